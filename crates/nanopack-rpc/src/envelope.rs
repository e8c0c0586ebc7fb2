use bytes::BytesMut;
use nanopack_wire::{WireRead, WireWrite};

use crate::error::{Result, RpcError};

/// Random 32-bit identifier pairing a request with its eventual response.
pub type MessageId = u32;

/// Byte offset of the kind byte in every RPC envelope.
pub const KIND_OFFSET: usize = 0;
/// Byte offset of the little-endian correlation ID.
pub const MESSAGE_ID_OFFSET: usize = 1;
/// Byte offset of the method-name length in a request envelope.
pub const METHOD_LEN_OFFSET: usize = 5;
/// Byte offset of the UTF-8 method name in a request envelope.
pub const METHOD_NAME_OFFSET: usize = 9;
/// Byte offset where a response's return value (or thrown error) begins.
pub const RESPONSE_PAYLOAD_OFFSET: usize = 5;

/// RPC envelope kind, stored in the first payload byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageKind {
    Request = 1,
    Response = 2,
}

impl MessageKind {
    /// Decode a kind byte. Unrecognized values yield `None`; frames carrying
    /// them are dropped by the transport.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(MessageKind::Request),
            2 => Some(MessageKind::Response),
            _ => None,
        }
    }
}

/// Decoded head of a request envelope.
///
/// Wire layout: kind (1) + correlation ID (4 LE) + method-name length
/// (4 LE) + UTF-8 method name + argument bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    pub id: MessageId,
    pub method: String,
    /// Offset of the first argument byte (`9 + method.len()`).
    pub args_offset: usize,
}

impl RequestHead {
    /// Parse the head of a request envelope.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        let kind = buf.read_u8(KIND_OFFSET)?;
        if MessageKind::from_byte(kind) != Some(MessageKind::Request) {
            return Err(RpcError::MalformedRequest("kind byte is not a request"));
        }
        let id = buf.read_u32(MESSAGE_ID_OFFSET)?;
        let method_len = buf.read_u32(METHOD_LEN_OFFSET)? as usize;
        let method = buf.read_string(METHOD_NAME_OFFSET, method_len)?;
        Ok(Self {
            id,
            method,
            args_offset: METHOD_NAME_OFFSET + method_len,
        })
    }
}

/// Append a request head (kind, correlation ID, method-name length, method
/// name) to `buf`. Argument bytes follow.
pub fn encode_request_head(buf: &mut BytesMut, id: MessageId, method: &str) {
    buf.append_u8(MessageKind::Request as u8);
    buf.append_u32(id);
    buf.append_u32(method.len() as u32);
    buf.append_string(method);
}

/// Append a response head (kind, correlation ID) to `buf`. The return value
/// or thrown-error bytes follow.
pub fn encode_response_head(buf: &mut BytesMut, id: MessageId) {
    buf.append_u8(MessageKind::Response as u8);
    buf.append_u32(id);
}

/// Read the correlation ID of a response envelope.
pub fn response_id(buf: &[u8]) -> Result<MessageId> {
    let kind = buf.read_u8(KIND_OFFSET)?;
    if MessageKind::from_byte(kind) != Some(MessageKind::Response) {
        return Err(RpcError::MalformedResponse("kind byte is not a response"));
    }
    Ok(buf.read_u32(MESSAGE_ID_OFFSET)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_head_roundtrip() {
        let mut buf = BytesMut::new();
        encode_request_head(&mut buf, 0xDEADBEEF, "greet");
        buf.extend_from_slice(b"args");

        let head = RequestHead::parse(&buf).unwrap();
        assert_eq!(head.id, 0xDEADBEEF);
        assert_eq!(head.method, "greet");
        assert_eq!(head.args_offset, METHOD_NAME_OFFSET + 5);
        assert_eq!(&buf[head.args_offset..], b"args");
    }

    #[test]
    fn request_head_layout() {
        let mut buf = BytesMut::new();
        encode_request_head(&mut buf, 2, "ab");

        assert_eq!(&buf[..], &[1, 2, 0, 0, 0, 2, 0, 0, 0, b'a', b'b']);
    }

    #[test]
    fn empty_method_name() {
        let mut buf = BytesMut::new();
        encode_request_head(&mut buf, 9, "");

        let head = RequestHead::parse(&buf).unwrap();
        assert_eq!(head.method, "");
        assert_eq!(head.args_offset, METHOD_NAME_OFFSET);
    }

    #[test]
    fn request_head_rejects_response_kind() {
        let mut buf = BytesMut::new();
        encode_response_head(&mut buf, 1);
        assert!(matches!(
            RequestHead::parse(&buf),
            Err(RpcError::MalformedRequest(_))
        ));
    }

    #[test]
    fn truncated_request_head_fails() {
        let buf: &[u8] = &[1, 5, 0, 0];
        assert!(matches!(
            RequestHead::parse(buf),
            Err(RpcError::Decode(_))
        ));
    }

    #[test]
    fn response_id_roundtrip() {
        let mut buf = BytesMut::new();
        encode_response_head(&mut buf, u32::MAX);
        buf.extend_from_slice(b"return value");

        assert_eq!(response_id(&buf).unwrap(), u32::MAX);
        assert_eq!(&buf[RESPONSE_PAYLOAD_OFFSET..], b"return value");
    }

    #[test]
    fn response_id_rejects_request_kind() {
        let mut buf = BytesMut::new();
        encode_request_head(&mut buf, 1, "m");
        assert!(matches!(
            response_id(&buf),
            Err(RpcError::MalformedResponse(_))
        ));
    }

    #[test]
    fn unknown_kind_byte() {
        assert_eq!(MessageKind::from_byte(1), Some(MessageKind::Request));
        assert_eq!(MessageKind::from_byte(2), Some(MessageKind::Response));
        assert_eq!(MessageKind::from_byte(0), None);
        assert_eq!(MessageKind::from_byte(3), None);
    }
}
