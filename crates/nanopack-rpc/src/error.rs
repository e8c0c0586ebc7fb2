use bytes::Bytes;
use nanopack_wire::WireError;

/// Errors that can occur in RPC channels, clients, and servers.
///
/// Unmatched correlation IDs and unknown frame kinds are deliberately *not*
/// errors: those frames are dropped and logged, and the caller is not
/// notified (a documented limitation of the protocol).
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    /// A received response could not be interpreted.
    #[error("malformed response: {0}")]
    MalformedResponse(&'static str),

    /// A received request could not be interpreted.
    #[error("malformed request: {0}")]
    MalformedRequest(&'static str),

    /// A field could not be decoded from a buffer.
    #[error("decode failure: {0}")]
    Decode(#[from] WireError),

    /// The remote handler threw a schema-typed error, carried verbatim in
    /// the response payload.
    #[error("remote handler threw a schema-typed error ({} bytes)", .0.len())]
    Thrown(Bytes),

    /// A stream frame ended before its declared length was read.
    #[error("framing violation: expected {expected} bytes, got {got}")]
    Framing { expected: usize, got: usize },

    /// An outbound payload does not fit the 4-byte length prefix.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// I/O error on the underlying transport.
    #[error("channel I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The channel's read loop is already running.
    #[error("channel already open")]
    AlreadyOpen,
}

pub type Result<T> = std::result::Result<T, RpcError>;
