use bytes::Bytes;

use crate::codec::TypeId;
use crate::error::Result;

/// Capability implemented by every generated NanoPack message type.
///
/// A message buffer starts with its [`TypeId`] in bytes 0–3, followed by a
/// size-header table with one 4-byte little-endian entry per variable-length
/// field at offset `4 * (field + 1)`, followed by the payload region. Field
/// layout inside the payload is schema-defined and out of scope here; every
/// implementor must honor the header convention.
pub trait Message: Sized {
    /// The schema tag of this message.
    fn type_id(&self) -> TypeId;

    /// Decode a message occupying the whole buffer.
    ///
    /// Fails if the buffer is malformed for this schema.
    fn from_bytes(buf: &[u8]) -> Result<Self>;

    /// Decode a message embedded at the start of a larger buffer, reporting
    /// how many bytes it consumed (e.g. RPC arguments followed by more
    /// data).
    fn from_bytes_prefix(buf: &[u8]) -> Result<(Self, usize)>;

    /// Encode this message into a fresh buffer.
    ///
    /// Fails if a required variable-length field is unset.
    fn to_bytes(&self) -> Result<Bytes>;
}
