/// Errors that can occur while reading or writing NanoPack buffers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    /// A read or in-place write reached past the end of the buffer.
    #[error("{need} bytes at offset {offset} out of bounds (buffer is {len} bytes)")]
    OutOfBounds {
        offset: usize,
        need: usize,
        len: usize,
    },

    /// A string field did not contain valid UTF-8.
    ///
    /// Distinct from [`WireError::OutOfBounds`]: the bytes were present but
    /// could not be decoded.
    #[error("invalid UTF-8 in string field at offset {offset}")]
    InvalidUtf8 { offset: usize },

    /// A required variable-length field was unset at encode time.
    #[error("required field unset: {0}")]
    MissingField(&'static str),
}

pub type Result<T> = std::result::Result<T, WireError>;
