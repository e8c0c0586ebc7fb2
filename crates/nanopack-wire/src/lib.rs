//! NanoPack binary wire format primitives.
//!
//! A NanoPack message buffer is self-describing:
//! - Bytes 0–3: little-endian [`TypeId`] identifying the schema
//! - A size-header table: one 4-byte little-endian length per
//!   variable-length field, at offset `4 * (field + 1)`
//! - The payload region, with schema-defined field ordering
//!
//! [`codec`] provides primitive reads and writes over such buffers;
//! [`message`] defines the contract every generated message type implements
//! on top of them.

pub mod codec;
pub mod error;
pub mod message;

pub use codec::{field_size_offset, Size, TypeId, WireRead, WireWrite, SIZE_ENTRY_WIDTH};
pub use error::{Result, WireError};
pub use message::Message;
