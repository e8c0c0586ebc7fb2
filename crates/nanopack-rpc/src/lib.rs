//! RPC over the NanoPack wire format.
//!
//! Messages travel as opaque byte payloads over a [`channel`], with a
//! one-byte kind tag (1 = request, 2 = response) and a little-endian
//! correlation ID pairing each request with its eventual response.
//!
//! Two channel implementations are provided:
//! - [`memory`] — a synchronous in-process loopback pair for same-process
//!   and test scenarios
//! - [`stdio`] — a length-prefixed duplex byte stream with a background
//!   read loop, for talking to another process over its pipes
//!
//! [`client::RpcClient`] correlates outgoing requests to completion
//! callbacks; [`server::RpcServer`] dispatches incoming requests to
//! registered method handlers. Constructing and interpreting typed request
//! and response payloads is the job of schema-generated code built on
//! `nanopack-wire`.

pub mod channel;
pub mod client;
pub mod envelope;
pub mod error;
pub mod memory;
pub mod server;
pub mod stdio;

pub use channel::{ClientChannel, PayloadHandler, ServerChannel};
pub use client::{RpcCallback, RpcClient};
pub use envelope::{
    encode_request_head, encode_response_head, response_id, MessageId, MessageKind, RequestHead,
    MESSAGE_ID_OFFSET, METHOD_LEN_OFFSET, METHOD_NAME_OFFSET, RESPONSE_PAYLOAD_OFFSET,
};
pub use error::{Result, RpcError};
pub use memory::{in_memory_pair, InMemoryClientChannel, InMemoryServerChannel};
pub use server::{CallHandler, RpcServer};
pub use stdio::StdioChannel;

/// Lock a mutex, recovering the guard if a handler panicked while holding
/// it. The maps guarded here stay consistent across panics because every
/// critical section is a single insert, remove, or clone.
pub(crate) fn lock<T>(mutex: &std::sync::Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
