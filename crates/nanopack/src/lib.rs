//! Compact self-describing binary serialization with an RPC layer.
//!
//! NanoPack messages carry their schema tag and per-field sizes inline, so
//! a receiver can frame and route them without out-of-band metadata.
//!
//! # Crate Structure
//!
//! - [`wire`] — primitive codec over NanoPack buffers and the message
//!   contract generated types implement
//! - [`rpc`] — channels, transports, and request/response correlation

/// Re-export wire format types.
pub mod wire {
    pub use nanopack_wire::*;
}

/// Re-export RPC types.
pub mod rpc {
    pub use nanopack_rpc::*;
}
