use std::sync::Arc;

use bytes::Bytes;

use crate::error::Result;

/// Callback invoked with one complete inbound payload.
///
/// Cloned out of its registration slot before invocation, so a handler may
/// itself send on the same channel.
pub type PayloadHandler = Arc<dyn Fn(Bytes) + Send + Sync>;

/// Client side of a channel: sends serialized requests, receives serialized
/// responses.
///
/// Channels carry opaque bytes only. Each `send_request` call and each
/// handler invocation delivers exactly one logical message; any framing
/// needed by the underlying transport is the channel's own concern.
pub trait ClientChannel: Send + Sync {
    /// Send one serialized RPC request to the server side.
    fn send_request(&self, data: Bytes) -> Result<()>;

    /// Register the callback invoked for every inbound response,
    /// replacing any previous registration.
    fn on_response(&self, handler: PayloadHandler);
}

/// Server side of a channel: receives serialized requests, sends serialized
/// responses.
pub trait ServerChannel: Send + Sync {
    /// Register the callback invoked for every inbound request,
    /// replacing any previous registration.
    fn on_request(&self, handler: PayloadHandler);

    /// Send one serialized RPC response to the client side.
    fn send_response(&self, data: Bytes) -> Result<()>;
}
