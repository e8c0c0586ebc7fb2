use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use tracing::warn;

use crate::channel::ClientChannel;
use crate::envelope::{response_id, MessageId, RESPONSE_PAYLOAD_OFFSET};
use crate::error::Result;
use crate::lock;

/// Called once when an RPC call completes.
///
/// Receives the full serialized response and the offset at which the return
/// value (or thrown error) begins.
pub type RpcCallback = Box<dyn FnOnce(Bytes, usize) + Send>;

/// Random draws before ID generation falls back to sequential probing.
/// A collision among pending u32 IDs is already vanishingly rare; the bound
/// only guarantees termination.
const MAX_ID_RETRIES: u32 = 32;

struct Pending {
    callbacks: HashMap<MessageId, RpcCallback>,
    rng: Box<dyn RngCore + Send>,
}

/// Correlates outgoing requests to completion callbacks.
///
/// Serialization of requests is the job of generated client code; this type
/// only tracks pending correlation IDs and resolves them when responses
/// arrive on the channel. A request that never receives a response leaves
/// its callback pending forever — there is no timeout or cancellation.
pub struct RpcClient {
    channel: Arc<dyn ClientChannel>,
    pending: Arc<Mutex<Pending>>,
}

impl RpcClient {
    /// Create a client over `channel` with an OS-seeded ID source.
    pub fn new(channel: Arc<dyn ClientChannel>) -> Self {
        Self::with_rng(channel, StdRng::from_os_rng())
    }

    /// Create a client with an explicit random source, for deterministic
    /// correlation IDs in tests.
    pub fn with_rng(channel: Arc<dyn ClientChannel>, rng: impl RngCore + Send + 'static) -> Self {
        let pending = Arc::new(Mutex::new(Pending {
            callbacks: HashMap::new(),
            rng: Box::new(rng),
        }));

        // The response path captures only the pending map, not the client.
        let pending_for_responses = Arc::clone(&pending);
        channel.on_response(Arc::new(move |data: Bytes| {
            resolve_response(&pending_for_responses, data);
        }));

        Self { channel, pending }
    }

    /// Register `callback` under `id` and forward `payload` to the channel.
    ///
    /// The caller has already encoded `id` into `payload`. If the channel
    /// rejects the send, the callback is deregistered before the error is
    /// returned.
    pub fn send_request(&self, id: MessageId, payload: Bytes, callback: RpcCallback) -> Result<()> {
        lock(&self.pending).callbacks.insert(id, callback);
        let sent = self.channel.send_request(payload);
        if sent.is_err() {
            lock(&self.pending).callbacks.remove(&id);
        }
        sent
    }

    /// Draw a correlation ID that no currently pending request is using.
    ///
    /// Uniform random u32, redrawn on collision; after [`MAX_ID_RETRIES`]
    /// draws, probes sequentially from the last candidate so the search
    /// always terminates. Uniqueness holds only among currently outstanding
    /// requests, not process-lifetime-wide.
    pub fn new_message_id(&self) -> MessageId {
        let mut pending = lock(&self.pending);
        let mut id = pending.rng.next_u32();
        let mut retries = 0;
        while pending.callbacks.contains_key(&id) {
            retries += 1;
            if retries < MAX_ID_RETRIES {
                id = pending.rng.next_u32();
            } else {
                id = id.wrapping_add(1);
            }
        }
        id
    }

    /// Number of requests still awaiting a response.
    pub fn pending_requests(&self) -> usize {
        lock(&self.pending).callbacks.len()
    }
}

/// Resolve one inbound response: remove the matching pending callback and
/// invoke it with the full buffer and the fixed return-value offset.
///
/// Removal enforces at-most-once delivery — a duplicate or replayed frame
/// finds no entry. Unmatched or malformed responses are dropped; the caller
/// is not notified.
fn resolve_response(pending: &Mutex<Pending>, data: Bytes) {
    let id = match response_id(&data) {
        Ok(id) => id,
        Err(err) => {
            warn!(error = %err, len = data.len(), "dropping malformed response frame");
            return;
        }
    };
    let callback = lock(pending).callbacks.remove(&id);
    match callback {
        Some(callback) => callback(data, RESPONSE_PAYLOAD_OFFSET),
        None => warn!(id, "dropping response with no pending request"),
    }
}
