use std::sync::{Arc, Mutex, Weak};

use bytes::Bytes;
use tracing::debug;

use crate::channel::{ClientChannel, PayloadHandler, ServerChannel};
use crate::error::Result;
use crate::lock;

/// Client half of a synchronous in-process channel pair.
///
/// Sends invoke the paired server's request handler on the same call stack;
/// there is no buffering, so a send before the peer has registered a handler
/// (or before pairing) is a silent no-op — the message is lost, not queued.
/// Intended for same-process and test scenarios.
pub struct InMemoryClientChannel {
    response_handler: Mutex<Option<PayloadHandler>>,
    server: Mutex<Weak<InMemoryServerChannel>>,
}

/// Server half of a synchronous in-process channel pair.
pub struct InMemoryServerChannel {
    request_handler: Mutex<Option<PayloadHandler>>,
    client: Mutex<Weak<InMemoryClientChannel>>,
}

impl InMemoryClientChannel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            response_handler: Mutex::new(None),
            server: Mutex::new(Weak::new()),
        })
    }

    /// Direct this channel's requests at `server`.
    ///
    /// Held weakly: if the server half is dropped, subsequent sends become
    /// silent no-ops.
    pub fn send_to(&self, server: &Arc<InMemoryServerChannel>) {
        *lock(&self.server) = Arc::downgrade(server);
    }

    fn deliver_response(&self, data: Bytes) {
        let handler = lock(&self.response_handler).clone();
        match handler {
            Some(handler) => handler(data),
            None => debug!("in-memory response dropped: no handler registered"),
        }
    }
}

impl InMemoryServerChannel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            request_handler: Mutex::new(None),
            client: Mutex::new(Weak::new()),
        })
    }

    /// Direct this channel's responses at `client`.
    pub fn reply_to(&self, client: &Arc<InMemoryClientChannel>) {
        *lock(&self.client) = Arc::downgrade(client);
    }

    fn deliver_request(&self, data: Bytes) {
        let handler = lock(&self.request_handler).clone();
        match handler {
            Some(handler) => handler(data),
            None => debug!("in-memory request dropped: no handler registered"),
        }
    }
}

impl ClientChannel for InMemoryClientChannel {
    fn send_request(&self, data: Bytes) -> Result<()> {
        let server = lock(&self.server).upgrade();
        match server {
            Some(server) => server.deliver_request(data),
            None => debug!("in-memory request dropped: channel not paired"),
        }
        Ok(())
    }

    fn on_response(&self, handler: PayloadHandler) {
        *lock(&self.response_handler) = Some(handler);
    }
}

impl ServerChannel for InMemoryServerChannel {
    fn on_request(&self, handler: PayloadHandler) {
        *lock(&self.request_handler) = Some(handler);
    }

    fn send_response(&self, data: Bytes) -> Result<()> {
        let client = lock(&self.client).upgrade();
        match client {
            Some(client) => client.deliver_response(data),
            None => debug!("in-memory response dropped: channel not paired"),
        }
        Ok(())
    }
}

/// Create an already-paired client/server channel couple.
pub fn in_memory_pair() -> (Arc<InMemoryClientChannel>, Arc<InMemoryServerChannel>) {
    let client = InMemoryClientChannel::new();
    let server = InMemoryServerChannel::new();
    client.send_to(&server);
    server.reply_to(&client);
    (client, server)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn request_and_response_same_call_stack() {
        let (client, server) = in_memory_pair();

        let server_for_reply = Arc::clone(&server);
        server.on_request(Arc::new(move |data: Bytes| {
            assert_eq!(data.as_ref(), b"ping");
            server_for_reply
                .send_response(Bytes::from_static(b"pong"))
                .unwrap();
        }));

        let got = Arc::new(Mutex::new(None));
        let got_in_handler = Arc::clone(&got);
        client.on_response(Arc::new(move |data: Bytes| {
            *got_in_handler.lock().unwrap() = Some(data);
        }));

        client.send_request(Bytes::from_static(b"ping")).unwrap();

        // Fully synchronous: the response landed before send_request returned.
        assert_eq!(got.lock().unwrap().as_deref(), Some(b"pong".as_ref()));
    }

    #[test]
    fn send_before_handler_is_silent_noop() {
        let (client, server) = in_memory_pair();

        client.send_request(Bytes::from_static(b"lost")).unwrap();

        let count = Arc::new(AtomicUsize::new(0));
        let count_in_handler = Arc::clone(&count);
        server.on_request(Arc::new(move |_| {
            count_in_handler.fetch_add(1, Ordering::SeqCst);
        }));

        // The earlier message was lost, not queued.
        assert_eq!(count.load(Ordering::SeqCst), 0);

        client.send_request(Bytes::from_static(b"seen")).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn send_before_pairing_is_silent_noop() {
        let client = InMemoryClientChannel::new();
        client.send_request(Bytes::from_static(b"nowhere")).unwrap();
    }

    #[test]
    fn nested_send_from_handler_does_not_deadlock() {
        let (client, server) = in_memory_pair();

        let count = Arc::new(AtomicUsize::new(0));
        let count_in_handler = Arc::clone(&count);
        let client_for_resend = Arc::clone(&client);
        server.on_request(Arc::new(move |data: Bytes| {
            if count_in_handler.fetch_add(1, Ordering::SeqCst) == 0 {
                // Re-enter the same pair from within the handler.
                client_for_resend.send_request(data).unwrap();
            }
        }));

        client.send_request(Bytes::from_static(b"again")).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn dropped_peer_makes_sends_noops() {
        let (client, server) = in_memory_pair();
        drop(server);
        client.send_request(Bytes::from_static(b"gone")).unwrap();
    }
}
