use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use bytes::{Bytes, BytesMut};
use tracing::{debug, warn};

use crate::channel::ServerChannel;
use crate::envelope::{encode_response_head, MessageId, RequestHead};
use crate::lock;

/// Handles one matching RPC call.
///
/// Receives the full serialized request, the offset at which the serialized
/// arguments begin, and the call's correlation ID. Returns the serialized
/// response (which must carry that ID), or `None` if the call produces no
/// response.
pub type CallHandler = Arc<dyn Fn(&[u8], usize, MessageId) -> Option<Bytes> + Send + Sync>;

/// Dispatches incoming requests to registered method handlers.
///
/// Handlers are registered at setup time and read during traffic; the map
/// is unbounded. Deserializing arguments and serializing responses is the
/// job of generated server code.
pub struct RpcServer {
    channel: Arc<dyn ServerChannel>,
    handlers: Arc<Mutex<HashMap<String, CallHandler>>>,
}

impl RpcServer {
    pub fn new(channel: Arc<dyn ServerChannel>) -> Self {
        let handlers: Arc<Mutex<HashMap<String, CallHandler>>> =
            Arc::new(Mutex::new(HashMap::new()));

        let handlers_for_requests = Arc::clone(&handlers);
        let channel_for_replies = Arc::clone(&channel);
        channel.on_request(Arc::new(move |data: Bytes| {
            handle_request(&handlers_for_requests, channel_for_replies.as_ref(), data);
        }));

        Self { channel, handlers }
    }

    /// Register `handler` for calls to `method`, replacing any previous
    /// registration under that name.
    pub fn on<F>(&self, method: impl Into<String>, handler: F)
    where
        F: Fn(&[u8], usize, MessageId) -> Option<Bytes> + Send + Sync + 'static,
    {
        lock(&self.handlers).insert(method.into(), Arc::new(handler));
    }

    /// The channel this server replies through.
    pub fn channel(&self) -> &Arc<dyn ServerChannel> {
        &self.channel
    }
}

fn handle_request(
    handlers: &Mutex<HashMap<String, CallHandler>>,
    channel: &dyn ServerChannel,
    data: Bytes,
) {
    let head = match RequestHead::parse(&data) {
        Ok(head) => head,
        Err(err) => {
            warn!(error = %err, "dropping malformed request frame");
            return;
        }
    };

    let handler = lock(handlers).get(&head.method).cloned();
    let Some(handler) = handler else {
        warn!(method = %head.method, id = head.id, "no handler for method");
        // Reply with a bare response head and an empty result region, so
        // the caller's pending callback is consumed instead of leaking.
        // Typed decoding of the empty region fails on the client, which
        // surfaces the call as a malformed response.
        let mut reply = BytesMut::new();
        encode_response_head(&mut reply, head.id);
        if let Err(err) = channel.send_response(reply.freeze()) {
            warn!(error = %err, "failed sending unknown-method response");
        }
        return;
    };

    match handler(&data, head.args_offset, head.id) {
        Some(response) => {
            if let Err(err) = channel.send_response(response) {
                warn!(error = %err, method = %head.method, "failed sending response");
            }
        }
        None => debug!(method = %head.method, "handler produced no response"),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use nanopack_wire::WireRead;

    use super::*;
    use crate::channel::ClientChannel;
    use crate::envelope::{encode_request_head, RESPONSE_PAYLOAD_OFFSET};
    use crate::memory::in_memory_pair;

    fn request(id: MessageId, method: &str, args: &[u8]) -> Bytes {
        let mut buf = BytesMut::new();
        encode_request_head(&mut buf, id, method);
        buf.extend_from_slice(args);
        buf.freeze()
    }

    fn capture_responses(
        client: &Arc<crate::memory::InMemoryClientChannel>,
    ) -> Arc<Mutex<Vec<Bytes>>> {
        let responses = Arc::new(Mutex::new(Vec::new()));
        let responses_in_handler = Arc::clone(&responses);
        client.on_response(Arc::new(move |data: Bytes| {
            responses_in_handler.lock().unwrap().push(data);
        }));
        responses
    }

    #[test]
    fn dispatches_to_matching_handler() {
        let (client, server_channel) = in_memory_pair();
        let responses = capture_responses(&client);

        let server = RpcServer::new(Arc::clone(&server_channel) as Arc<dyn ServerChannel>);
        server.on("echo", |data: &[u8], offset, id| {
            let mut reply = BytesMut::new();
            encode_response_head(&mut reply, id);
            reply.extend_from_slice(&data[offset..]);
            Some(reply.freeze())
        });

        client.send_request(request(41, "echo", b"args")).unwrap();

        let responses = responses.lock().unwrap();
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].read_u32(1).unwrap(), 41);
        assert_eq!(&responses[0][RESPONSE_PAYLOAD_OFFSET..], b"args");
    }

    #[test]
    fn handler_gets_args_offset_past_method_name() {
        let (client, server_channel) = in_memory_pair();
        let server = RpcServer::new(Arc::clone(&server_channel) as Arc<dyn ServerChannel>);

        let seen = Arc::new(Mutex::new(None));
        let seen_in_handler = Arc::clone(&seen);
        server.on("add", move |data: &[u8], offset, id| {
            *seen_in_handler.lock().unwrap() = Some((data[offset..].to_vec(), offset, id));
            None
        });

        client.send_request(request(9, "add", &[5, 6])).unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.as_ref().unwrap(), &(vec![5, 6], 9 + 3, 9));
    }

    #[test]
    fn none_from_handler_sends_nothing() {
        let (client, server_channel) = in_memory_pair();
        let responses = capture_responses(&client);

        let server = RpcServer::new(Arc::clone(&server_channel) as Arc<dyn ServerChannel>);
        server.on("fire_and_forget", |_: &[u8], _, _| None);

        client
            .send_request(request(1, "fire_and_forget", b""))
            .unwrap();

        assert!(responses.lock().unwrap().is_empty());
    }

    #[test]
    fn unknown_method_sends_empty_error_response() {
        let (client, server_channel) = in_memory_pair();
        let responses = capture_responses(&client);

        let _server = RpcServer::new(Arc::clone(&server_channel) as Arc<dyn ServerChannel>);

        client.send_request(request(77, "missing", b"")).unwrap();

        let responses = responses.lock().unwrap();
        assert_eq!(responses.len(), 1);
        // Bare head: kind, correlation ID, empty result region.
        assert_eq!(responses[0].as_ref(), &[2, 77, 0, 0, 0]);
    }

    #[test]
    fn malformed_request_is_dropped() {
        let (client, server_channel) = in_memory_pair();
        let responses = capture_responses(&client);

        let server = RpcServer::new(Arc::clone(&server_channel) as Arc<dyn ServerChannel>);
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in_handler = Arc::clone(&calls);
        server.on("echo", move |_: &[u8], _, _| {
            calls_in_handler.fetch_add(1, Ordering::SeqCst);
            None
        });

        // Method-name length runs past the end of the buffer.
        client
            .send_request(Bytes::from_static(&[1, 9, 0, 0, 0, 200, 0, 0, 0]))
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(responses.lock().unwrap().is_empty());
    }

    #[test]
    fn later_registration_overwrites_earlier() {
        let (client, server_channel) = in_memory_pair();
        let responses = capture_responses(&client);

        let server = RpcServer::new(Arc::clone(&server_channel) as Arc<dyn ServerChannel>);
        server.on("greet", |_: &[u8], _, id| {
            let mut reply = BytesMut::new();
            encode_response_head(&mut reply, id);
            reply.extend_from_slice(b"old");
            Some(reply.freeze())
        });
        server.on("greet", |_: &[u8], _, id| {
            let mut reply = BytesMut::new();
            encode_response_head(&mut reply, id);
            reply.extend_from_slice(b"new");
            Some(reply.freeze())
        });

        client.send_request(request(3, "greet", b"")).unwrap();

        let responses = responses.lock().unwrap();
        assert_eq!(&responses[0][RESPONSE_PAYLOAD_OFFSET..], b"new");
    }
}
