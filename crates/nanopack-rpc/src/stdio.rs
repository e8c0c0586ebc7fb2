use std::io::{ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use bytes::Bytes;
use tracing::{debug, error};

use crate::channel::{ClientChannel, PayloadHandler, ServerChannel};
use crate::envelope::MessageKind;
use crate::error::{Result, RpcError};
use crate::lock;

/// Width of the little-endian length prefix framing each message.
pub const LENGTH_PREFIX_WIDTH: usize = 4;

/// A channel over a duplex byte stream, framed as
/// `[u32 LE length][length payload bytes]` per direction.
///
/// Serves both roles at once: one RPC client and one RPC server may be bound
/// to the same channel, typically when talking to a child process over its
/// stdin/stdout pipes. Request and response writes share one lock, so two
/// frames' bytes never interleave on the outbound flow.
///
/// [`StdioChannel::open`] must be called before any traffic is received. It
/// spawns one background thread that reads frames in a loop and runs each
/// frame's handler on its own thread, so the read loop never blocks on
/// handler execution.
///
/// Cloning is cheap and yields a handle to the same channel.
pub struct StdioChannel<R, W> {
    shared: Arc<Shared<R, W>>,
}

impl<R, W> Clone for StdioChannel<R, W> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

struct Shared<R, W> {
    /// Reader half, parked here whenever the read loop is not running.
    reader: Mutex<Option<R>>,
    writer: Mutex<W>,
    request_handler: Mutex<Option<PayloadHandler>>,
    response_handler: Mutex<Option<PayloadHandler>>,
    closed: AtomicBool,
}

impl<R, W> StdioChannel<R, W>
where
    R: Read + Send + 'static,
    W: Write + Send + 'static,
{
    /// Create a channel over the given stream halves.
    ///
    /// `reader` carries inbound frames (the remote's requests and
    /// responses); `writer` carries outbound ones.
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            shared: Arc::new(Shared {
                reader: Mutex::new(Some(reader)),
                writer: Mutex::new(writer),
                request_handler: Mutex::new(None),
                response_handler: Mutex::new(None),
                closed: AtomicBool::new(true),
            }),
        }
    }

    /// Start the background read loop.
    ///
    /// Fails with [`RpcError::AlreadyOpen`] while a previous loop still owns
    /// the reader half. After [`StdioChannel::close`] (or a peer-initiated
    /// shutdown) the loop parks the reader back and `open` may be called
    /// again — provided the caller has confirmed the remote endpoint is
    /// still alive.
    pub fn open(&self) -> Result<()> {
        let reader = lock(&self.shared.reader)
            .take()
            .ok_or(RpcError::AlreadyOpen)?;
        self.shared.closed.store(false, Ordering::Release);

        let shared = Arc::clone(&self.shared);
        thread::spawn(move || {
            let reader = shared.read_loop(reader);
            *lock(&shared.reader) = Some(reader);
        });
        Ok(())
    }

    /// Request the read loop to stop.
    ///
    /// Cooperative: the flag is checked between iterations, so a read
    /// already blocked on the stream will not observe the close until that
    /// read completes.
    pub fn close(&self) {
        self.shared.closed.store(true, Ordering::Release);
    }
}

impl<R, W> Shared<R, W>
where
    R: Read + Send + 'static,
    W: Write + Send + 'static,
{
    fn read_loop(&self, mut reader: R) -> R {
        while !self.closed.load(Ordering::Acquire) {
            let mut len_buf = [0u8; LENGTH_PREFIX_WIDTH];
            match read_full(&mut reader, &mut len_buf) {
                Ok(0) => {
                    debug!("stream closed by peer");
                    break;
                }
                Ok(n) if n < LENGTH_PREFIX_WIDTH => {
                    let err = RpcError::Framing {
                        expected: LENGTH_PREFIX_WIDTH,
                        got: n,
                    };
                    error!(error = %err, "stream ended inside a length prefix");
                    break;
                }
                Ok(_) => {}
                Err(err) => {
                    error!(error = %err, "read loop failed");
                    break;
                }
            }

            let len = u32::from_le_bytes(len_buf) as usize;
            if len == 0 {
                // Zero-length frame is a no-op.
                continue;
            }

            let mut payload = vec![0u8; len];
            match read_full(&mut reader, &mut payload) {
                Ok(n) if n < len => {
                    let err = RpcError::Framing {
                        expected: len,
                        got: n,
                    };
                    error!(error = %err, "stream ended inside a frame payload");
                    break;
                }
                Ok(_) => {}
                Err(err) => {
                    error!(error = %err, "read loop failed");
                    break;
                }
            }

            self.dispatch(Bytes::from(payload));
        }
        reader
    }

    /// Hand a complete frame to the registered handler for its kind, on a
    /// thread of its own. Frames with no matching handler or an unrecognized
    /// kind byte are dropped.
    fn dispatch(&self, payload: Bytes) {
        let handler = match payload.first().copied().and_then(MessageKind::from_byte) {
            Some(MessageKind::Request) => lock(&self.request_handler).clone(),
            Some(MessageKind::Response) => lock(&self.response_handler).clone(),
            None => {
                debug!(kind = ?payload.first(), "dropping frame with unrecognized kind");
                return;
            }
        };

        match handler {
            Some(handler) => {
                thread::spawn(move || handler(payload));
            }
            None => debug!("dropping frame: no handler registered for its kind"),
        }
    }

    /// Write one frame (length prefix plus payload) under the writer lock.
    fn send_frame(&self, data: &[u8]) -> Result<()> {
        if data.len() > u32::MAX as usize {
            return Err(RpcError::PayloadTooLarge {
                size: data.len(),
                max: u32::MAX as usize,
            });
        }

        let mut writer = lock(&self.writer);
        writer.write_all(&(data.len() as u32).to_le_bytes())?;
        writer.write_all(data)?;
        writer.flush()?;
        Ok(())
    }
}

impl<R, W> ClientChannel for StdioChannel<R, W>
where
    R: Read + Send + 'static,
    W: Write + Send + 'static,
{
    fn send_request(&self, data: Bytes) -> Result<()> {
        self.shared.send_frame(&data)
    }

    fn on_response(&self, handler: PayloadHandler) {
        *lock(&self.shared.response_handler) = Some(handler);
    }
}

impl<R, W> ServerChannel for StdioChannel<R, W>
where
    R: Read + Send + 'static,
    W: Write + Send + 'static,
{
    fn on_request(&self, handler: PayloadHandler) {
        *lock(&self.shared.request_handler) = Some(handler);
    }

    fn send_response(&self, data: Bytes) -> Result<()> {
        self.shared.send_frame(&data)
    }
}

/// Read until `buf` is full or the stream ends, retrying on `Interrupted`.
///
/// Returns how many bytes were read; fewer than `buf.len()` means EOF.
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(RpcError::Io(err)),
        }
    }
    Ok(filled)
}
