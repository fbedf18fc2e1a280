//! One live daemon socket: reader and writer tasks plus the shared state the
//! client needs to correlate replies.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chia_protocol::Envelope;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, Notify};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, info, warn};

use crate::error::{ClientError, ClientResult};
use crate::pending::{PendingReply, PendingRequests};

type Hook = Box<dyn FnOnce() + Send + 'static>;

/// Connection lifecycle callbacks
///
/// `on_ready` runs once, when the daemon acknowledges registration.
/// `on_close` runs once, when the socket closes for any reason.
#[derive(Default)]
pub struct ConnectionHooks {
    on_ready: Option<Hook>,
    on_close: Option<Hook>,
}

impl ConnectionHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_ready(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.on_ready = Some(Box::new(hook));
        self
    }

    pub fn on_close(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.on_close = Some(Box::new(hook));
        self
    }
}

impl fmt::Debug for ConnectionHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHooks")
            .field("on_ready", &self.on_ready.is_some())
            .field("on_close", &self.on_close.is_some())
            .finish()
    }
}

/// Handle to an attached socket
///
/// Owns the pending request table for the socket's lifetime. The reader task
/// holds the other references and tears the state down when the socket ends.
pub(crate) struct Connection {
    outbound: mpsc::UnboundedSender<Message>,
    pending: Arc<PendingRequests>,
    open: Arc<AtomicBool>,
    closing: Arc<Notify>,
}

impl Connection {
    /// Split `stream`, spawn its reader and writer, and queue the
    /// registration envelope for `service_name`.
    ///
    /// After a local [`close`](Self::close) the reader waits at most
    /// `close_grace` for the peer's close reply.
    pub(crate) fn spawn<S>(
        stream: WebSocketStream<S>,
        service_name: &str,
        hooks: ConnectionHooks,
        close_grace: Duration,
    ) -> ClientResult<Self>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (sink, source) = stream.split();
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let pending = Arc::new(PendingRequests::new());
        let open = Arc::new(AtomicBool::new(true));
        let closing = Arc::new(Notify::new());

        tokio::spawn(write_loop(sink, outbound_rx));
        tokio::spawn(read_loop(
            source,
            ReaderState {
                pending: Arc::clone(&pending),
                open: Arc::clone(&open),
                closing: Arc::clone(&closing),
                close_grace,
            },
            hooks,
        ));

        let connection = Self {
            outbound,
            pending,
            open,
            closing,
        };
        connection.send(&Envelope::registration(service_name))?;
        Ok(connection)
    }

    pub(crate) fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    pub(crate) fn in_flight(&self) -> usize {
        self.pending.len()
    }

    /// Register the envelope's id, then queue it for the writer.
    ///
    /// Dropping the returned reply, on any path, removes the registration.
    pub(crate) fn dispatch(&self, envelope: &Envelope) -> ClientResult<PendingReply> {
        let reply = self.pending.watch(envelope.request_id.clone());
        // Closing marks the socket shut before draining the table, so an
        // entry registered after the drain is caught here.
        if !self.is_open() {
            return Err(ClientError::ConnectionClosed);
        }
        self.send(envelope)?;
        Ok(reply)
    }

    /// Queue a close frame and reject everything still waiting.
    pub(crate) fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
        // The writer may already be gone if the peer closed first.
        let _ = self.outbound.send(Message::Close(None));
        self.closing.notify_one();
        let rejected = self.pending.fail_all();
        if rejected > 0 {
            debug!("Rejected {} pending request(s) on disconnect", rejected);
        }
    }

    fn send(&self, envelope: &Envelope) -> ClientResult<()> {
        let text = envelope.to_json()?;
        self.outbound
            .send(Message::text(text))
            .map_err(|_| ClientError::ConnectionClosed)
    }
}

async fn write_loop<S>(
    mut sink: SplitSink<WebSocketStream<S>, Message>,
    mut outbound: mpsc::UnboundedReceiver<Message>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    while let Some(message) = outbound.recv().await {
        let closing = matches!(message, Message::Close(_));
        if let Err(e) = sink.send(message).await {
            debug!("Write to daemon socket failed: {}", e);
            break;
        }
        if closing {
            break;
        }
    }
}

/// Close drain limit used when the configured grace overflows the clock.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365);

/// Shared state the reader tears down when the socket ends
struct ReaderState {
    pending: Arc<PendingRequests>,
    open: Arc<AtomicBool>,
    closing: Arc<Notify>,
    close_grace: Duration,
}

async fn read_loop<S>(
    mut source: SplitStream<WebSocketStream<S>>,
    state: ReaderState,
    hooks: ConnectionHooks,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let ReaderState {
        pending,
        open,
        closing,
        close_grace,
    } = state;
    let ConnectionHooks {
        mut on_ready,
        on_close,
    } = hooks;
    let mut close_deadline: Option<Instant> = None;

    loop {
        let next = match close_deadline {
            None => tokio::select! {
                frame = source.next() => frame,
                _ = closing.notified() => {
                    let now = Instant::now();
                    close_deadline = Some(now.checked_add(close_grace).unwrap_or(now + FAR_FUTURE));
                    continue;
                }
            },
            Some(deadline) => match tokio::time::timeout_at(deadline, source.next()).await {
                Ok(frame) => frame,
                Err(_) => {
                    warn!("Daemon did not answer close within {:?}", close_grace);
                    break;
                }
            },
        };
        let Some(frame) = next else { break };

        let parsed = match frame {
            Ok(Message::Text(text)) => Envelope::from_json(text.as_str()),
            Ok(Message::Binary(bytes)) => Envelope::from_slice(&bytes),
            // Keep reading so tungstenite can flush the close reply; the
            // stream ends once the handshake completes.
            Ok(Message::Close(frame)) => {
                debug!("Daemon sent close frame: {:?}", frame);
                continue;
            }
            Ok(_) => continue,
            Err(e) => {
                warn!("Daemon socket read failed: {}", e);
                break;
            }
        };

        match parsed {
            Ok(envelope) => route(envelope, &pending, &mut on_ready),
            Err(e) => warn!("Discarding malformed message from daemon: {}", e),
        }
    }

    info!("Disconnecting...");
    open.store(false, Ordering::SeqCst);
    let rejected = pending.fail_all();
    if rejected > 0 {
        debug!("Rejected {} pending request(s) on close", rejected);
    }
    if let Some(hook) = on_close {
        hook();
    }
}

/// Correlate one inbound envelope.
///
/// Replies to pending requests win; otherwise a registration acknowledgement
/// fires the ready hook once; anything else is dropped.
fn route(envelope: Envelope, pending: &PendingRequests, on_ready: &mut Option<Hook>) {
    let envelope = match pending.resolve(envelope) {
        Ok(()) => return,
        Err(unmatched) => unmatched,
    };

    if envelope.is_registration() {
        if let Some(hook) = on_ready.take() {
            debug!("Registration acknowledged by daemon");
            hook();
            return;
        }
    }

    debug!(
        "Discarding unmatched '{}' message with request id '{}'",
        envelope.command, envelope.request_id
    );
}
