//! Agent channel session
//!
//! Owns one logical channel to a discovered companion service. The
//! transport is a WebSocket carrying JSON envelopes; the session drives
//! the handshake, a single receive loop (frames are processed strictly in
//! arrival order), a writer task, and a cancellable periodic keepalive.
//!
//! State machine: `Disconnected -> Connecting -> Connected ->
//! {Disconnected | Failed}`. `Failed` is only left through an explicit
//! `disconnect()`, which is legal from any state and idempotent. Absence
//! of keepalive traffic is not treated as failure; only a transport-level
//! read error or close is.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use tether_core::config::ChannelConfig;
use tether_core::error::ChannelError;
use tether_core::time::current_time_millis;
use tether_core::{ConnectionState, ServiceDescriptor};
use tether_protocol::{AgentMessage, Envelope, HandshakePayload, PROTOCOL_VERSION};

use crate::coalescer::{ConversationMessage, MessageCoalescer};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, WsMessage>;
type WsSource = SplitStream<WsStream>;

/// Capacity of the outbound frame queue between callers and the writer
/// task. Outbound traffic is small (handshake, pings, user requests), so
/// a modest buffer is plenty.
const OUTBOUND_QUEUE_CAPACITY: usize = 64;

/// Result of the handshake exchange
enum HandshakeOutcome {
    Accepted,
    Rejected(String),
}

/// Live transport bookkeeping for one established (or establishing) channel
struct ActiveChannel {
    /// Distinguishes this connect attempt from later ones
    generation: u64,
    /// Endpoint this channel is bound to
    endpoint: String,
    /// Queue into the writer task
    outbound: mpsc::Sender<Envelope>,
    /// Receive loop handle
    recv_task: JoinHandle<()>,
    /// Writer task handle
    writer_task: JoinHandle<()>,
    /// Stops the keepalive task
    keepalive: CancellationToken,
}

/// One logical channel to a companion service
pub struct ChannelSession {
    config: ChannelConfig,
    state_tx: Arc<watch::Sender<ConnectionState>>,
    coalescer: Arc<Mutex<MessageCoalescer>>,
    visible_rx: watch::Receiver<Vec<ConversationMessage>>,
    inner: Mutex<Option<ActiveChannel>>,
    generation: AtomicU64,
}

impl ChannelSession {
    /// Create an idle session
    pub fn new(config: ChannelConfig) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let coalescer = MessageCoalescer::new();
        let visible_rx = coalescer.subscribe();
        Self {
            config,
            state_tx: Arc::new(state_tx),
            coalescer: Arc::new(Mutex::new(coalescer)),
            visible_rx,
            inner: Mutex::new(None),
            generation: AtomicU64::new(0),
        }
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        self.state_tx.borrow().clone()
    }

    /// Subscribe to connection state changes
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Subscribe to the visible coalesced message list
    pub fn messages(&self) -> watch::Receiver<Vec<ConversationMessage>> {
        self.visible_rx.clone()
    }

    /// The reason the session failed, if it is in the Failed state
    pub fn last_error(&self) -> Option<String> {
        self.state().failure_reason().map(str::to_owned)
    }

    /// The endpoint the session is currently bound to
    pub async fn endpoint(&self) -> Option<String> {
        self.inner.lock().await.as_ref().map(|a| a.endpoint.clone())
    }

    /// Connect to a discovered service and perform the handshake.
    ///
    /// Transitions to Connecting, opens the transport, starts the receive
    /// loop, sends `ClientHandshake`, and waits for the server's verdict.
    /// Enters Connected only on `ConnectionAccepted`; rejection, timeout,
    /// or transport failure leaves the session Failed with a reason. A
    /// concurrent `disconnect()` supersedes the attempt.
    pub async fn connect(&self, descriptor: &ServiceDescriptor) -> Result<(), ChannelError> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let (handshake_tx, handshake_rx) = oneshot::channel();

        {
            let mut inner = self.inner.lock().await;
            teardown(&mut inner);
            self.state_tx.send_replace(ConnectionState::Connecting);

            info!("Connecting to {}", descriptor.endpoint);
            let stream = match connect_async(descriptor.endpoint.as_str()).await {
                Ok((stream, _response)) => stream,
                Err(e) => {
                    let reason = e.to_string();
                    self.state_tx
                        .send_replace(ConnectionState::Failed(reason.clone()));
                    return Err(ChannelError::TransportLost(reason));
                }
            };
            let (sink, source) = stream.split();

            let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
            let writer_task = tokio::spawn(write_loop(sink, outbound_rx));
            let recv_task = tokio::spawn(receive_loop(
                source,
                Arc::clone(&self.coalescer),
                Arc::clone(&self.state_tx),
                outbound_tx.clone(),
                handshake_tx,
            ));

            // Handshake is sent while still Connecting
            let handshake = Envelope::new(
                Uuid::new_v4().to_string(),
                current_time_millis(),
                AgentMessage::ClientHandshake(HandshakePayload {
                    client_type: self.config.client_type.clone(),
                    version: PROTOCOL_VERSION.to_string(),
                    capabilities: self.config.capabilities.clone(),
                }),
            );
            if outbound_tx.send(handshake).await.is_err() {
                let reason = "transport closed before handshake".to_string();
                self.state_tx
                    .send_replace(ConnectionState::Failed(reason.clone()));
                return Err(ChannelError::TransportLost(reason));
            }

            *inner = Some(ActiveChannel {
                generation,
                endpoint: descriptor.endpoint.clone(),
                outbound: outbound_tx,
                recv_task,
                writer_task,
                keepalive: CancellationToken::new(),
            });
        }

        // Lock released while waiting so disconnect() can supersede us
        let outcome =
            tokio::time::timeout(self.config.handshake_timeout, handshake_rx).await;

        let mut inner = self.inner.lock().await;
        let current_generation = inner.as_ref().map(|a| a.generation);
        if current_generation != Some(generation) {
            debug!("Connect attempt superseded by disconnect");
            return Err(ChannelError::NotConnected);
        }

        match outcome {
            Ok(Ok(HandshakeOutcome::Accepted)) => {
                let active = inner.as_ref().map(|a| {
                    (a.outbound.clone(), a.keepalive.clone())
                });
                if let Some((outbound, cancel)) = active {
                    spawn_keepalive(self.config.keepalive_interval, outbound, cancel);
                }
                self.state_tx.send_replace(ConnectionState::Connected);
                info!("Connected to {}", descriptor.endpoint);
                Ok(())
            }
            Ok(Ok(HandshakeOutcome::Rejected(reason))) => {
                teardown(&mut inner);
                self.state_tx
                    .send_replace(ConnectionState::Failed(reason.clone()));
                Err(ChannelError::HandshakeRejected(reason))
            }
            Ok(Err(_)) => {
                // Receive loop ended before the verdict; it already
                // recorded the transport failure if the state was live.
                teardown(&mut inner);
                let reason = self
                    .last_error()
                    .unwrap_or_else(|| "transport closed during handshake".to_string());
                self.state_tx
                    .send_replace(ConnectionState::Failed(reason.clone()));
                Err(ChannelError::TransportLost(reason))
            }
            Err(_) => {
                teardown(&mut inner);
                self.state_tx
                    .send_replace(ConnectionState::Failed("handshake timed out".to_string()));
                Err(ChannelError::HandshakeTimeout)
            }
        }
    }

    /// Send a message over the channel.
    ///
    /// Legal while Connecting or Connected; in any other state the frame
    /// is dropped with a warning.
    pub async fn send(&self, message: AgentMessage) {
        if !self.state().can_send() {
            warn!(
                "Dropping outbound {} frame: channel is {}",
                message.kind_str(),
                self.state()
            );
            return;
        }

        let inner = self.inner.lock().await;
        let Some(active) = inner.as_ref() else {
            warn!("Dropping outbound frame: no active transport");
            return;
        };

        let envelope = Envelope::new(
            Uuid::new_v4().to_string(),
            current_time_millis(),
            message,
        );
        if active.outbound.send(envelope).await.is_err() {
            warn!("Dropping outbound frame: writer task gone");
        }
    }

    /// Tear down the channel and return to Disconnected.
    ///
    /// Legal from any state, idempotent, and renders any in-flight
    /// connect attempt moot.
    pub async fn disconnect(&self) {
        let mut inner = self.inner.lock().await;
        teardown(&mut inner);
        self.state_tx.send_replace(ConnectionState::Disconnected);
        debug!("Channel disconnected");
    }
}

/// Stop keepalive, close the transport, and clear the endpoint binding
fn teardown(inner: &mut Option<ActiveChannel>) {
    if let Some(active) = inner.take() {
        active.keepalive.cancel();
        // Dropping the outbound sender ends the writer loop, which closes
        // the sink; aborting the receive task drops the read half.
        active.recv_task.abort();
        active.writer_task.abort();
    }
}

/// Writer task: serializes envelopes onto the sink in submission order
async fn write_loop(mut sink: WsSink, mut outbound: mpsc::Receiver<Envelope>) {
    while let Some(envelope) = outbound.recv().await {
        let text = match envelope.encode() {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to encode outbound frame: {}", e);
                continue;
            }
        };
        if sink.send(WsMessage::Text(text)).await.is_err() {
            // The receive loop observes and reports the transport failure
            break;
        }
    }
    let _ = sink.close().await;
}

/// Receive loop: decodes and dispatches inbound frames one at a time for
/// the lifetime of the transport
async fn receive_loop(
    mut source: WsSource,
    coalescer: Arc<Mutex<MessageCoalescer>>,
    state: Arc<watch::Sender<ConnectionState>>,
    outbound: mpsc::Sender<Envelope>,
    handshake: oneshot::Sender<HandshakeOutcome>,
) {
    let mut handshake = Some(handshake);

    loop {
        match source.next().await {
            Some(Ok(WsMessage::Text(text))) => {
                let envelope = match Envelope::decode(&text) {
                    Ok(envelope) => envelope,
                    Err(e) => {
                        warn!("Dropping undecodable frame: {}", e);
                        continue;
                    }
                };
                dispatch(envelope, &coalescer, &outbound, &mut handshake).await;
            }
            Some(Ok(WsMessage::Close(_))) | None => {
                on_transport_end(&state, "connection closed by server");
                break;
            }
            Some(Ok(_)) => {
                // WebSocket-level binary/ping/pong frames carry nothing
                // for us
            }
            Some(Err(e)) => {
                on_transport_end(&state, &e.to_string());
                break;
            }
        }
    }
}

async fn dispatch(
    envelope: Envelope,
    coalescer: &Arc<Mutex<MessageCoalescer>>,
    outbound: &mpsc::Sender<Envelope>,
    handshake: &mut Option<oneshot::Sender<HandshakeOutcome>>,
) {
    match &envelope.message {
        AgentMessage::ConnectionAccepted => {
            if let Some(tx) = handshake.take() {
                let _ = tx.send(HandshakeOutcome::Accepted);
            } else {
                debug!("Ignoring duplicate ConnectionAccepted");
            }
        }
        AgentMessage::ConnectionRejected { reason } => {
            if let Some(tx) = handshake.take() {
                let reason = reason
                    .clone()
                    .unwrap_or_else(|| "connection rejected".to_string());
                let _ = tx.send(HandshakeOutcome::Rejected(reason));
            }
        }
        AgentMessage::Ping => {
            let pong = Envelope::new(
                Uuid::new_v4().to_string(),
                current_time_millis(),
                AgentMessage::Pong,
            );
            let _ = outbound.send(pong).await;
        }
        AgentMessage::Pong => {
            trace!("Keepalive pong received");
        }
        AgentMessage::ClientHandshake(_) => {
            warn!("Unexpected ClientHandshake frame from server");
        }
        AgentMessage::Unknown { kind, .. } => {
            debug!("Ignoring frame of unknown kind '{}'", kind);
        }
        _ => {
            coalescer.lock().await.ingest(&envelope);
        }
    }
}

/// Record a transport failure unless the session was already taken down
/// by an explicit disconnect
fn on_transport_end(state: &watch::Sender<ConnectionState>, reason: &str) {
    let live = *state.borrow() != ConnectionState::Disconnected;
    if live {
        info!("Channel transport lost: {}", reason);
        state.send_replace(ConnectionState::Failed(reason.to_string()));
    }
}

/// Periodic keepalive ping, stopped deterministically via the token
fn spawn_keepalive(
    interval: std::time::Duration,
    outbound: mpsc::Sender<Envelope>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick fires immediately; the handshake already proved
        // the channel live, so skip it.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let ping = Envelope::new(
                        Uuid::new_v4().to_string(),
                        current_time_millis(),
                        AgentMessage::Ping,
                    );
                    if outbound.send(ping).await.is_err() {
                        break;
                    }
                    trace!("Keepalive ping sent");
                }
            }
        }
    })
}
