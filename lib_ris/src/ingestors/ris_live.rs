//! # RIS Live Ingestor
//!
//! WebSocket client for the RIPE RIS Live feed.
//!
//! `ConnectionManager` owns the socket and walks it through
//! `Connecting → Subscribed → Streaming`, sending the subscription exactly once
//! per connection. When the connection drops it either reconnects after a
//! capped exponential backoff or moves to `Closing → Closed`. Shutdown is
//! observed through a `CancellationToken` at every await point, so a blocked
//! receive is preempted within one cycle and the socket is closed by its owner
//! only.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use rustls::ClientConfig;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{Connector, MaybeTlsStream, WebSocketStream, connect_async_tls_with_config};
use tokio_util::sync::CancellationToken;

use crate::connections::tls::{self, TlsVerification};
use crate::core::sink::{MessageSink, SinkError};
use crate::ingestors::backoff::Backoff;
use crate::subscription::SubscriptionRequest;

/// The public RIS Live WebSocket endpoint.
pub const RIS_LIVE_URL: &str = "wss://ris-live.ripe.net/v1/ws/";

/// Client identity reported to the service when none is configured.
pub const DEFAULT_CLIENT_NAME: &str = "ris-live-rs";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// The endpoint URL carrying `client_name` as the client identity.
///
/// The name is not escaped; check it with [`is_valid_client_name`] first.
pub fn endpoint(client_name: &str) -> String {
    format!("{RIS_LIVE_URL}?client={client_name}")
}

/// Whether `name` can go into the endpoint query string as is: non-empty and
/// made only of URI unreserved characters (`A-Z a-z 0-9 - . _ ~`).
pub fn is_valid_client_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~'))
}

/// Lifecycle of the connection. Only `ConnectionManager` changes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Subscribed,
    Streaming,
    Closing,
    Closed,
}

/// Connection-level failures. These are the only errors that change state.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("TLS setup failed: {0}")]
    Tls(#[from] rustls::Error),

    #[error("Failed to connect to {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: WsError,
    },

    #[error("Failed to send subscription: {0}")]
    Subscribe(#[source] WsError),

    #[error("Connection error while streaming: {0}")]
    Receive(#[source] WsError),

    #[error("No data received for {}s", .0.as_secs())]
    Stalled(Duration),
}

/// Settings for one `ConnectionManager`.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// WebSocket URL; `ws://` is accepted for local testing.
    pub url: String,
    pub tls: TlsVerification,
    /// Reconnect after a drop instead of stopping.
    pub auto_reconnect: bool,
    pub reconnect_base_delay: Duration,
    pub reconnect_max_delay: Duration,
    /// Treat the connection as dead if nothing arrives for this long.
    pub stall_timeout: Option<Duration>,
    /// Upper bound on the closing handshake during shutdown.
    pub close_timeout: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            url: endpoint(DEFAULT_CLIENT_NAME),
            tls: TlsVerification::Verify,
            auto_reconnect: true,
            reconnect_base_delay: Duration::from_secs(1),
            reconnect_max_delay: Duration::from_secs(60),
            stall_timeout: None,
            close_timeout: Duration::from_secs(2),
        }
    }
}

/// Why a connection ended.
enum End {
    /// Shutdown was requested.
    Shutdown,
    /// The connection went away, with the transport error if there was one.
    Dropped(Option<TransportError>),
}

/// # Connection Manager
///
/// Drives one RIS Live subscription for the lifetime of the process.
pub struct ConnectionManager<S> {
    config: StreamConfig,
    request: SubscriptionRequest,
    sink: S,
    shutdown: CancellationToken,
    tls: Arc<ClientConfig>,
    state: ConnectionState,
    transitions: broadcast::Sender<ConnectionState>,
}

impl<S: MessageSink> ConnectionManager<S> {
    /// Creates an idle manager. The TLS configuration is built here so a bad
    /// trust store is reported before any connection attempt.
    pub fn new(
        config: StreamConfig,
        request: SubscriptionRequest,
        sink: S,
        shutdown: CancellationToken,
    ) -> Result<Self, TransportError> {
        let tls = tls::client_config(config.tls)?;
        let (transitions, _) = broadcast::channel(64);
        Ok(Self {
            config,
            request,
            sink,
            shutdown,
            tls,
            state: ConnectionState::Idle,
            transitions,
        })
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Every state change from now on, in order.
    pub fn transitions(&self) -> broadcast::Receiver<ConnectionState> {
        self.transitions.subscribe()
    }

    /// Runs until shutdown, or until the connection ends with auto-reconnect
    /// disabled.
    ///
    /// # Returns
    /// `Ok(())` on shutdown or a clean end of stream; the transport error when
    /// the connection failed and no reconnect was allowed.
    pub async fn run(mut self) -> Result<(), TransportError> {
        let mut backoff = Backoff::new(self.config.reconnect_base_delay, self.config.reconnect_max_delay);

        let result = loop {
            let (socket, end) = self.session(&mut backoff).await;

            let reason = match end {
                End::Shutdown => {
                    self.close(socket).await;
                    break Ok(());
                }
                End::Dropped(reason) => reason,
            };

            if self.shutdown.is_cancelled() {
                self.close(socket).await;
                break Ok(());
            }
            if !self.config.auto_reconnect {
                self.close(socket).await;
                break reason.map_or(Ok(()), Err);
            }
            drop(socket);

            let delay = backoff.next_delay();
            match &reason {
                Some(e) => log::warn!("Streamer encountered an error: {}. Reconnecting in {}ms...", e, delay.as_millis()),
                None => log::warn!("Stream closed by remote host. Reconnecting in {}ms...", delay.as_millis()),
            }

            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    self.close(None).await;
                    break Ok(());
                }
                _ = sleep(delay) => {}
            }
        };

        self.set_state(ConnectionState::Closed);
        result
    }

    /// One connection: connect, subscribe, stream until it ends.
    async fn session(&mut self, backoff: &mut Backoff) -> (Option<WsStream>, End) {
        if self.shutdown.is_cancelled() {
            return (None, End::Shutdown);
        }
        self.set_state(ConnectionState::Connecting);
        log::info!("Connecting to RIS Live: {}", self.config.url);

        let connecting = connect_async_tls_with_config(
            self.config.url.as_str(),
            None,
            true,
            Some(Connector::Rustls(self.tls.clone())),
        );
        let mut ws = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => return (None, End::Shutdown),
            connected = connecting => match connected {
                Ok((ws, _response)) => ws,
                Err(source) => {
                    let url = self.config.url.clone();
                    return (None, End::Dropped(Some(TransportError::Connect { url, source })));
                }
            },
        };

        self.set_state(ConnectionState::Subscribed);
        log::debug!("Sending RIS parameters: {}", self.request.as_str());
        let subscribe = Message::text(self.request.as_str().to_string());
        let sent = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => return (Some(ws), End::Shutdown),
            sent = ws.send(subscribe) => sent,
        };
        if let Err(e) = sent {
            return (None, End::Dropped(Some(TransportError::Subscribe(e))));
        }

        self.set_state(ConnectionState::Streaming);
        backoff.reset();
        log::info!("Listening...");

        let end = self.stream(&mut ws).await;
        (Some(ws), end)
    }

    /// The receive loop. Frames go to the sink in arrival order; a frame the
    /// sink cannot handle is logged and skipped.
    async fn stream(&mut self, ws: &mut WsStream) -> End {
        let stall_timeout = self.config.stall_timeout;
        loop {
            if self.shutdown.is_cancelled() {
                return End::Shutdown;
            }

            let received = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => return End::Shutdown,
                received = next_frame(ws, stall_timeout) => received,
            };

            match received {
                Ok(Some(Message::Text(text))) => self.dispatch(text.as_str()),
                Ok(Some(Message::Binary(data))) => match std::str::from_utf8(&data) {
                    Ok(text) => self.dispatch(text),
                    Err(e) => log::warn!("Error processing message: {}", SinkError::from(e)),
                },
                Ok(Some(Message::Close(frame))) => {
                    log::info!("Remote host closed the connection: {:?}", frame);
                    return End::Dropped(None);
                }
                // Ping/Pong are answered by tungstenite itself.
                Ok(Some(_)) => {}
                Ok(None) => {
                    log::warn!("WSS stream ended.");
                    return End::Dropped(None);
                }
                Err(e) => {
                    log::error!("WSS read error: {}", e);
                    return End::Dropped(Some(e));
                }
            }
        }
    }

    fn dispatch(&mut self, frame: &str) {
        if let Err(e) = self.sink.deliver(frame) {
            log::warn!("Error processing message: {}", e);
        }
    }

    /// Enters `Closing` and closes `socket` if one is still open. Closing a
    /// socket the peer already closed is not an error.
    async fn close(&mut self, socket: Option<WsStream>) {
        self.set_state(ConnectionState::Closing);
        let Some(mut ws) = socket else {
            return;
        };
        match timeout(self.config.close_timeout, ws.close(None)).await {
            Ok(Ok(())) => log::info!("Disconnected from RIS Live."),
            Ok(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) => {
                log::debug!("Connection was already closed.")
            }
            Ok(Err(e)) => log::warn!("Error during disconnect: {}", e),
            Err(_) => log::warn!("Timed out waiting for the close handshake."),
        }
    }

    fn set_state(&mut self, next: ConnectionState) {
        if self.state == next {
            return;
        }
        log::debug!("Connection state: {:?} -> {:?}", self.state, next);
        self.state = next;
        // No receivers is fine.
        let _ = self.transitions.send(next);
    }
}

async fn next_frame(ws: &mut WsStream, stall_timeout: Option<Duration>) -> Result<Option<Message>, TransportError> {
    let next = match stall_timeout {
        Some(limit) => timeout(limit, ws.next())
            .await
            .map_err(|_| TransportError::Stalled(limit))?,
        None => ws.next().await,
    };
    next.transpose().map_err(TransportError::Receive)
}
