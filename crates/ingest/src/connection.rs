//! Connection manager for the tick feed websocket.
//!
//! Owns one long-lived subscription and moves through
//! `Idle → Connecting → Subscribed → Streaming → Backoff → Connecting …`
//! until shutdown is signaled. Connection failures are never fatal.
//!
//! Decoded ticks are handed to a bounded channel (normally drained by a
//! [`TickWriterPool`](crate::tick_writer::TickWriterPool)), so a slow store
//! applies backpressure instead of dropping work.

use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use market_pulse_core::{FeedConfig, Tick, MIN_INTERVAL};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep, sleep_until, timeout, Instant};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::backoff::Backoff;
use crate::decode::{decode_message, Decoded, SubscribeRequest};

/// Lifecycle state of the feed connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionState {
    Idle,
    Connecting,
    /// Handshake done, subscription sent, nothing received yet
    Subscribed,
    Streaming,
    /// Waiting out a reconnect delay
    Backoff { delay: Duration },
}

/// Errors that end one connection attempt.
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("No frames received for {0:?}")]
    LivenessTimeout(Duration),

    #[error("Invalid feed URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Unsupported feed URL scheme: {0} (expected ws or wss)")]
    UnsupportedScheme(String),

    /// The tick consumer is gone; nothing left to stream for.
    #[error("Tick channel closed")]
    SinkClosed,
}

/// Connection settings.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub url: String,
    pub channel: String,
    pub symbols: Vec<String>,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    pub ping_interval: Duration,
    /// Grace period after a ping before the connection counts as dead
    pub ping_timeout: Duration,
    pub connect_timeout: Duration,
}

impl ConnectionSettings {
    #[must_use]
    pub fn from_config(config: &FeedConfig) -> Self {
        Self {
            url: config.url.clone(),
            channel: config.channel.clone(),
            symbols: config.symbols.clone(),
            base_backoff: config.base_backoff(),
            max_backoff: config.max_backoff(),
            ping_interval: config.ping_interval(),
            ping_timeout: config.ping_timeout(),
            connect_timeout: config.connect_timeout(),
        }
    }

    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    #[must_use]
    pub fn with_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.base_backoff = base;
        self.max_backoff = max;
        self
    }

    #[must_use]
    pub fn with_liveness(mut self, ping_interval: Duration, ping_timeout: Duration) -> Self {
        self.ping_interval = ping_interval;
        self.ping_timeout = ping_timeout;
        self
    }

    #[must_use]
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// Parses the feed URL, accepting only `ws` and `wss`.
    ///
    /// # Errors
    /// Returns an error if the URL does not parse or has another scheme.
    pub fn feed_url(&self) -> Result<Url, FeedError> {
        let url = Url::parse(&self.url)?;
        match url.scheme() {
            "ws" | "wss" => Ok(url),
            other => Err(FeedError::UnsupportedScheme(other.to_string())),
        }
    }

    fn ping_period(&self) -> Duration {
        self.ping_interval.max(MIN_INTERVAL)
    }

    fn liveness_window(&self) -> Duration {
        self.ping_period() + self.ping_timeout
    }
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self::from_config(&FeedConfig::default())
    }
}

/// Counters for one manager run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FeedStats {
    pub connects: u64,
    pub failures: u64,
    pub messages: u64,
    pub ticks: u64,
    pub ignored: u64,
    pub malformed: u64,
}

/// Owns the feed subscription and reconnect policy.
pub struct ConnectionManager {
    settings: ConnectionSettings,
    url: Url,
    tick_tx: mpsc::Sender<Tick>,
    state_tx: watch::Sender<ConnectionState>,
    backoff: Backoff,
    stats: FeedStats,
}

impl ConnectionManager {
    /// Creates an idle manager.
    ///
    /// # Errors
    /// Returns an error if the feed URL is not a valid `ws`/`wss` URL. This
    /// is the only failure the manager does not retry.
    pub fn new(settings: ConnectionSettings, tick_tx: mpsc::Sender<Tick>) -> Result<Self, FeedError> {
        let url = settings.feed_url()?;
        let (state_tx, _) = watch::channel(ConnectionState::Idle);
        let backoff = Backoff::new(settings.base_backoff, settings.max_backoff);
        Ok(Self {
            settings,
            url,
            tick_tx,
            state_tx,
            backoff,
            stats: FeedStats::default(),
        })
    }

    /// Subscribes to state transitions.
    #[must_use]
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Runs until `shutdown` flips to `true` (or its sender is dropped).
    ///
    /// Returns the run's counters. The tick sender is dropped on return, so a
    /// writer pool fed by this manager can be drained afterwards.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> FeedStats {
        loop {
            if *shutdown.borrow() {
                break;
            }

            self.set_state(ConnectionState::Connecting);
            info!(url = %self.settings.url, symbols = ?self.settings.symbols, "Connecting to tick feed");

            match self.connect_and_stream(&mut shutdown).await {
                Ok(()) => {
                    info!("Feed connection closed on shutdown");
                    break;
                }
                Err(FeedError::SinkClosed) => {
                    warn!("Tick channel closed, stopping feed");
                    break;
                }
                Err(e) => {
                    self.stats.failures += 1;
                    let delay = self.backoff.next_delay();
                    self.set_state(ConnectionState::Backoff { delay });
                    error!(error = %e, failures = self.stats.failures, "Feed connection failed");
                    info!(delay = ?delay, "Waiting before reconnect");

                    tokio::select! {
                        () = sleep(delay) => {}
                        () = wait_for_shutdown(&mut shutdown) => break,
                    }
                }
            }
        }

        self.set_state(ConnectionState::Idle);
        self.stats
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            debug!(from = ?previous, to = ?state, "Connection state changed");
        }
    }

    /// One connection attempt. `Ok` only on shutdown.
    async fn connect_and_stream(
        &mut self,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<(), FeedError> {
        let (ws_stream, _response) = timeout(self.settings.connect_timeout, connect_async(self.url.as_str()))
            .await
            .map_err(|_| {
                FeedError::ConnectionFailed(format!(
                    "connect timed out after {:?}",
                    self.settings.connect_timeout
                ))
            })?
            .map_err(|e| FeedError::ConnectionFailed(e.to_string()))?;

        let (mut write, mut read) = ws_stream.split();

        let request = SubscribeRequest::new(&self.settings.channel, &self.settings.symbols);
        let request_json = serde_json::to_string(&request)?;
        debug!(message = %request_json, "Sending subscription request");
        write.send(Message::Text(request_json)).await?;

        self.stats.connects += 1;
        self.backoff.reset();
        self.set_state(ConnectionState::Subscribed);
        info!(channel = %self.settings.channel, "Subscribed to tick feed");

        let mut ping_interval = tokio::time::interval(self.settings.ping_period());
        ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // first tick fires immediately
        ping_interval.tick().await;

        let liveness = self.settings.liveness_window();
        let mut last_seen = Instant::now();

        loop {
            tokio::select! {
                () = wait_for_shutdown(shutdown) => {
                    info!("Shutdown signal received, closing feed socket");
                    let _ = write.close().await;
                    return Ok(());
                }

                _ = ping_interval.tick() => {
                    debug!("Sending ping");
                    write.send(Message::Ping(Vec::new())).await?;
                }

                () = sleep_until(last_seen + liveness) => {
                    return Err(FeedError::LivenessTimeout(liveness));
                }

                msg = read.next() => {
                    last_seen = Instant::now();
                    match msg {
                        Some(Ok(Message::Text(text))) => self.handle_text(&text).await?,
                        Some(Ok(Message::Binary(data))) => {
                            match String::from_utf8(data) {
                                Ok(text) => self.handle_text(&text).await?,
                                Err(_) => {
                                    self.stats.malformed += 1;
                                    debug!("Dropping non-UTF-8 binary frame");
                                }
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            debug!("Received ping, sending pong");
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Pong(_))) => {
                            debug!("Received pong");
                        }
                        Some(Ok(Message::Close(frame))) => {
                            info!(frame = ?frame, "Received close frame");
                            return Err(FeedError::ConnectionFailed(
                                frame.map_or_else(|| "Connection closed".to_string(), |f| f.reason.to_string()),
                            ));
                        }
                        Some(Ok(Message::Frame(_))) => {}
                        Some(Err(e)) => return Err(FeedError::WebSocket(e)),
                        None => {
                            return Err(FeedError::ConnectionFailed("Stream ended".to_string()));
                        }
                    }
                }
            }
        }
    }

    async fn handle_text(&mut self, text: &str) -> Result<(), FeedError> {
        self.stats.messages += 1;
        let subscribed = *self.state_tx.borrow() == ConnectionState::Subscribed;
        if subscribed {
            self.set_state(ConnectionState::Streaming);
        }

        match decode_message(text, &self.settings.channel, Utc::now()) {
            Decoded::Tick(tick) => {
                self.stats.ticks += 1;
                self.tick_tx
                    .send(tick)
                    .await
                    .map_err(|_| FeedError::SinkClosed)?;
            }
            Decoded::Ignored => self.stats.ignored += 1,
            Decoded::Malformed(reason) => {
                self.stats.malformed += 1;
                debug!(reason = %reason, "Dropping malformed feed message");
            }
        }
        Ok(())
    }
}

/// Resolves once `shutdown` holds `true` or its sender is gone.
///
/// The borrowed value is released before returning, so callers can keep
/// awaiting inside a `select!` branch and stay `Send`.
pub(crate) async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}
