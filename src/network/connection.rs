use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{interval_at, sleep_until, Duration, Instant, MissedTickBehavior};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, trace, warn};
use url::Url;

use super::backoff::ReconnectPolicy;
use super::FeedEvent;
use crate::error::DashboardError;
use crate::model::message::{InboundMessage, OutboundMessage};
use crate::pipeline::window::ViewerZone;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

enum SessionEnd {
    /// Either side of the owning runtime went away.
    Shutdown,
    Dropped(String),
}

/// Owns the live channel: connects, keeps it alive with heartbeats and
/// reconnects with backoff until the command channel is closed.
pub struct FeedSession {
    url: Url,
    zone: ViewerZone,
    heartbeat: Duration,
    reconnect: ReconnectPolicy,
    event_sender: mpsc::Sender<FeedEvent>,
    command_receiver: mpsc::Receiver<String>,
}

impl FeedSession {
    pub fn new(
        url: &str,
        zone: ViewerZone,
        event_sender: mpsc::Sender<FeedEvent>,
        command_receiver: mpsc::Receiver<String>,
    ) -> Result<Self, DashboardError> {
        Ok(Self {
            url: Url::parse(url)?,
            zone,
            heartbeat: Duration::from_secs(30),
            reconnect: ReconnectPolicy::default(),
            event_sender,
            command_receiver,
        })
    }

    pub fn with_heartbeat(mut self, interval: Duration) -> Self {
        self.heartbeat = interval;
        self
    }

    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    // Runs until the command sender or the event receiver is dropped.
    pub async fn run(mut self) {
        let mut attempt: u32 = 0;
        loop {
            if self.emit(FeedEvent::Connecting).await.is_err() {
                return;
            }
            info!("Connecting to {}...", self.url);

            let reason = match connect_async(self.url.as_str()).await {
                Ok((ws_stream, _)) => {
                    info!("Connected to {}", self.url);
                    attempt = 0;
                    if self.emit(FeedEvent::Connected).await.is_err() {
                        return;
                    }
                    match self.pump(ws_stream).await {
                        SessionEnd::Shutdown => return,
                        SessionEnd::Dropped(reason) => reason,
                    }
                }
                Err(e) => {
                    let err = DashboardError::Connection(e.to_string());
                    error!("{}", err);
                    err.to_string()
                }
            };

            if self.emit(FeedEvent::Disconnected { reason }).await.is_err() {
                return;
            }
            attempt = attempt.saturating_add(1);
            let delay = self.reconnect.delay(attempt);
            info!("Reconnecting in {:?} (attempt {})", delay, attempt);
            if !self.wait(delay).await {
                return;
            }
        }
    }

    async fn emit(&self, event: FeedEvent) -> Result<(), DashboardError> {
        self.event_sender
            .send(event)
            .await
            .map_err(|_| DashboardError::ChannelClosed)
    }

    async fn pump(&mut self, ws_stream: WsStream) -> SessionEnd {
        let (mut write, mut read) = ws_stream.split();
        let mut heartbeat = interval_at(Instant::now() + self.heartbeat, self.heartbeat);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            if !forward(&self.event_sender, self.zone, text.as_str()).await {
                                return SessionEnd::Shutdown;
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            info!("Server closed the channel: {:?}", frame);
                            return SessionEnd::Dropped("closed by server".to_string());
                        }
                        Some(Ok(_)) => {
                            // Protocol pings are answered by tungstenite
                        }
                        Some(Err(e)) => {
                            error!("WebSocket error: {}", e);
                            return SessionEnd::Dropped(e.to_string());
                        }
                        None => {
                            warn!("Stream ended unexpectedly");
                            return SessionEnd::Dropped("stream ended".to_string());
                        }
                    }
                }
                _ = heartbeat.tick() => {
                    trace!("Sending heartbeat");
                    let ping = OutboundMessage::Ping.to_json();
                    if let Err(e) = write.send(Message::Text(ping.into())).await {
                        error!("Failed to send heartbeat: {}", e);
                        return SessionEnd::Dropped(e.to_string());
                    }
                }
                cmd = self.command_receiver.recv() => {
                    match cmd {
                        Some(payload) => {
                            if let Err(e) = write.send(Message::Text(payload.into())).await {
                                error!("Failed to send message: {}", e);
                                return SessionEnd::Dropped(e.to_string());
                            }
                        }
                        None => {
                            info!("Command channel closed, shutting down...");
                            let _ = write.send(Message::Close(None)).await;
                            return SessionEnd::Shutdown;
                        }
                    }
                }
            }
        }
    }

    /// Sleeps out the reconnect delay. Returns false if shutdown was
    /// requested meanwhile.
    async fn wait(&mut self, delay: Duration) -> bool {
        let deadline = Instant::now() + delay;
        loop {
            tokio::select! {
                _ = sleep_until(deadline) => return true,
                cmd = self.command_receiver.recv() => {
                    match cmd {
                        Some(payload) => {
                            warn!("Not connected, dropping outbound message: {}", payload)
                        }
                        None => {
                            info!("Command channel closed while reconnecting");
                            return false;
                        }
                    }
                }
            }
        }
    }
}

/// Decodes one text frame and passes snapshots on. Returns false once the
/// receiving side is gone.
async fn forward(sender: &mpsc::Sender<FeedEvent>, zone: ViewerZone, raw: &str) -> bool {
    match InboundMessage::decode(raw, zone) {
        Ok(InboundMessage::Pong) => {
            trace!("Heartbeat acknowledged");
            true
        }
        Ok(InboundMessage::Snapshot(snapshot)) => {
            debug!(
                "Snapshot with {} bars, {} trades",
                snapshot.frame().len(),
                snapshot.trades.len()
            );
            sender.send(FeedEvent::Snapshot(snapshot)).await.is_ok()
        }
        Err(e) => {
            warn!("Skipping undecodable message: {}", e);
            true
        }
    }
}
