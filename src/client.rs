use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::config::DashboardConfig;
use crate::controller::{ChartController, ChartSurface, DashboardEvent, UserIntent, ViewMode};
use crate::error::DashboardError;
use crate::model::message::ControlCommand;
use crate::network::{FeedEvent, FeedSession, HttpGateway};

const COMMAND_CAPACITY: usize = 32;

/// The running dashboard: bootstrap fetch, live feed session and the
/// single consumer that applies every event to the chart in order.
pub struct Dashboard<S: ChartSurface> {
    controller: ChartController<S>,
    gateway: HttpGateway,
    session: FeedSession,
    feed_receiver: mpsc::Receiver<FeedEvent>,

    // Inbox of the event loop; user intents and control failures land here
    inbox_sender: mpsc::Sender<DashboardEvent>,
    inbox: mpsc::Receiver<DashboardEvent>,

    // Raw frames for the live channel
    command_sender: mpsc::Sender<String>,
}

impl<S: ChartSurface> Dashboard<S> {
    pub fn new(config: DashboardConfig, surface: S) -> Result<Self, DashboardError> {
        Self::with_controller(ChartController::new(&config, surface), config)
    }

    /// Builds the runtime around an existing controller, e.g. one with a
    /// fixed resampler seed.
    pub fn with_controller(
        controller: ChartController<S>,
        config: DashboardConfig,
    ) -> Result<Self, DashboardError> {
        let zone = config.chart.zone;
        let gateway = HttpGateway::new(&config.bootstrap_url, &config.control_url, zone)?;

        let (tx_feed_event, rx_feed_event) = mpsc::channel(config.channel_capacity);
        let (tx_command, rx_command) = mpsc::channel(COMMAND_CAPACITY);
        let (tx_inbox, rx_inbox) = mpsc::channel(config.channel_capacity);

        let session = FeedSession::new(&config.feed_url, zone, tx_feed_event, rx_command)?
            .with_heartbeat(config.heartbeat_interval)
            .with_reconnect(config.reconnect);

        Ok(Self {
            controller,
            gateway,
            session,
            feed_receiver: rx_feed_event,
            inbox_sender: tx_inbox,
            inbox: rx_inbox,
            command_sender: tx_command,
        })
    }

    pub fn handle(&self) -> DashboardHandle {
        DashboardHandle {
            events: self.inbox_sender.clone(),
            commands: self.command_sender.clone(),
        }
    }

    /// Runs until [`DashboardHandle::shutdown`] is called and hands the
    /// controller back.
    pub async fn run(self) -> Result<ChartController<S>, DashboardError> {
        let Self {
            mut controller,
            gateway,
            session,
            mut feed_receiver,
            inbox_sender,
            mut inbox,
            command_sender,
        } = self;

        // Fetch first so a stale bootstrap can never overwrite live data.
        match gateway.fetch_snapshot().await {
            Ok(snapshot) => {
                info!("Loaded initial snapshot with {} bars", snapshot.frame().len());
                controller.apply_snapshot(snapshot);
            }
            Err(e) => {
                let transport = e.is_transport();
                controller.handle(DashboardEvent::BootstrapFailed {
                    reason: e.to_string(),
                    transport,
                });
            }
        }

        let session_task = tokio::spawn(session.run());
        let forward_sender = inbox_sender.clone();
        let forward_task = tokio::spawn(async move {
            while let Some(event) = feed_receiver.recv().await {
                if forward_sender.send(DashboardEvent::Feed(event)).await.is_err() {
                    break;
                }
            }
        });

        while let Some(event) = inbox.recv().await {
            if matches!(event, DashboardEvent::Shutdown) {
                info!("Shutting down dashboard");
                break;
            }
            if let Some(command) = controller.handle(event) {
                dispatch(&gateway, &inbox_sender, command);
            }
        }

        drop(command_sender);
        session_task.abort();
        forward_task.abort();
        Ok(controller)
    }
}

// Control requests are fire-and-forget; only failures come back.
fn dispatch(gateway: &HttpGateway, inbox: &mpsc::Sender<DashboardEvent>, command: ControlCommand) {
    let gateway = gateway.clone();
    let inbox = inbox.clone();
    tokio::spawn(async move {
        if let Err(e) = gateway.send_control(&command).await {
            error!("Control request {} failed: {}", command.action(), e);
            let failed = DashboardEvent::ControlFailed {
                command: command.action().to_string(),
                reason: e.to_string(),
            };
            if inbox.send(failed).await.is_err() {
                warn!("Dashboard stopped before control failure was reported");
            }
        }
    });
}

/// Cloneable sender for user intents and raw channel frames.
#[derive(Debug, Clone)]
pub struct DashboardHandle {
    events: mpsc::Sender<DashboardEvent>,
    commands: mpsc::Sender<String>,
}

impl DashboardHandle {
    pub async fn intent(&self, intent: UserIntent) -> Result<(), DashboardError> {
        self.events
            .send(DashboardEvent::Intent(intent))
            .await
            .map_err(|_| DashboardError::ChannelClosed)
    }

    pub async fn set_mode(&self, mode: ViewMode) -> Result<(), DashboardError> {
        self.intent(UserIntent::SetMode(mode)).await
    }

    pub async fn toggle_overlays(&self) -> Result<(), DashboardError> {
        self.intent(UserIntent::ToggleOverlays).await
    }

    pub async fn start(&self) -> Result<(), DashboardError> {
        self.intent(UserIntent::Start).await
    }

    pub async fn stop(&self) -> Result<(), DashboardError> {
        self.intent(UserIntent::Stop).await
    }

    pub async fn set_speed(&self, speed: f64) -> Result<(), DashboardError> {
        self.intent(UserIntent::SetSpeed(speed)).await
    }

    /// Sends a text frame as-is on the live channel.
    pub async fn send_raw(&self, json: String) -> Result<(), DashboardError> {
        self.commands
            .send(json)
            .await
            .map_err(|_| DashboardError::ChannelClosed)
    }

    pub async fn shutdown(&self) -> Result<(), DashboardError> {
        self.events
            .send(DashboardEvent::Shutdown)
            .await
            .map_err(|_| DashboardError::ChannelClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::ConnectionStatus;
    use crate::model::snapshot::Summary;
    use crate::pipeline::render::RenderPayload;
    use crate::pipeline::window::ViewerZone;
    use futures::{SinkExt, StreamExt};
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::time::timeout;
    use tokio_tungstenite::{accept_async, tungstenite::Message};

    #[derive(Debug, PartialEq)]
    enum Seen {
        Redraw(usize),
        Status(ConnectionStatus),
        Summary,
        Alert(String),
    }

    struct ChannelSurface(mpsc::UnboundedSender<Seen>);

    impl ChartSurface for ChannelSurface {
        fn redraw(&mut self, payload: &RenderPayload) {
            let _ = self.0.send(Seen::Redraw(payload.price.series.len()));
        }

        fn show_summary(&mut self, _summary: &Summary) {
            let _ = self.0.send(Seen::Summary);
        }

        fn show_status(&mut self, status: ConnectionStatus) {
            let _ = self.0.send(Seen::Status(status));
        }

        fn alert(&mut self, message: &str) {
            let _ = self.0.send(Seen::Alert(message.to_string()));
        }
    }

    const BOOTSTRAP: &str = r#"{"minute_aggregates":[
        {"minute":"2024-01-02T09:30:00","close_price":100},
        {"minute":"2024-01-02T09:31:00","close_price":101}],
        "summary":{"last_price":101,"opening_price":100}}"#;

    const LIVE: &str = r#"{"minute_aggregates":[
        {"minute":"2024-01-02T09:30:00","close_price":100},
        {"minute":"2024-01-02T09:31:00","close_price":101},
        {"minute":"2024-01-02T09:32:00","close_price":102}]}"#;

    /// Answers every HTTP request with the same JSON body.
    async fn http_server(body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut buf = [0u8; 4096];
                    let _ = stream.read(&mut buf).await;
                    let response = format!(
                        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        body.len(),
                        body
                    );
                    let _ = stream.write_all(response.as_bytes()).await;
                });
            }
        });
        base
    }

    async fn ws_server(snapshot: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            ws.send(Message::Text(snapshot.into())).await.unwrap();
            while ws.next().await.is_some() {}
        });
        url
    }

    async fn closed_url(scheme: &str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("{}://{}", scheme, addr)
    }

    async fn wait_for(rx: &mut mpsc::UnboundedReceiver<Seen>, wanted: Seen) {
        timeout(Duration::from_secs(5), async {
            while let Some(seen) = rx.recv().await {
                if seen == wanted {
                    return;
                }
            }
            panic!("surface dropped");
        })
        .await
        .expect("timed out waiting for surface");
    }

    #[tokio::test]
    async fn test_bootstrap_then_live_snapshot() {
        let http = http_server(BOOTSTRAP).await;
        let feed = ws_server(LIVE).await;
        let config = DashboardConfig::builder()
            .bootstrap_url(format!("{}/data", http))
            .control_url(format!("{}/control", http))
            .feed_url(feed)
            .zone(ViewerZone::utc())
            .build();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let dashboard = Dashboard::new(config, ChannelSurface(tx)).unwrap();
        let handle = dashboard.handle();
        let task = tokio::spawn(dashboard.run());

        // Two bars a minute apart resample to 7 points, three bars to 13.
        wait_for(&mut rx, Seen::Redraw(7)).await;
        wait_for(&mut rx, Seen::Status(ConnectionStatus::Live)).await;
        wait_for(&mut rx, Seen::Redraw(13)).await;

        handle.set_mode(ViewMode::Candlestick).await.unwrap();
        wait_for(&mut rx, Seen::Redraw(1)).await;

        handle.shutdown().await.unwrap();
        let controller = timeout(Duration::from_secs(5), task).await.unwrap().unwrap().unwrap();
        assert_eq!(controller.state().mode, ViewMode::Candlestick);
        assert_eq!(controller.state().connection, ConnectionStatus::Live);
        assert!(controller.state().summary.is_some());
    }

    #[tokio::test]
    async fn test_bootstrap_failure_alerts_and_keeps_running() {
        let config = DashboardConfig::builder()
            .bootstrap_url(closed_url("http").await)
            .control_url(closed_url("http").await)
            .feed_url(closed_url("ws").await)
            .zone(ViewerZone::utc())
            .build();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let dashboard = Dashboard::new(config, ChannelSurface(tx)).unwrap();
        let handle = dashboard.handle();
        let task = tokio::spawn(dashboard.run());

        let first = timeout(Duration::from_secs(5), rx.recv()).await.unwrap().unwrap();
        assert!(matches!(first, Seen::Alert(ref m) if m.contains("initial data")));
        wait_for(&mut rx, Seen::Status(ConnectionStatus::Disconnected)).await;

        // A control request to a dead endpoint comes back as an alert.
        handle.start().await.unwrap();
        let alert = timeout(Duration::from_secs(5), async {
            loop {
                if let Some(Seen::Alert(m)) = rx.recv().await {
                    break m;
                }
            }
        })
        .await
        .unwrap();
        assert!(alert.contains("start"));

        handle.shutdown().await.unwrap();
        timeout(Duration::from_secs(5), task).await.unwrap().unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_malformed_bootstrap_is_not_a_disconnect() {
        let http = http_server("not json").await;
        let config = DashboardConfig::builder()
            .bootstrap_url(format!("{}/data", http))
            .control_url(format!("{}/control", http))
            .feed_url(closed_url("ws").await)
            .zone(ViewerZone::utc())
            .build();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let dashboard = Dashboard::new(config, ChannelSurface(tx)).unwrap();
        let handle = dashboard.handle();
        let task = tokio::spawn(dashboard.run());

        let first = timeout(Duration::from_secs(5), rx.recv()).await.unwrap().unwrap();
        assert!(matches!(first, Seen::Alert(ref m) if m.contains("malformed")));
        // The next thing shown comes from the feed session, not the bootstrap.
        let second = timeout(Duration::from_secs(5), rx.recv()).await.unwrap().unwrap();
        assert_eq!(second, Seen::Status(ConnectionStatus::Connecting));

        handle.shutdown().await.unwrap();
        timeout(Duration::from_secs(5), task).await.unwrap().unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_invalid_feed_url() {
        let config = DashboardConfig::builder().feed_url("::nope").build();
        let (tx, _rx) = mpsc::unbounded_channel();
        assert!(matches!(
            Dashboard::new(config, ChannelSurface(tx)),
            Err(DashboardError::UrlParse(_))
        ));
    }
}
