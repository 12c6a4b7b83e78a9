//! Chart state controller.
//!
//! Owns [`DashboardState`] and re-derives the whole render payload from the
//! last snapshot whenever data arrives or a view toggle changes. A failed
//! derivation leaves the previously drawn chart in place.

pub mod state;
pub mod surface;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, error, info, warn};

use crate::config::DashboardConfig;
use crate::model::message::ControlCommand;
use crate::model::snapshot::Snapshot;
use crate::network::FeedEvent;
use crate::pipeline::render::{ChartPipeline, RenderPayload};

pub use crate::pipeline::render::ViewMode;
pub use state::{ConnectionStatus, DashboardEvent, DashboardState, UserIntent};
pub use surface::{ChartSurface, LogSurface};

pub struct ChartController<S: ChartSurface> {
    state: DashboardState,
    pipeline: ChartPipeline,
    surface: S,
    rng: StdRng,
    last_payload: Option<RenderPayload>,
}

impl<S: ChartSurface> ChartController<S> {
    pub fn new(config: &DashboardConfig, surface: S) -> Self {
        Self::with_rng(config, surface, StdRng::from_entropy())
    }

    /// Controller whose resampler jitter is reproducible.
    pub fn with_seed(config: &DashboardConfig, surface: S, seed: u64) -> Self {
        Self::with_rng(config, surface, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: &DashboardConfig, surface: S, rng: StdRng) -> Self {
        Self {
            state: DashboardState::new(config.trade_buffer_capacity),
            pipeline: ChartPipeline::new(&config.chart),
            surface,
            rng,
            last_payload: None,
        }
    }

    pub fn state(&self) -> &DashboardState {
        &self.state
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn into_surface(self) -> S {
        self.surface
    }

    /// The payload currently on screen.
    pub fn last_payload(&self) -> Option<&RenderPayload> {
        self.last_payload.as_ref()
    }

    /// Applies one event to completion. Returns a control command when the
    /// event asks for one to be sent.
    pub fn handle(&mut self, event: DashboardEvent) -> Option<ControlCommand> {
        match event {
            DashboardEvent::Feed(feed) => {
                self.on_feed(feed);
                None
            }
            DashboardEvent::Intent(intent) => self.on_intent(intent),
            DashboardEvent::ControlFailed { command, reason } => {
                error!("Control command {} failed: {}", command, reason);
                self.surface
                    .alert(&format!("Simulation {} failed: {}", command, reason));
                None
            }
            DashboardEvent::BootstrapFailed { reason, transport } => {
                if transport {
                    error!("Initial snapshot unavailable: {}", reason);
                    self.surface
                        .alert(&format!("Could not load initial data: {}", reason));
                    self.set_connection(ConnectionStatus::Disconnected);
                } else {
                    warn!("Initial snapshot rejected: {}", reason);
                    self.surface
                        .alert(&format!("Initial data was malformed: {}", reason));
                }
                None
            }
            DashboardEvent::Shutdown => None,
        }
    }

    fn on_feed(&mut self, event: FeedEvent) {
        match event {
            FeedEvent::Connecting => self.set_connection(ConnectionStatus::Connecting),
            FeedEvent::Connected => self.set_connection(ConnectionStatus::Live),
            FeedEvent::Disconnected { reason } => {
                warn!("Feed disconnected: {}", reason);
                self.set_connection(ConnectionStatus::Disconnected);
            }
            FeedEvent::Snapshot(snapshot) => self.apply_snapshot(*snapshot),
        }
    }

    fn on_intent(&mut self, intent: UserIntent) -> Option<ControlCommand> {
        match intent {
            UserIntent::SetMode(mode) => {
                info!("View mode -> {}", mode);
                self.state.mode = mode;
                self.refresh();
                None
            }
            UserIntent::ToggleOverlays => {
                self.state.show_overlays = !self.state.show_overlays;
                debug!("Overlays {}", if self.state.show_overlays { "on" } else { "off" });
                self.refresh();
                None
            }
            UserIntent::Start => Some(ControlCommand::Start),
            UserIntent::Stop => Some(ControlCommand::Stop),
            UserIntent::SetSpeed(speed) => {
                let command = ControlCommand::Speed { speed };
                match command.validate() {
                    Ok(()) => Some(command),
                    Err(e) => {
                        warn!("{}", e);
                        self.surface.alert(&e.to_string());
                        None
                    }
                }
            }
        }
    }

    fn set_connection(&mut self, status: ConnectionStatus) {
        if self.state.connection != status {
            debug!("Connection {} -> {}", self.state.connection, status);
        }
        self.state.connection = status;
        self.surface.show_status(status);
    }

    /// Folds a snapshot into the state. Snapshots without bars only update
    /// the summary and trade ring; the chart keeps its previous data.
    pub fn apply_snapshot(&mut self, mut snapshot: Snapshot) {
        self.state.trades.extend(std::mem::take(&mut snapshot.trades));
        if let Some(summary) = &snapshot.summary {
            self.surface.show_summary(summary);
            self.state.summary = Some(summary.clone());
        }
        self.state.last_update = Some(Utc::now());

        if !snapshot.has_bars() {
            debug!("Snapshot without minute bars, chart unchanged");
            return;
        }
        self.state.last_snapshot = Some(snapshot);
        self.refresh();
    }

    /// Re-derives and redraws from the last snapshot. Returns whether a
    /// redraw happened.
    pub fn refresh(&mut self) -> bool {
        let Some(snapshot) = &self.state.last_snapshot else {
            return false;
        };
        match self.pipeline.derive(
            snapshot.frame(),
            self.state.mode,
            self.state.show_overlays,
            &mut self.rng,
        ) {
            Ok(payload) => {
                self.surface.redraw(&payload);
                self.last_payload = Some(payload);
                true
            }
            Err(e) => {
                warn!("Keeping previous chart: {}", e);
                false
            }
        }
    }
}
