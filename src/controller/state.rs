//! Connection status, user intents and the state they mutate.

use chrono::{DateTime, Utc};

use crate::model::snapshot::{Snapshot, Summary};
use crate::model::trade::TradeBuffer;
use crate::network::FeedEvent;
use crate::pipeline::render::ViewMode;

/// Live channel status shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Live,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Live => "live",
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live)
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Discrete requests from the UI.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UserIntent {
    SetMode(ViewMode),
    ToggleOverlays,
    SetSpeed(f64),
    Start,
    Stop,
}

/// Everything the controller reacts to, drained one at a time.
#[derive(Debug, Clone)]
pub enum DashboardEvent {
    Feed(FeedEvent),
    Intent(UserIntent),
    ControlFailed { command: String, reason: String },
    /// `transport` is set when the bootstrap endpoint could not be reached
    /// at all, as opposed to answering with unusable data.
    BootstrapFailed { reason: String, transport: bool },
    Shutdown,
}

impl From<FeedEvent> for DashboardEvent {
    fn from(event: FeedEvent) -> Self {
        Self::Feed(event)
    }
}

impl From<UserIntent> for DashboardEvent {
    fn from(intent: UserIntent) -> Self {
        Self::Intent(intent)
    }
}

/// View and data state owned by a single controller.
#[derive(Debug, Clone)]
pub struct DashboardState {
    pub mode: ViewMode,
    pub show_overlays: bool,
    /// Latest snapshot that carried minute bars.
    pub last_snapshot: Option<Snapshot>,
    pub connection: ConnectionStatus,
    pub trades: TradeBuffer,
    pub summary: Option<Summary>,
    /// Wall time the last snapshot was processed.
    pub last_update: Option<DateTime<Utc>>,
}

impl DashboardState {
    pub fn new(trade_capacity: usize) -> Self {
        Self {
            mode: ViewMode::Line,
            show_overlays: true,
            last_snapshot: None,
            connection: ConnectionStatus::Disconnected,
            trades: TradeBuffer::new(trade_capacity),
            summary: None,
            last_update: None,
        }
    }
}

impl Default for DashboardState {
    fn default() -> Self {
        Self::new(crate::model::trade::TRADE_BUFFER_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let state = DashboardState::default();
        assert_eq!(state.mode, ViewMode::Line);
        assert!(state.show_overlays);
        assert!(state.last_snapshot.is_none());
        assert_eq!(state.connection, ConnectionStatus::Disconnected);
        assert_eq!(state.trades.capacity(), 10_000);
    }

    #[test]
    fn test_status_names() {
        assert_eq!(ConnectionStatus::Live.to_string(), "live");
        assert!(!ConnectionStatus::Connecting.is_live());
    }
}
