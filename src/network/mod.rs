pub mod backoff;
pub mod connection;
pub mod http;

use crate::model::snapshot::Snapshot;

pub use backoff::ReconnectPolicy;
pub use connection::FeedSession;
pub use http::HttpGateway;

/// What the feed session reports upward, in the order it happens.
#[derive(Debug, Clone)]
pub enum FeedEvent {
    Connecting,
    Connected,
    Disconnected { reason: String },
    Snapshot(Box<Snapshot>),
}
