pub mod client;
pub mod config;
pub mod controller;
mod error;
pub mod model;
pub mod network;
pub mod pipeline;

pub use client::{Dashboard, DashboardHandle};
pub use config::{ChartConfig, DashboardConfig};
pub use controller::{
    ChartController, ChartSurface, ConnectionStatus, DashboardEvent, DashboardState, LogSurface,
    UserIntent, ViewMode,
};
pub use error::DashboardError;
pub use model::bar::Bar;
pub use model::message::ControlCommand;
pub use model::series::{AnchoredSeries, DerivedSeries, MinuteFrame, SeriesKey};
pub use model::snapshot::{Snapshot, Summary};
pub use network::{FeedEvent, FeedSession};
pub use pipeline::render::{AxisRange, CandlePoint, Point, PriceSeries, RenderPayload};
pub use pipeline::{ChartPipeline, TradingWindow, ViewerZone};
