//! Pure re-derivation stages between a validated snapshot and the chart.

pub mod align;
pub mod candles;
pub mod render;
pub mod resample;
pub mod window;

pub use align::project;
pub use candles::CandleAggregator;
pub use render::{ChartPipeline, RenderPayload};
pub use resample::Resampler;
pub use window::{TradingWindow, ViewerZone};
