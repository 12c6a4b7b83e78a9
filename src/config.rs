//! Runtime configuration for the dashboard.
//!
//! Every value has a default matching the local simulator deployment and
//! can be overridden with the builder or through `QUOTEBOARD_*` environment
//! variables.

use std::time::Duration;

use crate::model::trade::TRADE_BUFFER_CAPACITY;
use crate::network::backoff::ReconnectPolicy;
use crate::pipeline::resample::{DEFAULT_MAX_GAP_SECS, DEFAULT_STEP_SECS};
use crate::pipeline::window::{TradingWindow, ViewerZone};

pub const ENV_FEED_URL: &str = "QUOTEBOARD_FEED_URL";
pub const ENV_BOOTSTRAP_URL: &str = "QUOTEBOARD_BOOTSTRAP_URL";
pub const ENV_CONTROL_URL: &str = "QUOTEBOARD_CONTROL_URL";
pub const ENV_HEARTBEAT_SECS: &str = "QUOTEBOARD_HEARTBEAT_SECS";
pub const ENV_UTC_OFFSET_MINUTES: &str = "QUOTEBOARD_UTC_OFFSET_MINUTES";

/// Settings for re-deriving chart payloads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChartConfig {
    /// Grid step of the resampler (default: 10s)
    pub resample_step: Duration,
    /// Widest gap between bars the resampler fills (default: 5min)
    pub resample_max_gap: Duration,
    /// Candlestick bucket width in minutes (default: 5)
    pub candle_bucket_minutes: u32,
    /// First displayed local hour (default: 4)
    pub window_start_hour: u32,
    /// Last displayed local hour, inclusive (default: 16)
    pub window_end_hour: u32,
    /// Zone used for hours, bucket alignment and naive timestamps
    pub zone: ViewerZone,
    /// Fractional y-axis padding of the price panel (default: 0.05)
    pub price_padding: f64,
    /// Fractional y-axis padding of the MACD panel (default: 0.10)
    pub macd_padding: f64,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            resample_step: Duration::from_secs(DEFAULT_STEP_SECS as u64),
            resample_max_gap: Duration::from_secs(DEFAULT_MAX_GAP_SECS as u64),
            candle_bucket_minutes: 5,
            window_start_hour: TradingWindow::DEFAULT_START_HOUR,
            window_end_hour: TradingWindow::DEFAULT_END_HOUR,
            zone: ViewerZone::default(),
            price_padding: 0.05,
            macd_padding: 0.10,
        }
    }
}

impl ChartConfig {
    pub fn trading_window(&self) -> TradingWindow {
        TradingWindow::new(self.window_start_hour, self.window_end_hour, self.zone)
    }
}

/// Dashboard configuration - all endpoints can be overridden via environment variables
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardConfig {
    /// Live snapshot WebSocket URL
    pub feed_url: String,
    /// One-shot snapshot endpoint fetched at startup
    pub bootstrap_url: String,
    /// Simulation control endpoint
    pub control_url: String,
    /// Interval between `{"type":"ping"}` heartbeats (default: 30s)
    pub heartbeat_interval: Duration,
    /// Reconnect backoff (default: 1s doubling, capped at 30s)
    pub reconnect: ReconnectPolicy,
    /// Raw trades retained (default: 10 000)
    pub trade_buffer_capacity: usize,
    /// Capacity of the controller's event inbox (default: 100)
    pub channel_capacity: usize,
    pub chart: ChartConfig,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            feed_url: "ws://localhost:8001/ws".to_string(),
            bootstrap_url: "http://localhost:8001/data".to_string(),
            control_url: "http://localhost:8000/simulation/control".to_string(),
            heartbeat_interval: Duration::from_secs(30),
            reconnect: ReconnectPolicy::default(),
            trade_buffer_capacity: TRADE_BUFFER_CAPACITY,
            channel_capacity: 100,
            chart: ChartConfig::default(),
        }
    }
}

impl DashboardConfig {
    pub fn builder() -> DashboardConfigBuilder {
        DashboardConfigBuilder::default()
    }

    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an arbitrary variable source.
    /// Values that fail to parse leave the default in place.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup(ENV_FEED_URL) {
            config.feed_url = url;
        }
        if let Some(url) = lookup(ENV_BOOTSTRAP_URL) {
            config.bootstrap_url = url;
        }
        if let Some(url) = lookup(ENV_CONTROL_URL) {
            config.control_url = url;
        }
        if let Some(secs) = lookup(ENV_HEARTBEAT_SECS) {
            if let Ok(s) = secs.trim().parse::<u64>() {
                if s > 0 {
                    config.heartbeat_interval = Duration::from_secs(s);
                }
            }
        }
        if let Some(offset) = lookup(ENV_UTC_OFFSET_MINUTES) {
            if let Some(zone) = offset
                .trim()
                .parse::<i32>()
                .ok()
                .and_then(ViewerZone::from_offset_minutes)
            {
                config.chart.zone = zone;
            }
        }

        config
    }
}

/// Builder pattern for DashboardConfig.
#[derive(Default)]
pub struct DashboardConfigBuilder {
    config: DashboardConfig,
}

impl DashboardConfigBuilder {
    pub fn feed_url(mut self, url: impl Into<String>) -> Self {
        self.config.feed_url = url.into();
        self
    }

    pub fn bootstrap_url(mut self, url: impl Into<String>) -> Self {
        self.config.bootstrap_url = url.into();
        self
    }

    pub fn control_url(mut self, url: impl Into<String>) -> Self {
        self.config.control_url = url.into();
        self
    }

    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.config.heartbeat_interval = interval;
        self
    }

    pub fn reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.config.reconnect = policy;
        self
    }

    pub fn trade_buffer_capacity(mut self, capacity: usize) -> Self {
        self.config.trade_buffer_capacity = capacity;
        self
    }

    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.config.channel_capacity = capacity.max(1);
        self
    }

    /// Viewer zone for hours, buckets and naive timestamps.
    pub fn zone(mut self, zone: ViewerZone) -> Self {
        self.config.chart.zone = zone;
        self
    }

    pub fn trading_hours(mut self, start_hour: u32, end_hour: u32) -> Self {
        self.config.chart.window_start_hour = start_hour;
        self.config.chart.window_end_hour = end_hour;
        self
    }

    pub fn candle_bucket_minutes(mut self, minutes: u32) -> Self {
        self.config.chart.candle_bucket_minutes = minutes;
        self
    }

    pub fn resample_step(mut self, step: Duration) -> Self {
        self.config.chart.resample_step = step;
        self
    }

    pub fn resample_max_gap(mut self, max_gap: Duration) -> Self {
        self.config.chart.resample_max_gap = max_gap;
        self
    }

    pub fn build(self) -> DashboardConfig {
        self.config
    }
}
