use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{lenient_f64, lenient_u64, Timestamped};
use crate::error::DashboardError;
use crate::pipeline::window::ViewerZone;

/// One OHLCV aggregation window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bar {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub trade_count: u64,
    pub vwap: Option<f64>,
    /// True for bars the resampler invented between two real bars. Only the
    /// close and volume of such a bar are interpolated; open/high/low/vwap
    /// carry cosmetic jitter and are not market data.
    pub synthetic: bool,
}

impl Bar {
    pub fn new(
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
            trade_count: 0,
            vwap: None,
            synthetic: false,
        }
    }

    pub fn with_trade_count(mut self, trade_count: u64) -> Self {
        self.trade_count = trade_count;
        self
    }

    pub fn with_vwap(mut self, vwap: f64) -> Self {
        self.vwap = Some(vwap);
        self
    }
}

impl Timestamped for Bar {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// A minute aggregate as the feed sends it. Every field is optional and
/// numbers may be strings; [`WireBar::parse`] decides what survives.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct WireBar {
    #[serde(default, alias = "timestamp")]
    pub minute: Option<Value>,
    #[serde(default, alias = "open")]
    pub open_price: Option<Value>,
    #[serde(default, alias = "high")]
    pub max_price: Option<Value>,
    #[serde(default, alias = "low")]
    pub min_price: Option<Value>,
    #[serde(default, alias = "close")]
    pub close_price: Option<Value>,
    #[serde(default)]
    pub volume: Option<Value>,
    #[serde(default)]
    pub trade_count: Option<Value>,
    #[serde(default)]
    pub vwap: Option<Value>,
}

impl WireBar {
    /// Timestamp and close are mandatory. Missing open/high/low fall back to
    /// the close and high/low are widened to cover open and close.
    pub fn parse(&self, zone: ViewerZone) -> Result<Bar, DashboardError> {
        let raw_time = self
            .minute
            .as_ref()
            .and_then(Value::as_str)
            .ok_or_else(|| DashboardError::Parse("bar without timestamp".to_string()))?;
        let timestamp = zone
            .parse_timestamp(raw_time)
            .ok_or_else(|| DashboardError::Parse(format!("bad bar timestamp {:?}", raw_time)))?;
        let close = lenient_f64(self.close_price.as_ref()).ok_or_else(|| {
            DashboardError::Parse(format!("bar at {} has no close price", raw_time))
        })?;

        let open = lenient_f64(self.open_price.as_ref()).unwrap_or(close);
        let high = lenient_f64(self.max_price.as_ref())
            .unwrap_or(close)
            .max(open)
            .max(close);
        let low = lenient_f64(self.min_price.as_ref())
            .unwrap_or(close)
            .min(open)
            .min(close);

        Ok(Bar {
            timestamp,
            open,
            high,
            low,
            close,
            volume: lenient_f64(self.volume.as_ref()).unwrap_or(0.0).max(0.0),
            trade_count: lenient_u64(self.trade_count.as_ref()).unwrap_or(0),
            vwap: lenient_f64(self.vwap.as_ref()),
            synthetic: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc() -> ViewerZone {
        ViewerZone::utc()
    }

    #[test]
    fn test_parse_feed_bar() {
        let raw = r#"{"minute":"2024-01-02T09:30:00","min_price":99.5,"max_price":101.0,
            "open_price":100.0,"close_price":100.5,"volume":1200,"trade_count":14,"vwap":100.2}"#;
        let wire: WireBar = serde_json::from_str(raw).unwrap();
        let bar = wire.parse(utc()).unwrap();

        assert_eq!(
            bar.timestamp,
            Utc.with_ymd_and_hms(2024, 1, 2, 9, 30, 0).unwrap()
        );
        assert_eq!(bar.open, 100.0);
        assert_eq!(bar.high, 101.0);
        assert_eq!(bar.low, 99.5);
        assert_eq!(bar.close, 100.5);
        assert_eq!(bar.volume, 1200.0);
        assert_eq!(bar.trade_count, 14);
        assert_eq!(bar.vwap, Some(100.2));
        assert!(!bar.synthetic);
    }

    #[test]
    fn test_parse_string_numbers_and_aliases() {
        let raw = r#"{"timestamp":"2024-01-02T09:31:00Z","open":"10","high":"12",
            "low":"9","close":"11","volume":"300","vwap":null}"#;
        let wire: WireBar = serde_json::from_str(raw).unwrap();
        let bar = wire.parse(utc()).unwrap();

        assert_eq!(bar.high, 12.0);
        assert_eq!(bar.volume, 300.0);
        assert_eq!(bar.trade_count, 0);
        assert_eq!(bar.vwap, None);
    }

    #[test]
    fn test_malformed_timestamp_rejected() {
        let raw = r#"{"minute":"not-a-date","close_price":100.0}"#;
        let wire: WireBar = serde_json::from_str(raw).unwrap();
        assert!(matches!(wire.parse(utc()), Err(DashboardError::Parse(_))));
    }

    #[test]
    fn test_missing_close_rejected() {
        let raw = r#"{"minute":"2024-01-02T09:30:00","open_price":100.0}"#;
        let wire: WireBar = serde_json::from_str(raw).unwrap();
        assert!(wire.parse(utc()).is_err());
    }

    #[test]
    fn test_high_low_cover_open_close() {
        let raw = r#"{"minute":"2024-01-02T09:30:00","open_price":105.0,
            "max_price":101.0,"min_price":100.0,"close_price":99.0}"#;
        let wire: WireBar = serde_json::from_str(raw).unwrap();
        let bar = wire.parse(utc()).unwrap();

        assert_eq!(bar.high, 105.0);
        assert_eq!(bar.low, 99.0);
    }
}
