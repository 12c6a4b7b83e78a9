use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::bar::{Bar, WireBar};
use super::series::{DerivedSeries, MinuteFrame, SeriesKey};
use super::trade::{Trade, WireTrade};
use super::{lenient_f64, lenient_u64};
use crate::error::DashboardError;
use crate::pipeline::window::ViewerZone;

/// Snapshot payload exactly as the feed sends it.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct WireSnapshot {
    #[serde(default)]
    pub timestamp: Option<Value>,
    #[serde(default, alias = "bars")]
    pub minute_aggregates: Option<Vec<Value>>,
    #[serde(default)]
    pub trades: Option<Vec<Value>>,
    #[serde(default)]
    pub summary: Option<Value>,
    #[serde(default)]
    pub moving_averages: Option<Value>,
    #[serde(default)]
    pub macd: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct WireMovingAverages {
    #[serde(default, rename = "MA10")]
    pub ma10: Option<Value>,
    #[serde(default, rename = "MA20")]
    pub ma20: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct WireMacd {
    #[serde(default)]
    pub macd_line: Option<Value>,
    #[serde(default)]
    pub signal_line: Option<Value>,
    #[serde(default)]
    pub histogram: Option<Value>,
}

/// Session statistics computed upstream.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summary {
    pub last_price: Option<f64>,
    pub opening_price: Option<f64>,
    pub day_high: Option<f64>,
    pub day_low: Option<f64>,
    pub total_volume: u64,
    pub trade_count: u64,
    pub last_update: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PriceDirection {
    Up,
    Down,
    Flat,
}

impl Summary {
    pub fn from_value(value: &Value) -> Self {
        Self {
            last_price: lenient_f64(value.get("last_price")),
            opening_price: lenient_f64(value.get("opening_price")),
            day_high: lenient_f64(value.get("day_high")),
            day_low: lenient_f64(value.get("day_low")),
            total_volume: lenient_u64(value.get("total_volume")).unwrap_or(0),
            trade_count: lenient_u64(value.get("trade_count")).unwrap_or(0),
            last_update: value
                .get("last_update")
                .and_then(Value::as_str)
                .map(str::to_string),
        }
    }

    /// Last price relative to the session open.
    pub fn direction(&self) -> PriceDirection {
        match (self.last_price, self.opening_price) {
            (Some(last), Some(open)) if last > open => PriceDirection::Up,
            (Some(last), Some(open)) if last < open => PriceDirection::Down,
            _ => PriceDirection::Flat,
        }
    }
}

/// One validated, atomic feed update.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub timestamp: Option<DateTime<Utc>>,
    pub frame: MinuteFrame,
    pub trades: Vec<Trade>,
    pub summary: Option<Summary>,
}

impl Snapshot {
    pub fn parse(raw: &str, zone: ViewerZone) -> Result<Self, DashboardError> {
        let wire: WireSnapshot = serde_json::from_str(raw)?;
        Ok(Self::from_wire(wire, zone))
    }

    /// Validates a wire snapshot. Each bar and trade is decoded on its own,
    /// so one malformed element only drops itself; surviving bars keep their
    /// delivered index so the derived series still line up with them.
    pub fn from_wire(wire: WireSnapshot, zone: ViewerZone) -> Self {
        let wire_bars = wire.minute_aggregates.unwrap_or_default();
        let delivered = wire_bars.len();
        let entries: Vec<_> = wire_bars
            .into_iter()
            .enumerate()
            .filter_map(|(i, raw)| match decode_bar(raw, zone) {
                Ok(bar) => Some((i, bar)),
                Err(e) => {
                    debug!("Skipping bar {}: {}", i, e);
                    None
                }
            })
            .collect();
        if entries.len() < delivered {
            warn!(
                "Dropped {} of {} minute bars that failed to parse",
                delivered - entries.len(),
                delivered
            );
        }

        let mut series = Vec::new();
        let moving_averages: Option<WireMovingAverages> =
            decode_block(wire.moving_averages, "moving_averages");
        if let Some(ma) = moving_averages {
            push_series(&mut series, SeriesKey::Ma10, ma.ma10.as_ref());
            push_series(&mut series, SeriesKey::Ma20, ma.ma20.as_ref());
        }
        let macd: Option<WireMacd> = decode_block(wire.macd, "macd");
        if let Some(macd) = macd {
            push_series(&mut series, SeriesKey::MacdLine, macd.macd_line.as_ref());
            push_series(&mut series, SeriesKey::MacdSignal, macd.signal_line.as_ref());
            push_series(&mut series, SeriesKey::MacdHistogram, macd.histogram.as_ref());
        }

        let trades = wire
            .trades
            .unwrap_or_default()
            .into_iter()
            .filter_map(|raw| serde_json::from_value::<WireTrade>(raw).ok())
            .filter_map(|t| t.parse(zone))
            .collect();

        Self {
            timestamp: wire
                .timestamp
                .as_ref()
                .and_then(Value::as_str)
                .and_then(|t| zone.parse_timestamp(t)),
            frame: MinuteFrame::new(entries, series),
            trades,
            summary: wire.summary.as_ref().map(Summary::from_value),
        }
    }

    pub fn frame(&self) -> &MinuteFrame {
        &self.frame
    }

    pub fn has_bars(&self) -> bool {
        !self.frame.is_empty()
    }
}

fn decode_bar(raw: Value, zone: ViewerZone) -> Result<Bar, DashboardError> {
    serde_json::from_value::<WireBar>(raw)?.parse(zone)
}

fn decode_block<T: DeserializeOwned>(raw: Option<Value>, name: &str) -> Option<T> {
    match serde_json::from_value(raw?) {
        Ok(block) => Some(block),
        Err(e) => {
            warn!("Ignoring malformed {} block: {}", name, e);
            None
        }
    }
}

fn push_series(out: &mut Vec<(SeriesKey, DerivedSeries)>, key: SeriesKey, value: Option<&Value>) {
    if let Some(value) = value {
        out.push((key, DerivedSeries::from_value(value)));
    }
}
