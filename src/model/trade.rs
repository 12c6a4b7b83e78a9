use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{lenient_f64, Timestamped};
use crate::pipeline::window::ViewerZone;

/// Default number of raw trades kept in memory.
pub const TRADE_BUFFER_CAPACITY: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trade {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub size: f64,
    pub venue: Option<String>,
}

impl Timestamped for Trade {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// A raw trade as the simulator emits it.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct WireTrade {
    #[serde(default, alias = "datetime", alias = "timestamp")]
    pub original_datetime: Option<Value>,
    #[serde(default)]
    pub price: Option<Value>,
    #[serde(default, alias = "size")]
    pub quantity: Option<Value>,
    #[serde(default)]
    pub venue: Option<Value>,
}

impl WireTrade {
    pub fn parse(&self, zone: ViewerZone) -> Option<Trade> {
        let timestamp = zone.parse_timestamp(self.original_datetime.as_ref()?.as_str()?)?;
        Some(Trade {
            timestamp,
            price: lenient_f64(self.price.as_ref())?,
            size: lenient_f64(self.quantity.as_ref()).unwrap_or(0.0),
            venue: self.venue.as_ref().and_then(Value::as_str).map(str::to_string),
        })
    }
}

/// Bounded ring of the most recent trades, oldest evicted first.
#[derive(Debug, Clone)]
pub struct TradeBuffer {
    trades: VecDeque<Trade>,
    capacity: usize,
}

impl TradeBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            trades: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    pub fn push(&mut self, trade: Trade) {
        if self.capacity == 0 {
            return;
        }
        if self.trades.len() == self.capacity {
            self.trades.pop_front();
        }
        self.trades.push_back(trade);
    }

    pub fn extend<I: IntoIterator<Item = Trade>>(&mut self, trades: I) {
        for trade in trades {
            self.push(trade);
        }
    }

    pub fn latest(&self) -> Option<&Trade> {
        self.trades.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Trade> {
        self.trades.iter()
    }
}

impl Default for TradeBuffer {
    fn default() -> Self {
        Self::new(TRADE_BUFFER_CAPACITY)
    }
}
