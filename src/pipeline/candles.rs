use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use super::window::TradingWindow;
use crate::model::bar::Bar;

pub const DEFAULT_BUCKET_MINUTES: u32 = 5;

/// Regroups bars into fixed-width candles aligned to the viewer's clock.
#[derive(Debug, Clone, Copy)]
pub struct CandleAggregator {
    bucket_minutes: u32,
    window: TradingWindow,
}

#[derive(Debug)]
struct Accumulator {
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
    trade_count: u64,
    notional: f64,
    vwap_volume: f64,
}

impl Accumulator {
    fn start(bar: &Bar) -> Self {
        let mut acc = Self {
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: 0.0,
            trade_count: 0,
            notional: 0.0,
            vwap_volume: 0.0,
        };
        acc.add_flow(bar);
        acc
    }

    fn push(&mut self, bar: &Bar) {
        self.high = self.high.max(bar.high);
        self.low = self.low.min(bar.low);
        self.close = bar.close;
        self.add_flow(bar);
    }

    fn add_flow(&mut self, bar: &Bar) {
        self.volume += bar.volume;
        self.trade_count += bar.trade_count;
        if let Some(vwap) = bar.vwap {
            self.notional += vwap * bar.volume;
            self.vwap_volume += bar.volume;
        }
    }

    fn finish(self, start: DateTime<Utc>) -> Bar {
        // Bars carry possibly inconsistent ranges; widen so the candle
        // always contains its own open and close.
        let high = self.high.max(self.open).max(self.close);
        let low = self.low.min(self.open).min(self.close);
        let vwap = (self.vwap_volume > 0.0).then(|| self.notional / self.vwap_volume);
        Bar {
            timestamp: start,
            open: self.open,
            high,
            low,
            close: self.close,
            volume: self.volume,
            trade_count: self.trade_count,
            vwap,
            synthetic: false,
        }
    }
}

impl CandleAggregator {
    pub fn new(bucket_minutes: u32, window: TradingWindow) -> Self {
        Self {
            bucket_minutes: bucket_minutes.max(1),
            window,
        }
    }

    /// One candle per non-empty bucket, ascending by bucket start.
    ///
    /// Input must already be ordered by timestamp so that `open` and
    /// `close` come from the first and last bar of each bucket.
    pub fn aggregate(&self, bars: &[Bar]) -> Vec<Bar> {
        let zone = self.window.zone();
        let mut buckets: BTreeMap<DateTime<Utc>, Accumulator> = BTreeMap::new();

        for bar in bars.iter().filter(|b| self.window.contains(b.timestamp)) {
            let key = zone.bucket_start(bar.timestamp, self.bucket_minutes);
            buckets
                .entry(key)
                .and_modify(|acc| acc.push(bar))
                .or_insert_with(|| Accumulator::start(bar));
        }

        buckets
            .into_iter()
            .map(|(start, acc)| acc.finish(start))
            .collect()
    }
}

impl Default for CandleAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_BUCKET_MINUTES, TradingWindow::default())
    }
}
