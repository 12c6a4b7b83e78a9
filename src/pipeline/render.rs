//! Renderable payload and the full re-derivation that produces it.
//!
//! Every payload is derived from scratch out of one [`MinuteFrame`]; nothing
//! is patched incrementally, so an overlay can never be drawn against bars
//! from a different snapshot.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use tracing::debug;

use super::align::project_onto;
use super::candles::CandleAggregator;
use super::resample::Resampler;
use super::window::TradingWindow;
use crate::config::ChartConfig;
use crate::error::DashboardError;
use crate::model::bar::Bar;
use crate::model::series::{MinuteFrame, SeriesKey};

const VOLUME_HEADROOM: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Line,
    Candlestick,
}

impl ViewMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Line => "line",
            Self::Candlestick => "candlestick",
        }
    }
}

impl std::fmt::Display for ViewMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// `{x, y}` point for line, volume and MACD series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub x: DateTime<Utc>,
    pub y: f64,
}

/// `{x, o, h, l, c}` tuple for candlestick series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CandlePoint {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub x: DateTime<Utc>,
    pub o: f64,
    pub h: f64,
    pub l: f64,
    pub c: f64,
}

impl From<&Bar> for CandlePoint {
    fn from(bar: &Bar) -> Self {
        Self {
            x: bar.timestamp,
            o: bar.open,
            h: bar.high,
            l: bar.low,
            c: bar.close,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AxisRange {
    pub min: f64,
    pub max: f64,
}

impl AxisRange {
    /// `[min - f*range, max + f*range]` over `values`, or `None` if empty.
    ///
    /// A flat series gets padding relative to its magnitude instead so
    /// the axis never collapses to a single value.
    pub fn padded<I>(values: I, fraction: f64) -> Option<Self>
    where
        I: IntoIterator<Item = f64>,
    {
        let (min, max) = bounds(values)?;
        let span = max - min;
        let pad = if span > 0.0 {
            span * fraction
        } else if max != 0.0 {
            max.abs() * fraction
        } else {
            1.0
        };
        Some(Self {
            min: min - pad,
            max: max + pad,
        })
    }

    /// `[0, max * (1 + headroom)]`, used for bar-style panels.
    pub fn from_zero<I>(values: I, headroom: f64) -> Option<Self>
    where
        I: IntoIterator<Item = f64>,
    {
        let (_, max) = bounds(values)?;
        let max = if max > 0.0 { max * (1.0 + headroom) } else { 1.0 };
        Some(Self { min: 0.0, max })
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

fn bounds<I: IntoIterator<Item = f64>>(values: I) -> Option<(f64, f64)> {
    values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "lowercase")]
pub enum PriceSeries {
    Line(Vec<Point>),
    Candles(Vec<CandlePoint>),
}

impl PriceSeries {
    pub fn len(&self) -> usize {
        match self {
            Self::Line(points) => points.len(),
            Self::Candles(candles) => candles.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A derived series aligned onto the price panel's axis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overlay {
    pub key: SeriesKey,
    pub label: &'static str,
    pub points: Vec<Point>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricePanel {
    pub series: PriceSeries,
    pub overlays: Vec<Overlay>,
    pub range: Option<AxisRange>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VolumePanel {
    pub bars: Vec<Point>,
    pub range: Option<AxisRange>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MacdPanel {
    pub line: Vec<Point>,
    pub signal: Vec<Point>,
    pub histogram: Vec<Point>,
    pub range: Option<AxisRange>,
}

impl MacdPanel {
    pub fn is_empty(&self) -> bool {
        self.line.is_empty() && self.signal.is_empty() && self.histogram.is_empty()
    }
}

/// Everything the chart surface needs for one redraw.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderPayload {
    pub mode: ViewMode,
    /// Shared x-axis extent: the trading window on the first bar's day.
    pub x_extent: Option<(DateTime<Utc>, DateTime<Utc>)>,
    pub price: PricePanel,
    pub volume: VolumePanel,
    pub macd: MacdPanel,
}

/// The stateless stages wired together with their configuration.
#[derive(Debug, Clone, Copy)]
pub struct ChartPipeline {
    window: TradingWindow,
    resampler: Resampler,
    candles: CandleAggregator,
    price_padding: f64,
    macd_padding: f64,
}

impl ChartPipeline {
    pub fn new(config: &ChartConfig) -> Self {
        let window = config.trading_window();
        Self {
            window,
            resampler: Resampler::new(config.resample_step)
                .with_max_gap(config.resample_max_gap),
            candles: CandleAggregator::new(config.candle_bucket_minutes, window),
            price_padding: config.price_padding,
            macd_padding: config.macd_padding,
        }
    }

    pub fn derive<R: Rng + ?Sized>(
        &self,
        frame: &MinuteFrame,
        mode: ViewMode,
        show_overlays: bool,
        rng: &mut R,
    ) -> Result<RenderPayload, DashboardError> {
        let first = frame
            .bars()
            .first()
            .ok_or(DashboardError::EmptyInput("snapshot has no minute bars"))?;

        // Volume, MACD and the line price series share the dense axis.
        let dense = self.window.filter(&self.resampler.resample_with(frame.bars(), rng));
        if dense.is_empty() {
            return Err(DashboardError::EmptyInput("no bars inside the trading window"));
        }

        let price = match mode {
            ViewMode::Line => self.line_panel(frame, &dense, show_overlays),
            ViewMode::Candlestick => self.candle_panel(frame, show_overlays)?,
        };

        let volume_bars: Vec<Point> = dense
            .iter()
            .map(|b| Point { x: b.timestamp, y: b.volume })
            .collect();
        let volume = VolumePanel {
            range: AxisRange::from_zero(volume_bars.iter().map(|p| p.y), VOLUME_HEADROOM),
            bars: volume_bars,
        };

        let macd = self.macd_panel(frame, &dense);

        debug!(
            "Derived {} payload: {} price points, {} overlays, {} volume bars, macd {}",
            mode,
            price.series.len(),
            price.overlays.len(),
            volume.bars.len(),
            if macd.is_empty() { "empty" } else { "present" }
        );

        Ok(RenderPayload {
            mode,
            x_extent: self.window.day_extent(first.timestamp),
            price,
            volume,
            macd,
        })
    }

    fn line_panel(&self, frame: &MinuteFrame, dense: &[Bar], show_overlays: bool) -> PricePanel {
        let line: Vec<Point> = dense.iter().map(|b| Point { x: b.timestamp, y: b.close }).collect();
        let overlays = if show_overlays {
            moving_average_overlays(frame, dense)
        } else {
            Vec::new()
        };

        let values = line
            .iter()
            .chain(overlays.iter().flat_map(|o| o.points.iter()))
            .map(|p| p.y);
        PricePanel {
            range: AxisRange::padded(values, self.price_padding),
            series: PriceSeries::Line(line),
            overlays,
        }
    }

    fn candle_panel(
        &self,
        frame: &MinuteFrame,
        show_overlays: bool,
    ) -> Result<PricePanel, DashboardError> {
        let candles: Vec<CandlePoint> = self
            .candles
            .aggregate(frame.bars())
            .iter()
            .map(CandlePoint::from)
            .collect();
        if candles.is_empty() {
            return Err(DashboardError::EmptyInput("no candles inside the trading window"));
        }

        // Candle buckets have no 1:1 bar, so overlays follow the raw minutes.
        let overlays = if show_overlays {
            moving_average_overlays(frame, &self.window.filter(frame.bars()))
        } else {
            Vec::new()
        };

        let values = candles.iter().flat_map(|c| [c.o, c.h, c.l, c.c]);
        Ok(PricePanel {
            range: AxisRange::padded(values, self.price_padding),
            series: PriceSeries::Candles(candles),
            overlays,
        })
    }

    fn macd_panel(&self, frame: &MinuteFrame, dense: &[Bar]) -> MacdPanel {
        let aligned = |key| {
            frame
                .series(key)
                .map(|series| project_onto(series, dense))
                .unwrap_or_default()
        };
        let line = aligned(SeriesKey::MacdLine);
        let signal = aligned(SeriesKey::MacdSignal);
        let histogram = aligned(SeriesKey::MacdHistogram);
        let range = AxisRange::padded(
            line.iter().chain(&signal).chain(&histogram).map(|p| p.y),
            self.macd_padding,
        );
        MacdPanel {
            line,
            signal,
            histogram,
            range,
        }
    }
}

impl Default for ChartPipeline {
    fn default() -> Self {
        Self::new(&ChartConfig::default())
    }
}

fn moving_average_overlays(frame: &MinuteFrame, axis: &[Bar]) -> Vec<Overlay> {
    SeriesKey::MOVING_AVERAGES
        .iter()
        .filter_map(|&key| {
            let points = project_onto(frame.series(key)?, axis);
            (!points.is_empty()).then_some(Overlay {
                key,
                label: key.label(),
                points,
            })
        })
        .collect()
}
