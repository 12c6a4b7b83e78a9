//! Derived series and the minute axis they are indexed against.
//!
//! Moving averages and MACD values arrive keyed by position in the minute
//! bar array of the same snapshot. [`MinuteFrame`] owns both halves and only
//! hands a series out as an [`AnchoredSeries`] borrowing its own axis, so a
//! series can never be read against bars from another snapshot.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use super::bar::Bar;
use super::lenient_f64;

/// The derived series a snapshot can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum SeriesKey {
    Ma10,
    Ma20,
    MacdLine,
    MacdSignal,
    MacdHistogram,
}

impl SeriesKey {
    pub const MOVING_AVERAGES: [SeriesKey; 2] = [SeriesKey::Ma10, SeriesKey::Ma20];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Ma10 => "10-Period MA",
            Self::Ma20 => "20-Period MA",
            Self::MacdLine => "MACD Line",
            Self::MacdSignal => "Signal Line",
            Self::MacdHistogram => "Histogram",
        }
    }
}

impl std::fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Sparse index -> value mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DerivedSeries {
    values: BTreeMap<usize, f64>,
}

impl DerivedSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts both encodings the feed uses: an object keyed by decimal
    /// index strings, or a plain array with `null` holes.
    pub fn from_value(value: &Value) -> Self {
        let values = match value {
            Value::Object(map) => map
                .iter()
                .filter_map(|(k, v)| Some((k.trim().parse::<usize>().ok()?, lenient_f64(Some(v))?)))
                .collect(),
            Value::Array(items) => items
                .iter()
                .enumerate()
                .filter_map(|(i, v)| Some((i, lenient_f64(Some(v))?)))
                .collect(),
            _ => BTreeMap::new(),
        };
        Self { values }
    }

    pub fn insert(&mut self, index: usize, value: f64) {
        self.values.insert(index, value);
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.values.get(&index).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.values.iter().map(|(i, v)| (*i, *v))
    }

    fn retain_positions(&mut self, positions: &HashSet<usize>) -> usize {
        let before = self.values.len();
        self.values.retain(|i, _| positions.contains(i));
        before - self.values.len()
    }
}

impl FromIterator<(usize, f64)> for DerivedSeries {
    fn from_iter<T: IntoIterator<Item = (usize, f64)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Time-ordered minute bars together with the series indexed against them.
#[derive(Debug, Clone, Default)]
pub struct MinuteFrame {
    bars: Vec<Bar>,
    /// Index each bar had in the array the feed delivered.
    positions: Vec<usize>,
    series: BTreeMap<SeriesKey, DerivedSeries>,
}

impl MinuteFrame {
    /// Builds a frame from `(delivered_index, bar)` pairs.
    ///
    /// Bars are stably sorted by timestamp and later duplicates of a
    /// timestamp are dropped. Series entries that do not point at a
    /// surviving bar are discarded.
    pub fn new<I>(entries: Vec<(usize, Bar)>, series: I) -> Self
    where
        I: IntoIterator<Item = (SeriesKey, DerivedSeries)>,
    {
        let mut entries = entries;
        entries.sort_by_key(|(_, bar)| bar.timestamp);
        let before = entries.len();
        entries.dedup_by_key(|(_, bar)| bar.timestamp);
        if entries.len() < before {
            warn!(
                "Dropped {} minute bars with duplicate timestamps",
                before - entries.len()
            );
        }

        let (positions, bars): (Vec<usize>, Vec<Bar>) = entries.into_iter().unzip();
        let known: HashSet<usize> = positions.iter().copied().collect();

        let series = series
            .into_iter()
            .filter_map(|(key, mut values)| {
                let orphaned = values.retain_positions(&known);
                if orphaned > 0 {
                    warn!("{}: discarded {} values with no matching bar", key, orphaned);
                }
                (!values.is_empty()).then_some((key, values))
            })
            .collect();

        Self {
            bars,
            positions,
            series,
        }
    }

    /// Frame whose bars were delivered in exactly this order.
    pub fn from_bars<I>(bars: Vec<Bar>, series: I) -> Self
    where
        I: IntoIterator<Item = (SeriesKey, DerivedSeries)>,
    {
        Self::new(bars.into_iter().enumerate().collect(), series)
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn has_series(&self, key: SeriesKey) -> bool {
        self.series.contains_key(&key)
    }

    pub fn series(&self, key: SeriesKey) -> Option<AnchoredSeries<'_>> {
        let values = self.series.get(&key)?;
        Some(AnchoredSeries {
            axis: &self.bars,
            positions: &self.positions,
            values,
        })
    }
}

/// A derived series borrowed together with the bar axis it indexes.
#[derive(Debug, Clone, Copy)]
pub struct AnchoredSeries<'a> {
    axis: &'a [Bar],
    positions: &'a [usize],
    values: &'a DerivedSeries,
}

impl<'a> AnchoredSeries<'a> {
    pub fn axis(&self) -> &'a [Bar] {
        self.axis
    }

    /// Value attached to the `bar_index`-th bar of the axis, if any.
    pub fn value_at(&self, bar_index: usize) -> Option<f64> {
        let position = *self.positions.get(bar_index)?;
        self.values.get(position)
    }

    /// `(bar, value)` for every bar that has a value.
    pub fn points(&self) -> impl Iterator<Item = (&'a Bar, f64)> + 'a {
        let this = *self;
        self.axis
            .iter()
            .enumerate()
            .filter_map(move |(i, bar)| Some((bar, this.value_at(i)?)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use serde_json::json;

    fn bar(minute: i64, close: f64) -> Bar {
        let base = Utc.with_ymd_and_hms(2024, 1, 2, 9, 30, 0).unwrap();
        Bar::new(base + Duration::minutes(minute), close, close, close, close, 10.0)
    }

    #[test]
    fn test_series_from_object_and_array() {
        let object = DerivedSeries::from_value(&json!({"0": 1.5, "2": "2.5", "x": 3.0, "3": null}));
        assert_eq!(object.len(), 2);
        assert_eq!(object.get(2), Some(2.5));

        let array = DerivedSeries::from_value(&json!([null, 1.0, 0.0]));
        assert_eq!(array.get(0), None);
        assert_eq!(array.get(1), Some(1.0));
        assert_eq!(array.get(2), Some(0.0));

        assert!(DerivedSeries::from_value(&json!("nope")).is_empty());
    }

    #[test]
    fn test_frame_sorts_and_keeps_positions() {
        let ma: DerivedSeries = vec![(0, 10.0), (1, 11.0), (2, 12.0)].into_iter().collect();
        let entries = vec![(0, bar(2, 3.0)), (1, bar(0, 1.0)), (2, bar(1, 2.0))];
        let frame = MinuteFrame::new(entries, vec![(SeriesKey::Ma10, ma)]);

        let closes: Vec<f64> = frame.bars().iter().map(|b| b.close).collect();
        assert_eq!(closes, vec![1.0, 2.0, 3.0]);

        let anchored = frame.series(SeriesKey::Ma10).unwrap();
        assert_eq!(anchored.value_at(0), Some(11.0));
        assert_eq!(anchored.value_at(1), Some(12.0));
        assert_eq!(anchored.value_at(2), Some(10.0));
    }

    #[test]
    fn test_frame_drops_duplicate_timestamps() {
        let entries = vec![(0, bar(0, 1.0)), (1, bar(0, 9.0)), (2, bar(1, 2.0))];
        let frame = MinuteFrame::new(entries, Vec::new());

        assert_eq!(frame.len(), 2);
        assert_eq!(frame.bars()[0].close, 1.0);
    }

    #[test]
    fn test_orphaned_series_values_discarded() {
        // Position 1 belonged to a bar that failed to parse.
        let ma: DerivedSeries = vec![(0, 10.0), (1, 11.0), (2, 12.0), (7, 99.0)]
            .into_iter()
            .collect();
        let entries = vec![(0, bar(0, 1.0)), (2, bar(2, 3.0))];
        let frame = MinuteFrame::new(entries, vec![(SeriesKey::Ma20, ma)]);

        let anchored = frame.series(SeriesKey::Ma20).unwrap();
        let values: Vec<f64> = anchored.points().map(|(_, v)| v).collect();
        assert_eq!(values, vec![10.0, 12.0]);
    }

    #[test]
    fn test_empty_series_not_exposed() {
        let ma: DerivedSeries = vec![(5, 1.0)].into_iter().collect();
        let frame = MinuteFrame::from_bars(vec![bar(0, 1.0)], vec![(SeriesKey::Ma10, ma)]);
        assert!(!frame.has_series(SeriesKey::Ma10));
        assert!(frame.series(SeriesKey::Ma10).is_none());
    }
}
