//! Projects a derived series onto the time axis actually being drawn.
//!
//! Each target time takes the value of the first minute bar at or after it.
//! Values are stepped onto finer axes, never interpolated, and a target
//! whose following bar has no value is simply left out.

use chrono::{DateTime, Utc};

use super::render::Point;
use crate::model::series::AnchoredSeries;

pub fn project<I>(series: AnchoredSeries<'_>, targets: I) -> Vec<Point>
where
    I: IntoIterator<Item = DateTime<Utc>>,
{
    let axis = series.axis();
    let mut cursor = 0usize;
    let mut previous: Option<DateTime<Utc>> = None;
    let mut out = Vec::new();

    for target in targets {
        if previous.is_some_and(|p| target < p) {
            // Out-of-order target; restart the walk from a binary search.
            cursor = axis.partition_point(|bar| bar.timestamp < target);
        } else {
            while cursor < axis.len() && axis[cursor].timestamp < target {
                cursor += 1;
            }
        }
        previous = Some(target);

        if cursor == axis.len() {
            continue;
        }
        if let Some(y) = series.value_at(cursor) {
            out.push(Point { x: target, y });
        }
    }
    out
}

/// Convenience for the common case of projecting onto a bar sequence.
pub fn project_onto<'b, B>(series: AnchoredSeries<'_>, bars: B) -> Vec<Point>
where
    B: IntoIterator<Item = &'b crate::model::bar::Bar>,
{
    project(series, bars.into_iter().map(|b| b.timestamp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::bar::Bar;
    use crate::model::series::{DerivedSeries, MinuteFrame, SeriesKey};
    use chrono::{Duration, TimeZone};

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 2, 9, 30, 0).unwrap()
    }

    fn frame(values: Vec<(usize, f64)>) -> MinuteFrame {
        let bars = (0..4)
            .map(|i| {
                let close = 100.0 + i as f64;
                Bar::new(base() + Duration::minutes(i), close, close, close, close, 1.0)
            })
            .collect();
        let ma10: DerivedSeries = values.into_iter().collect();
        MinuteFrame::from_bars(bars, vec![(SeriesKey::Ma10, ma10)])
    }

    #[test]
    fn test_identity_on_raw_axis() {
        let frame = frame(vec![(0, 1.0), (1, 2.0), (2, 0.0), (3, 4.0)]);
        let series = frame.series(SeriesKey::Ma10).unwrap();
        let points = project_onto(series, frame.bars());

        let expected: Vec<Point> = series
            .points()
            .map(|(b, y)| Point { x: b.timestamp, y })
            .collect();
        assert_eq!(points, expected);
        assert_eq!(points.len(), 4);
    }

    #[test]
    fn test_identity_skips_missing_values() {
        let frame = frame(vec![(1, 2.0), (3, 4.0)]);
        let series = frame.series(SeriesKey::Ma10).unwrap();
        let points = project_onto(series, frame.bars());

        assert_eq!(points.len(), 2);
        assert_eq!(points[0], Point { x: base() + Duration::minutes(1), y: 2.0 });
    }

    #[test]
    fn test_steps_forward_onto_finer_axis() {
        let frame = frame(vec![(0, 1.0), (1, 2.0), (2, 3.0), (3, 4.0)]);
        let series = frame.series(SeriesKey::Ma10).unwrap();
        let targets = [0, 10, 50, 60, 61].map(|s| base() + Duration::seconds(s));
        let points = project(series, targets);

        let ys: Vec<f64> = points.iter().map(|p| p.y).collect();
        assert_eq!(ys, vec![1.0, 2.0, 2.0, 2.0, 3.0]);
        assert_eq!(points[1].x, base() + Duration::seconds(10));
    }

    #[test]
    fn test_targets_after_last_bar_dropped() {
        let frame = frame(vec![(0, 1.0), (1, 2.0), (2, 3.0), (3, 4.0)]);
        let series = frame.series(SeriesKey::Ma10).unwrap();
        let targets = [3 * 60, 3 * 60 + 1, 600].map(|s| base() + Duration::seconds(s));
        let points = project(series, targets);

        assert_eq!(points.len(), 1);
        assert_eq!(points[0].y, 4.0);
    }

    #[test]
    fn test_unordered_targets_match_linear_scan() {
        let frame = frame(vec![(0, 1.0), (1, 2.0), (2, 3.0), (3, 4.0)]);
        let series = frame.series(SeriesKey::Ma10).unwrap();
        let targets = [150, 5, 120, 0, 179].map(|s| base() + Duration::seconds(s));
        let points = project(series, targets);

        let ys: Vec<f64> = points.iter().map(|p| p.y).collect();
        assert_eq!(ys, vec![4.0, 2.0, 3.0, 1.0, 4.0]);
    }
}
