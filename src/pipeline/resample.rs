//! Densifies minute bars onto a fixed sub-minute grid.
//!
//! Between two consecutive bars, one synthetic bar is emitted for every grid
//! point strictly inside the gap. Gaps wider than the maximum gap (an
//! overnight close, a halted session) are left alone and only their real
//! endpoints are kept. Close and volume are interpolated linearly
//! in time. Open, high, low and vwap of a synthetic bar are the interpolated
//! close plus a little random jitter so the points do not render as flat
//! candles; that jitter is cosmetic and every such bar has
//! `synthetic == true`.

use chrono::{Duration, TimeDelta};
use rand::Rng;

use crate::model::bar::Bar;

pub const DEFAULT_STEP_SECS: i64 = 10;
pub const DEFAULT_MAX_GAP_SECS: i64 = 300;

const OPEN_JITTER: f64 = 0.03;
const RANGE_JITTER: f64 = 0.05;
const VWAP_JITTER: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resampler {
    step: TimeDelta,
    max_gap: TimeDelta,
}

impl Resampler {
    pub fn new(step: std::time::Duration) -> Self {
        Self {
            step: TimeDelta::from_std(step)
                .unwrap_or_else(|_| Duration::seconds(DEFAULT_STEP_SECS)),
            max_gap: Duration::seconds(DEFAULT_MAX_GAP_SECS),
        }
    }

    /// Widest gap that still gets filled.
    pub fn with_max_gap(mut self, max_gap: std::time::Duration) -> Self {
        self.max_gap = TimeDelta::from_std(max_gap)
            .unwrap_or_else(|_| Duration::seconds(DEFAULT_MAX_GAP_SECS));
        self
    }

    pub fn resample(&self, bars: &[Bar]) -> Vec<Bar> {
        self.resample_with(bars, &mut rand::thread_rng())
    }

    /// Output keeps every input bar, in order, and is never shorter than
    /// the input. Fewer than two bars are returned unchanged.
    pub fn resample_with<R: Rng + ?Sized>(&self, bars: &[Bar], rng: &mut R) -> Vec<Bar> {
        let step_ms = self.step.num_milliseconds();
        let max_gap_ms = self.max_gap.num_milliseconds();
        if bars.len() < 2 || step_ms <= 0 {
            return bars.to_vec();
        }

        let mut out = Vec::with_capacity(bars.len());
        for pair in bars.windows(2) {
            let (current, next) = (&pair[0], &pair[1]);
            out.push(current.clone());

            let gap_ms = (next.timestamp - current.timestamp).num_milliseconds();
            if gap_ms <= step_ms || gap_ms > max_gap_ms {
                continue;
            }

            let steps = gap_ms / step_ms;
            let trade_count = (current.trade_count as f64 / steps as f64).round() as u64;
            let mut offset_ms = step_ms;
            while offset_ms < gap_ms {
                let fraction = offset_ms as f64 / gap_ms as f64;
                let close = current.close + (next.close - current.close) * fraction;
                let volume = (current.volume + (next.volume - current.volume) * fraction).round();
                out.push(synthesize(
                    current.timestamp + Duration::milliseconds(offset_ms),
                    close,
                    volume,
                    trade_count,
                    rng,
                ));
                offset_ms += step_ms;
            }
        }
        if let Some(last) = bars.last() {
            out.push(last.clone());
        }
        out
    }
}

impl Default for Resampler {
    fn default() -> Self {
        Self {
            step: Duration::seconds(DEFAULT_STEP_SECS),
            max_gap: Duration::seconds(DEFAULT_MAX_GAP_SECS),
        }
    }
}

fn synthesize<R: Rng + ?Sized>(
    timestamp: chrono::DateTime<chrono::Utc>,
    close: f64,
    volume: f64,
    trade_count: u64,
    rng: &mut R,
) -> Bar {
    let open = close - rng.gen::<f64>() * OPEN_JITTER;
    let high = close + rng.gen::<f64>() * RANGE_JITTER;
    let low = (close - rng.gen::<f64>() * RANGE_JITTER).min(open);
    let vwap = close + rng.gen::<f64>() * 2.0 * VWAP_JITTER - VWAP_JITTER;
    Bar {
        timestamp,
        open,
        high,
        low,
        close,
        volume,
        trade_count,
        vwap: Some(vwap),
        synthetic: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn at(m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 2, 9, m, s).unwrap()
    }

    fn bar(ts: DateTime<Utc>, close: f64, volume: f64) -> Bar {
        Bar::new(ts, close, close, close, close, volume).with_trade_count(6)
    }

    const EPS: f64 = 1e-9;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    #[test]
    fn test_short_input_unchanged() {
        let resampler = Resampler::default();
        assert!(resampler.resample_with(&[], &mut rng()).is_empty());

        let single = vec![bar(at(30, 0), 100.0, 10.0)];
        assert_eq!(resampler.resample_with(&single, &mut rng()), single);
    }

    #[test]
    fn test_small_gap_unchanged() {
        let resampler = Resampler::default();
        let bars = vec![bar(at(30, 0), 100.0, 10.0), bar(at(30, 10), 101.0, 20.0)];
        assert_eq!(resampler.resample_with(&bars, &mut rng()), bars);

        let close = vec![bar(at(30, 0), 100.0, 10.0), bar(at(30, 4), 101.0, 20.0)];
        assert_eq!(resampler.resample_with(&close, &mut rng()), close);
    }

    #[test]
    fn test_thirty_second_gap() {
        let resampler = Resampler::default();
        let bars = vec![bar(at(30, 0), 100.0, 10.0), bar(at(30, 30), 101.0, 40.0)];
        let out = resampler.resample_with(&bars, &mut rng());

        let stamps: Vec<_> = out.iter().map(|b| b.timestamp).collect();
        assert_eq!(stamps, vec![at(30, 0), at(30, 10), at(30, 20), at(30, 30)]);

        let closes: Vec<f64> = out.iter().map(|b| b.close).collect();
        let expected = [100.0, 100.0 + 1.0 / 3.0, 100.0 + 2.0 / 3.0, 101.0];
        for (got, want) in closes.iter().zip(expected) {
            assert!((got - want).abs() < 1e-9, "{} vs {}", got, want);
        }

        assert_eq!(out[1].volume, 20.0);
        assert_eq!(out[2].volume, 30.0);
        assert_eq!(out[1].trade_count, 2);
        assert!(!out[0].synthetic && out[1].synthetic && out[2].synthetic && !out[3].synthetic);
        assert_eq!(out[0], bars[0]);
        assert_eq!(out[3], bars[1]);
    }

    #[test]
    fn test_thirty_five_second_gap_is_monotonic() {
        let resampler = Resampler::default();
        let bars = vec![bar(at(30, 0), 100.0, 10.0), bar(at(30, 35), 99.0, 10.0)];
        let out = resampler.resample_with(&bars, &mut rng());

        assert_eq!(out.iter().filter(|b| b.synthetic).count(), 3);
        assert_eq!(out.len(), 5);
        assert!(out.windows(2).all(|w| w[1].close <= w[0].close));
        assert!(out.windows(2).all(|w| w[1].timestamp > w[0].timestamp));
    }

    #[test]
    fn test_minute_gap_and_jitter_bounds() {
        let resampler = Resampler::default();
        let bars = vec![
            bar(at(30, 0), 100.0, 10.0),
            bar(at(31, 0), 100.0, 10.0),
            bar(at(33, 0), 106.0, 70.0),
        ];
        let out = resampler.resample_with(&bars, &mut rng());

        // 5 points in the first minute, 11 in the two-minute gap.
        assert_eq!(out.len(), 3 + 5 + 11);
        for b in out.iter().filter(|b| b.synthetic) {
            assert!(b.high >= b.close && b.high - b.close <= RANGE_JITTER + EPS);
            assert!(b.low <= b.close && b.close - b.low <= RANGE_JITTER + EPS);
            assert!(b.open <= b.close && b.close - b.open <= OPEN_JITTER + EPS);
            assert!(b.low <= b.open);
            let vwap = b.vwap.unwrap();
            assert!((vwap - b.close).abs() <= VWAP_JITTER + EPS);
        }
    }

    #[test]
    fn test_custom_step() {
        let resampler = Resampler::new(std::time::Duration::from_secs(30));
        let bars = vec![bar(at(30, 0), 100.0, 10.0), bar(at(31, 0), 102.0, 10.0)];
        let out = resampler.resample_with(&bars, &mut rng());

        assert_eq!(out.len(), 3);
        assert_eq!(out[1].timestamp, at(30, 30));
        assert!((out[1].close - 101.0).abs() < 1e-9);
    }

    #[test]
    fn test_overnight_gap_not_filled() {
        let resampler = Resampler::default();
        let close = Utc.with_ymd_and_hms(2024, 1, 2, 16, 59, 0).unwrap();
        let reopen = Utc.with_ymd_and_hms(2024, 1, 3, 9, 30, 0).unwrap();
        let bars = vec![
            bar(close, 100.0, 10.0),
            bar(reopen, 103.0, 10.0),
            bar(reopen + Duration::seconds(30), 104.0, 10.0),
        ];
        let out = resampler.resample_with(&bars, &mut rng());

        // Only the 30 second gap after the reopen is filled.
        assert_eq!(out.len(), 5);
        assert_eq!(out[0], bars[0]);
        assert_eq!(out[1], bars[1]);
        assert!(out[2].synthetic && out[3].synthetic);
        assert!(out[2].timestamp > reopen);
    }

    #[test]
    fn test_year_gap_keeps_endpoints_only() {
        let resampler = Resampler::default();
        let start = Utc.with_ymd_and_hms(2023, 1, 2, 9, 30, 0).unwrap();
        let bars = vec![bar(start, 100.0, 10.0), bar(at(30, 0), 110.0, 10.0)];
        assert_eq!(resampler.resample_with(&bars, &mut rng()), bars);
    }

    #[test]
    fn test_max_gap_is_inclusive() {
        let resampler = Resampler::default().with_max_gap(std::time::Duration::from_secs(60));
        let bars = vec![
            bar(at(30, 0), 100.0, 10.0),
            bar(at(31, 0), 100.0, 10.0),
            bar(at(32, 10), 100.0, 10.0),
        ];
        let out = resampler.resample_with(&bars, &mut rng());

        assert_eq!(out.iter().filter(|b| b.synthetic).count(), 5);
        assert!(out.iter().filter(|b| b.synthetic).all(|b| b.timestamp < at(31, 0)));
    }
}
