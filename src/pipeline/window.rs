//! Viewer-local wall-clock handling and the trading-hours window.

use chrono::{
    DateTime, Duration, FixedOffset, Local, LocalResult, NaiveDateTime, Offset, TimeZone,
    Timelike, Utc,
};

use crate::model::Timestamped;

const NAIVE_FORMATS: [&str; 3] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
];

/// The timezone the dashboard is viewed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewerZone {
    /// The host's local timezone.
    #[default]
    Local,
    Fixed(FixedOffset),
}

impl ViewerZone {
    pub fn utc() -> Self {
        Self::Fixed(Utc.fix())
    }

    pub fn from_offset_minutes(minutes: i32) -> Option<Self> {
        FixedOffset::east_opt(minutes.checked_mul(60)?).map(Self::Fixed)
    }

    /// Parses RFC 3339, or a naive ISO timestamp read as viewer wall-clock
    /// time. `HH:MM:SS:mmm` (millis after a colon) is also accepted.
    pub fn parse_timestamp(&self, raw: &str) -> Option<DateTime<Utc>> {
        let raw = raw.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Some(naive) = parse_naive(raw) {
            return self.resolve(naive);
        }
        if raw.matches(':').count() == 3 {
            let (head, millis) = raw.rsplit_once(':')?;
            return self.resolve(parse_naive(&format!("{}.{}", head, millis))?);
        }
        None
    }

    pub fn wall_clock(&self, ts: DateTime<Utc>) -> NaiveDateTime {
        match self {
            Self::Local => ts.with_timezone(&Local).naive_local(),
            Self::Fixed(offset) => ts.with_timezone(offset).naive_local(),
        }
    }

    pub fn hour(&self, ts: DateTime<Utc>) -> u32 {
        self.wall_clock(ts).hour()
    }

    /// Start of the `width_minutes` bucket containing `ts`, with the
    /// minute-of-hour floored in viewer wall-clock time.
    pub fn bucket_start(&self, ts: DateTime<Utc>, width_minutes: u32) -> DateTime<Utc> {
        let wall = self.wall_clock(ts);
        let width = width_minutes.max(1);
        let into_bucket = i64::from((wall.minute() % width) * 60 + wall.second());
        ts - Duration::seconds(into_bucket) - Duration::nanoseconds(i64::from(wall.nanosecond()))
    }

    /// `hour:00` on the viewer-local day of `ts`.
    pub fn at_hour(&self, ts: DateTime<Utc>, hour: u32) -> Option<DateTime<Utc>> {
        let naive = self.wall_clock(ts).date().and_hms_opt(hour, 0, 0)?;
        self.resolve(naive)
    }

    fn resolve(&self, naive: NaiveDateTime) -> Option<DateTime<Utc>> {
        let resolved = match self {
            Self::Local => pick(Local.from_local_datetime(&naive))?.with_timezone(&Utc),
            Self::Fixed(offset) => pick(offset.from_local_datetime(&naive))?.with_timezone(&Utc),
        };
        Some(resolved)
    }
}

fn parse_naive(raw: &str) -> Option<NaiveDateTime> {
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

// Ambiguous wall-clock times (DST fall-back) take the earlier instant.
fn pick<T>(result: LocalResult<T>) -> Option<T> {
    match result {
        LocalResult::Single(dt) => Some(dt),
        LocalResult::Ambiguous(earlier, _) => Some(earlier),
        LocalResult::None => None,
    }
}

/// Keeps points whose viewer-local hour lies in `[start_hour, end_hour]`.
/// Both bounds are inclusive, so 16:59 is still inside a 4..=16 window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TradingWindow {
    pub start_hour: u32,
    pub end_hour: u32,
    pub zone: ViewerZone,
}

impl TradingWindow {
    pub const DEFAULT_START_HOUR: u32 = 4;
    pub const DEFAULT_END_HOUR: u32 = 16;

    pub fn new(start_hour: u32, end_hour: u32, zone: ViewerZone) -> Self {
        Self {
            start_hour,
            end_hour,
            zone,
        }
    }

    pub fn zone(&self) -> ViewerZone {
        self.zone
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        let hour = self.zone.hour(ts);
        hour >= self.start_hour && hour <= self.end_hour
    }

    /// Order-preserving subsequence of in-window points.
    pub fn filter<T: Timestamped + Clone>(&self, points: &[T]) -> Vec<T> {
        points
            .iter()
            .filter(|p| self.contains(p.timestamp()))
            .cloned()
            .collect()
    }

    /// Parses a raw timestamp and keeps it only if it is inside the window.
    /// Unparseable input is simply not kept.
    pub fn admit(&self, raw: &str) -> Option<DateTime<Utc>> {
        self.zone
            .parse_timestamp(raw)
            .filter(|ts| self.contains(*ts))
    }

    /// The `start_hour:00 ..= end_hour:00` extent on the day of `ts`.
    pub fn day_extent(&self, ts: DateTime<Utc>) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        Some((
            self.zone.at_hour(ts, self.start_hour)?,
            self.zone.at_hour(ts, self.end_hour)?,
        ))
    }
}

impl Default for TradingWindow {
    fn default() -> Self {
        Self::new(
            Self::DEFAULT_START_HOUR,
            Self::DEFAULT_END_HOUR,
            ViewerZone::default(),
        )
    }
}
