pub mod bar;
pub mod message;
pub mod series;
pub mod snapshot;
pub mod trade;

use chrono::{DateTime, Utc};
use serde_json::Value;

/// Anything that sits on a time axis.
pub trait Timestamped {
    fn timestamp(&self) -> DateTime<Utc>;
}

/// Feed numbers arrive either as JSON numbers or as numeric strings.
pub(crate) fn lenient_f64(value: Option<&Value>) -> Option<f64> {
    let parsed = match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    parsed.is_finite().then_some(parsed)
}

pub(crate) fn lenient_u64(value: Option<&Value>) -> Option<u64> {
    lenient_f64(value)
        .filter(|v| *v >= 0.0)
        .map(|v| v.round() as u64)
}
