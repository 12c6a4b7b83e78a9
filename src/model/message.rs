use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::snapshot::{Snapshot, WireSnapshot};
use crate::error::DashboardError;
use crate::pipeline::window::ViewerZone;

/// Slowest and fastest replay speed the simulator accepts.
pub const MIN_SPEED: f64 = 0.1;
pub const MAX_SPEED: f64 = 10.0;

/// A decoded message from the live channel.
#[derive(Debug, Clone)]
pub enum InboundMessage {
    Pong,
    Snapshot(Box<Snapshot>),
}

impl InboundMessage {
    pub fn decode(raw: &str, zone: ViewerZone) -> Result<Self, DashboardError> {
        let value: Value = serde_json::from_str(raw)?;
        if !value.is_object() {
            return Err(DashboardError::Parse(
                "expected a JSON object on the live channel".to_string(),
            ));
        }
        if value.get("type").and_then(Value::as_str) == Some("pong") {
            return Ok(Self::Pong);
        }
        let wire: WireSnapshot = serde_json::from_value(value)?;
        Ok(Self::Snapshot(Box::new(Snapshot::from_wire(wire, zone))))
    }
}

/// Messages we send on the live channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutboundMessage {
    Ping,
}

impl OutboundMessage {
    pub fn to_json(&self) -> String {
        match self {
            Self::Ping => serde_json::json!({ "type": "ping" }).to_string(),
        }
    }
}

/// Body of a simulation control request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum ControlCommand {
    Start,
    Stop,
    Speed { speed: f64 },
}

impl ControlCommand {
    pub fn action(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Speed { .. } => "speed",
        }
    }

    pub fn validate(&self) -> Result<(), DashboardError> {
        match self {
            Self::Speed { speed } if !(MIN_SPEED..=MAX_SPEED).contains(speed) => {
                Err(DashboardError::ControlCommand(format!(
                    "speed {} outside {}..={}",
                    speed, MIN_SPEED, MAX_SPEED
                )))
            }
            _ => Ok(()),
        }
    }
}
