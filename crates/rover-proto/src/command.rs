use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

/// One inbound control message. The wire form is a JSON object whose `type`
/// field selects the variant, e.g. `{"type":"throttle_forward","value":60}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlCommand {
    ThrottleForward {
        #[serde(default)]
        value: f64,
    },
    ThrottleBackward {
        #[serde(default)]
        value: f64,
    },
    SteeringRight {
        #[serde(default)]
        value: f64,
    },
    SteeringLeft {
        #[serde(default)]
        value: f64,
    },
    Brake {
        #[serde(default)]
        value: f64,
    },
    Honk {
        #[serde(default, deserialize_with = "truthy")]
        value: bool,
    },
    /// Gear, lights and auto-mode in one message, applied as three writes.
    /// A gear that is not a whole number decodes to 0, which no gear line
    /// accepts, so the lights and auto-mode writes still happen.
    Settings {
        #[serde(default = "default_gear", deserialize_with = "whole_gear")]
        gear: i64,
        #[serde(default, deserialize_with = "truthy")]
        lights: bool,
        #[serde(default, deserialize_with = "truthy")]
        auto: bool,
    },
    /// Any `type` we do not recognise. Carries no effect.
    #[serde(other)]
    Unknown,
}

fn default_gear() -> i64 {
    1
}

/// Switch fields follow the usual JSON truthiness: `null`, `false`, `0`,
/// `""` and empty containers are off.
fn truthy<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Null => false,
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    })
}

/// `2` and `2.0` are both gear 2. Anything else becomes 0.
fn whole_gear<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
    let gear = match Value::deserialize(d)? {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() <= 1e9)
                .map(|f| f as i64)
        }),
        _ => None,
    };
    Ok(gear.unwrap_or(0))
}

impl ControlCommand {
    pub fn kind(&self) -> &'static str {
        match self {
            ControlCommand::ThrottleForward { .. } => "throttle_forward",
            ControlCommand::ThrottleBackward { .. } => "throttle_backward",
            ControlCommand::SteeringRight { .. } => "steering_right",
            ControlCommand::SteeringLeft { .. } => "steering_left",
            ControlCommand::Brake { .. } => "brake",
            ControlCommand::Honk { .. } => "honk",
            ControlCommand::Settings { .. } => "settings",
            ControlCommand::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid JSON: {0}")]
    Json(#[source] serde_json::Error),
    #[error("command is not a JSON object")]
    NotAnObject,
    #[error("bad command fields: {0}")]
    Fields(#[source] serde_json::Error),
}

/// Decode one message payload (text or binary frame contents).
///
/// A well-formed object whose `type` is missing or not a string decodes to
/// [`ControlCommand::Unknown`]; it is ignored, not reported.
pub fn decode(payload: &[u8]) -> Result<ControlCommand, DecodeError> {
    let value: serde_json::Value = serde_json::from_slice(payload).map_err(DecodeError::Json)?;
    let obj = value.as_object().ok_or(DecodeError::NotAnObject)?;
    if !obj.get("type").is_some_and(serde_json::Value::is_string) {
        return Ok(ControlCommand::Unknown);
    }
    serde_json::from_value(value).map_err(DecodeError::Fields)
}
