//! Dice roll payloads
//!
//! A `dice_roll` message carries `{ "rolls": [ { "rolled_number": 17, ... } ] }`.
//! Only the face value is interpreted; every other field rides along untouched
//! so renderers can use it later.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{OverlayError, Result};

/// Event name that carries dice rolls on a character channel
pub const DICE_ROLL_EVENT: &str = "dice_roll";

/// One die outcome
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RollResult {
    /// Face value shown on the overlay
    pub rolled_number: i64,
    /// Fields the overlay does not interpret
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RollResult {
    pub fn new(rolled_number: i64) -> Self {
        Self {
            rolled_number,
            extra: Map::new(),
        }
    }

    /// Attach an opaque metadata field
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Decode one entry of a `rolls` array.
    ///
    /// `index` is the entry's position in the batch and is only used for
    /// error reporting.
    pub fn from_value(index: usize, value: &Value) -> Result<Self> {
        let Value::Object(fields) = value else {
            return Err(OverlayError::MalformedRoll {
                index,
                reason: format!("expected an object, got {}", kind_of(value)),
            });
        };

        let mut extra = fields.clone();
        let face = extra
            .remove("rolled_number")
            .ok_or_else(|| OverlayError::MalformedRoll {
                index,
                reason: "missing rolled_number".to_string(),
            })?;

        let rolled_number = parse_face(&face).ok_or_else(|| OverlayError::MalformedRoll {
            index,
            reason: format!("rolled_number is not an integer: {}", face),
        })?;

        Ok(Self {
            rolled_number,
            extra,
        })
    }
}

/// Accepts JSON integers, whole floats (`4.0`) and numeric strings (`"4"`).
fn parse_face(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0)
                .filter(|f| *f >= i64::MIN as f64 && *f <= i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A batch of rolls that arrived as one message
#[derive(Debug, Default)]
pub struct RollEvent {
    /// Valid results, in batch order
    pub rolls: Vec<RollResult>,
    /// Entries that were rejected; the rest of the batch still plays
    pub rejected: Vec<OverlayError>,
}

impl RollEvent {
    /// Decode a `dice_roll` payload.
    ///
    /// Fails only when there is no `rolls` array at all. Individual bad
    /// entries are collected in `rejected` and skipped.
    pub fn decode(payload: &Value) -> Result<Self> {
        let entries = payload
            .get("rolls")
            .ok_or_else(|| OverlayError::MalformedEvent("missing rolls".to_string()))?
            .as_array()
            .ok_or_else(|| OverlayError::MalformedEvent("rolls is not an array".to_string()))?;

        let mut event = RollEvent::default();
        for (index, entry) in entries.iter().enumerate() {
            match RollResult::from_value(index, entry) {
                Ok(roll) => event.rolls.push(roll),
                Err(e) => event.rejected.push(e),
            }
        }

        Ok(event)
    }
}
