use bytes::Bytes;
use serde::{Serialize, Deserialize};

use crate::config::PositionBounds;
use crate::error::PayloadError;

/// Direction of valve travel. Higher positions close the valve.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Opening,
    Closing,
}

impl Direction {
    /// Direction of a move from `from` to `to`; `None` when they are equal.
    pub fn between(from: f64, to: f64) -> Option<Direction> {
        if to > from {
            Some(Direction::Closing)
        } else if to < from {
            Some(Direction::Opening)
        } else {
            None
        }
    }

    pub fn sign(self) -> f64 {
        match self {
            Direction::Closing => 1.0,
            Direction::Opening => -1.0,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct ActuatorState {
    pub position: f64,
    pub direction: Option<Direction>,
}

impl ActuatorState {
    pub fn new(position: f64) -> Self {
        ActuatorState {
            position,
            direction: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub topic: String,
    pub payload: Bytes,
}

impl Message {
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Message {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

fn payload_str(payload: &[u8]) -> Result<&str, PayloadError> {
    std::str::from_utf8(payload)
        .map(str::trim)
        .map_err(|_| PayloadError::NotUtf8)
}

/// Parses a manual valve command: a decimal integer within `bounds`.
pub fn parse_valve_command(payload: &[u8], bounds: &PositionBounds) -> Result<i64, PayloadError> {
    let text = payload_str(payload)?;
    let value: i64 = text
        .parse()
        .map_err(|_| PayloadError::NotInteger(text.to_string()))?;
    if !bounds.contains(value as f64) {
        return Err(PayloadError::OutOfRange {
            value,
            min: bounds.min,
            max: bounds.max,
        });
    }
    Ok(value)
}

/// Parses a temperature reading or a position report.
pub fn parse_decimal(payload: &[u8]) -> Result<f64, PayloadError> {
    let text = payload_str(payload)?;
    match text.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(PayloadError::NotNumeric(text.to_string())),
    }
}

pub fn format_position(position: f64) -> String {
    format!("{}", position)
}

pub fn format_temperature(temperature: f64) -> String {
    format!("{:.2}", temperature)
}
