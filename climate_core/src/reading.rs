//! Readings, reports and the command envelope posted to the API

use serde::{Deserialize, Serialize};

/// Command name the API routes climate updates by
pub const UPDATE_DATA_COMMAND: &str = "ClimateData.updateData";

/// One sampled temperature/humidity pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Degrees Celsius
    pub temperature: f64,
    /// Relative humidity in percent
    pub humidity: f64,
}

impl Reading {
    pub fn new(temperature: f64, humidity: f64) -> Self {
        Self {
            temperature,
            humidity,
        }
    }
}

/// Static description of where the sensor lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub id: String,
    pub name: String,
}

impl Location {
    /// Location whose display name falls back to its ID
    pub fn new(id: impl Into<String>, name: Option<String>) -> Self {
        let id = id.into();
        let name = name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| id.clone());
        Self { id, name }
    }
}

/// Payload of an update command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub location_id: String,
    pub location_name: String,
    pub temperature: String,
    pub humidity: String,
}

impl Report {
    pub fn from_reading(reading: &Reading, location: &Location) -> Self {
        Self {
            location_id: location.id.clone(),
            location_name: location.name.clone(),
            temperature: format_one_decimal(reading.temperature),
            humidity: format_one_decimal(reading.humidity),
        }
    }
}

/// Envelope the API expects on `POST {api}/command`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub name: String,
    pub payload: Report,
}

impl Command {
    pub fn update_data(report: Report) -> Self {
        Self {
            name: UPDATE_DATA_COMMAND.to_string(),
            payload: report,
        }
    }
}

/// Format a value with exactly one fractional digit.
///
/// Rounds half away from zero on the shortest decimal representation of the
/// value, so `21.45` becomes `"21.5"` even though its binary form sits just
/// below the midpoint. Negative values that round to zero print as `"0.0"`.
pub fn format_one_decimal(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }

    let shortest = value.abs().to_string();
    let (int_part, frac_part) = shortest.split_once('.').unwrap_or((&shortest, ""));

    let mut digits: Vec<u8> = int_part.bytes().map(|b| b - b'0').collect();
    digits.push(frac_part.bytes().next().map_or(0, |b| b - b'0'));

    let round_up = frac_part.as_bytes().get(1).is_some_and(|b| *b >= b'5');
    if round_up {
        let mut idx = digits.len();
        loop {
            if idx == 0 {
                digits.insert(0, 1);
                break;
            }
            idx -= 1;
            if digits[idx] == 9 {
                digits[idx] = 0;
            } else {
                digits[idx] += 1;
                break;
            }
        }
    }

    let is_zero = digits.iter().all(|d| *d == 0);
    let sign = if value < 0.0 && !is_zero { "-" } else { "" };
    let tenths = digits.pop().unwrap_or(0);
    let whole: String = digits.iter().map(|d| char::from(b'0' + d)).collect();
    let whole = if whole.is_empty() { "0".to_string() } else { whole };

    format!("{}{}.{}", sign, whole, tenths)
}
