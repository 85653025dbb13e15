//! Remote row format.
//!
//! One [`CycleRecord`] becomes one spreadsheet row with nine ordered
//! columns:
//!
//! | # | Column          | Example              |
//! |---|-----------------|----------------------|
//! | 0 | timestamp       | `24-05-17 14:03:09`  |
//! | 1 | temperature °C  | `80.25`              |
//! | 2 | status          | `Heating to cooling` |
//! | 3 | cycle index     | `3`                  |
//! | 4 | cycle limit     | `10` or `inf`        |
//! | 5 | top setpoint    | `80.0`               |
//! | 6 | bottom setpoint | `25.0`               |
//! | 7 | phase duration  | `4:12`               |
//! | 8 | cycle duration  | `9:40`               |
//!
//! The JSON body follows the value-range shape of a sheets append call:
//! `{"majorDimension":"ROWS","values":[[...9 cells...]]}`.

use core::fmt::Write as _;

use heapless::String;
use serde::ser::{Serialize, SerializeTuple, Serializer};

use crate::app::events::{CycleRecord, DurationText, StatusText};

/// Timestamp used while the wall clock is not synchronised.
pub const UNSYNCED_TIMESTAMP: &str = "00-00-00 00:00:00";

pub type Timestamp = String<20>;

#[derive(Debug, Clone, PartialEq)]
pub struct LogRow {
    pub timestamp: Timestamp,
    pub temperature_c: Option<f32>,
    pub status: StatusText,
    pub cycle_index: u32,
    /// Decimal limit or `inf`.
    pub cycle_limit: String<6>,
    pub top_setpoint_c: f32,
    pub bottom_setpoint_c: f32,
    pub phase_duration: DurationText,
    pub cycle_duration: DurationText,
}

impl LogRow {
    /// Build a row; `timestamp` is the wall rendering of the record's
    /// instant, `None` while unsynced.
    pub fn from_record(record: &CycleRecord, timestamp: Option<Timestamp>) -> Self {
        let timestamp = timestamp.unwrap_or_else(|| {
            let mut t = Timestamp::new();
            let _ = t.push_str(UNSYNCED_TIMESTAMP);
            t
        });
        Self {
            timestamp,
            temperature_c: record.temperature_c,
            status: record.status.clone(),
            cycle_index: record.cycle_index,
            cycle_limit: limit_text(record.cycle_limit),
            top_setpoint_c: record.top_setpoint_c,
            bottom_setpoint_c: record.bottom_setpoint_c,
            phase_duration: record.phase_duration.clone(),
            cycle_duration: record.cycle_duration.clone(),
        }
    }

    /// Append-call request body.
    pub fn to_json(&self) -> serde_json::Result<std::string::String> {
        serde_json::to_string(&ValueRange { major_dimension: "ROWS", values: [self] })
    }
}

pub fn limit_text(limit: u16) -> String<6> {
    let mut s = String::new();
    if limit == 0 {
        let _ = s.push_str("inf");
    } else {
        let _ = write!(s, "{limit}");
    }
    s
}

impl Serialize for LogRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut t = serializer.serialize_tuple(9)?;
        t.serialize_element(self.timestamp.as_str())?;
        t.serialize_element(&self.temperature_c)?;
        t.serialize_element(self.status.as_str())?;
        t.serialize_element(&self.cycle_index)?;
        t.serialize_element(self.cycle_limit.as_str())?;
        t.serialize_element(&self.top_setpoint_c)?;
        t.serialize_element(&self.bottom_setpoint_c)?;
        t.serialize_element(self.phase_duration.as_str())?;
        t.serialize_element(self.cycle_duration.as_str())?;
        t.end()
    }
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct ValueRange<'a> {
    major_dimension: &'static str,
    values: [&'a LogRow; 1],
}
