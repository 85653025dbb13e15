//! Push-notification classification and formatting.
//!
//! Every record the worker dequeues is classified into a
//! [`NotifyCategory`]; the [`NotifyFilter`] decides whether it is pushed.
//! The notification goes out whether or not the row delivery succeeded.

use core::fmt::Write as _;

use heapless::String;
use serde::{Deserialize, Serialize};

use super::row::{UNSYNCED_TIMESTAMP, Timestamp, limit_text};
use crate::app::events::{CycleRecord, RecordKind};

pub const NOTIFY_TITLE: &str = "Temperature Monitor";
pub const BODY_LEN: usize = 512;

pub type NotifyBody = String<BODY_LEN>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotifyCategory {
    Start,
    Stop,
    Transition,
    Safety,
    Warning,
}

impl NotifyCategory {
    /// Emoji tag understood by ntfy-style push services.
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Start => "green_square",
            Self::Stop => "red_square",
            Self::Transition => "blue_square",
            Self::Safety | Self::Warning => "warning",
        }
    }
}

pub fn classify(kind: RecordKind) -> NotifyCategory {
    match kind {
        RecordKind::Start => NotifyCategory::Start,
        RecordKind::Stop | RecordKind::Off => NotifyCategory::Stop,
        RecordKind::SafetyCooling | RecordKind::RunawayTrip | RecordKind::StagnationTrip => {
            NotifyCategory::Safety
        }
        RecordKind::HeatToCool | RecordKind::CoolToHeat => NotifyCategory::Transition,
        RecordKind::PhaseDeviation => NotifyCategory::Warning,
    }
}

/// Master switch plus one flag per category.  Everything on by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyFilter {
    pub enabled: bool,
    pub start: bool,
    pub stop: bool,
    pub transition: bool,
    pub safety: bool,
    pub warning: bool,
}

impl Default for NotifyFilter {
    fn default() -> Self {
        Self {
            enabled: true,
            start: true,
            stop: true,
            transition: true,
            safety: true,
            warning: true,
        }
    }
}

impl NotifyFilter {
    pub fn allows(&self, category: NotifyCategory) -> bool {
        self.enabled
            && match category {
                NotifyCategory::Start => self.start,
                NotifyCategory::Stop => self.stop,
                NotifyCategory::Transition => self.transition,
                NotifyCategory::Safety => self.safety,
                NotifyCategory::Warning => self.warning,
            }
    }
}

/// Multi-line body.  Anything past [`BODY_LEN`] is cut off.
pub fn compose_body(record: &CycleRecord, timestamp: Option<&Timestamp>) -> NotifyBody {
    let mut body = NotifyBody::new();
    let ts = timestamp.map_or(UNSYNCED_TIMESTAMP, |t| t.as_str());
    let _ = writeln!(body, "Status: {}", record.status);
    let _ = match record.temperature_c {
        Some(c) => writeln!(body, "Temperature: {c:.1}\u{00b0}C"),
        None => writeln!(body, "Temperature: --"),
    };
    let _ = writeln!(body, "Cycle: {}/{}", record.cycle_index, limit_text(record.cycle_limit));
    let _ = writeln!(
        body,
        "T_top: {:.1}\u{00b0}C, T_bottom: {:.1}\u{00b0}C",
        record.top_setpoint_c, record.bottom_setpoint_c
    );
    let _ = writeln!(body, "Phase time: {}", record.phase_duration);
    let _ = write!(body, "Time: {ts}");
    body
}
