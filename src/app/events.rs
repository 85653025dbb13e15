//! Outbound application events.
//!
//! The [`CycleEngine`](crate::cycle::CycleEngine) emits a [`CycleRecord`]
//! through the [`TransitionObserver`](super::ports::TransitionObserver)
//! port on every transition.  Adapters on the other side decide what to do
//! with it: log to serial, queue it for the remote sheet, push a
//! notification.

use core::fmt::Write as _;

use heapless::String;
use serde::Serialize;

use super::ports::Millis;
use crate::cycle::CycleState;
use crate::telemetry::TelemetrySnapshot;

/// Maximum length of a record's status text.
pub const STATUS_LEN: usize = 49;
/// Maximum length of an `m:ss` duration text.
pub const DURATION_LEN: usize = 9;

pub type StatusText = String<STATUS_LEN>;
pub type DurationText = String<DURATION_LEN>;

/// What happened.  Drives the status label, the duration fields and the
/// notification category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RecordKind {
    Start,
    Stop,
    HeatToCool,
    CoolToHeat,
    /// Temperature first dropped below the safety threshold during cooldown.
    SafetyCooling,
    Off,
    RunawayTrip,
    StagnationTrip,
    /// Newest heating phase deviates from the recent median (warning only).
    PhaseDeviation,
}

impl RecordKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Start => "Start",
            Self::Stop => "Stop",
            Self::HeatToCool => "Heating to cooling",
            Self::CoolToHeat => "Cooling to heating",
            Self::SafetyCooling => "Safety cooling",
            Self::Off => "Off",
            Self::RunawayTrip => "Safety: heating too long",
            Self::StagnationTrip => "Safety: temperature stagnation",
            Self::PhaseDeviation => "Warning: phase duration deviation",
        }
    }

    pub const fn is_safety_trip(self) -> bool {
        matches!(self, Self::RunawayTrip | Self::StagnationTrip)
    }
}

/// Immutable snapshot of one transition.  Copied into the telemetry queue,
/// so the worker never shares state with the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleRecord {
    pub kind: RecordKind,
    pub status: StatusText,
    /// Reading that triggered the record, `None` if unavailable.
    pub temperature_c: Option<f32>,
    pub cycle_index: u32,
    /// 0 = unlimited.
    pub cycle_limit: u16,
    pub top_setpoint_c: f32,
    pub bottom_setpoint_c: f32,
    pub phase_duration: DurationText,
    pub cycle_duration: DurationText,
    /// Monotonic instant the record refers to (phase start for transitions).
    pub timestamp_ms: Millis,
}

/// Render milliseconds as `m:ss`.  Minutes saturate so the text always
/// fits in [`DURATION_LEN`] characters.
pub fn format_duration(ms: u32) -> DurationText {
    let secs = ms / 1000;
    let minutes = (secs / 60).min(999_999);
    let mut out = DurationText::new();
    // 6 digits + ':' + 2 digits fits exactly.
    let _ = write!(out, "{}:{:02}", minutes, secs % 60);
    out
}

/// `0:00`, used where a record has no phase of its own.
pub fn zero_duration() -> DurationText {
    format_duration(0)
}

/// Bounded copy of `text`, truncated on a char boundary.
pub fn status_text(text: &str) -> StatusText {
    let mut out = StatusText::new();
    for ch in text.chars() {
        if out.push(ch).is_err() {
            break;
        }
    }
    out
}

/// Snapshot polled by the UI / web collaborators.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleStatus {
    pub state: CycleState,
    pub active: bool,
    pub heating: bool,
    pub off: bool,
    pub safety_cooling: bool,
    pub heating_elapsed_ms: u32,
    pub cooling_elapsed_ms: u32,
    pub cycle_index: u32,
    pub cycle_limit: u16,
    pub top_setpoint_c: f32,
    pub bottom_setpoint_c: f32,
    pub last_transition_c: Option<f32>,
    pub last_heating_ms: u32,
    pub last_cooling_ms: u32,
    /// Current rolling-median reading, filled in by the control service.
    pub median_c: Option<f32>,
    /// Delivery counters, filled in when a telemetry worker is attached.
    pub telemetry: Option<TelemetrySnapshot>,
}
