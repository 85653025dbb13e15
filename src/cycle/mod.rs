//! Heat/cool cycle state machine.
//!
//! ```text
//!   Idle ──start()──▶ Heating ──reading ≥ T_top──▶ Cooling
//!                        ▲                            │
//!                        └──── reading ≤ T_bottom ────┤
//!                                                     │ index reached limit
//!   {Heating, Cooling, Off} ──stop() / trip──▶ SafetyCooling ──< threshold for hold──▶ Off
//!                                                                                      │
//!   Idle ◀──────────────────────────────── reset() ──────────────────────────────────┘
//! ```
//!
//! Every decision is taken on the critical (majority-voted) reading, with
//! the rolling median as fallback.  An unavailable reading is "no decision
//! this tick": no transition, no safety evaluation.
//!
//! The engine owns the relay port and the transition observer.  It never
//! blocks beyond the bounded sensor read it asks its [`ReadingSource`] for.

mod phases;

use core::fmt::Write as _;

use log::{error, info};
use serde::Serialize;

use crate::app::events::{
    CycleRecord, CycleStatus, DurationText, RecordKind, StatusText, status_text, zero_duration,
};
use crate::app::ports::{Drive, Millis, ReadingSource, RelayPort, TransitionObserver};
use crate::config::SystemConfig;
use crate::safety::{SafetyMonitor, SafetyPolicy};

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CycleState {
    Idle,
    Heating,
    Cooling,
    /// Mandatory cooldown after stop, cycle-limit completion or a trip.
    SafetyCooling,
    Off,
}

impl CycleState {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Heating => "Heating",
            Self::Cooling => "Cooling",
            Self::SafetyCooling => "SafetyCooling",
            Self::Off => "Off",
        }
    }

    pub const fn is_active(self) -> bool {
        matches!(self, Self::Heating | Self::Cooling)
    }
}

// ---------------------------------------------------------------------------
// Operator settings
// ---------------------------------------------------------------------------

/// Setpoints and cycle limit.  Changes apply on the next evaluation and
/// are not validated against the running phase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleSettings {
    pub top_setpoint_c: f32,
    pub bottom_setpoint_c: f32,
    /// 0 = unlimited.
    pub max_cycles: u16,
}

impl From<&SystemConfig> for CycleSettings {
    fn from(c: &SystemConfig) -> Self {
        Self {
            top_setpoint_c: c.top_setpoint_c,
            bottom_setpoint_c: c.bottom_setpoint_c,
            max_cycles: c.max_cycles,
        }
    }
}

impl Default for CycleSettings {
    fn default() -> Self {
        Self::from(&SystemConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct CycleEngine<R, O> {
    relays: R,
    observer: O,
    settings: CycleSettings,
    monitor: SafetyMonitor,

    state: CycleState,
    /// Drive the current state wants.
    commanded: Drive,
    /// Last drive successfully applied to the relays.
    drive: Drive,
    drive_fault: bool,
    actuator_faults: u32,

    /// Starts at 1; only increases on Cooling → Heating.
    cycle_index: u32,
    heating_started: Option<Millis>,
    cooling_started: Option<Millis>,
    last_heating_ms: u32,
    last_cooling_ms: u32,
    last_transition_c: Option<f32>,

    /// When the current cooldown began.
    safety_started: Option<Millis>,
    /// When the reading last dropped below the safety threshold.
    hold_started: Option<Millis>,
}

impl<R: RelayPort, O: TransitionObserver> CycleEngine<R, O> {
    pub fn new(relays: R, observer: O, settings: CycleSettings, policy: SafetyPolicy) -> Self {
        let mut engine = Self {
            relays,
            observer,
            settings,
            monitor: SafetyMonitor::new(policy),
            state: CycleState::Idle,
            commanded: Drive::Off,
            drive: Drive::Off,
            drive_fault: true,
            actuator_faults: 0,
            cycle_index: 1,
            heating_started: None,
            cooling_started: None,
            last_heating_ms: 0,
            last_cooling_ms: 0,
            last_transition_c: None,
            safety_started: None,
            hold_started: None,
        };
        engine.apply(Drive::Off);
        engine
    }

    // ── Operator commands ─────────────────────────────────────

    /// Idle/Off → Heating.  Resets every counter and the safety history.
    /// Returns `false` (and changes nothing) from any other state.
    pub fn start(&mut self, now: Millis, source: &mut impl ReadingSource) -> bool {
        if !matches!(self.state, CycleState::Idle | CycleState::Off) {
            return false;
        }
        self.clear_run();
        self.heating_started = Some(now);
        self.apply(Drive::Heat);
        self.set_state(CycleState::Heating);

        let record = self.record(RecordKind::Start, source.median().value(), now);
        self.emit(&record);
        true
    }

    /// Heating/Cooling/Off → SafetyCooling.  Outputs go off, then the
    /// cooler comes on and the mandatory cooldown begins.
    ///
    /// Idempotent: a stop while already cooling down (or idle) changes
    /// nothing and returns `false`.
    pub fn stop(&mut self, now: Millis, source: &mut impl ReadingSource) -> bool {
        if !matches!(self.state, CycleState::Heating | CycleState::Cooling | CycleState::Off) {
            return false;
        }
        let record = self.record(RecordKind::Stop, source.median().value(), now);
        self.emit(&record);
        self.enter_safety_cooling(now);
        true
    }

    /// Off → Idle.  Also accepted in Idle (re-arms the relays).
    pub fn reset(&mut self) -> bool {
        if !matches!(self.state, CycleState::Idle | CycleState::Off) {
            return false;
        }
        self.clear_run();
        self.apply(Drive::Off);
        self.set_state(CycleState::Idle);
        true
    }

    pub fn set_top_setpoint(&mut self, celsius: f32) {
        self.settings.top_setpoint_c = celsius;
    }

    pub fn set_bottom_setpoint(&mut self, celsius: f32) {
        self.settings.bottom_setpoint_c = celsius;
    }

    pub fn set_max_cycles(&mut self, max_cycles: u16) {
        self.settings.max_cycles = max_cycles;
    }

    // ── Control tick ──────────────────────────────────────────

    /// One control evaluation.  Idle and Off take no reading, but a failed
    /// relay write is retried in every state.
    pub fn tick(&mut self, now: Millis, source: &mut impl ReadingSource) {
        if self.drive_fault {
            self.apply(self.commanded);
        }
        if matches!(self.state, CycleState::Idle | CycleState::Off) {
            return;
        }

        let critical = source.critical();
        let reading = if critical.valid { critical } else { source.median() };
        let Some(celsius) = reading.value() else {
            if self.state == CycleState::Heating {
                self.monitor.clear_stagnation();
            }
            return;
        };

        match self.state {
            CycleState::Heating => self.handle_heating(now, celsius),
            CycleState::Cooling => self.handle_cooling(now, celsius),
            CycleState::SafetyCooling => self.handle_safety_cooling(now, celsius),
            CycleState::Idle | CycleState::Off => {}
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> CycleState {
        self.state
    }

    pub fn cycle_index(&self) -> u32 {
        self.cycle_index
    }

    pub fn settings(&self) -> &CycleSettings {
        &self.settings
    }

    pub fn drive(&self) -> Drive {
        self.drive
    }

    pub fn actuator_faults(&self) -> u32 {
        self.actuator_faults
    }

    pub fn heating_average_ms(&self) -> Option<u32> {
        self.monitor.heating_average()
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }

    pub fn relays(&self) -> &R {
        &self.relays
    }

    /// Snapshot for the UI / web collaborators.
    pub fn status(&self, now: Millis) -> CycleStatus {
        let since = |start: Option<Millis>| start.map_or(0, |s| now.wrapping_sub(s));
        CycleStatus {
            state: self.state,
            active: self.state.is_active(),
            heating: self.state == CycleState::Heating,
            off: self.state == CycleState::Off,
            safety_cooling: self.state == CycleState::SafetyCooling,
            heating_elapsed_ms: since(self.heating_started),
            cooling_elapsed_ms: since(self.cooling_started),
            cycle_index: self.cycle_index,
            cycle_limit: self.settings.max_cycles,
            top_setpoint_c: self.settings.top_setpoint_c,
            bottom_setpoint_c: self.settings.bottom_setpoint_c,
            last_transition_c: self.last_transition_c,
            last_heating_ms: self.last_heating_ms,
            last_cooling_ms: self.last_cooling_ms,
            median_c: None,
            telemetry: None,
        }
    }

    // ── Internal ──────────────────────────────────────────────

    fn clear_run(&mut self) {
        self.monitor.reset();
        self.cycle_index = 1;
        self.heating_started = None;
        self.cooling_started = None;
        self.last_heating_ms = 0;
        self.last_cooling_ms = 0;
        self.last_transition_c = None;
        self.safety_started = None;
        self.hold_started = None;
    }

    fn set_state(&mut self, next: CycleState) {
        if next != self.state {
            info!("cycle: {} -> {} (cycle {})", self.state.name(), next.name(), self.cycle_index);
            self.state = next;
        }
    }

    /// Drive the relays, skipping writes that would change nothing.
    fn apply(&mut self, drive: Drive) {
        self.commanded = drive;
        if drive == self.drive && !self.drive_fault {
            return;
        }
        match self.relays.apply(drive) {
            Ok(()) => {
                self.drive = drive;
                self.drive_fault = false;
            }
            Err(e) => {
                error!("relay: failed to apply {drive:?}: {e}");
                self.actuator_faults = self.actuator_faults.wrapping_add(1);
                self.drive_fault = true;
                // Never stay energised on something we could not confirm.
                if drive != Drive::Off && self.relays.apply(Drive::Off).is_ok() {
                    self.drive = Drive::Off;
                }
            }
        }
    }

    /// Cooler on, cooldown timer running.  Relays go through Off first.
    fn enter_safety_cooling(&mut self, now: Millis) {
        self.apply(Drive::Off);
        self.apply(Drive::Cool);
        self.heating_started = None;
        self.cooling_started = None;
        self.safety_started = Some(now);
        self.hold_started = None;
        self.monitor.clear_stagnation();
        self.set_state(CycleState::SafetyCooling);
    }

    /// Base record: current counters, `0:00` durations, stamped `at`.
    fn record(&self, kind: RecordKind, temperature_c: Option<f32>, at: Millis) -> CycleRecord {
        CycleRecord {
            kind,
            status: status_text(kind.label()),
            temperature_c,
            cycle_index: self.cycle_index,
            cycle_limit: self.settings.max_cycles,
            top_setpoint_c: self.settings.top_setpoint_c,
            bottom_setpoint_c: self.settings.bottom_setpoint_c,
            phase_duration: zero_duration(),
            cycle_duration: zero_duration(),
            timestamp_ms: at,
        }
    }

    fn emit(&mut self, record: &CycleRecord) {
        self.observer.on_transition(record);
    }
}

/// `"<label> +12%"`, truncated to the status bound.
fn deviation_status(kind: RecordKind, ratio: f32) -> StatusText {
    let mut text = status_text(kind.label());
    let _ = write!(text, " {:+.0}%", ratio * 100.0);
    text
}

/// Empty duration, used where a record has no cycle total.
fn no_duration() -> DurationText {
    DurationText::new()
}
