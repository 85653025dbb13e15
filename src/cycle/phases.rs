//! Per-state tick handlers.
//!
//! Each handler receives a valid reading.  Invalid readings never get this
//! far (see [`CycleEngine::tick`]).

use log::{error, info, warn};

use super::{CycleEngine, CycleState, deviation_status, no_duration};
use crate::app::events::{RecordKind, format_duration};
use crate::app::ports::{Drive, Millis, RelayPort, TransitionObserver};
use crate::error::SafetyTrip;

impl<R: RelayPort, O: TransitionObserver> CycleEngine<R, O> {
    // ── Heating ───────────────────────────────────────────────

    /// Interlocks first (runaway, then stagnation), then the setpoint.
    pub(super) fn handle_heating(&mut self, now: Millis, celsius: f32) {
        let started = *self.heating_started.get_or_insert(now);
        let elapsed = now.wrapping_sub(started);

        if let Some(trip) = self.monitor.check_runaway(elapsed) {
            self.trip(now, trip, celsius);
            return;
        }
        if let Some(trip) = self.monitor.check_stagnation(celsius, now) {
            self.trip(now, trip, celsius);
            return;
        }
        if celsius < self.settings.top_setpoint_c {
            return;
        }

        self.last_heating_ms = elapsed;
        self.last_transition_c = Some(celsius);
        let deviation = self.monitor.complete_heating_phase(elapsed);

        let mut record = self.record(RecordKind::HeatToCool, Some(celsius), started);
        record.phase_duration = format_duration(elapsed);
        record.cycle_duration = no_duration();
        self.emit(&record);

        if let Some(dev) = deviation {
            let mut warning = self.record(RecordKind::PhaseDeviation, Some(celsius), now);
            warning.status = deviation_status(RecordKind::PhaseDeviation, dev.ratio);
            warning.phase_duration = format_duration(dev.duration_ms);
            warning.cycle_duration = format_duration(dev.median_ms);
            self.emit(&warning);
        }

        self.heating_started = None;
        self.cooling_started = Some(now);
        self.apply(Drive::Cool);
        self.set_state(CycleState::Cooling);
    }

    // ── Cooling ───────────────────────────────────────────────

    pub(super) fn handle_cooling(&mut self, now: Millis, celsius: f32) {
        let started = *self.cooling_started.get_or_insert(now);
        if celsius > self.settings.bottom_setpoint_c {
            return;
        }

        let cooled = now.wrapping_sub(started);
        self.last_cooling_ms = cooled;
        self.last_transition_c = Some(celsius);

        // Reported with the index of the cycle that just completed.
        let mut record = self.record(RecordKind::CoolToHeat, Some(celsius), started);
        record.phase_duration = format_duration(cooled);
        record.cycle_duration = format_duration(self.last_heating_ms.saturating_add(cooled));
        self.emit(&record);

        self.cooling_started = None;
        let limit = u32::from(self.settings.max_cycles);
        if limit > 0 && self.cycle_index >= limit {
            info!("cycle: limit of {limit} reached");
            if celsius < self.monitor.policy().safety_threshold_c {
                self.apply(Drive::Off);
                self.set_state(CycleState::Off);
                let off = self.record(RecordKind::Off, Some(celsius), now);
                self.emit(&off);
            } else {
                // Bottom setpoint above touch-safe: finish with a cooldown.
                self.enter_safety_cooling(now);
            }
            return;
        }

        self.cycle_index += 1;
        self.heating_started = Some(now);
        self.apply(Drive::Heat);
        self.set_state(CycleState::Heating);
    }

    // ── Safety cooling ────────────────────────────────────────

    /// Cooler stays on until the reading has been below the safety
    /// threshold for the whole hold time.  Any reading at or above the
    /// threshold restarts the hold.
    pub(super) fn handle_safety_cooling(&mut self, now: Millis, celsius: f32) {
        let policy = *self.monitor.policy();
        let began = *self.safety_started.get_or_insert(now);

        if celsius >= policy.safety_threshold_c {
            if self.hold_started.take().is_some() {
                warn!("cooldown: {celsius:.1}\u{00b0}C back above threshold, hold restarted");
            }
            self.apply(Drive::Cool);
            return;
        }

        let hold = match self.hold_started {
            Some(hold) => hold,
            None => {
                self.hold_started = Some(now);
                let mut record = self.record(RecordKind::SafetyCooling, Some(celsius), began);
                record.phase_duration = format_duration(now.wrapping_sub(began));
                self.emit(&record);
                now
            }
        };

        if now.wrapping_sub(hold) < policy.cooldown_hold_ms {
            self.apply(Drive::Cool);
            return;
        }

        self.apply(Drive::Off);
        self.safety_started = None;
        self.hold_started = None;
        self.set_state(CycleState::Off);
        let mut record = self.record(RecordKind::Off, Some(celsius), began);
        record.phase_duration = format_duration(now.wrapping_sub(began));
        self.emit(&record);
    }

    // ── Trips ─────────────────────────────────────────────────

    fn trip(&mut self, now: Millis, trip: SafetyTrip, celsius: f32) {
        let kind = match trip {
            SafetyTrip::RunawayHeating => RecordKind::RunawayTrip,
            SafetyTrip::Stagnation => RecordKind::StagnationTrip,
        };
        error!("cycle: {trip} at {celsius:.1}\u{00b0}C, entering safety cooling");
        let record = self.record(kind, Some(celsius), now);
        self.emit(&record);
        self.enter_safety_cooling(now);
    }
}
