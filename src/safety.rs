//! Safety interlocks.
//!
//! The [`SafetyMonitor`] is consulted by the cycle engine **every tick
//! while heating**, after a valid critical reading has been taken and
//! before the setpoint comparison:
//!
//! 1. [`check_runaway`](SafetyMonitor::check_runaway): heating has run
//!    longer than `runaway_factor` × the EWMA of completed heating phases.
//!    Never fires before the first heating phase completes.
//! 2. [`check_stagnation`](SafetyMonitor::check_stagnation): while above
//!    the safety threshold, the reading stayed inside ±`stagnation_band_c`
//!    of a reference for `stagnation_window_ms` (stuck sensor, dead heater).
//!
//! Both trips are latched by the engine into `SafetyCooling` and require an
//! operator restart.  The phase-duration anomaly check is advisory only.

use heapless::HistoryBuffer;
use log::{error, warn};

use crate::app::ports::Millis;
use crate::config::{PHASE_HISTORY_LEN, SystemConfig};
use crate::error::SafetyTrip;

/// Policy knobs, lifted out of [`SystemConfig`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SafetyPolicy {
    pub safety_threshold_c: f32,
    pub cooldown_hold_ms: u32,
    pub stagnation_band_c: f32,
    pub stagnation_window_ms: u32,
    pub runaway_factor: f32,
    pub phase_deviation_ratio: f32,
}

impl From<&SystemConfig> for SafetyPolicy {
    fn from(c: &SystemConfig) -> Self {
        Self {
            safety_threshold_c: c.safety_threshold_c,
            cooldown_hold_ms: c.cooldown_hold_ms,
            stagnation_band_c: c.stagnation_band_c,
            stagnation_window_ms: c.stagnation_window_ms,
            runaway_factor: c.runaway_factor,
            phase_deviation_ratio: c.phase_deviation_ratio,
        }
    }
}

impl Default for SafetyPolicy {
    fn default() -> Self {
        Self::from(&SystemConfig::default())
    }
}

// ── Heating average ───────────────────────────────────────────

/// EWMA of heating-phase durations, weights 0.7 old / 0.3 new.
/// The first completed phase seeds the average directly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeatingAverage {
    average_ms: Option<u32>,
    samples: u32,
}

impl HeatingAverage {
    pub fn update(&mut self, duration_ms: u32) {
        self.average_ms = Some(match self.average_ms {
            None => duration_ms,
            Some(avg) => ((u64::from(avg) * 7 + u64::from(duration_ms) * 3) / 10) as u32,
        });
        self.samples = self.samples.saturating_add(1);
    }

    pub fn get(&self) -> Option<u32> {
        self.average_ms
    }

    pub fn samples(&self) -> u32 {
        self.samples
    }
}

// ── Phase history ─────────────────────────────────────────────

/// Last [`PHASE_HISTORY_LEN`] completed heating-phase durations.
#[derive(Debug, Default)]
pub struct PhaseDurationHistory {
    durations: HistoryBuffer<u32, PHASE_HISTORY_LEN>,
}

impl PhaseDurationHistory {
    pub fn push(&mut self, duration_ms: u32) {
        self.durations.write(duration_ms);
    }

    pub fn is_full(&self) -> bool {
        self.durations.len() == PHASE_HISTORY_LEN
    }

    /// Median once the history is full.
    pub fn median(&self) -> Option<u32> {
        if !self.is_full() {
            return None;
        }
        let mut sorted = [0u32; PHASE_HISTORY_LEN];
        sorted.copy_from_slice(self.durations.as_slice());
        sorted.sort_unstable();
        Some(sorted[PHASE_HISTORY_LEN / 2])
    }

    pub fn clear(&mut self) {
        self.durations.clear();
    }
}

/// Advisory: newest heating phase is off the recent median.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseDeviation {
    pub duration_ms: u32,
    pub median_ms: u32,
    /// Signed relative deviation, e.g. `0.12` = 12 % longer than median.
    pub ratio: f32,
}

// ── Monitor ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
struct StagnationTrack {
    reference_c: f32,
    since_ms: Millis,
}

pub struct SafetyMonitor {
    policy: SafetyPolicy,
    heating_average: HeatingAverage,
    history: PhaseDurationHistory,
    stagnation: Option<StagnationTrack>,
}

impl SafetyMonitor {
    pub fn new(policy: SafetyPolicy) -> Self {
        Self {
            policy,
            heating_average: HeatingAverage::default(),
            history: PhaseDurationHistory::default(),
            stagnation: None,
        }
    }

    pub fn policy(&self) -> &SafetyPolicy {
        &self.policy
    }

    pub fn heating_average(&self) -> Option<u32> {
        self.heating_average.get()
    }

    /// Trip if the running heating phase exceeds the allowed multiple of
    /// the average.  No average, no trip.
    pub fn check_runaway(&self, heating_elapsed_ms: u32) -> Option<SafetyTrip> {
        let avg = self.heating_average.get()?;
        let limit = f64::from(avg) * f64::from(self.policy.runaway_factor);
        if f64::from(heating_elapsed_ms) > limit {
            error!(
                "SAFETY TRIP: heating for {} ms, limit {:.0} ms (avg {} ms)",
                heating_elapsed_ms, limit, avg
            );
            return Some(SafetyTrip::RunawayHeating);
        }
        None
    }

    /// Feed one valid critical reading taken while heating.
    pub fn check_stagnation(&mut self, celsius: f32, now: Millis) -> Option<SafetyTrip> {
        if celsius <= self.policy.safety_threshold_c {
            self.stagnation = None;
            return None;
        }
        let Some(track) = self.stagnation else {
            self.stagnation = Some(StagnationTrack { reference_c: celsius, since_ms: now });
            return None;
        };
        if (celsius - track.reference_c).abs() > self.policy.stagnation_band_c {
            self.stagnation = Some(StagnationTrack { reference_c: celsius, since_ms: now });
            return None;
        }
        let held = now.wrapping_sub(track.since_ms);
        if held >= self.policy.stagnation_window_ms {
            error!(
                "SAFETY TRIP: {:.1}\u{00b0}C within \u{00b1}{:.1}\u{00b0}C for {} ms",
                celsius, self.policy.stagnation_band_c, held
            );
            self.stagnation = None;
            return Some(SafetyTrip::Stagnation);
        }
        None
    }

    pub fn clear_stagnation(&mut self) {
        self.stagnation = None;
    }

    /// A heating phase reached the top setpoint: update the EWMA, append to
    /// the history and compare against the median.
    pub fn complete_heating_phase(&mut self, duration_ms: u32) -> Option<PhaseDeviation> {
        self.heating_average.update(duration_ms);
        self.history.push(duration_ms);
        self.stagnation = None;

        let median_ms = self.history.median()?;
        if median_ms == 0 {
            return None;
        }
        let ratio = (f64::from(duration_ms) - f64::from(median_ms)) / f64::from(median_ms);
        if ratio.abs() > f64::from(self.policy.phase_deviation_ratio) {
            warn!(
                "heating phase {} ms deviates {:+.0}% from median {} ms",
                duration_ms,
                ratio * 100.0,
                median_ms
            );
            return Some(PhaseDeviation { duration_ms, median_ms, ratio: ratio as f32 });
        }
        None
    }

    /// Forget all history (fresh run).
    pub fn reset(&mut self) {
        self.heating_average = HeatingAverage::default();
        self.history.clear();
        self.stagnation = None;
    }
}
