//! System configuration parameters
//!
//! All tunable parameters for the thermocycler.  Values can be overridden
//! through a [`crate::app::ports::ConfigPort`] implementation (flash, web UI).

use serde::{Deserialize, Serialize};

use crate::telemetry::notify::NotifyFilter;

/// Physical range of a K-type thermocouple behind a MAX6675.
pub const SENSOR_MIN_C: f32 = -200.0;
pub const SENSOR_MAX_C: f32 = 1200.0;

/// Capacity of the completed-phase history used for anomaly detection.
pub const PHASE_HISTORY_LEN: usize = 5;

/// Upper bound on the delivery backoff step; keeps `step × attempts` well
/// inside `u32`.
pub const MAX_BACKOFF_STEP_MS: u32 = 60_000;

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Setpoints ---
    /// Heating stops once the critical reading reaches this value (°C)
    pub top_setpoint_c: f32,
    /// Cooling stops once the critical reading falls to this value (°C)
    pub bottom_setpoint_c: f32,
    /// Number of cycles to run; 0 runs until stopped
    pub max_cycles: u16,
    /// Calibration offset added to every raw conversion (°C)
    pub temp_offset_c: f32,

    // --- Safety ---
    /// Below this temperature the apparatus is touch-safe (°C)
    pub safety_threshold_c: f32,
    /// Time the reading must stay below the threshold before Off (ms)
    pub cooldown_hold_ms: u32,
    /// Half-width of the stagnation band (°C)
    pub stagnation_band_c: f32,
    /// Time inside the band that counts as stagnation (ms)
    pub stagnation_window_ms: u32,
    /// Heating longer than this multiple of the average trips the interlock
    pub runaway_factor: f32,
    /// Relative deviation from the phase median that raises a warning
    pub phase_deviation_ratio: f32,

    // --- Sensor timing ---
    /// Minimum time between two physical conversions (ms)
    pub conversion_interval_ms: u32,
    /// Attempts per reliable read
    pub read_retries: u8,
    /// Delay between reliable-read attempts (ms)
    pub retry_delay_ms: u32,
    /// Independent samples taken by a critical read
    pub critical_samples: u8,
    /// Delay between critical samples (ms)
    pub critical_sample_delay_ms: u32,
    /// Interval of the rolling-median sampler (ms)
    pub sample_interval_ms: u32,

    // --- Timing ---
    /// Control loop interval (milliseconds)
    pub control_loop_interval_ms: u32,

    // --- Telemetry ---
    /// Minimum spacing between two deliveries (ms)
    pub min_delivery_interval_ms: u32,
    /// Attempts per record
    pub delivery_attempts: u8,
    /// Overall time budget per record (ms)
    pub delivery_budget_ms: u32,
    /// Backoff step; attempt n waits n × step before the next try (ms)
    pub delivery_backoff_ms: u32,
    /// Cadence of the outbound session's credential refresh (ms)
    pub credential_refresh_ms: u32,
    /// Which notification categories are pushed
    pub notify: NotifyFilter,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            // Setpoints
            top_setpoint_c: 80.0,
            bottom_setpoint_c: 25.0,
            max_cycles: 0,
            temp_offset_c: 0.0,

            // Safety
            safety_threshold_c: 35.0,
            cooldown_hold_ms: 120_000,   // 2 min
            stagnation_band_c: 3.0,
            stagnation_window_ms: 120_000, // 2 min
            runaway_factor: 2.0,
            phase_deviation_ratio: 0.10,

            // Sensor timing
            conversion_interval_ms: 250,
            read_retries: 3,
            retry_delay_ms: 10,
            critical_samples: 3,
            critical_sample_delay_ms: 250,
            sample_interval_ms: 285,

            // Timing
            control_loop_interval_ms: 1000, // 1 Hz

            // Telemetry
            min_delivery_interval_ms: 2000,
            delivery_attempts: 3,
            delivery_budget_ms: 15_000,
            delivery_backoff_ms: 500,
            credential_refresh_ms: 1000,
            notify: NotifyFilter::default(),
        }
    }
}

impl SystemConfig {
    /// Range-check every field.  Rejects configurations that would make
    /// the engine oscillate or the sensor pipeline never produce a vote.
    pub fn validate(&self) -> crate::Result<()> {
        use crate::Error::Config;

        let plausible = SENSOR_MIN_C..=SENSOR_MAX_C;
        if !plausible.contains(&self.top_setpoint_c) || !plausible.contains(&self.bottom_setpoint_c)
        {
            return Err(Config("setpoint outside sensor range"));
        }
        if self.bottom_setpoint_c >= self.top_setpoint_c {
            return Err(Config("bottom setpoint must be below top setpoint"));
        }
        if !(-20.0..=20.0).contains(&self.temp_offset_c) {
            return Err(Config("temp_offset_c out of range"));
        }
        if !plausible.contains(&self.safety_threshold_c) {
            return Err(Config("safety_threshold_c out of range"));
        }
        if !(0.5..=50.0).contains(&self.stagnation_band_c) {
            return Err(Config("stagnation_band_c out of range"));
        }
        if self.cooldown_hold_ms == 0 || self.stagnation_window_ms == 0 {
            return Err(Config("safety windows must be non-zero"));
        }
        if !(1.1..=10.0).contains(&self.runaway_factor) {
            return Err(Config("runaway_factor out of range"));
        }
        if !(0.01..=1.0).contains(&self.phase_deviation_ratio) {
            return Err(Config("phase_deviation_ratio out of range"));
        }
        if self.read_retries == 0 || self.read_retries > 10 {
            return Err(Config("read_retries out of range"));
        }
        if self.critical_samples < 2 || usize::from(self.critical_samples) > 7 {
            return Err(Config("critical_samples must be 2..=7"));
        }
        if self.critical_sample_delay_ms < self.conversion_interval_ms {
            return Err(Config("critical samples must be spaced by a full conversion"));
        }
        if self.sample_interval_ms < self.conversion_interval_ms {
            return Err(Config("sample interval shorter than conversion time"));
        }
        if self.control_loop_interval_ms == 0 {
            return Err(Config("control_loop_interval_ms must be non-zero"));
        }
        if self.delivery_attempts == 0 || self.delivery_attempts > 10 {
            return Err(Config("delivery_attempts out of range"));
        }
        if self.delivery_backoff_ms > MAX_BACKOFF_STEP_MS {
            return Err(Config("delivery_backoff_ms out of range"));
        }
        if self.delivery_budget_ms < self.delivery_backoff_ms {
            return Err(Config("delivery budget shorter than one backoff step"));
        }
        if self.credential_refresh_ms == 0 {
            return Err(Config("credential_refresh_ms must be non-zero"));
        }
        Ok(())
    }
}
