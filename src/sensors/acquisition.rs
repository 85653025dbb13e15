//! Thermocouple acquisition pipeline.
//!
//! Three read strengths over one [`SensorChannel`]:
//!
//! | Read          | Cost                          | Used for                   |
//! |---------------|-------------------------------|----------------------------|
//! | [`raw`]       | one conversion                | building block             |
//! | [`reliable`]  | up to N conversions, retried  | rolling-median sampler     |
//! | [`critical`]  | M reliable reads, median vote | every threshold / safety check |
//!
//! Every read is bounded: retries and inter-sample delays are fixed, so a
//! dead probe costs a known amount of time and returns
//! [`Reading::UNAVAILABLE`], never an error.
//!
//! [`raw`]: TemperatureAcquisition::raw
//! [`reliable`]: TemperatureAcquisition::reliable
//! [`critical`]: TemperatureAcquisition::critical

use embedded_hal::delay::DelayNs;
use log::debug;

use super::Reading;
use super::filter::{self, MEDIAN_SAMPLES, SampleWindow};
use crate::app::ports::{Clock, Millis, ReadingSource, SensorChannel};
use crate::config::{SENSOR_MAX_C, SENSOR_MIN_C, SystemConfig};
use crate::error::SensorError;

/// Timing and calibration knobs, lifted out of [`SystemConfig`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorTiming {
    pub conversion_interval_ms: u32,
    pub read_retries: u8,
    pub retry_delay_ms: u32,
    pub critical_samples: u8,
    pub critical_sample_delay_ms: u32,
    pub sample_interval_ms: u32,
    pub offset_c: f32,
}

impl From<&SystemConfig> for SensorTiming {
    fn from(c: &SystemConfig) -> Self {
        Self {
            conversion_interval_ms: c.conversion_interval_ms,
            read_retries: c.read_retries,
            retry_delay_ms: c.retry_delay_ms,
            critical_samples: c.critical_samples,
            critical_sample_delay_ms: c.critical_sample_delay_ms,
            sample_interval_ms: c.sample_interval_ms,
            offset_c: c.temp_offset_c,
        }
    }
}

impl Default for SensorTiming {
    fn default() -> Self {
        Self::from(&SystemConfig::default())
    }
}

pub struct TemperatureAcquisition<S, D, K> {
    channel: S,
    delay: D,
    clock: K,
    timing: SensorTiming,

    last_conversion_ms: Option<Millis>,
    last_sample_ms: Option<Millis>,
    window: SampleWindow,
    /// Rolling median (or latest single reading before two samples exist).
    current: Reading,
    last_fault: Option<SensorError>,
    fault_count: u32,
}

impl<S, D, K> TemperatureAcquisition<S, D, K>
where
    S: SensorChannel,
    D: DelayNs,
    K: Clock,
{
    pub fn new(channel: S, delay: D, clock: K, timing: SensorTiming) -> Self {
        Self {
            channel,
            delay,
            clock,
            timing,
            last_conversion_ms: None,
            last_sample_ms: None,
            window: SampleWindow::new(),
            current: Reading::UNAVAILABLE,
            last_fault: None,
            fault_count: 0,
        }
    }

    /// One physical conversion.
    ///
    /// Unavailable when called before the conversion interval has elapsed
    /// since the previous conversion, on open circuit, on bus fault, or when
    /// the calibrated value falls outside the thermocouple's range.
    pub fn raw(&mut self) -> Reading {
        match self.try_raw() {
            Ok(celsius) => Reading::new(celsius),
            Err(e) => {
                if e != SensorError::NotReady {
                    debug!("thermocouple: {e}");
                    self.fault_count = self.fault_count.wrapping_add(1);
                }
                self.last_fault = Some(e);
                Reading::UNAVAILABLE
            }
        }
    }

    fn try_raw(&mut self) -> Result<f32, SensorError> {
        let now = self.clock.now_ms();
        if let Some(last) = self.last_conversion_ms {
            if now.wrapping_sub(last) < self.timing.conversion_interval_ms {
                return Err(SensorError::NotReady);
            }
        }
        let converted = self.channel.convert();
        self.last_conversion_ms = Some(now);

        let celsius = converted? + self.timing.offset_c;
        if !celsius.is_finite() || !(SENSOR_MIN_C..=SENSOR_MAX_C).contains(&celsius) {
            return Err(SensorError::OutOfRange);
        }
        Ok(celsius)
    }

    /// [`raw`](Self::raw) retried up to `read_retries` times.
    pub fn reliable(&mut self) -> Reading {
        let attempts = self.timing.read_retries.max(1);
        for attempt in 0..attempts {
            let reading = self.raw();
            if reading.valid {
                return reading;
            }
            if attempt + 1 < attempts {
                self.delay.delay_ms(self.timing.retry_delay_ms);
            }
        }
        Reading::UNAVAILABLE
    }

    /// Majority vote: median of `critical_samples` independent reliable
    /// reads.  Needs at least two valid samples.
    pub fn critical(&mut self) -> Reading {
        let count = usize::from(self.timing.critical_samples).clamp(1, MEDIAN_SAMPLES);
        let mut valid = heapless::Vec::<f32, MEDIAN_SAMPLES>::new();
        for i in 0..count {
            if let Some(c) = self.reliable().value() {
                // capacity equals the loop bound
                let _ = valid.push(c);
            }
            if i + 1 < count {
                self.delay.delay_ms(self.timing.critical_sample_delay_ms);
            }
        }
        if valid.len() < 2 {
            return Reading::UNAVAILABLE;
        }
        Reading::from_option(filter::median(&valid))
    }

    /// Periodic rolling-median sampler.  Rate-limited to one reliable read
    /// per `sample_interval_ms`; returns `None` when skipped.
    pub fn sample(&mut self) -> Option<Reading> {
        let now = self.clock.now_ms();
        if let Some(last) = self.last_sample_ms {
            if now.wrapping_sub(last) < self.timing.sample_interval_ms {
                return None;
            }
        }
        self.last_sample_ms = Some(now);

        let reading = self.reliable();
        if let Some(c) = reading.value() {
            self.window.push(c);
            self.current = Reading::new(self.window.median().unwrap_or(c));
        }
        Some(reading)
    }

    /// Latest rolling median, or the latest single reading before two
    /// valid samples exist.  Stays at the last good value when the probe
    /// drops out.
    pub fn current(&self) -> Reading {
        self.current
    }

    pub fn last_fault(&self) -> Option<SensorError> {
        self.last_fault
    }

    /// Conversions that failed (excluding conversion-time gating).
    pub fn fault_count(&self) -> u32 {
        self.fault_count
    }

    pub fn set_offset(&mut self, offset_c: f32) {
        self.timing.offset_c = offset_c;
    }

    pub fn timing(&self) -> &SensorTiming {
        &self.timing
    }
}

impl<S, D, K> ReadingSource for TemperatureAcquisition<S, D, K>
where
    S: SensorChannel,
    D: DelayNs,
    K: Clock,
{
    fn critical(&mut self) -> Reading {
        TemperatureAcquisition::critical(self)
    }

    fn median(&self) -> Reading {
        self.current
    }
}
