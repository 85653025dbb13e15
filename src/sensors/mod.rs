//! Sensor subsystem: the MAX6675 channel driver and the
//! [`TemperatureAcquisition`](acquisition::TemperatureAcquisition) pipeline
//! that turns its raw conversions into values safe to decide on.
//!
//! ```text
//!   Max6675 ──convert()──▶ raw() ──▶ reliable() ──┬──▶ critical()  (majority vote)
//!                                                  └──▶ sample()    (rolling median)
//! ```

pub mod acquisition;
pub mod filter;
pub mod max6675;

/// A temperature in °C plus a validity flag.
///
/// An invalid reading is never an error: every consumer treats it as "no
/// decision this tick".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub celsius: f32,
    pub valid: bool,
}

impl Reading {
    pub const UNAVAILABLE: Self = Self { celsius: f32::NAN, valid: false };

    pub const fn new(celsius: f32) -> Self {
        Self { celsius, valid: true }
    }

    /// Build from an optional value; `None` and NaN are unavailable.
    pub fn from_option(value: Option<f32>) -> Self {
        match value {
            Some(c) if c.is_finite() => Self::new(c),
            _ => Self::UNAVAILABLE,
        }
    }

    pub fn value(self) -> Option<f32> {
        self.valid.then_some(self.celsius)
    }
}

impl Default for Reading {
    fn default() -> Self {
        Self::UNAVAILABLE
    }
}
