//! Unified error types for the thermocycler firmware.
//!
//! A single `Error` enum that every subsystem can convert into, keeping the
//! control loop's error handling uniform.  All variants are `Copy` so they
//! can be passed through the engine and the telemetry pipeline without
//! allocation.
//!
//! Only [`SafetyTrip`] ever changes control-plane state.  Sensor and
//! telemetry failures are absorbed where they happen and surface as
//! counters or "unavailable" readings.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The thermocouple could not be read or returned implausible data.
    Sensor(SensorError),
    /// A relay line could not be driven.
    Actuator(ActuatorError),
    /// A safety interlock tripped.
    Safety(SafetyTrip),
    /// The telemetry pipeline dropped or failed to deliver a record.
    Telemetry(TelemetryError),
    /// Configuration is invalid.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Actuator(e) => write!(f, "actuator: {e}"),
            Self::Safety(e) => write!(f, "safety: {e}"),
            Self::Telemetry(e) => write!(f, "telemetry: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl core::error::Error for Error {}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

/// Transient thermocouple faults.  Retried internally, never fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// The converter's fixed conversion interval has not elapsed yet.
    NotReady,
    /// Thermocouple input is open (probe unplugged or broken).
    OpenCircuit,
    /// Reading is outside the physically plausible range.
    OutOfRange,
    /// The SPI transfer failed or returned a malformed frame.
    BusFault,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotReady => write!(f, "conversion not ready"),
            Self::OpenCircuit => write!(f, "thermocouple open circuit"),
            Self::OutOfRange => write!(f, "reading out of range"),
            Self::BusFault => write!(f, "bus fault"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Actuator errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorError {
    /// GPIO set failed.
    GpioWriteFailed,
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GpioWriteFailed => write!(f, "GPIO write failed"),
        }
    }
}

impl From<ActuatorError> for Error {
    fn from(e: ActuatorError) -> Self {
        Self::Actuator(e)
    }
}

// ---------------------------------------------------------------------------
// Safety trips
// ---------------------------------------------------------------------------

/// Safety trips force the engine into `SafetyCooling` and require an
/// operator restart.  They are always logged and always notified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafetyTrip {
    /// Heating has run longer than the allowed multiple of the average.
    RunawayHeating,
    /// Temperature stayed inside the stagnation band for too long
    /// (stuck sensor or failed heater).
    Stagnation,
}

impl fmt::Display for SafetyTrip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RunawayHeating => write!(f, "runaway heating"),
            Self::Stagnation => write!(f, "temperature stagnation"),
        }
    }
}

impl From<SafetyTrip> for Error {
    fn from(e: SafetyTrip) -> Self {
        Self::Safety(e)
    }
}

// ---------------------------------------------------------------------------
// Telemetry errors
// ---------------------------------------------------------------------------

/// Recoverable telemetry failures.  None of these affect relay control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryError {
    /// The record queue stayed full; the record was dropped.
    QueueOverflow,
    /// The remote sink rejected every attempt within the budget.
    DeliveryFailed { attempts: u8 },
    /// The outbound session has no valid credentials yet.
    CredentialNotReady,
}

impl fmt::Display for TelemetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QueueOverflow => write!(f, "record queue overflow"),
            Self::DeliveryFailed { attempts } => {
                write!(f, "delivery failed after {attempts} attempts")
            }
            Self::CredentialNotReady => write!(f, "credentials not ready"),
        }
    }
}

impl From<TelemetryError> for Error {
    fn from(e: TelemetryError) -> Self {
        Self::Telemetry(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
