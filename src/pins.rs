//! GPIO / peripheral pin assignments for the thermocycler board.
//!
//! Single source of truth: the binary references this module rather than
//! hard-coding pin numbers.
//!
//! Pin numbers are ESP32 (classic) GPIOs on a DevKit-style board.

// ---------------------------------------------------------------------------
// Relay outputs (opto-isolated relay module, active HIGH)
// ---------------------------------------------------------------------------

/// Heater relay.  Never energised together with the cooler.
pub const HEATER_RELAY_GPIO: i32 = 23;
/// Cooler (fan / Peltier) relay.
pub const COOLER_RELAY_GPIO: i32 = 5;

// ---------------------------------------------------------------------------
// MAX6675 thermocouple converter (read-only SPI)
// ---------------------------------------------------------------------------

/// Chip select, driven by the SPI device driver.
pub const MAX6675_CS_GPIO: i32 = 15;
/// Serial data out of the converter.
pub const MAX6675_MISO_GPIO: i32 = 19;
/// Serial clock.
pub const MAX6675_SCK_GPIO: i32 = 18;

/// SPI clock for the MAX6675 (datasheet maximum is 4.3 MHz).
pub const MAX6675_SPI_HZ: u32 = 1_000_000;
