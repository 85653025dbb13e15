//! MAX6675 K-type thermocouple-to-digital converter.
//!
//! Read-only SPI device that shifts out one 16-bit frame per chip-select:
//!
//! ```text
//!   bit 15     dummy sign bit, always 0
//!   bits 14..3 temperature, 0.25 °C per LSB
//!   bit 2      thermocouple input open
//!   bit 1      device id (0)
//!   bit 0      three-state
//! ```
//!
//! The converter needs ~220 ms per conversion; reading faster returns the
//! previous conversion or garbage, so the acquisition pipeline gates reads.

use embedded_hal::spi::SpiDevice;
use log::debug;

use crate::app::ports::SensorChannel;
use crate::error::SensorError;

const OPEN_CIRCUIT_BIT: u16 = 0x0004;
const DUMMY_SIGN_BIT: u16 = 0x8000;
const LSB_C: f32 = 0.25;

pub struct Max6675<SPI> {
    spi: SPI,
}

impl<SPI: SpiDevice> Max6675<SPI> {
    pub fn new(spi: SPI) -> Self {
        Self { spi }
    }

    /// Give the bus back (tests, re-initialisation).
    pub fn release(self) -> SPI {
        self.spi
    }

    fn read_frame(&mut self) -> Result<u16, SensorError> {
        let mut buf = [0u8; 2];
        self.spi.read(&mut buf).map_err(|e| {
            debug!("max6675: spi read failed: {e:?}");
            SensorError::BusFault
        })?;
        Ok(u16::from_be_bytes(buf))
    }
}

/// Decode one frame into °C.
pub fn decode_frame(frame: u16) -> Result<f32, SensorError> {
    if frame & DUMMY_SIGN_BIT != 0 {
        // A floating MISO line reads as all ones.
        return Err(SensorError::BusFault);
    }
    if frame & OPEN_CIRCUIT_BIT != 0 {
        return Err(SensorError::OpenCircuit);
    }
    Ok(f32::from(frame >> 3) * LSB_C)
}

impl<SPI: SpiDevice> SensorChannel for Max6675<SPI> {
    fn convert(&mut self) -> Result<f32, SensorError> {
        let frame = self.read_frame()?;
        decode_frame(frame)
    }
}
