//! Heater / cooler relay pair.
//!
//! Break-before-make: the opposite line is always released before a line
//! is energised, and a line is never energised if that release failed.
//! Combined with [`Drive`] having no "both" variant, the two relays can
//! never be on at the same time.
//!
//! Generic over `embedded_hal::digital::OutputPin`, so the same driver runs
//! on `esp_idf_hal::gpio::PinDriver` and on test doubles.

use embedded_hal::digital::OutputPin;
use log::warn;

use crate::app::ports::{Drive, RelayPort};
use crate::error::ActuatorError;

pub struct RelayPair<H, C> {
    heater: H,
    cooler: C,
    heater_on: bool,
    cooler_on: bool,
}

impl<H: OutputPin, C: OutputPin> RelayPair<H, C> {
    /// Takes ownership of both pins and drives them low.
    pub fn new(heater: H, cooler: C) -> Result<Self, ActuatorError> {
        let mut pair = Self { heater, cooler, heater_on: true, cooler_on: true };
        pair.release_heater()?;
        pair.release_cooler()?;
        Ok(pair)
    }

    pub fn heater_on(&self) -> bool {
        self.heater_on
    }

    pub fn cooler_on(&self) -> bool {
        self.cooler_on
    }

    fn release_heater(&mut self) -> Result<(), ActuatorError> {
        self.heater.set_low().map_err(|_| ActuatorError::GpioWriteFailed)?;
        self.heater_on = false;
        Ok(())
    }

    fn release_cooler(&mut self) -> Result<(), ActuatorError> {
        self.cooler.set_low().map_err(|_| ActuatorError::GpioWriteFailed)?;
        self.cooler_on = false;
        Ok(())
    }

    fn energise_heater(&mut self) -> Result<(), ActuatorError> {
        debug_assert!(!self.cooler_on);
        self.heater.set_high().map_err(|_| ActuatorError::GpioWriteFailed)?;
        self.heater_on = true;
        Ok(())
    }

    fn energise_cooler(&mut self) -> Result<(), ActuatorError> {
        debug_assert!(!self.heater_on);
        self.cooler.set_high().map_err(|_| ActuatorError::GpioWriteFailed)?;
        self.cooler_on = true;
        Ok(())
    }
}

impl<H: OutputPin, C: OutputPin> RelayPort for RelayPair<H, C> {
    fn apply(&mut self, drive: Drive) -> Result<(), ActuatorError> {
        let result = match drive {
            Drive::Heat => self.release_cooler().and_then(|()| self.energise_heater()),
            Drive::Cool => self.release_heater().and_then(|()| self.energise_cooler()),
            Drive::Off => {
                // Attempt both even if the first write fails.
                let heater = self.release_heater();
                let cooler = self.release_cooler();
                heater.and(cooler)
            }
        };
        if result.is_err() {
            warn!(
                "relay: {drive:?} incomplete (heater_on={} cooler_on={})",
                self.heater_on, self.cooler_on
            );
        }
        result
    }
}
