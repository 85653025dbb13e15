//! Thermocycler firmware library.
//!
//! Exposes the pure-logic modules for integration testing and host
//! simulation.  All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod cycle;
pub mod drivers;
pub mod error;
pub mod pins;
pub mod safety;
pub mod sensors;
pub mod telemetry;

pub use error::{Error, Result};
