//! Application core: domain orchestration, zero I/O.
//!
//! The port traits in [`ports`] are the only way the engine and the
//! telemetry worker reach hardware or the network, so this layer is
//! testable on the host with mock adapters.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
