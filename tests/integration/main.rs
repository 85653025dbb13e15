//! Integration test driver for `tests/integration/` submodules.
//!
//! Each `mod` below maps to a file that exercises a subsystem against
//! mock adapters.  All tests run on the host with no real hardware.

#![cfg(not(target_os = "espidf"))]

mod mock_hw;
mod scenario_tests;
mod telemetry_tests;
