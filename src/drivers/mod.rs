//! Actuator drivers and task helpers.

pub mod relay;
pub mod task_pin;
