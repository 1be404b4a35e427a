//! ABOUTME: Telemetry event registration for the signalgraph workflow engine
//! ABOUTME: register_event is the single seam that updates operational counters

pub mod register;
#[cfg(test)]
mod testing;

pub use register::{node_execution_data, register_event, signals_broadcast_data};
