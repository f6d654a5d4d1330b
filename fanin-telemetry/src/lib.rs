//! Telemetry setup shared by fan-in binaries and tests.

pub mod tracing;
