//! Shared utilities.

pub mod cpu;
pub mod telemetry;

pub use cpu::{CpuProbe, ProcessCpuProbe};
pub use telemetry::init_tracing;
