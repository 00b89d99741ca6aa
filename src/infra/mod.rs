//! Infrastructure: telemetry bootstrap and its failure modes.

pub mod error;
pub mod telemetry;
