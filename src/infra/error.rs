use thiserror::Error;

use crate::config::SettingsError;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("configuration failure: {0}")]
    Configuration(#[from] SettingsError),
    #[error("telemetry failure: {0}")]
    Telemetry(String),
}

impl InfraError {
    pub fn telemetry(message: impl Into<String>) -> Self {
        Self::Telemetry(message.into())
    }
}
