// Error taxonomy for the simulation engine
// Numerical degradation is not an error: it travels as a flag on trajectory samples.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SimulationError {
    /// Malformed or out-of-range input; surfaced before any computation.
    #[error("validation error: {0}")]
    Validation(String),

    /// Unknown asteroid designation.
    #[error("asteroid not found: {0}")]
    NotFound(String),

    /// Catalog or elevation collaborator failure.
    #[error("upstream error: {0}")]
    Upstream(String),
}

impl SimulationError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream(message.into())
    }
}

impl From<reqwest::Error> for SimulationError {
    fn from(err: reqwest::Error) -> Self {
        Self::Upstream(format!("request failed: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, SimulationError>;
