//! Model validation and parsing errors.

use thiserror::Error;

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("Invalid run configuration: {0}")]
    InvalidConfig(String),

    #[error("Missing field '{0}' in artifact")]
    MissingField(&'static str),

    #[error("Malformed artifact: {0}")]
    Malformed(String),
}

impl ModelError {
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }
}
