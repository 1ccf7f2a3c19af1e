// Core error taxonomy shared by every use case
use thiserror::Error;

/// Malformed or out-of-range telemetry. Carries every offending field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid telemetry field(s): {}", .fields.join(", "))]
pub struct ValidationError {
    pub fields: Vec<String>,
}

impl ValidationError {
    pub fn new(fields: Vec<String>) -> Self {
        Self { fields }
    }

    #[cfg(test)]
    pub fn references(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f == field)
    }
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("missing or invalid credential")]
    Unauthorized,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("storage failure: {0}")]
    Storage(String),
}

impl CoreError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }
}

impl From<anyhow::Error> for CoreError {
    fn from(err: anyhow::Error) -> Self {
        // {:#} keeps the context chain on one line
        Self::Storage(format!("{:#}", err))
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
