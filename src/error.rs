use crate::models::{Id, IdError};

/// Errors surfaced by ledger operations.
///
/// Storage backends report failures as `anyhow::Error`; they arrive here as
/// [`LedgerError::Backend`] and carry the full context chain for logging.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// The client sent a value that cannot be turned into a canonical record.
    #[error("invalid value for '{field}': {message}")]
    Validation { field: &'static str, message: String },

    #[error("transaction {0} not found")]
    NotFound(Id),

    #[error("storage backend failure: {0:#}")]
    Backend(#[from] anyhow::Error),
}

impl LedgerError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Backend(_))
    }
}

impl From<IdError> for LedgerError {
    fn from(err: IdError) -> Self {
        Self::validation("id", err.to_string())
    }
}

pub type Result<T, E = LedgerError> = std::result::Result<T, E>;
