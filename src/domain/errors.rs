use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Entity not found: {0}")]
    NotFound(String),
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Operation not allowed: {0}")]
    Forbidden(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DomainError {
    /// Invalid input and guard breaches fail the whole run; retrying cannot fix them.
    pub fn is_retriable(&self) -> bool {
        !matches!(self, DomainError::Validation(_) | DomainError::Forbidden(_))
    }
}
