use thiserror::Error;

pub type Result<T> = std::result::Result<T, QueryError>;

/// Terminal failure of a call graph query. None of these are retried.
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("missing required input: {0}")]
    MissingRequiredInput(String),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("symbol not found: {0}")]
    SymbolNotFound(String),

    #[error("call graph construction failed: {0:#}")]
    CollaboratorFailure(anyhow::Error),

    #[error("query interrupted: {0}")]
    Interrupted(String),
}

impl QueryError {
    /// Stable machine-readable code for structured failure responses.
    pub fn kind(&self) -> &'static str {
        match self {
            QueryError::MissingRequiredInput(_) => "missing_required_input",
            QueryError::InvalidConfiguration(_) => "invalid_configuration",
            QueryError::SymbolNotFound(_) => "symbol_not_found",
            QueryError::CollaboratorFailure(_) => "collaborator_failure",
            QueryError::Interrupted(_) => "interrupted",
        }
    }
}
