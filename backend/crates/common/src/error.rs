use thiserror::Error;

#[derive(Debug, Error)]
pub enum HubsyncError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl HubsyncError {
    /// Wrap any displayable database-layer error.
    pub fn database(err: impl std::fmt::Display) -> Self {
        Self::Database(err.to_string())
    }
}

pub type HubsyncResult<T> = Result<T, HubsyncError>;
