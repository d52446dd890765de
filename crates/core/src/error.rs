use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Session busy: {0}")]
    SessionBusy(String),

    #[error("Session expired: {0}")]
    SessionExpired(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Retrieval unavailable: {0}")]
    RetrievalUnavailable(String),

    #[error("Agent unavailable: {0}")]
    AgentUnavailable(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Transient failures are absorbed inside the orchestrator (retried or
    /// degraded); everything else surfaces to the caller.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Provider(_) | Error::AgentUnavailable(_) | Error::Timeout(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
