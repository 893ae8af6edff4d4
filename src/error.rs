#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Git command failed: {0}")]
    GitCommandError(String),

    #[error("Git is not available: {0}")]
    ToolUnavailable(String),

    #[error("Invalid reference: {0:?}")]
    InvalidReference(String),

    #[error("{0}")]
    Validation(String),

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Malformed log line: {0:?}")]
    LogParse(String),

    #[error("{stage} stage timed out after {limit:?}")]
    Timeout {
        stage: &'static str,
        limit: std::time::Duration,
    },

    #[error("git {command} was killed after {limit:?}")]
    CommandTimeout {
        command: String,
        limit: std::time::Duration,
    },

    #[error("Background task failed: {0}")]
    Join(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(String),
}

impl Error {
    /// HTTP status used when this error crosses the API boundary.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::MethodNotAllowed => 405,
            _ => 500,
        }
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Join(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
