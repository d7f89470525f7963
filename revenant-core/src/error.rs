use thiserror::Error;

/// The core's single error taxonomy. Every component boundary returns
/// `Result<_, RevenantError>`; nothing unwinds across a session boundary
/// (see `runner::mod` for how panics inside a session task are caught and
/// converted into an `AttemptResult::Error` instead of propagating).
#[derive(Error, Debug)]
pub enum RevenantError {
    #[error("input validation failed: {0}")]
    Validation(String),

    #[error("browser error: {0}")]
    Browser(String),

    #[error("evasion surface '{surface}' failed to install: {reason}")]
    EvasionInstall { surface: &'static str, reason: String },

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("action failed: {0}")]
    ActionFailed(String),

    #[error("classification timed out after {0}ms")]
    ClassificationTimeout(u64),

    #[error("rotation failed: {0}")]
    Rotation(String),

    #[error("control protocol error: {0}")]
    Protocol(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RevenantError>;
