use thiserror::Error;

/// Errors raised inside the fan-out path. None of them ever reach the code
/// that triggered a publish.
#[derive(Debug, Error)]
pub enum LiveError {
    /// The group backend could not be reached.
    #[error("group backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The backend did not answer within the publish budget.
    #[error("group backend timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// The session is no longer open; treated as a disconnect.
    #[error("session closed")]
    SessionClosed,

    /// Writing to the client connection failed.
    #[error("transport error: {0}")]
    Transport(String),
}

pub type Result<T> = std::result::Result<T, LiveError>;
