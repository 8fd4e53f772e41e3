use thiserror::Error;

#[derive(Debug, Error)]
pub enum MiniblogError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MiniblogError {
    /// Short error code string, logged next to the message.
    pub fn code(&self) -> &'static str {
        match self {
            MiniblogError::Config(_) => "CONFIG_ERROR",
            MiniblogError::Io(_) => "IO_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, MiniblogError>;
