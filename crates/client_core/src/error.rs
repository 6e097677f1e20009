use shared::error::ApiFailure;
use thiserror::Error;

/// Message used whenever the analysis channel drops before a terminal frame.
pub const CONNECTION_LOST: &str = "connection lost";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("{0}")]
    Server(String),
    #[error("malformed payload: {0}")]
    Protocol(String),
    #[error("local file error: {0}")]
    Io(String),
}

impl PipelineError {
    pub fn is_transport(&self) -> bool {
        matches!(self, PipelineError::Transport(_))
    }

    /// Text suitable for a session's status message.
    pub fn display_message(&self) -> String {
        match self {
            PipelineError::Transport(_) => CONNECTION_LOST.to_string(),
            PipelineError::Server(message) => message.clone(),
            PipelineError::Protocol(message) => format!("malformed server message: {message}"),
            PipelineError::Io(message) => message.clone(),
        }
    }
}

impl From<ApiFailure> for PipelineError {
    fn from(value: ApiFailure) -> Self {
        PipelineError::Server(value.error)
    }
}

impl From<reqwest::Error> for PipelineError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_decode() {
            PipelineError::Protocol(value.to_string())
        } else {
            PipelineError::Transport(value.to_string())
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for PipelineError {
    fn from(value: tokio_tungstenite::tungstenite::Error) -> Self {
        PipelineError::Transport(value.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(value: serde_json::Error) -> Self {
        PipelineError::Protocol(value.to_string())
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(value: std::io::Error) -> Self {
        PipelineError::Io(value.to_string())
    }
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
