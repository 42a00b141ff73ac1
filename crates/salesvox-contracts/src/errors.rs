use thiserror::Error;

use crate::pipeline::Stage;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolArgumentError {
    #[error("unknown tool '{0}'")]
    UnknownTool(String),

    #[error("invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error("{tool} requires a non-empty '{field}'")]
    EmptyField { tool: String, field: &'static str },
}

/// Rejected before any collaborator is contacted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("audio input is empty")]
    EmptyAudio,

    #[error("audio input is {size} bytes; the limit is {limit} bytes")]
    AudioTooLarge { size: usize, limit: usize },

    #[error("text input is empty")]
    EmptyText,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{stage} stage failed: {message}")]
pub struct StageError {
    pub stage: Stage,
    pub message: String,
}

impl StageError {
    pub fn new(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
        }
    }
}

impl From<InputError> for StageError {
    fn from(err: InputError) -> Self {
        Self::new(Stage::Validate, err.to_string())
    }
}
