// Typed errors with thiserror. Surfaced to JS as strings at the wasm boundary.
// Only construction and recording can fail; playback transitions never do.

use thiserror::Error;
use wasm_bindgen::JsValue;

/// Presentation error types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PresentationError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Presentation needs at least one scene")]
    EmptySceneList,

    #[error("Scene at position {index} has an empty id")]
    EmptySceneId { index: usize },

    #[error("Scene '{id}' has a zero duration")]
    ZeroDuration { id: String },

    #[error("Duplicate scene id: {0}")]
    DuplicateSceneId(String),

    #[error("A recording session is already running")]
    RecordingInProgress,

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for PresentationError {
    fn from(err: serde_json::Error) -> Self {
        PresentationError::Serialization(err.to_string())
    }
}

impl From<PresentationError> for JsValue {
    fn from(err: PresentationError) -> Self {
        JsValue::from_str(&err.to_string())
    }
}
