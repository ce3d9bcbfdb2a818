use thiserror::Error;

use crate::types::{InputSide, Language};

/// Failures that abort a merge invocation. Problems with the *content* of
/// individual resolutions never surface here; they fall back to defaults.
#[derive(Debug, Error)]
pub enum MergeError {
    #[error("{side} input could not be parsed at line {line}, column {column}: {detail}")]
    InputParse {
        side: InputSide,
        line: usize,
        column: usize,
        detail: String,
    },

    #[error("{language} grammar could not be loaded: {reason}")]
    Language { language: Language, reason: String },

    #[error("malformed resolution payload: {0}")]
    ResolutionFormat(String),
}

impl MergeError {
    pub fn is_parse_error(&self) -> bool {
        matches!(self, MergeError::InputParse { .. })
    }
}
