//! Error types for yomi training and evaluation.

use thiserror::Error;

/// Errors that can occur while ingesting data, configuring, or running the model.
///
/// Empty segmentations, unknown readings and zero-mass distributions are
/// ordinary outcomes and never surface here.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum YomiError {
    /// Malformed corpus or test-set line (1-based line number).
    #[error("corpus error at line {line}: {message}")]
    Corpus { line: usize, message: String },

    /// Invalid configuration or mismatched inputs between trials.
    #[error("validation error: {0}")]
    Validation(String),

    /// Internal error (an arena id that does not resolve).
    #[error("internal error: {0}")]
    Internal(String),
}

impl YomiError {
    pub(crate) fn corpus(line: usize, message: impl Into<String>) -> Self {
        YomiError::Corpus {
            line,
            message: message.into(),
        }
    }
}
