//! Shared error types for the services crate.

use thiserror::Error;

use quiz_core::model::{LevelTag, SessionStateError};
use quiz_core::scoring::ScoringError;
use storage::repository::StorageError;

/// Errors emitted by the quiz services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuizError {
    #[error("not enough questions for {tag}: {available} available, {required} required")]
    InsufficientPool {
        tag: LevelTag,
        available: usize,
        required: usize,
    },
    #[error("no active quiz session")]
    NoActiveSession,
    #[error("answer option must be between 1 and 4, got {0}")]
    InvalidOption(u8),
    #[error("answer targets question {got} but the session is at question {expected}")]
    QuestionOutOfSync { expected: usize, got: usize },
    #[error(transparent)]
    Session(#[from] SessionStateError),
    #[error(transparent)]
    Scoring(#[from] ScoringError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
