use thiserror::Error;

use crate::model::{
    ParseIdError, ParseLevelError, QuestionError, RatingError, SessionStateError, SubjectError,
};
use crate::scoring::ScoringError;

/// Any domain validation failure raised by this crate.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Question(#[from] QuestionError),
    #[error(transparent)]
    Session(#[from] SessionStateError),
    #[error(transparent)]
    Rating(#[from] RatingError),
    #[error(transparent)]
    Scoring(#[from] ScoringError),
    #[error(transparent)]
    Level(#[from] ParseLevelError),
    #[error(transparent)]
    Subject(#[from] SubjectError),
    #[error(transparent)]
    Id(#[from] ParseIdError),
}
