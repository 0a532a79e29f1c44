use quiz_core::model::{AnswerOutcome, QuestionItem, SessionCompleted};

/// What a user should see next.
#[derive(Debug, Clone, PartialEq)]
pub enum CurrentQuestion {
    /// The question at 0-based `index` is waiting for an answer.
    Question { index: usize, item: QuestionItem },
    /// The last session is finished.
    Completed(SessionCompleted),
    NoSession,
}

/// Result of one submitted answer.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerResult {
    pub outcome: AnswerOutcome,
    /// Present when this answer finished the session.
    pub completed: Option<SessionCompleted>,
    /// True when the answer had already been recorded and nothing changed.
    pub replayed: bool,
}

impl AnswerResult {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.completed.is_some()
    }
}
