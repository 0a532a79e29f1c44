use quiz_core::model::{LevelTag, QUESTIONS_PER_SESSION, QuizSession};

/// Aggregated view of session progress, useful for status screens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionProgress {
    pub tag: LevelTag,
    pub total: usize,
    pub answered: usize,
    pub remaining: usize,
    pub correct: u8,
    pub is_complete: bool,
}

impl SessionProgress {
    #[must_use]
    pub fn of(session: &QuizSession) -> Self {
        let answered = session.current_index();
        Self {
            tag: session.tag().clone(),
            total: QUESTIONS_PER_SESSION,
            answered,
            remaining: QUESTIONS_PER_SESSION.saturating_sub(answered),
            correct: session.correct_count(),
            is_complete: !session.is_active(),
        }
    }
}
