use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use crate::model::{AnswerOption, LevelTag, QuestionId, QuestionItem, UserId};

/// Number of questions in every quiz session.
pub const QUESTIONS_PER_SESSION: usize = 10;

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionStateError {
    #[error("a session needs exactly {expected} questions, got {got}")]
    WrongQuestionCount { expected: usize, got: usize },

    #[error("question {0} appears more than once in the session")]
    DuplicateQuestion(QuestionId),

    #[error("answer targets question {got} but the session is at question {expected}")]
    QuestionMismatch {
        expected: QuestionId,
        got: QuestionId,
    },

    #[error("session is already completed")]
    Completed,

    #[error("session is still in progress")]
    InProgress,

    #[error("invalid persisted session: {0}")]
    InvalidPersistedState(String),
}

//
// ─── COMPLETION ───────────────────────────────────────────────────────────────
//

/// Final result of a session, produced atomically with its terminal transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCompleted {
    pub correct_count: u8,
    pub rating_delta: i32,
    pub new_rating: u32,
}

impl SessionCompleted {
    #[must_use]
    pub fn score_percent(&self) -> f64 {
        score_percent(self.correct_count)
    }

    #[must_use]
    pub fn band(&self) -> ScoreBand {
        ScoreBand::from_correct(self.correct_count)
    }

    #[must_use]
    pub fn trend(&self) -> RatingTrend {
        RatingTrend::from_delta(self.rating_delta)
    }

    /// Rating before the delta was applied.
    ///
    /// Derived from the clamped new rating, so it may differ from the true
    /// previous rating when the floor at zero was hit.
    #[must_use]
    pub fn previous_rating(&self) -> u32 {
        let previous = i64::from(self.new_rating) - i64::from(self.rating_delta);
        u32::try_from(previous.max(0)).unwrap_or(u32::MAX)
    }
}

/// Percentage of correct answers in a full session.
#[must_use]
pub fn score_percent(correct_count: u8) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let total = QUESTIONS_PER_SESSION as f64;
    f64::from(correct_count) * 100.0 / total
}

/// Coarse grade shown with a finished session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScoreBand {
    /// 90 % and above.
    Excellent,
    /// 70 % and above.
    Good,
    /// 50 % and above.
    NeedsPractice,
    KeepLearning,
}

impl ScoreBand {
    #[must_use]
    pub fn from_correct(correct_count: u8) -> Self {
        let percent = score_percent(correct_count);
        if percent >= 90.0 {
            Self::Excellent
        } else if percent >= 70.0 {
            Self::Good
        } else if percent >= 50.0 {
            Self::NeedsPractice
        } else {
            Self::KeepLearning
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatingTrend {
    Up,
    Down,
    Flat,
}

impl RatingTrend {
    #[must_use]
    pub fn from_delta(delta: i32) -> Self {
        match delta.signum() {
            1 => Self::Up,
            -1 => Self::Down,
            _ => Self::Flat,
        }
    }
}

//
// ─── ANSWER OUTCOME ───────────────────────────────────────────────────────────
//

/// Feedback for a single answered question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerOutcome {
    pub correct: bool,
    pub selected_option_text: String,
    pub correct_option_text: String,
}

impl AnswerOutcome {
    #[must_use]
    pub fn evaluate(question: &QuestionItem, selected: AnswerOption) -> Self {
        Self {
            correct: question.is_correct(selected),
            selected_option_text: question.option_text(selected).to_owned(),
            correct_option_text: question.correct_text().to_owned(),
        }
    }
}

//
// ─── QUIZ SESSION ─────────────────────────────────────────────────────────────
//

/// One user's attempt at a fixed sequence of questions.
///
/// `current_index` is the number of recorded answers, so it only grows, and
/// `correct_count <= current_index <= QUESTIONS_PER_SESSION` holds after every
/// mutation. The session turns terminal exactly when the last answer lands.
#[derive(Debug, Clone, PartialEq)]
pub struct QuizSession {
    user_id: UserId,
    tag: LevelTag,
    question_ids: Vec<QuestionId>,
    answers: Vec<AnswerOption>,
    correct_count: u8,
    active: bool,
    started_at: DateTime<Utc>,
    last_answer_at: Option<DateTime<Utc>>,
    completion: Option<SessionCompleted>,
}

impl QuizSession {
    /// Start a fresh session over the given question order.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError::WrongQuestionCount` unless exactly
    /// `QUESTIONS_PER_SESSION` ids are given, and
    /// `SessionStateError::DuplicateQuestion` if any id repeats.
    pub fn new(
        user_id: UserId,
        tag: LevelTag,
        question_ids: Vec<QuestionId>,
        started_at: DateTime<Utc>,
    ) -> Result<Self, SessionStateError> {
        validate_question_ids(&question_ids)?;
        Ok(Self {
            user_id,
            tag,
            question_ids,
            answers: Vec::with_capacity(QUESTIONS_PER_SESSION),
            correct_count: 0,
            active: true,
            started_at,
            last_answer_at: None,
            completion: None,
        })
    }

    /// Rehydrate a session from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError` if the stored fields violate any session invariant.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        user_id: UserId,
        tag: LevelTag,
        question_ids: Vec<QuestionId>,
        answers: Vec<AnswerOption>,
        correct_count: u8,
        active: bool,
        started_at: DateTime<Utc>,
        last_answer_at: Option<DateTime<Utc>>,
        completion: Option<SessionCompleted>,
    ) -> Result<Self, SessionStateError> {
        validate_question_ids(&question_ids)?;

        let invalid = |msg: String| Err(SessionStateError::InvalidPersistedState(msg));
        if answers.len() > QUESTIONS_PER_SESSION {
            return invalid(format!("{} answers recorded", answers.len()));
        }
        if usize::from(correct_count) > answers.len() {
            return invalid(format!(
                "correct_count {correct_count} exceeds answered {}",
                answers.len()
            ));
        }
        let finished = answers.len() == QUESTIONS_PER_SESSION;
        if active == finished {
            return invalid(format!(
                "active={active} with {} of {QUESTIONS_PER_SESSION} answered",
                answers.len()
            ));
        }
        match completion {
            Some(summary) if summary.correct_count != correct_count => {
                return invalid("completion summary disagrees with correct_count".into());
            }
            None if finished => return invalid("finished session without summary".into()),
            Some(_) if !finished => return invalid("unfinished session with summary".into()),
            _ => {}
        }
        if answers.is_empty() != last_answer_at.is_none() {
            return invalid("last_answer_at does not match answers".into());
        }

        Ok(Self {
            user_id,
            tag,
            question_ids,
            answers,
            correct_count,
            active,
            started_at,
            last_answer_at,
            completion,
        })
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn tag(&self) -> &LevelTag {
        &self.tag
    }

    #[must_use]
    pub fn question_ids(&self) -> &[QuestionId] {
        &self.question_ids
    }

    /// Options selected so far, in question order.
    #[must_use]
    pub fn answers(&self) -> &[AnswerOption] {
        &self.answers
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.answers.len()
    }

    #[must_use]
    pub fn correct_count(&self) -> u8 {
        self.correct_count
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn last_answer_at(&self) -> Option<DateTime<Utc>> {
        self.last_answer_at
    }

    #[must_use]
    pub fn last_activity_at(&self) -> DateTime<Utc> {
        self.last_answer_at.unwrap_or(self.started_at)
    }

    #[must_use]
    pub fn completion(&self) -> Option<SessionCompleted> {
        self.completion
    }

    #[must_use]
    pub fn question_id_at(&self, index: usize) -> Option<QuestionId> {
        self.question_ids.get(index).copied()
    }

    #[must_use]
    pub fn current_question_id(&self) -> Option<QuestionId> {
        if self.active {
            self.question_id_at(self.current_index())
        } else {
            None
        }
    }

    #[must_use]
    pub fn answer_at(&self, index: usize) -> Option<AnswerOption> {
        self.answers.get(index).copied()
    }

    /// True if the session has been idle for longer than `ttl` at `now`.
    ///
    /// Finished sessions never expire.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        self.active && now.signed_duration_since(self.last_activity_at()) > ttl
    }

    /// Record the answer to the current question and advance.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError::Completed` if the session is terminal and
    /// `SessionStateError::QuestionMismatch` if `question` is not the current one.
    pub fn record_answer(
        &mut self,
        question: &QuestionItem,
        selected: AnswerOption,
        answered_at: DateTime<Utc>,
    ) -> Result<AnswerOutcome, SessionStateError> {
        let expected = self
            .current_question_id()
            .ok_or(SessionStateError::Completed)?;
        if question.id() != expected {
            return Err(SessionStateError::QuestionMismatch {
                expected,
                got: question.id(),
            });
        }

        let outcome = AnswerOutcome::evaluate(question, selected);
        if outcome.correct {
            self.correct_count += 1;
        }
        self.answers.push(selected);
        self.last_answer_at = Some(answered_at);
        if self.answers.len() == QUESTIONS_PER_SESSION {
            self.active = false;
        }

        Ok(outcome)
    }

    /// Attach the completion summary to a terminal session.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError::InProgress` if answers are still pending,
    /// `SessionStateError::Completed` if a summary is already attached, and
    /// `SessionStateError::InvalidPersistedState` if the summary's score differs.
    pub fn complete(&mut self, summary: SessionCompleted) -> Result<(), SessionStateError> {
        if self.active {
            return Err(SessionStateError::InProgress);
        }
        if self.completion.is_some() {
            return Err(SessionStateError::Completed);
        }
        if summary.correct_count != self.correct_count {
            return Err(SessionStateError::InvalidPersistedState(
                "completion summary disagrees with correct_count".into(),
            ));
        }
        self.completion = Some(summary);
        Ok(())
    }
}

fn validate_question_ids(ids: &[QuestionId]) -> Result<(), SessionStateError> {
    if ids.len() != QUESTIONS_PER_SESSION {
        return Err(SessionStateError::WrongQuestionCount {
            expected: QUESTIONS_PER_SESSION,
            got: ids.len(),
        });
    }
    let mut seen = HashSet::with_capacity(ids.len());
    for id in ids {
        if !seen.insert(*id) {
            return Err(SessionStateError::DuplicateQuestion(*id));
        }
    }
    Ok(())
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
