use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::model::{LevelTag, QuestionId};

/// Every question offers exactly this many answer options.
pub const OPTION_COUNT: usize = 4;

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question text must not be empty")]
    EmptyText,

    #[error("option {option} must not be empty")]
    EmptyOption { option: u8 },

    #[error("answer option must be between 1 and 4, got {0}")]
    InvalidOption(u8),
}

//
// ─── ANSWER OPTION ────────────────────────────────────────────────────────────
//

/// A validated 1-based answer choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct AnswerOption(u8);

impl AnswerOption {
    /// # Errors
    ///
    /// Returns `QuestionError::InvalidOption` when `value` is outside 1-4.
    pub fn new(value: u8) -> Result<Self, QuestionError> {
        if (1..=4).contains(&value) {
            Ok(Self(value))
        } else {
            Err(QuestionError::InvalidOption(value))
        }
    }

    #[must_use]
    pub fn value(self) -> u8 {
        self.0
    }

    /// Zero-based slot into a question's option array.
    #[must_use]
    pub fn slot(self) -> usize {
        usize::from(self.0 - 1)
    }
}

impl TryFrom<u8> for AnswerOption {
    type Error = QuestionError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<AnswerOption> for u8 {
    fn from(value: AnswerOption) -> Self {
        value.0
    }
}

impl fmt::Display for AnswerOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

//
// ─── QUESTION ITEM ────────────────────────────────────────────────────────────
//

/// An immutable multiple-choice question owned by the question bank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionItem {
    id: QuestionId,
    tag: LevelTag,
    text: String,
    options: [String; OPTION_COUNT],
    correct: AnswerOption,
}

impl QuestionItem {
    /// Build a question, validating text and the correct option.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the text or any option is blank, or if
    /// `correct_option` is outside 1-4.
    pub fn new(
        id: QuestionId,
        tag: LevelTag,
        text: impl Into<String>,
        options: [String; OPTION_COUNT],
        correct_option: u8,
    ) -> Result<Self, QuestionError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(QuestionError::EmptyText);
        }
        for (option, slot) in (1_u8..).zip(options.iter()) {
            if slot.trim().is_empty() {
                return Err(QuestionError::EmptyOption { option });
            }
        }
        let correct = AnswerOption::new(correct_option)?;

        Ok(Self {
            id,
            tag,
            text,
            options,
            correct,
        })
    }

    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn tag(&self) -> &LevelTag {
        &self.tag
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn options(&self) -> &[String; OPTION_COUNT] {
        &self.options
    }

    #[must_use]
    pub fn correct_option(&self) -> AnswerOption {
        self.correct
    }

    #[must_use]
    pub fn option_text(&self, option: AnswerOption) -> &str {
        &self.options[option.slot()]
    }

    #[must_use]
    pub fn correct_text(&self) -> &str {
        self.option_text(self.correct)
    }

    #[must_use]
    pub fn is_correct(&self, option: AnswerOption) -> bool {
        option == self.correct
    }
}
