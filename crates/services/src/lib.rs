#![forbid(unsafe_code)]

pub mod error;
pub mod question_bank;
pub mod sessions;
pub mod stats;

pub use quiz_core::Clock;

pub use error::QuizError;
pub use question_bank::QuestionBank;
pub use sessions::{AnswerResult, CurrentQuestion, SessionManager, SessionProgress};
pub use stats::{LeaderboardEntry, StatsAggregator};
