mod ids;
mod level;
mod question;
mod rating;
mod session;

pub use ids::{ParseIdError, QuestionId, UserId};
pub use level::{Level, LevelTag, ParseLevelError, Subject, SubjectError};
pub use question::{AnswerOption, OPTION_COUNT, QuestionError, QuestionItem};
pub use rating::{
    INITIAL_MMR, LevelAverages, LevelStats, RatingError, UserRating, default_display_name,
};
pub use session::{
    AnswerOutcome, QUESTIONS_PER_SESSION, QuizSession, RatingTrend, ScoreBand, SessionCompleted,
    SessionStateError, score_percent,
};
