use chrono::{DateTime, Utc};
use quiz_core::model::{
    AnswerOption, Level, LevelAverages, LevelTag, QuestionId, QuestionItem, QuizSession,
    SessionCompleted, Subject, UserId, UserRating,
};
use sqlx::Row;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn(e: sqlx::Error) -> StorageError {
    StorageError::Connection(e.to_string())
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn user_id_from_i64(v: i64) -> Result<UserId, StorageError> {
    Ok(UserId::new(i64_to_u64("user_id", v)?))
}

pub(crate) fn question_id_from_i64(v: i64) -> Result<QuestionId, StorageError> {
    Ok(QuestionId::new(i64_to_u64("question_id", v)?))
}

fn u8_from_i64(field: &'static str, v: i64) -> Result<u8, StorageError> {
    u8::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

fn i32_from_i64(field: &'static str, v: i64) -> Result<i32, StorageError> {
    i32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

fn tag_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<LevelTag, StorageError> {
    let subject = Subject::new(row.try_get::<String, _>("subject").map_err(ser)?).map_err(ser)?;
    let level = row
        .try_get::<String, _>("level")
        .map_err(ser)?
        .parse::<Level>()
        .map_err(ser)?;
    Ok(LevelTag::new(subject, level))
}

pub(crate) fn map_question_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<QuestionItem, StorageError> {
    let options = [
        row.try_get::<String, _>("option1").map_err(ser)?,
        row.try_get::<String, _>("option2").map_err(ser)?,
        row.try_get::<String, _>("option3").map_err(ser)?,
        row.try_get::<String, _>("option4").map_err(ser)?,
    ];
    QuestionItem::new(
        question_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        tag_from_row(row)?,
        row.try_get::<String, _>("question_text").map_err(ser)?,
        options,
        u8_from_i64(
            "correct_option",
            row.try_get::<i64, _>("correct_option").map_err(ser)?,
        )?,
    )
    .map_err(ser)
}

/// Question ids are stored as a JSON array to keep the session order.
pub(crate) fn encode_question_ids(ids: &[QuestionId]) -> Result<String, StorageError> {
    serde_json::to_string(ids).map_err(ser)
}

pub(crate) fn encode_answers(answers: &[AnswerOption]) -> Result<String, StorageError> {
    serde_json::to_string(answers).map_err(ser)
}

pub(crate) fn map_session_row(row: &sqlx::sqlite::SqliteRow) -> Result<QuizSession, StorageError> {
    let question_ids: Vec<QuestionId> =
        serde_json::from_str(&row.try_get::<String, _>("question_ids").map_err(ser)?)
            .map_err(ser)?;
    let answers: Vec<AnswerOption> =
        serde_json::from_str(&row.try_get::<String, _>("answers").map_err(ser)?).map_err(ser)?;
    let correct_count = u8_from_i64(
        "correct_count",
        row.try_get::<i64, _>("correct_count").map_err(ser)?,
    )?;
    let active: bool = row.try_get("active").map_err(ser)?;
    let started_at: DateTime<Utc> = row.try_get("started_at").map_err(ser)?;
    let last_answer_at: Option<DateTime<Utc>> = row.try_get("last_answer_at").map_err(ser)?;

    let delta: Option<i64> = row.try_get("completed_delta").map_err(ser)?;
    let rating: Option<i64> = row.try_get("completed_rating").map_err(ser)?;
    let completion = match (delta, rating) {
        (Some(delta), Some(rating)) => Some(SessionCompleted {
            correct_count,
            rating_delta: i32_from_i64("completed_delta", delta)?,
            new_rating: u32_from_i64("completed_rating", rating)?,
        }),
        (None, None) => None,
        _ => {
            return Err(StorageError::Serialization(
                "partial completion columns".into(),
            ));
        }
    };

    QuizSession::from_persisted(
        user_id_from_i64(row.try_get::<i64, _>("user_id").map_err(ser)?)?,
        tag_from_row(row)?,
        question_ids,
        answers,
        correct_count,
        active,
        started_at,
        last_answer_at,
        completion,
    )
    .map_err(ser)
}

pub(crate) fn encode_level_stats(stats: &LevelAverages) -> Result<String, StorageError> {
    serde_json::to_string(stats).map_err(ser)
}

pub(crate) fn map_rating_row(row: &sqlx::sqlite::SqliteRow) -> Result<UserRating, StorageError> {
    let level_stats: LevelAverages =
        serde_json::from_str(&row.try_get::<String, _>("level_stats").map_err(ser)?)
            .map_err(ser)?;

    UserRating::from_persisted(
        user_id_from_i64(row.try_get::<i64, _>("user_id").map_err(ser)?)?,
        row.try_get("display_name").map_err(ser)?,
        u32_from_i64("mmr", row.try_get::<i64, _>("mmr").map_err(ser)?)?,
        u32_from_i64(
            "total_tests",
            row.try_get::<i64, _>("total_tests").map_err(ser)?,
        )?,
        row.try_get("last_test_at").map_err(ser)?,
        row.try_get("created_at").map_err(ser)?,
        level_stats,
    )
    .map_err(ser)
}
