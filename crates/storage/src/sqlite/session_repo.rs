use quiz_core::model::{QuizSession, UserId, UserRating};
use sqlx::Sqlite;

use super::{
    SqliteRepository,
    mapping::{conn, encode_answers, encode_question_ids, id_i64, map_session_row},
    rating_repo::{insert_rating_if_absent, write_rating},
};
use crate::repository::{SessionPersistence, SessionRepository, StorageError};

pub(crate) async fn write_session<'e, E>(
    executor: E,
    session: &QuizSession,
) -> Result<(), StorageError>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let completion = session.completion();

    sqlx::query(
        r"
            INSERT INTO quiz_sessions (
                user_id, subject, level, question_ids, answers, correct_count,
                active, started_at, last_answer_at, completed_delta, completed_rating
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ON CONFLICT(user_id) DO UPDATE SET
                subject = excluded.subject,
                level = excluded.level,
                question_ids = excluded.question_ids,
                answers = excluded.answers,
                correct_count = excluded.correct_count,
                active = excluded.active,
                started_at = excluded.started_at,
                last_answer_at = excluded.last_answer_at,
                completed_delta = excluded.completed_delta,
                completed_rating = excluded.completed_rating
        ",
    )
    .bind(id_i64("user_id", session.user_id().value())?)
    .bind(session.tag().subject().as_str())
    .bind(session.tag().level().as_str())
    .bind(encode_question_ids(session.question_ids())?)
    .bind(encode_answers(session.answers())?)
    .bind(i64::from(session.correct_count()))
    .bind(session.is_active())
    .bind(session.started_at())
    .bind(session.last_answer_at())
    .bind(completion.map(|c| i64::from(c.rating_delta)))
    .bind(completion.map(|c| i64::from(c.new_rating)))
    .execute(executor)
    .await
    .map_err(conn)?;

    Ok(())
}

#[async_trait::async_trait]
impl SessionRepository for SqliteRepository {
    async fn get_session(&self, user_id: UserId) -> Result<Option<QuizSession>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT
                    user_id, subject, level, question_ids, answers, correct_count,
                    active, started_at, last_answer_at, completed_delta, completed_rating
                FROM quiz_sessions
                WHERE user_id = ?1
            ",
        )
        .bind(id_i64("user_id", user_id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_session_row).transpose()
    }

    async fn upsert_session(&self, session: &QuizSession) -> Result<(), StorageError> {
        write_session(&self.pool, session).await
    }

    async fn delete_session(&self, user_id: UserId) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM quiz_sessions WHERE user_id = ?1")
            .bind(id_i64("user_id", user_id.value())?)
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl SessionPersistence for SqliteRepository {
    async fn begin_session(
        &self,
        session: &QuizSession,
        new_rating: Option<&UserRating>,
    ) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;

        if let Some(rating) = new_rating {
            insert_rating_if_absent(&mut *tx, rating).await?;
        }
        write_session(&mut *tx, session).await?;

        tx.commit().await.map_err(conn)?;
        Ok(())
    }

    async fn commit_completion(
        &self,
        session: &QuizSession,
        rating: &UserRating,
    ) -> Result<(), StorageError> {
        if session.user_id() != rating.user_id() {
            return Err(StorageError::Conflict);
        }

        let completion = session.completion().ok_or(StorageError::Conflict)?;
        let mut tx = self.pool.begin().await.map_err(conn)?;

        // The guard is the first statement so the transaction takes the write
        // lock up front. Only the attempt that is still open may be closed.
        let closed = sqlx::query(
            r"
                UPDATE quiz_sessions SET
                    answers = ?2,
                    correct_count = ?3,
                    active = 0,
                    last_answer_at = ?4,
                    completed_delta = ?5,
                    completed_rating = ?6
                WHERE user_id = ?1 AND active = 1 AND started_at = ?7
            ",
        )
        .bind(id_i64("user_id", session.user_id().value())?)
        .bind(encode_answers(session.answers())?)
        .bind(i64::from(session.correct_count()))
        .bind(session.last_answer_at())
        .bind(i64::from(completion.rating_delta))
        .bind(i64::from(completion.new_rating))
        .bind(session.started_at())
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        if closed.rows_affected() == 0 {
            return Err(StorageError::Conflict);
        }

        write_rating(&mut *tx, rating).await?;

        tx.commit().await.map_err(conn)?;
        Ok(())
    }
}
