use std::collections::HashMap;

use quiz_core::model::{Level, LevelTag, QuestionId, QuestionItem, Subject};
use sqlx::Row;

use super::{
    SqliteRepository,
    mapping::{conn, id_i64, map_question_row, ser},
};
use crate::repository::{QuestionRepository, StorageError};

#[async_trait::async_trait]
impl QuestionRepository for SqliteRepository {
    async fn upsert_question(&self, question: &QuestionItem) -> Result<(), StorageError> {
        let [option1, option2, option3, option4] = question.options();

        sqlx::query(
            r"
                INSERT INTO questions (
                    id, subject, level, question_text,
                    option1, option2, option3, option4, correct_option
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                ON CONFLICT(id) DO UPDATE SET
                    subject = excluded.subject,
                    level = excluded.level,
                    question_text = excluded.question_text,
                    option1 = excluded.option1,
                    option2 = excluded.option2,
                    option3 = excluded.option3,
                    option4 = excluded.option4,
                    correct_option = excluded.correct_option
            ",
        )
        .bind(id_i64("question_id", question.id().value())?)
        .bind(question.tag().subject().as_str())
        .bind(question.tag().level().as_str())
        .bind(question.text())
        .bind(option1.as_str())
        .bind(option2.as_str())
        .bind(option3.as_str())
        .bind(option4.as_str())
        .bind(i64::from(question.correct_option().value()))
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn query_questions(&self, tag: &LevelTag) -> Result<Vec<QuestionItem>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT
                    id, subject, level, question_text,
                    option1, option2, option3, option4, correct_option
                FROM questions
                WHERE subject = ?1 AND level = ?2
                ORDER BY id ASC
            ",
        )
        .bind(tag.subject().as_str())
        .bind(tag.level().as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_question_row(&row)?);
        }
        Ok(out)
    }

    async fn get_questions(&self, ids: &[QuestionId]) -> Result<Vec<QuestionItem>, StorageError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut sql = String::from(
            r"
                SELECT
                    id, subject, level, question_text,
                    option1, option2, option3, option4, correct_option
                FROM questions
                WHERE id IN (
            ",
        );
        for i in 0..ids.len() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push('?');
            sql.push_str(&(i + 1).to_string());
        }
        sql.push(')');

        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(id_i64("question_id", id.value())?);
        }

        let rows = query.fetch_all(&self.pool).await.map_err(conn)?;
        let mut by_id = HashMap::with_capacity(rows.len());
        for row in rows {
            let question = map_question_row(&row)?;
            by_id.insert(question.id(), question);
        }

        ids.iter()
            .map(|id| by_id.get(id).cloned().ok_or(StorageError::NotFound))
            .collect()
    }

    async fn pool_sizes(&self) -> Result<Vec<(LevelTag, usize)>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT subject, level, COUNT(*) AS total
                FROM questions
                GROUP BY subject, level
                ORDER BY subject ASC,
                    CASE level WHEN 'junior' THEN 0 WHEN 'middle' THEN 1 ELSE 2 END ASC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let subject = Subject::new(row.try_get::<String, _>("subject").map_err(ser)?)
                .map_err(ser)?;
            let level = row
                .try_get::<String, _>("level")
                .map_err(ser)?
                .parse::<Level>()
                .map_err(ser)?;
            let total: i64 = row.try_get("total").map_err(ser)?;
            let total = usize::try_from(total).map_err(ser)?;
            out.push((LevelTag::new(subject, level), total));
        }
        Ok(out)
    }
}
