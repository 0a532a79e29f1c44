use quiz_core::model::{UserId, UserRating};
use sqlx::Sqlite;

use super::{
    SqliteRepository,
    mapping::{conn, encode_level_stats, id_i64, map_rating_row},
};
use crate::repository::{RatingRepository, StorageError};

const RATING_COLUMNS: &str =
    "user_id, display_name, mmr, total_tests, last_test_at, created_at, level_stats";

pub(crate) async fn write_rating<'e, E>(
    executor: E,
    rating: &UserRating,
) -> Result<(), StorageError>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r"
            INSERT INTO user_ratings (
                user_id, display_name, mmr, total_tests, last_test_at, created_at, level_stats
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(user_id) DO UPDATE SET
                -- keep created_at from the original insert
                display_name = excluded.display_name,
                mmr = excluded.mmr,
                total_tests = excluded.total_tests,
                last_test_at = excluded.last_test_at,
                level_stats = excluded.level_stats
        ",
    )
    .bind(id_i64("user_id", rating.user_id().value())?)
    .bind(rating.display_name())
    .bind(i64::from(rating.mmr()))
    .bind(i64::from(rating.total_tests()))
    .bind(rating.last_test_at())
    .bind(rating.created_at())
    .bind(encode_level_stats(rating.level_stats())?)
    .execute(executor)
    .await
    .map_err(conn)?;

    Ok(())
}

pub(crate) async fn insert_rating_if_absent<'e, E>(
    executor: E,
    rating: &UserRating,
) -> Result<(), StorageError>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r"
            INSERT INTO user_ratings (
                user_id, display_name, mmr, total_tests, last_test_at, created_at, level_stats
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(user_id) DO NOTHING
        ",
    )
    .bind(id_i64("user_id", rating.user_id().value())?)
    .bind(rating.display_name())
    .bind(i64::from(rating.mmr()))
    .bind(i64::from(rating.total_tests()))
    .bind(rating.last_test_at())
    .bind(rating.created_at())
    .bind(encode_level_stats(rating.level_stats())?)
    .execute(executor)
    .await
    .map_err(conn)?;

    Ok(())
}

#[async_trait::async_trait]
impl RatingRepository for SqliteRepository {
    async fn get_rating(&self, user_id: UserId) -> Result<Option<UserRating>, StorageError> {
        let sql = format!("SELECT {RATING_COLUMNS} FROM user_ratings WHERE user_id = ?1");
        let row = sqlx::query(&sql)
            .bind(id_i64("user_id", user_id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        row.as_ref().map(map_rating_row).transpose()
    }

    async fn upsert_rating(&self, rating: &UserRating) -> Result<(), StorageError> {
        write_rating(&self.pool, rating).await
    }

    async fn list_top_ratings(&self, limit: u32) -> Result<Vec<UserRating>, StorageError> {
        let sql = format!(
            "SELECT {RATING_COLUMNS} FROM user_ratings
             WHERE total_tests > 0
             ORDER BY mmr DESC, last_test_at ASC, user_id ASC
             LIMIT ?1"
        );
        let rows = sqlx::query(&sql)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_rating_row(&row)?);
        }
        Ok(out)
    }
}
