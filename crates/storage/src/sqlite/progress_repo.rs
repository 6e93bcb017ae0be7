use lesson_core::model::{CourseId, UserId};

use super::SqliteRepository;
use super::mapping::{map_progress_row, watched_to_json};
use crate::repository::{ProgressRecord, ProgressRepository, StorageError};

fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait::async_trait]
impl ProgressRepository for SqliteRepository {
    async fn load(
        &self,
        user: &UserId,
        course: &CourseId,
    ) -> Result<Option<ProgressRecord>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT user_id, course_id, watched_modules, progress, last_watched_module, updated_at
            FROM course_progress
            WHERE user_id = ?1 AND course_id = ?2
            ",
        )
        .bind(user.as_str())
        .bind(course.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        match row {
            Some(row) => map_progress_row(&row).map(Some),
            None => Ok(None),
        }
    }

    async fn save(&self, record: &ProgressRecord) -> Result<(), StorageError> {
        let watched = watched_to_json(&record.watched_videos)?;

        sqlx::query(
            r"
            INSERT INTO course_progress
                (user_id, course_id, watched_modules, progress, last_watched_module, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(user_id, course_id) DO UPDATE SET
                watched_modules = excluded.watched_modules,
                progress = excluded.progress,
                last_watched_module = excluded.last_watched_module,
                updated_at = excluded.updated_at
            ",
        )
        .bind(record.user_id.as_str())
        .bind(record.course_id.as_str())
        .bind(watched)
        .bind(i64::from(record.progress))
        .bind(record.last_watched_module)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn list_for_user(&self, user: &UserId) -> Result<Vec<ProgressRecord>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT user_id, course_id, watched_modules, progress, last_watched_module, updated_at
            FROM course_progress
            WHERE user_id = ?1
            ORDER BY updated_at DESC
            ",
        )
        .bind(user.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            records.push(map_progress_row(&row)?);
        }
        Ok(records)
    }
}
