use lesson_core::model::{CourseId, UserId};
use sqlx::Row;

use crate::repository::{ProgressRecord, StorageError};

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn position_to_i64(position: usize) -> Result<i64, StorageError> {
    i64::try_from(position).map_err(|_| StorageError::Serialization("position overflow".into()))
}

/// Encodes the watched-module set as a JSON array for the TEXT column.
pub(crate) fn watched_to_json(watched: &[i64]) -> Result<String, StorageError> {
    serde_json::to_string(watched).map_err(ser)
}

/// Decodes the watched-module JSON column. Corrupt data surfaces as a
/// `Serialization` error; callers degrade to an empty state.
pub(crate) fn watched_from_json(raw: &str) -> Result<Vec<i64>, StorageError> {
    serde_json::from_str(raw).map_err(ser)
}

pub(crate) fn map_progress_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<ProgressRecord, StorageError> {
    let user_id = UserId::new(row.try_get::<String, _>("user_id").map_err(ser)?).map_err(ser)?;
    let course_id =
        CourseId::new(row.try_get::<String, _>("course_id").map_err(ser)?).map_err(ser)?;

    let watched_videos = watched_from_json(&row.try_get::<String, _>("watched_modules").map_err(ser)?)?;

    let progress_i64: i64 = row.try_get("progress").map_err(ser)?;
    let progress = u8::try_from(progress_i64)
        .ok()
        .filter(|p| *p <= 100)
        .ok_or_else(|| StorageError::Serialization(format!("invalid progress: {progress_i64}")))?;

    Ok(ProgressRecord {
        user_id,
        course_id,
        watched_videos,
        progress,
        last_watched_module: row
            .try_get::<Option<i64>, _>("last_watched_module")
            .map_err(ser)?,
        updated_at: row.try_get("updated_at").map_err(ser)?,
    })
}
