use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use lesson_core::model::{Course, CourseId, ProgressState, UserId};

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Persisted shape for a learner's per-course progress.
///
/// This mirrors the wire contract of the progress endpoint so repositories
/// can serialize/deserialize without leaking storage concerns into the
/// domain layer. Indices refer to the course's frozen module flattening;
/// `progress` is a redundant cache of the derived completion percentage and
/// is recomputed on every write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    pub user_id: UserId,
    pub course_id: CourseId,
    /// Unordered watched module indices.
    pub watched_videos: Vec<i64>,
    /// Completion percentage in `[0, 100]`.
    pub progress: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_watched_module: Option<i64>,
    pub updated_at: DateTime<Utc>,
}

impl ProgressRecord {
    /// Snapshot domain progress state into the persisted shape, recomputing
    /// the redundant percentage from the watched set.
    #[must_use]
    pub fn from_state(
        user_id: UserId,
        course_id: CourseId,
        state: &ProgressState,
        total_modules: usize,
    ) -> Self {
        Self {
            user_id,
            course_id,
            watched_videos: state
                .watched
                .iter()
                .filter_map(|i| i64::try_from(*i).ok())
                .collect(),
            progress: state.completion_percent(total_modules),
            last_watched_module: state.last_watched.and_then(|i| i64::try_from(i).ok()),
            updated_at: state.updated_at,
        }
    }

    /// Convert the record back into domain progress state.
    ///
    /// Indices outside `[0, total_modules)` are dropped rather than surfaced
    /// as errors; a damaged record degrades toward an empty state.
    #[must_use]
    pub fn to_state(&self, total_modules: usize) -> ProgressState {
        ProgressState::sanitized(
            self.watched_videos.iter().copied(),
            self.last_watched_module,
            total_modules,
            self.updated_at,
        )
    }
}

/// Repository contract for the course catalog.
///
/// The catalog is read-mostly from the tracker's perspective; `upsert_course`
/// exists for publishing and seeding.
#[async_trait]
pub trait CourseRepository: Send + Sync {
    /// Persist or replace a course, including its milestone/module layout.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the course cannot be stored.
    async fn upsert_course(&self, course: &Course) -> Result<(), StorageError>;

    /// Fetch a course by id. Returns `Ok(None)` when the course does not
    /// exist.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn get_course(&self, id: &CourseId) -> Result<Option<Course>, StorageError>;

    /// List courses ordered by id, up to the given limit.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn list_courses(&self, limit: u32) -> Result<Vec<Course>, StorageError>;
}

/// Progress store keyed by (user, course).
///
/// Absence on load is a normal outcome, not an error. Saves are idempotent
/// upserts with last-write-wins semantics; there is no merge.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Fetch the progress record for a (user, course) pair, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures; a missing record is
    /// `Ok(None)`.
    async fn load(
        &self,
        user: &UserId,
        course: &CourseId,
    ) -> Result<Option<ProgressRecord>, StorageError>;

    /// Upsert the record under its (user, course) key, overwriting any
    /// earlier save unconditionally.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be stored.
    async fn save(&self, record: &ProgressRecord) -> Result<(), StorageError>;

    /// All progress records for a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn list_for_user(&self, user: &UserId) -> Result<Vec<ProgressRecord>, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    courses: Arc<Mutex<HashMap<CourseId, Course>>>,
    progress: Arc<Mutex<HashMap<(UserId, CourseId), ProgressRecord>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self {
            courses: Arc::new(Mutex::new(HashMap::new())),
            progress: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

#[async_trait]
impl CourseRepository for InMemoryRepository {
    async fn upsert_course(&self, course: &Course) -> Result<(), StorageError> {
        let mut guard = self
            .courses
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(course.id().clone(), course.clone());
        Ok(())
    }

    async fn get_course(&self, id: &CourseId) -> Result<Option<Course>, StorageError> {
        let guard = self
            .courses
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(id).cloned())
    }

    async fn list_courses(&self, limit: u32) -> Result<Vec<Course>, StorageError> {
        let guard = self
            .courses
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut courses: Vec<Course> = guard.values().cloned().collect();
        courses.sort_by(|a, b| a.id().as_str().cmp(b.id().as_str()));
        courses.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(courses)
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn load(
        &self,
        user: &UserId,
        course: &CourseId,
    ) -> Result<Option<ProgressRecord>, StorageError> {
        let guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(&(user.clone(), course.clone())).cloned())
    }

    async fn save(&self, record: &ProgressRecord) -> Result<(), StorageError> {
        let mut guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(
            (record.user_id.clone(), record.course_id.clone()),
            record.clone(),
        );
        Ok(())
    }

    async fn list_for_user(&self, user: &UserId) -> Result<Vec<ProgressRecord>, StorageError> {
        let guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut records: Vec<ProgressRecord> = guard
            .values()
            .filter(|r| &r.user_id == user)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(records)
    }
}

/// Aggregates catalog and progress repositories behind trait objects for easy
/// backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub courses: Arc<dyn CourseRepository>,
    pub progress: Arc<dyn ProgressRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let courses: Arc<dyn CourseRepository> = Arc::new(repo.clone());
        let progress: Arc<dyn ProgressRepository> = Arc::new(repo);
        Self { courses, progress }
    }
}
