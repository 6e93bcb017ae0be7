use std::sync::Arc;

use lesson_core::model::{Course, CourseId, Milestone};
use storage::repository::CourseRepository;

use crate::Clock;
use crate::error::CatalogError;

/// Orchestrates course publishing and catalog reads.
///
/// Publishing freezes the course's module flattening; stored progress refers
/// to those frozen positions.
#[derive(Clone)]
pub struct CatalogService {
    clock: Clock,
    courses: Arc<dyn CourseRepository>,
}

impl CatalogService {
    #[must_use]
    pub fn new(clock: Clock, courses: Arc<dyn CourseRepository>) -> Self {
        Self { clock, courses }
    }

    /// Validate and publish a course, stamping the publish time from the
    /// service clock.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Course` for validation failures.
    /// Returns `CatalogError::Storage` if persistence fails.
    pub async fn publish_course(
        &self,
        id: CourseId,
        title: String,
        milestones: Vec<Milestone>,
    ) -> Result<Course, CatalogError> {
        let course = Course::new(id, title, milestones, self.clock.now())?;
        self.courses.upsert_course(&course).await?;
        Ok(course)
    }

    /// Fetch a course by id.
    ///
    /// Returns `Ok(None)` when the course does not exist.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Storage` if repository access fails.
    pub async fn get_course(&self, id: &CourseId) -> Result<Option<Course>, CatalogError> {
        let course = self.courses.get_course(id).await?;
        Ok(course)
    }

    /// List courses ordered by id, up to the given limit.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Storage` if repository access fails.
    pub async fn list_courses(&self, limit: u32) -> Result<Vec<Course>, CatalogError> {
        let courses = self.courses.list_courses(limit).await?;
        Ok(courses)
    }
}
