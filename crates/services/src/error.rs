//! Shared error types for the services crate.

use thiserror::Error;

use lesson_core::model::CourseError;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by progress services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("course not found")]
    CourseNotFound,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `CatalogService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CatalogError {
    #[error(transparent)]
    Course(#[from] CourseError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
