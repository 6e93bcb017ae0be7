#![forbid(unsafe_code)]

pub mod app_services;
pub mod catalog;
pub mod error;
pub mod tracking;

pub use lesson_core::Clock;

pub use app_services::AppServices;
pub use catalog::CatalogService;
pub use error::{AppServicesError, CatalogError, ProgressError};

pub use tracking::{
    AutoWatchPolicy, CourseProgress, DebouncedSaver, MilestoneProgress, ProgressService,
    ProgressTracker, ResumeItem, WatchSession,
};
