use chrono::{DateTime, Utc};
use lesson_core::model::CourseId;

/// Aggregated view of course progress, useful for UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseProgress {
    pub total: usize,
    pub watched: usize,
    pub percent: u8,
    pub is_complete: bool,
}

/// Watched share of a single milestone, for per-milestone sub-bars.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MilestoneProgress {
    pub milestone: usize,
    pub total: usize,
    pub watched: usize,
    pub percent: u8,
}

/// Presentation-agnostic "continue learning" entry for a learner dashboard.
///
/// This is intentionally **not** a UI view-model:
/// - no pre-formatted strings
/// - no localization assumptions
///
/// The UI may format timestamps (e.g., relative time, locale) as needed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeItem {
    pub course_id: CourseId,
    pub percent: u8,
    pub resume_index: usize,
    pub updated_at: DateTime<Utc>,
}
