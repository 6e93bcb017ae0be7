mod course;
mod ids;
mod progress;

pub use course::{Course, CourseError, Milestone, Module, VideoRef};
pub use ids::{CourseId, InvalidIdError, UserId};
pub use progress::{ProgressState, completion_percent};
