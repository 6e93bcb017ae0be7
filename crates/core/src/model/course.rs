use chrono::{DateTime, Utc};
use std::ops::Range;
use thiserror::Error;
use url::Url;

use crate::model::ids::CourseId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CourseError {
    #[error("course title cannot be empty")]
    EmptyCourseTitle,

    #[error("milestone title cannot be empty")]
    EmptyMilestoneTitle,

    #[error("module title cannot be empty")]
    EmptyModuleTitle,

    #[error("video reference cannot be empty")]
    EmptyVideoRef,

    #[error("video reference is not a valid URL: {0}")]
    InvalidVideoRef(String),
}

//
// ─── VIDEO REFERENCE ───────────────────────────────────────────────────────────
//

/// Opaque reference to a module's playable content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoRef(Url);

impl VideoRef {
    /// Parses a video reference from a URL string.
    ///
    /// # Errors
    ///
    /// Returns `CourseError::EmptyVideoRef` for empty input and
    /// `CourseError::InvalidVideoRef` when the input is not a valid URL.
    pub fn parse(raw: impl AsRef<str>) -> Result<Self, CourseError> {
        let s = raw.as_ref().trim();
        if s.is_empty() {
            return Err(CourseError::EmptyVideoRef);
        }
        let url = Url::parse(s).map_err(|_| CourseError::InvalidVideoRef(s.to_owned()))?;
        Ok(Self(url))
    }

    #[must_use]
    pub fn as_url(&self) -> &Url {
        &self.0
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

//
// ─── MODULE ────────────────────────────────────────────────────────────────────
//

/// The smallest playable unit of a course (one video).
///
/// A module has no identity of its own; its stable id is its position in the
/// course's frozen flattening.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    title: String,
    video: VideoRef,
}

impl Module {
    /// Creates a new Module.
    ///
    /// # Errors
    ///
    /// Returns `CourseError::EmptyModuleTitle` if the title is empty or
    /// whitespace-only.
    pub fn new(title: impl Into<String>, video: VideoRef) -> Result<Self, CourseError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(CourseError::EmptyModuleTitle);
        }
        Ok(Self {
            title: title.trim().to_owned(),
            video,
        })
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn video(&self) -> &VideoRef {
        &self.video
    }
}

//
// ─── MILESTONE ─────────────────────────────────────────────────────────────────
//

/// An ordered group of modules (a chapter).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Milestone {
    title: String,
    modules: Vec<Module>,
}

impl Milestone {
    /// Creates a new Milestone. The module list may be empty.
    ///
    /// # Errors
    ///
    /// Returns `CourseError::EmptyMilestoneTitle` if the title is empty or
    /// whitespace-only.
    pub fn new(title: impl Into<String>, modules: Vec<Module>) -> Result<Self, CourseError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(CourseError::EmptyMilestoneTitle);
        }
        Ok(Self {
            title: title.trim().to_owned(),
            modules,
        })
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    #[must_use]
    pub fn module_count(&self) -> usize {
        self.modules.len()
    }
}

//
// ─── COURSE ────────────────────────────────────────────────────────────────────
//

/// A published course: ordered milestones of ordered modules.
///
/// Milestone order then module order defines the global module index space.
/// That flattening is frozen at `published_at`; stored progress refers to
/// these frozen positions, so later catalog edits never reinterpret old
/// indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Course {
    id: CourseId,
    title: String,
    milestones: Vec<Milestone>,
    published_at: DateTime<Utc>,
}

impl Course {
    /// Creates a new Course. A course with zero modules is valid.
    ///
    /// # Errors
    ///
    /// Returns `CourseError::EmptyCourseTitle` if the title is empty or
    /// whitespace-only.
    pub fn new(
        id: CourseId,
        title: impl Into<String>,
        milestones: Vec<Milestone>,
        published_at: DateTime<Utc>,
    ) -> Result<Self, CourseError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(CourseError::EmptyCourseTitle);
        }
        Ok(Self {
            id,
            title: title.trim().to_owned(),
            milestones,
            published_at,
        })
    }

    #[must_use]
    pub fn id(&self) -> &CourseId {
        &self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn milestones(&self) -> &[Milestone] {
        &self.milestones
    }

    #[must_use]
    pub fn published_at(&self) -> DateTime<Utc> {
        self.published_at
    }

    /// Total module count across all milestones.
    #[must_use]
    pub fn total_modules(&self) -> usize {
        self.milestones.iter().map(Milestone::module_count).sum()
    }

    /// Modules in global index order: milestones in document order, modules
    /// within each milestone in document order.
    pub fn modules(&self) -> impl Iterator<Item = &Module> {
        self.milestones.iter().flat_map(|m| m.modules.iter())
    }

    /// The module at the given global index, if any.
    #[must_use]
    pub fn module_at(&self, index: usize) -> Option<&Module> {
        self.modules().nth(index)
    }

    /// The range of global indices covered by the given milestone.
    #[must_use]
    pub fn milestone_span(&self, milestone: usize) -> Option<Range<usize>> {
        let mut start = 0;
        for (i, m) in self.milestones.iter().enumerate() {
            let end = start + m.module_count();
            if i == milestone {
                return Some(start..end);
            }
            start = end;
        }
        None
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
