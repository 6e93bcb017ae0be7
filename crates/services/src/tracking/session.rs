use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use lesson_core::model::{Course, CourseId, ProgressState, UserId};
use storage::repository::ProgressRecord;

use super::policy::AutoWatchPolicy;
use super::progress::{CourseProgress, MilestoneProgress};
use super::tracker::ProgressTracker;

/// In-memory watch session for one learner on one course.
///
/// Exclusively owned by the UI session that created it; all mutations are
/// synchronous. Mutating methods return true when the session changed in a
/// way worth persisting, which is what drives the debounced save policy.
pub struct WatchSession {
    user_id: UserId,
    course_id: CourseId,
    course: Course,
    tracker: ProgressTracker,
    policy: AutoWatchPolicy,
    viewed_current: Duration,
}

impl WatchSession {
    /// Create a session, resuming from a prior persisted state if present.
    ///
    /// The `user_id` is carried explicitly through every snapshot rather than
    /// read from any ambient context.
    #[must_use]
    pub fn new(user_id: UserId, course: Course, prior: Option<&ProgressState>) -> Self {
        let tracker = ProgressTracker::resume(&course, prior);
        Self {
            user_id,
            course_id: course.id().clone(),
            course,
            tracker,
            policy: AutoWatchPolicy::default(),
            viewed_current: Duration::ZERO,
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: AutoWatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    #[must_use]
    pub fn course_id(&self) -> &CourseId {
        &self.course_id
    }

    #[must_use]
    pub fn course(&self) -> &Course {
        &self.course
    }

    #[must_use]
    pub fn current_module(&self) -> usize {
        self.tracker.current_module()
    }

    #[must_use]
    pub fn tracker(&self) -> &ProgressTracker {
        &self.tracker
    }

    /// Navigate to a module.
    ///
    /// Leaving the current module marks it watched (mark on exit) and resets
    /// the viewing timer. The target module is only selected, never marked.
    /// Out-of-range targets clamp; clamping onto the current module is not an
    /// exit. Returns true if the session changed.
    pub fn go_to(&mut self, index: usize) -> bool {
        let from = self.tracker.current_module();
        if !self.tracker.select_module(index) {
            return false;
        }
        self.tracker.mark_watched(from);
        self.viewed_current = Duration::ZERO;
        true
    }

    /// Navigate forward one module, with mark-on-exit semantics.
    pub fn advance(&mut self) -> bool {
        self.go_to(self.tracker.current_module().saturating_add(1))
    }

    /// Navigate back one module, with mark-on-exit semantics.
    pub fn retreat(&mut self) -> bool {
        self.go_to(self.tracker.current_module().saturating_sub(1))
    }

    /// Select a module without navigation side effects.
    ///
    /// Used for positioning the player on initial render; nothing is marked
    /// watched. Returns true if the current module changed.
    pub fn select_module(&mut self, index: usize) -> bool {
        if self.tracker.select_module(index) {
            self.viewed_current = Duration::ZERO;
            return true;
        }
        false
    }

    /// Record continuous viewing time on the current module.
    ///
    /// Crossing the policy threshold marks the module watched. Returns true
    /// when the mark fired (repeats keep reporting true; marking is
    /// idempotent and the debounce layer coalesces the saves).
    pub fn record_playback(&mut self, elapsed: Duration) -> bool {
        if self.tracker.total_modules() == 0 {
            return false;
        }
        self.viewed_current = self.viewed_current.saturating_add(elapsed);
        if self.policy.reaches_threshold(self.viewed_current) {
            return self.tracker.mark_watched(self.tracker.current_module());
        }
        false
    }

    /// Explicit manual "mark as watched" for the current module.
    pub fn mark_current_watched(&mut self) -> bool {
        self.tracker.mark_watched(self.tracker.current_module())
    }

    /// Explicit manual mark for an arbitrary module; out-of-range indices are
    /// ignored. Returns true whenever the index was valid, even for a repeat.
    pub fn mark_watched(&mut self, index: usize) -> bool {
        self.tracker.mark_watched(index)
    }

    /// Returns a summary of the overall course progress.
    #[must_use]
    pub fn progress(&self) -> CourseProgress {
        self.tracker.progress()
    }

    /// Watched share within a single milestone.
    #[must_use]
    pub fn milestone_progress(&self, milestone: usize) -> Option<MilestoneProgress> {
        self.tracker.milestone_progress(milestone)
    }

    /// Snapshot the session into the persisted record shape, recomputing the
    /// redundant percentage field from the watched set.
    #[must_use]
    pub fn to_record(&self, now: DateTime<Utc>) -> ProgressRecord {
        ProgressRecord::from_state(
            self.user_id.clone(),
            self.course_id.clone(),
            &self.tracker.state(now),
            self.tracker.total_modules(),
        )
    }
}

impl fmt::Debug for WatchSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchSession")
            .field("user_id", &self.user_id)
            .field("course_id", &self.course_id)
            .field("current", &self.tracker.current_module())
            .field("watched", &self.tracker.watched_count())
            .field("total", &self.tracker.total_modules())
            .field("viewed_current", &self.viewed_current)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
