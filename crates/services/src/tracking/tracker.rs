use std::collections::BTreeSet;
use std::ops::Range;

use chrono::{DateTime, Utc};
use lesson_core::model::{Course, ProgressState, completion_percent};

use super::progress::{CourseProgress, MilestoneProgress};

/// Tracks which modules of a single course a learner has watched and which
/// module plays next on resume.
///
/// Indices refer to the course's frozen module flattening. Invalid input is
/// clamped or ignored rather than surfaced as an error: progress tracking is
/// a convenience layer and must never block playback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressTracker {
    total: usize,
    milestone_spans: Vec<Range<usize>>,
    watched: BTreeSet<usize>,
    current: usize,
}

impl ProgressTracker {
    /// Start fresh on a course with nothing watched.
    #[must_use]
    pub fn new(course: &Course) -> Self {
        Self::resume(course, None)
    }

    /// Resume from a previously persisted state, if any.
    ///
    /// The prior state is sanitized against the course's module count:
    /// out-of-range watched indices are dropped and an absent or out-of-range
    /// resume index falls back to the first module.
    #[must_use]
    pub fn resume(course: &Course, prior: Option<&ProgressState>) -> Self {
        let total = course.total_modules();
        let milestone_spans = (0..course.milestones().len())
            .filter_map(|i| course.milestone_span(i))
            .collect();
        let (watched, current) = match prior {
            Some(state) => {
                let watched = state
                    .watched
                    .iter()
                    .copied()
                    .filter(|i| *i < total)
                    .collect();
                let current = state.last_watched.filter(|i| *i < total).unwrap_or(0);
                (watched, current)
            }
            None => (BTreeSet::new(), 0),
        };
        Self {
            total,
            milestone_spans,
            watched,
            current,
        }
    }

    #[must_use]
    pub fn total_modules(&self) -> usize {
        self.total
    }

    /// The module the learner is currently on (the resume point).
    #[must_use]
    pub fn current_module(&self) -> usize {
        self.current
    }

    #[must_use]
    pub fn watched(&self) -> &BTreeSet<usize> {
        &self.watched
    }

    #[must_use]
    pub fn watched_count(&self) -> usize {
        self.watched.len()
    }

    /// Move to the given module, clamped to the valid range.
    ///
    /// Out-of-range requests land on the nearest bound instead of failing,
    /// matching Previous/Next being disabled at the boundaries. Selection
    /// never marks anything watched. On an empty course this is a no-op.
    /// Returns true if the current module changed.
    pub fn select_module(&mut self, index: usize) -> bool {
        if self.total == 0 {
            return false;
        }
        let clamped = index.min(self.total - 1);
        if clamped == self.current {
            return false;
        }
        self.current = clamped;
        true
    }

    /// Mark a module watched. Idempotent; out-of-range indices are ignored.
    ///
    /// Returns true whenever the index was valid, even if it was already
    /// watched, so callers can still schedule a persistence save for a
    /// repeated mark.
    pub fn mark_watched(&mut self, index: usize) -> bool {
        if index >= self.total {
            return false;
        }
        self.watched.insert(index);
        true
    }

    /// Step forward one module, stopping at the last.
    pub fn advance(&mut self) -> bool {
        self.select_module(self.current.saturating_add(1))
    }

    /// Step back one module, stopping at the first.
    pub fn retreat(&mut self) -> bool {
        self.select_module(self.current.saturating_sub(1))
    }

    /// Completion percentage, recomputed from the watched set on every call.
    #[must_use]
    pub fn completion_percent(&self) -> u8 {
        completion_percent(self.watched.len(), self.total)
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.watched.len() == self.total
    }

    /// Returns a summary of the overall course progress.
    #[must_use]
    pub fn progress(&self) -> CourseProgress {
        CourseProgress {
            total: self.total,
            watched: self.watched.len(),
            percent: self.completion_percent(),
            is_complete: self.is_complete(),
        }
    }

    /// Watched share within a single milestone, or `None` for an unknown
    /// milestone index.
    #[must_use]
    pub fn milestone_progress(&self, milestone: usize) -> Option<MilestoneProgress> {
        let span = self.milestone_spans.get(milestone)?.clone();
        let total = span.len();
        let watched = self.watched.range(span).count();
        Some(MilestoneProgress {
            milestone,
            total,
            watched,
            percent: completion_percent(watched, total),
        })
    }

    /// Snapshot the tracker into a persistable state.
    #[must_use]
    pub fn state(&self, updated_at: DateTime<Utc>) -> ProgressState {
        ProgressState {
            watched: self.watched.clone(),
            last_watched: if self.total == 0 {
                None
            } else {
                Some(self.current)
            },
            updated_at,
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use lesson_core::model::{CourseId, Milestone, Module, VideoRef};
    use lesson_core::time::fixed_now;

    fn module(title: &str) -> Module {
        let video = VideoRef::parse(format!("https://videos.example/{title}")).unwrap();
        Module::new(title, video).unwrap()
    }

    fn course_with_modules(per_milestone: &[usize]) -> Course {
        let milestones = per_milestone
            .iter()
            .enumerate()
            .map(|(m, count)| {
                let modules = (0..*count).map(|i| module(&format!("m{m}-{i}"))).collect();
                Milestone::new(format!("Milestone {m}"), modules).unwrap()
            })
            .collect();
        Course::new(
            CourseId::new("guitar-101").unwrap(),
            "Guitar Basics",
            milestones,
            fixed_now(),
        )
        .unwrap()
    }

    #[test]
    fn fresh_start_has_nothing_watched() {
        let course = course_with_modules(&[3]);
        let tracker = ProgressTracker::new(&course);

        assert_eq!(tracker.current_module(), 0);
        assert!(tracker.watched().is_empty());
        assert_eq!(tracker.completion_percent(), 0);
    }

    #[test]
    fn marking_first_of_three_reports_34_percent() {
        let course = course_with_modules(&[3]);
        let mut tracker = ProgressTracker::new(&course);

        assert!(tracker.mark_watched(0));
        assert_eq!(tracker.completion_percent(), 34);
    }

    #[test]
    fn mark_watched_is_idempotent() {
        let course = course_with_modules(&[5]);
        let mut tracker = ProgressTracker::new(&course);

        tracker.mark_watched(2);
        let once = tracker.watched().clone();
        tracker.mark_watched(2);

        assert_eq!(tracker.watched(), &once);
        assert_eq!(tracker.watched_count(), 1);
    }

    #[test]
    fn mark_watched_ignores_out_of_range() {
        let course = course_with_modules(&[3]);
        let mut tracker = ProgressTracker::new(&course);

        assert!(!tracker.mark_watched(3));
        assert!(!tracker.mark_watched(99));
        assert!(tracker.watched().is_empty());
    }

    #[test]
    fn completion_never_decreases_as_marks_accumulate() {
        let course = course_with_modules(&[4, 3]);
        let mut tracker = ProgressTracker::new(&course);

        let mut last = tracker.completion_percent();
        for i in [3, 1, 1, 6, 0, 99, 2, 4, 5] {
            tracker.mark_watched(i);
            let now = tracker.completion_percent();
            assert!(now >= last);
            last = now;
        }
        assert_eq!(last, 100);
        assert!(tracker.is_complete());
    }

    #[test]
    fn selection_clamps_to_bounds() {
        let course = course_with_modules(&[5]);
        let mut tracker = ProgressTracker::new(&course);

        tracker.select_module(99);
        assert_eq!(tracker.current_module(), 4);

        tracker.select_module(0);
        tracker.retreat();
        assert_eq!(tracker.current_module(), 0);
    }

    #[test]
    fn selection_does_not_mark_watched() {
        let course = course_with_modules(&[5]);
        let mut tracker = ProgressTracker::new(&course);

        tracker.select_module(3);
        assert!(tracker.watched().is_empty());
    }

    #[test]
    fn advance_and_retreat_stop_at_boundaries() {
        let course = course_with_modules(&[3]);
        let mut tracker = ProgressTracker::new(&course);

        assert!(!tracker.retreat());
        assert_eq!(tracker.current_module(), 0);

        assert!(tracker.advance());
        assert!(tracker.advance());
        assert!(!tracker.advance());
        assert_eq!(tracker.current_module(), 2);
    }

    #[test]
    fn empty_course_is_inert() {
        let course = course_with_modules(&[]);
        let mut tracker = ProgressTracker::new(&course);

        assert_eq!(tracker.completion_percent(), 0);
        assert!(!tracker.is_complete());

        tracker.select_module(5);
        tracker.advance();
        tracker.mark_watched(0);
        assert_eq!(tracker.current_module(), 0);
        assert!(tracker.watched().is_empty());
        assert_eq!(tracker.state(fixed_now()).last_watched, None);
    }

    #[test]
    fn resume_restores_watched_set_and_position() {
        let course = course_with_modules(&[2, 3]);
        let prior = ProgressState::sanitized([0, 2, 4], Some(2), 5, fixed_now());
        let tracker = ProgressTracker::resume(&course, Some(&prior));

        assert_eq!(
            tracker.watched().iter().copied().collect::<Vec<_>>(),
            vec![0, 2, 4]
        );
        assert_eq!(tracker.current_module(), 2);
        assert_eq!(tracker.completion_percent(), 60);
    }

    #[test]
    fn resume_then_advance_leaves_watched_set_alone() {
        let course = course_with_modules(&[3]);
        let prior = ProgressState::sanitized([0], Some(0), 3, fixed_now());
        let mut tracker = ProgressTracker::resume(&course, Some(&prior));

        assert_eq!(tracker.current_module(), 0);
        assert!(tracker.advance());
        assert_eq!(tracker.current_module(), 1);
        assert_eq!(
            tracker.watched().iter().copied().collect::<Vec<_>>(),
            vec![0]
        );
    }

    #[test]
    fn resume_drops_stale_out_of_range_state() {
        let course = course_with_modules(&[2]);
        // A state persisted against an older, larger layout.
        let prior = ProgressState {
            watched: [0, 1, 7].into_iter().collect(),
            last_watched: Some(7),
            updated_at: fixed_now(),
        };
        let tracker = ProgressTracker::resume(&course, Some(&prior));

        assert_eq!(
            tracker.watched().iter().copied().collect::<Vec<_>>(),
            vec![0, 1]
        );
        assert_eq!(tracker.current_module(), 0);
    }

    #[test]
    fn milestone_progress_counts_within_span() {
        let course = course_with_modules(&[2, 3]);
        let mut tracker = ProgressTracker::new(&course);

        tracker.mark_watched(0);
        tracker.mark_watched(2);
        tracker.mark_watched(3);

        let first = tracker.milestone_progress(0).unwrap();
        assert_eq!((first.watched, first.total, first.percent), (1, 2, 50));

        let second = tracker.milestone_progress(1).unwrap();
        assert_eq!((second.watched, second.total, second.percent), (2, 3, 67));

        assert!(tracker.milestone_progress(2).is_none());
    }

    #[test]
    fn state_snapshot_round_trips_through_resume() {
        let course = course_with_modules(&[3]);
        let mut tracker = ProgressTracker::new(&course);
        tracker.mark_watched(0);
        tracker.mark_watched(1);
        tracker.select_module(1);

        let state = tracker.state(fixed_now());
        let restored = ProgressTracker::resume(&course, Some(&state));
        assert_eq!(restored, tracker);
    }
}
