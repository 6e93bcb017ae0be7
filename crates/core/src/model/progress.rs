use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

/// Derived completion percentage for a watched count out of a total.
///
/// An empty course reports 0 rather than dividing by zero. Uses ceiling
/// division: 1 of 3 modules is 34.
#[must_use]
pub fn completion_percent(watched: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let watched = watched.min(total);
    let percent = (watched * 100).div_ceil(total);
    u8::try_from(percent).unwrap_or(100)
}

/// Watched-set snapshot for one (user, course) pair.
///
/// Plain carrier between the persistence layer and the tracker. Build it via
/// [`ProgressState::sanitized`] when the input comes from storage so that
/// every index is known to be inside the course's module range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressState {
    /// Watched module indices into the course's frozen flattening.
    pub watched: BTreeSet<usize>,
    /// The module to resume into, when known.
    pub last_watched: Option<usize>,
    pub updated_at: DateTime<Utc>,
}

impl ProgressState {
    /// A fresh state with nothing watched.
    #[must_use]
    pub fn empty(updated_at: DateTime<Utc>) -> Self {
        Self {
            watched: BTreeSet::new(),
            last_watched: None,
            updated_at,
        }
    }

    /// Rebuilds a state against a known module count.
    ///
    /// Negative or out-of-range watched indices are dropped and an
    /// out-of-range resume index collapses to `None`, so malformed persisted
    /// data degrades toward a fresh state instead of failing.
    #[must_use]
    pub fn sanitized(
        watched: impl IntoIterator<Item = i64>,
        last_watched: Option<i64>,
        total_modules: usize,
        updated_at: DateTime<Utc>,
    ) -> Self {
        let watched = watched
            .into_iter()
            .filter_map(|i| usize::try_from(i).ok())
            .filter(|i| *i < total_modules)
            .collect();
        let last_watched = last_watched
            .and_then(|i| usize::try_from(i).ok())
            .filter(|i| *i < total_modules);
        Self {
            watched,
            last_watched,
            updated_at,
        }
    }

    /// Completion percentage of this state for a course with the given module
    /// count. Recomputed from the watched set on every call.
    #[must_use]
    pub fn completion_percent(&self, total_modules: usize) -> u8 {
        completion_percent(self.watched.len(), total_modules)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
