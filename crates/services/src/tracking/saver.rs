use std::sync::{Arc, Mutex};
use std::time::Duration;

use storage::repository::{ProgressRecord, ProgressRepository};
use tokio::task::JoinHandle;
use tracing::warn;

/// Trailing-edge debounce for progress saves.
///
/// Each mutation replaces the pending snapshot and restarts the quiet-period
/// timer, so a rapid burst of changes produces one save carrying the latest
/// state. Save failures are logged and dropped; the next mutation schedules a
/// fresh attempt, so there is no retry queue.
pub struct DebouncedSaver {
    quiet: Duration,
    repo: Arc<dyn ProgressRepository>,
    pending: Arc<Mutex<Option<ProgressRecord>>>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl DebouncedSaver {
    /// Quiet period after the last mutation before a save is issued.
    pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_secs(1);

    #[must_use]
    pub fn new(repo: Arc<dyn ProgressRepository>) -> Self {
        Self::with_quiet_period(repo, Self::DEFAULT_QUIET_PERIOD)
    }

    #[must_use]
    pub fn with_quiet_period(repo: Arc<dyn ProgressRepository>, quiet: Duration) -> Self {
        Self {
            quiet,
            repo,
            pending: Arc::new(Mutex::new(None)),
            timer: Mutex::new(None),
        }
    }

    /// Replace the pending snapshot and restart the quiet-period timer.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule(&self, record: ProgressRecord) {
        if let Ok(mut pending) = self.pending.lock() {
            *pending = Some(record);
        }

        let repo = Arc::clone(&self.repo);
        let pending = Arc::clone(&self.pending);
        let quiet = self.quiet;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(quiet).await;
            let snapshot = pending.lock().ok().and_then(|mut p| p.take());
            if let Some(record) = snapshot {
                persist(repo.as_ref(), &record).await;
            }
        });
        self.swap_timer(Some(handle));
    }

    /// Cancel the timer and write any pending snapshot immediately.
    ///
    /// Call on teardown so the last quiet period of state is not lost.
    pub async fn flush(&self) {
        self.swap_timer(None);
        let snapshot = self.pending.lock().ok().and_then(|mut p| p.take());
        if let Some(record) = snapshot {
            persist(self.repo.as_ref(), &record).await;
        }
    }

    /// True while a mutation is waiting out the quiet period.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.pending.lock().map(|p| p.is_some()).unwrap_or(false)
    }

    fn swap_timer(&self, next: Option<JoinHandle<()>>) {
        if let Ok(mut timer) = self.timer.lock() {
            if let Some(old) = timer.take() {
                old.abort();
            }
            *timer = next;
        }
    }
}

impl Drop for DebouncedSaver {
    // Dropping without flush() loses at most one quiet period of state.
    fn drop(&mut self) {
        self.swap_timer(None);
    }
}

async fn persist(repo: &dyn ProgressRepository, record: &ProgressRecord) {
    if let Err(err) = repo.save(record).await {
        warn!(
            user = %record.user_id,
            course = %record.course_id,
            error = %err,
            "progress save failed; next change will retry"
        );
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use lesson_core::model::{CourseId, ProgressState, UserId};
    use lesson_core::time::fixed_now;
    use std::sync::atomic::{AtomicU32, Ordering};
    use storage::repository::StorageError;

    #[derive(Default)]
    struct RecordingRepo {
        saves: Mutex<Vec<ProgressRecord>>,
        failures_remaining: AtomicU32,
        attempts: AtomicU32,
    }

    impl RecordingRepo {
        fn failing(times: u32) -> Self {
            Self {
                failures_remaining: AtomicU32::new(times),
                ..Self::default()
            }
        }

        fn saved(&self) -> Vec<ProgressRecord> {
            self.saves.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl ProgressRepository for RecordingRepo {
        async fn load(
            &self,
            _user: &UserId,
            _course: &CourseId,
        ) -> Result<Option<ProgressRecord>, StorageError> {
            Ok(None)
        }

        async fn save(&self, record: &ProgressRecord) -> Result<(), StorageError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            if self.failures_remaining.load(Ordering::SeqCst) > 0 {
                self.failures_remaining.fetch_sub(1, Ordering::SeqCst);
                return Err(StorageError::Connection("store unreachable".into()));
            }
            self.saves.lock().unwrap().push(record.clone());
            Ok(())
        }

        async fn list_for_user(
            &self,
            _user: &UserId,
        ) -> Result<Vec<ProgressRecord>, StorageError> {
            Ok(Vec::new())
        }
    }

    fn build_record(watched: &[i64]) -> ProgressRecord {
        let state = ProgressState::sanitized(
            watched.iter().copied(),
            watched.last().copied(),
            5,
            fixed_now(),
        );
        ProgressRecord::from_state(
            UserId::new("learner").unwrap(),
            CourseId::new("guitar-101").unwrap(),
            &state,
            5,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_mutations_coalesce_into_one_save() {
        let repo = Arc::new(RecordingRepo::default());
        let saver = DebouncedSaver::with_quiet_period(repo.clone(), Duration::from_secs(1));

        for end in 1..=5 {
            let watched: Vec<i64> = (0..end).collect();
            saver.schedule(build_record(&watched));
        }
        assert!(saver.has_pending());

        tokio::time::sleep(Duration::from_secs(2)).await;

        let saved = repo.saved();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].watched_videos, vec![0, 1, 2, 3, 4]);
        assert!(!saver.has_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn timer_restarts_on_each_mutation() {
        let repo = Arc::new(RecordingRepo::default());
        let saver = DebouncedSaver::with_quiet_period(repo.clone(), Duration::from_secs(1));

        saver.schedule(build_record(&[0]));
        tokio::time::sleep(Duration::from_millis(600)).await;

        saver.schedule(build_record(&[0, 1]));
        tokio::time::sleep(Duration::from_millis(600)).await;
        // 1.2s since the first schedule, 0.6s since the second: still quiet.
        assert!(repo.saved().is_empty());

        tokio::time::sleep(Duration::from_millis(500)).await;
        let saved = repo.saved();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].watched_videos, vec![0, 1]);
    }

    #[tokio::test(start_paused = true)]
    async fn flush_writes_latest_state_immediately() {
        let repo = Arc::new(RecordingRepo::default());
        let saver = DebouncedSaver::with_quiet_period(repo.clone(), Duration::from_secs(1));

        saver.schedule(build_record(&[0]));
        saver.schedule(build_record(&[0, 1]));
        saver.flush().await;

        let saved = repo.saved();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].watched_videos, vec![0, 1]);
        assert!(!saver.has_pending());

        // Nothing left for the aborted timer to write.
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(repo.saved().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn flush_without_pending_is_a_no_op() {
        let repo = Arc::new(RecordingRepo::default());
        let saver = DebouncedSaver::with_quiet_period(repo.clone(), Duration::from_secs(1));

        saver.flush().await;
        assert_eq!(repo.attempts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_save_is_dropped_and_next_change_retries() {
        let repo = Arc::new(RecordingRepo::failing(1));
        let saver = DebouncedSaver::with_quiet_period(repo.clone(), Duration::from_secs(1));

        saver.schedule(build_record(&[0]));
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(repo.attempts.load(Ordering::SeqCst), 1);
        assert!(repo.saved().is_empty());

        saver.schedule(build_record(&[0, 1]));
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(repo.attempts.load(Ordering::SeqCst), 2);
        let saved = repo.saved();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].watched_videos, vec![0, 1]);
    }
}
