use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use lesson_core::model::{CourseId, UserId};
use storage::repository::{CourseRepository, ProgressRepository};
use tracing::warn;

use super::progress::ResumeItem;
use super::saver::DebouncedSaver;
use super::session::WatchSession;
use crate::Clock;
use crate::error::ProgressError;

/// Orchestrates watch-session start, debounced persistence, and the
/// dashboard progress queries.
///
/// This service owns:
/// - the time source (`Clock`)
/// - repository access
/// - the debounced saver
///
/// It does **not** own UI formatting.
#[derive(Clone)]
pub struct ProgressService {
    clock: Clock,
    courses: Arc<dyn CourseRepository>,
    progress: Arc<dyn ProgressRepository>,
    saver: Arc<DebouncedSaver>,
}

impl ProgressService {
    #[must_use]
    pub fn new(
        clock: Clock,
        courses: Arc<dyn CourseRepository>,
        progress: Arc<dyn ProgressRepository>,
    ) -> Self {
        let saver = Arc::new(DebouncedSaver::new(Arc::clone(&progress)));
        Self {
            clock,
            courses,
            progress,
            saver,
        }
    }

    /// Replace the saver with one using the given quiet period.
    #[must_use]
    pub fn with_quiet_period(mut self, quiet: Duration) -> Self {
        self.saver = Arc::new(DebouncedSaver::with_quiet_period(
            Arc::clone(&self.progress),
            quiet,
        ));
        self
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Open a watch session for a learner on a course.
    ///
    /// A missing prior record and a failed record load both start the session
    /// fresh; a load failure is logged and treated as absence so a
    /// persistence hiccup never blocks playback. Only a missing course is an
    /// error.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::CourseNotFound` if the course does not exist
    /// and `ProgressError::Storage` if the catalog read fails.
    pub async fn resume_course(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
    ) -> Result<WatchSession, ProgressError> {
        let course = self
            .courses
            .get_course(course_id)
            .await?
            .ok_or(ProgressError::CourseNotFound)?;

        let prior = match self.progress.load(user_id, course_id).await {
            Ok(found) => found,
            Err(err) => {
                warn!(
                    user = %user_id,
                    course = %course_id,
                    error = %err,
                    "progress load failed; starting fresh"
                );
                None
            }
        };
        let state = prior.map(|record| record.to_state(course.total_modules()));

        Ok(WatchSession::new(user_id.clone(), course, state.as_ref()))
    }

    /// Navigate the session, scheduling a debounced save if it changed.
    pub fn go_to(&self, session: &mut WatchSession, index: usize) {
        if session.go_to(index) {
            self.schedule_save(session);
        }
    }

    /// Navigate forward one module.
    pub fn advance(&self, session: &mut WatchSession) {
        if session.advance() {
            self.schedule_save(session);
        }
    }

    /// Navigate back one module.
    pub fn retreat(&self, session: &mut WatchSession) {
        if session.retreat() {
            self.schedule_save(session);
        }
    }

    /// Position the player without navigation side effects.
    pub fn select_module(&self, session: &mut WatchSession, index: usize) {
        if session.select_module(index) {
            self.schedule_save(session);
        }
    }

    /// Manually mark a module watched.
    pub fn mark_watched(&self, session: &mut WatchSession, index: usize) {
        if session.mark_watched(index) {
            self.schedule_save(session);
        }
    }

    /// Manually mark the current module watched.
    pub fn mark_current_watched(&self, session: &mut WatchSession) {
        if session.mark_current_watched() {
            self.schedule_save(session);
        }
    }

    /// Feed continuous playback time into the session's auto-watch policy.
    pub fn record_playback(&self, session: &mut WatchSession, elapsed: Duration) {
        if session.record_playback(elapsed) {
            self.schedule_save(session);
        }
    }

    /// Write any pending progress immediately. Call on teardown.
    pub async fn flush(&self) {
        self.saver.flush().await;
    }

    /// Latest progress across courses for a learner dashboard, newest first.
    ///
    /// The stored percentage cache is trusted here; it is recomputed from the
    /// watched set on every save.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Storage` on repository failures.
    pub async fn continue_learning(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<ResumeItem>, ProgressError> {
        let records = self.progress.list_for_user(user_id).await?;
        Ok(records
            .into_iter()
            .map(|record| ResumeItem {
                resume_index: record
                    .last_watched_module
                    .and_then(|i| usize::try_from(i).ok())
                    .unwrap_or(0),
                course_id: record.course_id,
                percent: record.progress,
                updated_at: record.updated_at,
            })
            .collect())
    }

    fn schedule_save(&self, session: &WatchSession) {
        self.saver.schedule(session.to_record(self.clock.now()));
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use lesson_core::model::{Course, Milestone, Module, ProgressState, VideoRef};
    use lesson_core::time::fixed_now;
    use storage::repository::{
        InMemoryRepository, ProgressRecord, StorageError,
    };

    fn module(title: &str) -> Module {
        let video = VideoRef::parse(format!("https://videos.example/{title}")).unwrap();
        Module::new(title, video).unwrap()
    }

    fn build_course(id: &str, modules: usize) -> Course {
        let modules = (0..modules).map(|i| module(&format!("m{i}"))).collect();
        Course::new(
            CourseId::new(id).unwrap(),
            "Guitar Basics",
            vec![Milestone::new("Chapter 1", modules).unwrap()],
            fixed_now(),
        )
        .unwrap()
    }

    fn build_service(repo: InMemoryRepository) -> ProgressService {
        let repo = Arc::new(repo);
        ProgressService::new(Clock::Fixed(fixed_now()), repo.clone(), repo)
    }

    #[tokio::test]
    async fn resume_without_prior_record_starts_fresh() {
        let repo = InMemoryRepository::new();
        let course = build_course("guitar-101", 3);
        repo.upsert_course(&course).await.unwrap();

        let service = build_service(repo);
        let session = service
            .resume_course(
                &UserId::new("learner").unwrap(),
                &CourseId::new("guitar-101").unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(session.current_module(), 0);
        assert_eq!(session.progress().percent, 0);
    }

    #[tokio::test]
    async fn resume_restores_persisted_progress() {
        let repo = InMemoryRepository::new();
        let course = build_course("guitar-101", 5);
        repo.upsert_course(&course).await.unwrap();

        let user = UserId::new("learner").unwrap();
        let state = ProgressState::sanitized([0, 2, 4], Some(2), 5, fixed_now());
        let record =
            ProgressRecord::from_state(user.clone(), course.id().clone(), &state, 5);
        repo.save(&record).await.unwrap();

        let service = build_service(repo);
        let session = service.resume_course(&user, course.id()).await.unwrap();

        assert_eq!(
            session.tracker().watched().iter().copied().collect::<Vec<_>>(),
            vec![0, 2, 4]
        );
        assert_eq!(session.current_module(), 2);
        assert_eq!(session.progress().percent, 60);
    }

    #[tokio::test]
    async fn resume_of_unknown_course_is_an_error() {
        let service = build_service(InMemoryRepository::new());
        let err = service
            .resume_course(
                &UserId::new("learner").unwrap(),
                &CourseId::new("nope").unwrap(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ProgressError::CourseNotFound));
    }

    #[tokio::test]
    async fn failed_record_load_starts_fresh() {
        struct BrokenProgress;

        #[async_trait::async_trait]
        impl ProgressRepository for BrokenProgress {
            async fn load(
                &self,
                _user: &UserId,
                _course: &CourseId,
            ) -> Result<Option<ProgressRecord>, StorageError> {
                Err(StorageError::Connection("store unreachable".into()))
            }

            async fn save(&self, _record: &ProgressRecord) -> Result<(), StorageError> {
                Ok(())
            }

            async fn list_for_user(
                &self,
                _user: &UserId,
            ) -> Result<Vec<ProgressRecord>, StorageError> {
                Ok(Vec::new())
            }
        }

        let courses = InMemoryRepository::new();
        let course = build_course("guitar-101", 3);
        courses.upsert_course(&course).await.unwrap();

        let service = ProgressService::new(
            Clock::Fixed(fixed_now()),
            Arc::new(courses),
            Arc::new(BrokenProgress),
        );

        let session = service
            .resume_course(&UserId::new("learner").unwrap(), course.id())
            .await
            .unwrap();
        assert_eq!(session.progress().percent, 0);
        assert!(session.tracker().watched().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn mutations_persist_after_the_quiet_period() {
        let repo = InMemoryRepository::new();
        let course = build_course("guitar-101", 3);
        repo.upsert_course(&course).await.unwrap();

        let user = UserId::new("learner").unwrap();
        let service = build_service(repo.clone());
        let mut session = service.resume_course(&user, course.id()).await.unwrap();

        service.mark_current_watched(&mut session);
        service.advance(&mut session);
        tokio::time::sleep(std::time::Duration::from_secs(2)).await;

        let stored = repo.load(&user, course.id()).await.unwrap().unwrap();
        assert_eq!(stored.watched_videos, vec![0]);
        assert_eq!(stored.last_watched_module, Some(1));
        assert_eq!(stored.progress, 34);
    }

    #[tokio::test]
    async fn flush_persists_without_waiting() {
        let repo = InMemoryRepository::new();
        let course = build_course("guitar-101", 3);
        repo.upsert_course(&course).await.unwrap();

        let user = UserId::new("learner").unwrap();
        let service = build_service(repo.clone());
        let mut session = service.resume_course(&user, course.id()).await.unwrap();

        service.mark_watched(&mut session, 0);
        service.flush().await;

        let stored = repo.load(&user, course.id()).await.unwrap().unwrap();
        assert_eq!(stored.watched_videos, vec![0]);
    }

    #[tokio::test]
    async fn continue_learning_lists_newest_first() {
        let repo = InMemoryRepository::new();
        let user = UserId::new("learner").unwrap();

        let older_state = ProgressState::sanitized(
            [0],
            Some(0),
            4,
            fixed_now() - ChronoDuration::days(3),
        );
        let newer_state = ProgressState::sanitized([0, 1], Some(1), 4, fixed_now());
        repo.save(&ProgressRecord::from_state(
            user.clone(),
            CourseId::new("guitar-101").unwrap(),
            &older_state,
            4,
        ))
        .await
        .unwrap();
        repo.save(&ProgressRecord::from_state(
            user.clone(),
            CourseId::new("piano-201").unwrap(),
            &newer_state,
            4,
        ))
        .await
        .unwrap();

        let service = build_service(repo);
        let items = service.continue_learning(&user).await.unwrap();

        let ids: Vec<_> = items.iter().map(|i| i.course_id.as_str()).collect();
        assert_eq!(ids, vec!["piano-201", "guitar-101"]);
        assert_eq!(items[0].resume_index, 1);
        assert_eq!(items[0].percent, 50);
    }
}
