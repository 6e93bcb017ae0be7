use std::time::Duration;

/// Decides when continuous viewing auto-marks a module as watched.
///
/// Three triggers produce the same mark-watched effect: reaching the viewing
/// threshold, leaving the module before the threshold (mark on exit), and an
/// explicit manual mark. The triggers are not mutually exclusive; the first
/// to fire wins and repeats are idempotent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoWatchPolicy {
    threshold: Duration,
}

impl AutoWatchPolicy {
    /// Continuous viewing time after which a module counts as watched.
    pub const DEFAULT_THRESHOLD: Duration = Duration::from_secs(30);

    #[must_use]
    pub fn new(threshold: Duration) -> Self {
        Self { threshold }
    }

    #[must_use]
    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    /// True once accumulated continuous viewing reaches the threshold.
    #[must_use]
    pub fn reaches_threshold(&self, viewed: Duration) -> bool {
        viewed >= self.threshold
    }
}

impl Default for AutoWatchPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_THRESHOLD)
    }
}
