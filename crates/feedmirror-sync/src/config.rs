use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Datelike, Utc};

use crate::catalog::FeedVersion;

/// First year the NVD published a yearly feed.
pub const START_YEAR: i32 = 2002;

/// How recent the modified sidecar may be before a run is skipped outright.
pub const RECHECK_WINDOW: Duration = Duration::from_secs(2 * 60 * 60);

/// Total verification attempts per yearly payload.
pub const VERIFY_ATTEMPTS: u32 = 3;

/// Base pause before re-fetching a payload that failed verification.
pub const RETRY_BACKOFF: Duration = Duration::from_secs(1);

/// Immutable run configuration, resolved once at startup.
#[derive(Debug, Clone)]
pub struct MirrorConfig {
    pub output_dir:      PathBuf,
    pub versions:        Vec<FeedVersion>,
    /// Overrides each version's default publication root.
    pub source_root:     Option<String>,
    pub start_year:      i32,
    /// Wall-clock instant the run started; also fixes the last year mirrored.
    pub started_at:      DateTime<Utc>,
    pub recheck_window:  Duration,
    pub verify_attempts: u32,
    pub retry_backoff:   Duration,
}

impl MirrorConfig {
    pub fn new(output_dir: impl Into<PathBuf>, versions: Vec<FeedVersion>) -> Self {
        Self {
            output_dir: output_dir.into(),
            versions,
            source_root: None,
            start_year: START_YEAR,
            started_at: Utc::now(),
            recheck_window: RECHECK_WINDOW,
            verify_attempts: VERIFY_ATTEMPTS,
            retry_backoff: RETRY_BACKOFF,
        }
    }

    pub fn source_root(mut self, root: impl Into<String>) -> Self {
        self.source_root = Some(root.into());
        self
    }

    pub fn start_year(mut self, year: i32) -> Self {
        self.start_year = year;
        self
    }

    /// Pin the run clock, e.g. for reproducible tests.
    pub fn started_at(mut self, at: DateTime<Utc>) -> Self {
        self.started_at = at;
        self
    }

    pub fn recheck_window(mut self, window: Duration) -> Self {
        self.recheck_window = window;
        self
    }

    pub fn verify_attempts(mut self, attempts: u32) -> Self {
        self.verify_attempts = attempts.max(1);
        self
    }

    pub fn retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub fn current_year(&self) -> i32 { self.started_at.year() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_defaults() {
        let config = MirrorConfig::new("/var/lib/nvd", vec![FeedVersion::Json11]);
        assert_eq!(config.start_year, 2002);
        assert_eq!(config.recheck_window, Duration::from_secs(7200));
        assert_eq!(config.verify_attempts, 3);
        assert!(config.source_root.is_none());
    }

    #[test]
    fn test_current_year_follows_pinned_clock() {
        let at = Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 59).unwrap();
        let config = MirrorConfig::new("/tmp/m", vec![]).started_at(at);
        assert_eq!(config.current_year(), 2024);
    }

    #[test]
    fn test_at_least_one_attempt() {
        let config = MirrorConfig::new("/tmp/m", vec![]).verify_attempts(0);
        assert_eq!(config.verify_attempts, 1);
    }
}
