use std::fmt;
use std::sync::Arc;

/// Phases of a single fetch.
///
/// Connecting → Downloading → Committing → Completed, or Failed from any
/// phase before Completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchPhase {
    /// Waiting for the transport to open the body stream.
    #[default]
    Connecting,

    /// Streaming bytes into the staging file.
    Downloading,

    /// Renaming the staging file over the destination.
    Committing,

    Completed,

    /// The fetch gave up; nothing was placed.
    Failed,
}

impl fmt::Display for FetchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchPhase::Connecting => write!(f, "Connecting"),
            FetchPhase::Downloading => write!(f, "Downloading"),
            FetchPhase::Committing => write!(f, "Committing"),
            FetchPhase::Completed => write!(f, "Completed"),
            FetchPhase::Failed => write!(f, "Failed"),
        }
    }
}

/// Snapshot passed to progress callbacks.
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    pub url:              String,
    pub phase:            FetchPhase,
    pub bytes_downloaded: u64,
    /// Known only when the server sent Content-Length.
    pub total_bytes:      Option<u64>,
}

pub type ProgressCallback = Arc<dyn Fn(&Progress) + Send + Sync>;
