use std::fmt;
use std::io;
use std::path::PathBuf;

use feedmirror_fetch::FetchError;
use thiserror::Error;

/// Which sidecar field failed and why.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    MissingField,
    MalformedTimestamp,
    MalformedInteger,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseErrorKind::MissingField => write!(f, "missing field"),
            ParseErrorKind::MalformedTimestamp => write!(f, "malformed timestamp"),
            ParseErrorKind::MalformedInteger => write!(f, "malformed integer"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct ParseError {
    pub kind:  ParseErrorKind,
    pub field: &'static str,
    /// Offending raw value, absent for missing fields.
    pub value: Option<String>,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} `{}`", self.kind, self.field)?;
        if let Some(value) = &self.value {
            write!(f, ": {value:?}")?;
        }
        Ok(())
    }
}

/// Coarse failure classes reported per resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Configuration,
    Transport,
    Integrity,
    Decompression,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Configuration => write!(f, "configuration"),
            ErrorCategory::Transport => write!(f, "transport"),
            ErrorCategory::Integrity => write!(f, "integrity"),
            ErrorCategory::Decompression => write!(f, "decompression"),
        }
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("invalid catalog URL {url}: {source}")]
    InvalidUrl {
        url:    String,
        #[source]
        source: url::ParseError,
    },

    #[error("corrupt sidecar {path}: {source}")]
    CorruptSidecar {
        path:   PathBuf,
        #[source]
        source: ParseError,
    },

    #[error("failed to read sidecar {path}: {source}")]
    ReadSidecar {
        path:   PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Decompression(#[from] feedmirror_archive::Error),

    #[error("{path} failed verification after {attempts} attempts")]
    Integrity { path: PathBuf, attempts: u32 },
}

impl SyncError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            SyncError::InvalidUrl { .. }
            | SyncError::CorruptSidecar { .. }
            | SyncError::ReadSidecar { .. } => ErrorCategory::Configuration,
            SyncError::Fetch(e) if e.is_configuration() => ErrorCategory::Configuration,
            SyncError::Fetch(_) => ErrorCategory::Transport,
            SyncError::Decompression(_) => ErrorCategory::Decompression,
            SyncError::Integrity { .. } => ErrorCategory::Integrity,
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
