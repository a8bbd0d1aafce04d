//! Error types for feedmirror-fetch.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("URL has no file name to store under: {0}")]
    NoFileName(String),

    #[error("transport error for {url}: {message}")]
    Transport { url: String, message: String },

    #[error("failed to write {path}: {source}")]
    Write {
        path:   PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("atomic placement failed: {0}")]
    Fs(#[from] feedmirror_fs::Error),

    #[cfg(feature = "reqwest")]
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl FetchError {
    /// Whether the failure lies in the URL rather than the network or disk.
    pub fn is_configuration(&self) -> bool { matches!(self, Self::NoFileName(_)) }
}

pub type Result<T> = std::result::Result<T, FetchError>;
