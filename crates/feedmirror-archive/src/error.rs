use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("not a recognised archive: {path}")]
    UnsupportedFormat { path: PathBuf },

    #[error("archive is corrupted: {path}: {source}")]
    Corrupted { path: PathBuf, source: io::Error },

    #[error("failed to open {path}: {source}")]
    Open { path: PathBuf, source: io::Error },

    #[error("failed to write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("staging failed: {source}")]
    Staging { source: feedmirror_fs::Error },
}

impl From<feedmirror_fs::Error> for Error {
    fn from(e: feedmirror_fs::Error) -> Self { Self::Staging { source: e } }
}

pub type Result<T> = std::result::Result<T, Error>;
