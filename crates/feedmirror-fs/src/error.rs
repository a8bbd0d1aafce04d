use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("path has no parent directory: {path}")]
    NoParent { path: PathBuf },

    #[error("path has no file name: {path}")]
    NoFileName { path: PathBuf },

    #[error("failed to move {from} to {to}: {source}")]
    Rename {
        from:   PathBuf,
        to:     PathBuf,
        source: io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
