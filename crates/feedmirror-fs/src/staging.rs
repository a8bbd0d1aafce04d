use std::fs;
use std::path::{Path, PathBuf};

use crate::{Error, Result};

const STAGING_PREFIX: &str = ".";
const STAGING_SUFFIX: &str = ".part";

/// A temporary sibling of `destination` that becomes `destination` on commit.
///
/// The staging path lives in the same directory as the destination so the
/// final rename never crosses a filesystem boundary.
#[derive(Debug)]
pub struct StagedFile {
    staging:     PathBuf,
    destination: PathBuf,
    committed:   bool,
}

impl StagedFile {
    pub fn new(destination: impl Into<PathBuf>) -> Result<Self> {
        let destination = destination.into();
        let parent = destination.parent().ok_or_else(|| Error::NoParent {
            path: destination.clone(),
        })?;
        let name = destination
            .file_name()
            .ok_or_else(|| Error::NoFileName {
                path: destination.clone(),
            })?
            .to_string_lossy();

        let staging = parent.join(format!("{STAGING_PREFIX}{name}{STAGING_SUFFIX}"));

        Ok(Self {
            staging,
            destination,
            committed: false,
        })
    }

    /// Where the writer should put its bytes.
    pub fn path(&self) -> &Path { &self.staging }

    pub fn destination(&self) -> &Path { &self.destination }

    /// Replace the destination with the staged content.
    pub fn commit(mut self) -> Result<PathBuf> {
        fs::rename(&self.staging, &self.destination).map_err(|source| Error::Rename {
            from: self.staging.clone(),
            to: self.destination.clone(),
            source,
        })?;
        self.committed = true;
        Ok(self.destination.clone())
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if !self.committed && self.staging.exists() {
            let _ = fs::remove_file(&self.staging);
        }
    }
}
