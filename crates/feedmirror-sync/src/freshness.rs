//! Decides whether a payload needs fetching by comparing sidecar snapshots.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use feedmirror_fetch::{Fetcher, Transport, file_name_for};
use tracing::{debug, info};
use url::Url;

use crate::catalog::ResourceDescriptor;
use crate::error::{Result, SyncError};
use crate::meta::MetaDescriptor;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FreshnessDecision {
    /// No sidecar is published for the resource.
    Unconditional,
    NeedsFetch {
        before: Option<MetaDescriptor>,
        after:  MetaDescriptor,
    },
    UpToDate { after: MetaDescriptor },
}

impl FreshnessDecision {
    pub fn needs_fetch(&self) -> bool { !matches!(self, FreshnessDecision::UpToDate { .. }) }

    /// The sidecar just retrieved from the remote, if any.
    pub fn meta(&self) -> Option<&MetaDescriptor> {
        match self {
            FreshnessDecision::Unconditional => None,
            FreshnessDecision::NeedsFetch { after, .. } | FreshnessDecision::UpToDate { after } => Some(after),
        }
    }
}

/// Fetch iff there is no prior snapshot or the remote moved strictly forward.
///
/// An equal or older remote timestamp is "not newer", never an error.
pub fn is_newer(before: Option<&MetaDescriptor>, after: &MetaDescriptor) -> bool {
    before.is_none_or(|before| after.last_modified > before.last_modified)
}

/// Whether a sidecar was modified less than `window` before `now`.
///
/// Timestamps ahead of `now` count as recent.
pub fn recently_checked(meta: &MetaDescriptor, now: DateTime<Utc>, window: Duration) -> bool {
    let window = i64::try_from(window.as_secs()).unwrap_or(i64::MAX);
    now.timestamp().saturating_sub(meta.last_modified) < window
}

/// Bytes of a local sidecar as they were before a refresh.
///
/// Restoring puts those bytes back, or removes the refreshed file when there
/// was none, so a payload that never landed is fetched again on the next run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidecarBackup {
    path:     PathBuf,
    previous: Option<Vec<u8>>,
}

impl SidecarBackup {
    pub fn capture(path: PathBuf) -> Result<Self> {
        let previous = match fs::read(&path) {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(source) => return Err(SyncError::ReadSidecar { path, source }),
        };
        Ok(Self { path, previous })
    }

    pub fn path(&self) -> &Path { &self.path }

    pub fn restore(self) -> io::Result<()> {
        match self.previous {
            Some(bytes) => fs::write(&self.path, bytes),
            None => match fs::remove_file(&self.path) {
                Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
                _ => Ok(()),
            },
        }
    }
}

/// Freshness checks against one output directory.
pub struct FreshnessGate<'a, T: Transport> {
    fetcher:    &'a Fetcher<T>,
    output_dir: &'a Path,
}

impl<'a, T: Transport> FreshnessGate<'a, T> {
    pub fn new(fetcher: &'a Fetcher<T>, output_dir: &'a Path) -> Self { Self { fetcher, output_dir } }

    /// Where the sidecar behind `meta_url` is kept locally.
    pub fn sidecar_path(&self, meta_url: &Url) -> Result<PathBuf> {
        Ok(self.output_dir.join(file_name_for(meta_url)?))
    }

    /// The locally recorded sidecar of `resource`, without touching the network.
    pub fn local_meta(&self, resource: &ResourceDescriptor) -> Result<Option<MetaDescriptor>> {
        match &resource.meta_url {
            Some(url) => MetaDescriptor::load_if_present(&self.sidecar_path(url)?),
            None => Ok(None),
        }
    }

    /// Snapshot the local sidecar of `resource` before [`check`](Self::check)
    /// overwrites it.
    pub fn backup(&self, resource: &ResourceDescriptor) -> Result<Option<SidecarBackup>> {
        resource
            .meta_url
            .as_ref()
            .map(|url| self.sidecar_path(url).and_then(SidecarBackup::capture))
            .transpose()
    }

    /// Refresh the sidecar of `resource` and decide whether its payload is stale.
    ///
    /// A corrupt local sidecar is an error rather than "no prior state".
    pub async fn check(&self, resource: &ResourceDescriptor) -> Result<FreshnessDecision> {
        let Some(meta_url) = &resource.meta_url else {
            debug!(resource = %resource.id, "no sidecar published; fetching unconditionally");
            return Ok(FreshnessDecision::Unconditional);
        };

        let path = self.sidecar_path(meta_url)?;
        let before = MetaDescriptor::load_if_present(&path)?;
        self.fetcher.fetch(meta_url, self.output_dir).await?;
        let after = MetaDescriptor::load(&path)?;

        if is_newer(before.as_ref(), &after) {
            debug!(
                resource = %resource.id,
                before = ?before.as_ref().map(|m| m.last_modified),
                after = after.last_modified,
                "remote is newer"
            );
            Ok(FreshnessDecision::NeedsFetch { before, after })
        } else {
            info!(resource = %resource.id, "local copy is current");
            Ok(FreshnessDecision::UpToDate { after })
        }
    }
}
