//! Sequential mirroring of every configured feed version.

use std::path::PathBuf;

use feedmirror_archive::{Compression, decompress, decompressed_path};
use feedmirror_fetch::{Fetcher, Transport, file_name_for};
use feedmirror_verify::{Sha256Verifier, Verifier};
use tracing::{error, info, warn};

use crate::catalog::{Catalog, FeedVersion, ResourceDescriptor, ResourceKind};
use crate::config::MirrorConfig;
use crate::error::{Result, SyncError};
use crate::freshness::{FreshnessGate, SidecarBackup, recently_checked};
use crate::meta::MetaDescriptor;
use crate::report::{ResourceOutcome, ResourceReport, RunReport, VersionReport};
use crate::retry::retry_delay;

/// What one pass over a resource left on disk.
struct Pass {
    fetched: bool,
    meta:    Option<MetaDescriptor>,
    /// Decompressed payload, or the payload itself when not an archive.
    payload: PathBuf,
}

impl Pass {
    fn outcome(&self) -> ResourceOutcome {
        if self.fetched {
            ResourceOutcome::Fetched
        } else {
            ResourceOutcome::UpToDate
        }
    }
}

/// Drives freshness check, fetch, decompression and verification for every
/// resource of every configured feed version, one at a time.
pub struct SyncOrchestrator<T: Transport, V: Verifier = Sha256Verifier> {
    config:   MirrorConfig,
    fetcher:  Fetcher<T>,
    verifier: V,
}

impl<T: Transport> SyncOrchestrator<T> {
    pub fn new(config: MirrorConfig, fetcher: Fetcher<T>) -> Self {
        Self {
            config,
            fetcher,
            verifier: Sha256Verifier,
        }
    }
}

impl<T: Transport, V: Verifier> SyncOrchestrator<T, V> {
    pub fn with_verifier<W: Verifier>(self, verifier: W) -> SyncOrchestrator<T, W> {
        SyncOrchestrator {
            config: self.config,
            fetcher: self.fetcher,
            verifier,
        }
    }

    pub fn config(&self) -> &MirrorConfig { &self.config }

    pub fn fetcher(&self) -> &Fetcher<T> { &self.fetcher }

    /// Mirror every configured version. Never aborts early: failures are
    /// recorded in the returned report.
    pub async fn run(&self) -> RunReport {
        info!(
            at = %self.config.started_at,
            output = %self.config.output_dir.display(),
            "downloading files"
        );

        let mut report = RunReport::new(self.config.started_at);
        for &version in &self.config.versions {
            report.push(self.mirror_version(version).await);
        }

        let summary = report.summary();
        info!(
            fetched = summary.fetched,
            up_to_date = summary.up_to_date,
            verified = summary.verified,
            corrupted = summary.corrupted,
            failed = summary.failed,
            "mirror run finished"
        );
        report
    }

    async fn mirror_version(&self, version: FeedVersion) -> VersionReport {
        let mut report = VersionReport::new(version);

        let catalog = match Catalog::for_version(
            version,
            self.config.source_root.as_deref(),
            self.config.start_year,
            self.config.current_year(),
        ) {
            Ok(catalog) => catalog,
            Err(e) => {
                error!(%version, error = %e, "cannot build feed catalog");
                report.error = Some(e.to_string());
                return report;
            }
        };

        let gate = FreshnessGate::new(&self.fetcher, &self.config.output_dir);

        // A corrupt sidecar here is reported when the modified resource is processed.
        if let Ok(Some(meta)) = gate.local_meta(&catalog.modified)
            && recently_checked(&meta, self.config.started_at, self.config.recheck_window)
        {
            info!(%version, "using local cache as last update was within the recheck window");
            report.short_circuited = true;
            return report;
        }

        for resource in catalog.resources() {
            let outcome = self.mirror_resource(&gate, resource).await;
            log_outcome(resource, &outcome);
            report.resources.push(ResourceReport {
                id: resource.id.clone(),
                kind: resource.kind,
                outcome,
            });
        }
        report
    }

    async fn mirror_resource(&self, gate: &FreshnessGate<'_, T>, resource: &ResourceDescriptor) -> ResourceOutcome {
        let verifies = resource.is_base() && resource.meta_url.is_some();
        if !verifies {
            return match self.pass(gate, resource, false).await {
                Ok(pass) => pass.outcome(),
                Err(e) => ResourceOutcome::failed(&e),
            };
        }

        let attempts = self.config.verify_attempts.max(1);
        let mut payload = PathBuf::new();
        for attempt in 1..=attempts {
            if attempt > 1 {
                let delay = retry_delay(attempt - 2, self.config.retry_backoff);
                info!(resource = %resource.id, attempt, ?delay, "retrying download");
                tokio::time::sleep(delay).await;
            }

            // Retries re-fetch the payload even when its sidecar is unchanged.
            let pass = match self.pass(gate, resource, attempt > 1).await {
                Ok(pass) => pass,
                Err(e) => return ResourceOutcome::failed(&e),
            };
            let Some(expected) = pass.meta.as_ref().and_then(|m| m.sha256.as_deref()) else {
                warn!(resource = %resource.id, "sidecar carries no checksum; skipping verification");
                return pass.outcome();
            };

            match self.verifier.verify(&pass.payload, expected) {
                Ok(()) => return ResourceOutcome::Verified { attempts: attempt },
                Err(e) => warn!(resource = %resource.id, attempt, error = %e, "verification failed"),
            }
            payload = pass.payload;
        }

        let err = SyncError::Integrity {
            path: payload,
            attempts,
        };
        error!(resource = %resource.id, error = %err, "giving up on corrupted payload");
        ResourceOutcome::Corrupted { attempts }
    }

    /// One freshness check plus, when needed or forced, fetch and decompression.
    async fn pass(&self, gate: &FreshnessGate<'_, T>, resource: &ResourceDescriptor, force: bool) -> Result<Pass> {
        let backup = gate.backup(resource)?;
        let decision = gate.check(resource).await?;

        let archive = self.config.output_dir.join(file_name_for(&resource.payload_url)?);
        let payload = decompressed_path(&archive).unwrap_or_else(|| archive.clone());

        let fetched = force || decision.needs_fetch();
        if fetched && let Err(e) = self.place(resource).await {
            // The refreshed sidecar must not vouch for a payload that never landed.
            if let Some(backup) = backup {
                roll_back(resource, backup);
            }
            return Err(e);
        }

        Ok(Pass {
            fetched,
            meta: decision.meta().cloned(),
            payload,
        })
    }

    /// Fetch the payload and decompress it when it is an archive.
    async fn place(&self, resource: &ResourceDescriptor) -> Result<()> {
        let result = self.fetcher.fetch(&resource.payload_url, &self.config.output_dir).await?;
        if Compression::from_path(&result.path).is_some() {
            decompress(&result.path)?;
        }
        Ok(())
    }
}

fn roll_back(resource: &ResourceDescriptor, backup: SidecarBackup) {
    let path = backup.path().to_path_buf();
    match backup.restore() {
        Ok(()) => warn!(resource = %resource.id, path = %path.display(), "restored previous sidecar"),
        Err(e) => error!(resource = %resource.id, path = %path.display(), error = %e, "cannot restore previous sidecar"),
    }
}

fn log_outcome(resource: &ResourceDescriptor, outcome: &ResourceOutcome) {
    let id = resource.id.as_str();
    match outcome {
        ResourceOutcome::UpToDate => info!(resource = id, "payload unchanged, not downloaded"),
        ResourceOutcome::Fetched => info!(resource = id, "payload downloaded"),
        ResourceOutcome::Verified { attempts } => match resource.kind {
            ResourceKind::Base { year } => info!(resource = id, attempts, "file {year} is valid"),
            _ => info!(resource = id, attempts, "payload verified"),
        },
        ResourceOutcome::Corrupted { attempts } => error!(resource = id, attempts, "payload is corrupted"),
        ResourceOutcome::Failed { category, message } => {
            error!(resource = id, %category, error = %message, "resource failed")
        }
    }
}
