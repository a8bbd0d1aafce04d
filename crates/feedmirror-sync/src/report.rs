//! Per-run outcome bookkeeping.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::catalog::{FeedVersion, ResourceKind};
use crate::error::{ErrorCategory, SyncError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ResourceOutcome {
    /// The sidecar showed no remote change; the payload was left alone.
    UpToDate,
    Fetched,
    /// Checksum matched on attempt `attempts`.
    Verified { attempts: u32 },
    /// Checksum still mismatched after every attempt.
    Corrupted { attempts: u32 },
    Failed {
        category: ErrorCategory,
        message:  String,
    },
}

impl ResourceOutcome {
    pub fn failed(error: &SyncError) -> Self {
        ResourceOutcome::Failed {
            category: error.category(),
            message:  error.to_string(),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ResourceOutcome::Corrupted { .. } | ResourceOutcome::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceReport {
    pub id:      String,
    pub kind:    ResourceKind,
    pub outcome: ResourceOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionReport {
    pub version:         FeedVersion,
    /// Skipped because the modified sidecar was checked moments ago.
    pub short_circuited: bool,
    /// Catalog-level configuration error that stopped this version.
    pub error:           Option<String>,
    pub resources:       Vec<ResourceReport>,
}

impl VersionReport {
    pub fn new(version: FeedVersion) -> Self {
        Self {
            version,
            short_circuited: false,
            error: None,
            resources: Vec::new(),
        }
    }

    pub fn has_failure(&self) -> bool {
        self.error.is_some() || self.resources.iter().any(|r| r.outcome.is_failure())
    }

    pub fn outcome(&self, id: &str) -> Option<&ResourceOutcome> {
        self.resources.iter().find(|r| r.id == id).map(|r| &r.outcome)
    }
}

/// Counts across every version of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub fetched:    usize,
    pub up_to_date: usize,
    pub verified:   usize,
    pub corrupted:  usize,
    pub failed:     usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub versions:   Vec<VersionReport>,
    failed:         bool,
}

impl RunReport {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            versions: Vec::new(),
            failed: false,
        }
    }

    pub fn push(&mut self, version: VersionReport) {
        if version.has_failure() {
            self.failed = true;
        }
        self.versions.push(version);
    }

    /// Set once any resource of the run failed; never cleared.
    pub fn failed(&self) -> bool { self.failed }

    pub fn version(&self, version: FeedVersion) -> Option<&VersionReport> {
        self.versions.iter().find(|v| v.version == version)
    }

    pub fn summary(&self) -> Summary {
        let mut summary = Summary::default();
        for outcome in self.versions.iter().flat_map(|v| v.resources.iter().map(|r| &r.outcome)) {
            match outcome {
                ResourceOutcome::UpToDate => summary.up_to_date += 1,
                ResourceOutcome::Fetched => summary.fetched += 1,
                ResourceOutcome::Verified { .. } => summary.verified += 1,
                ResourceOutcome::Corrupted { .. } => summary.corrupted += 1,
                ResourceOutcome::Failed { .. } => summary.failed += 1,
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource(id: &str, outcome: ResourceOutcome) -> ResourceReport {
        ResourceReport {
            id: id.to_string(),
            kind: ResourceKind::Modified,
            outcome,
        }
    }

    #[test]
    fn test_failed_flag_is_monotonic() {
        let mut report = RunReport::new(Utc::now());

        let mut bad = VersionReport::new(FeedVersion::Json11);
        bad.resources.push(resource("1.1/2002", ResourceOutcome::Corrupted { attempts: 3 }));
        report.push(bad);
        assert!(report.failed());

        let mut good = VersionReport::new(FeedVersion::Xml20);
        good.resources.push(resource("2.0/modified", ResourceOutcome::Fetched));
        report.push(good);
        assert!(report.failed());
    }

    #[test]
    fn test_catalog_error_fails_version() {
        let mut version = VersionReport::new(FeedVersion::Json11);
        assert!(!version.has_failure());
        version.error = Some("invalid catalog URL".into());
        assert!(version.has_failure());
    }

    #[test]
    fn test_summary_counts() {
        let mut version = VersionReport::new(FeedVersion::Json11);
        version.resources.push(resource("a", ResourceOutcome::Fetched));
        version.resources.push(resource("b", ResourceOutcome::UpToDate));
        version.resources.push(resource("c", ResourceOutcome::Verified { attempts: 2 }));
        version.resources.push(resource("d", ResourceOutcome::Failed {
            category: ErrorCategory::Transport,
            message:  "reset".into(),
        }));
        let mut report = RunReport::new(Utc::now());
        report.push(version);

        assert_eq!(report.summary(), Summary {
            fetched:    1,
            up_to_date: 1,
            verified:   1,
            corrupted:  0,
            failed:     1,
        });
    }

    #[test]
    fn test_outcome_serializes_with_status_tag() {
        let json = serde_json::to_value(ResourceOutcome::Verified { attempts: 2 }).unwrap();
        assert_eq!(json, serde_json::json!({ "status": "verified", "attempts": 2 }));

        let json = serde_json::to_value(ResourceOutcome::Failed {
            category: ErrorCategory::Integrity,
            message:  "mismatch".into(),
        })
        .unwrap();
        assert_eq!(json["category"], "integrity");
    }
}
