//! Incremental synchronization engine for NVD data feed mirrors.
//!
//! Per resource, the engine refreshes the small `.meta` sidecar, compares its
//! last-modified timestamp with the previously stored copy, and only then
//! fetches, decompresses and verifies the payload:
//!
//! - [`meta`] - sidecar parsing into [`MetaDescriptor`]
//! - [`catalog`] - the fixed resource table per [`FeedVersion`]
//! - [`freshness`] - the before/after sidecar comparison
//! - [`orchestrator`] - the sequential run over every resource
//! - [`report`] - per-resource outcomes and the run-level failure flag
//!
//! Processing is strictly sequential; log order matches catalog order.

pub mod catalog;
pub mod config;
mod error;
pub mod freshness;
pub mod meta;
pub mod orchestrator;
pub mod report;
mod retry;

pub use catalog::{Catalog, FeedVersion, ResourceDescriptor, ResourceKind, UnknownFeedVersion};
pub use config::MirrorConfig;
pub use error::{ErrorCategory, ParseError, ParseErrorKind, Result, SyncError};
pub use freshness::{FreshnessDecision, FreshnessGate, SidecarBackup};
pub use meta::MetaDescriptor;
pub use orchestrator::SyncOrchestrator;
pub use report::{ResourceOutcome, ResourceReport, RunReport, Summary, VersionReport};
pub use retry::retry_delay;
