use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use feedmirror_fetch::Fetcher;
use feedmirror_fetch::mock::MemoryTransport;
use feedmirror_sync::{ErrorCategory, FeedVersion, MirrorConfig, ResourceOutcome, RunReport, SyncOrchestrator};
use feedmirror_verify::{VerificationError, Verifier};
use flate2::Compression;
use flate2::write::GzEncoder;
use sha2::{Digest, Sha256};
use tempfile::TempDir;

const JSON_ROOT: &str = "https://nvd.nist.gov/feeds/json/cve/1.1/";
const XML_ROOT: &str = "https://static.nvd.nist.gov/feeds/xml/cve/";
const PUBLISHED: &str = "2003-05-01T03:00:01-05:00";

fn started_at() -> DateTime<Utc> { Utc.with_ymd_and_hms(2003, 6, 1, 12, 0, 0).unwrap() }

fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

fn sidecar(published: &str, body: &[u8], sha256: Option<String>) -> String {
    let mut text = format!(
        "lastModifiedDate:{published}\r\nsize:{}\r\nzipSize:{}\r\ngzSize:{}\r\n",
        body.len(),
        body.len() / 2,
        body.len() / 2
    );
    if let Some(sha) = sha256 {
        text.push_str(&format!("sha256:{sha}\r\n"));
    }
    text
}

/// A fake NVD publication plus a local mirror directory.
struct Feed {
    dir:       TempDir,
    transport: Arc<MemoryTransport>,
}

impl Feed {
    fn new() -> Self {
        Self {
            dir:       tempfile::tempdir().unwrap(),
            transport: Arc::new(MemoryTransport::new()),
        }
    }

    fn path(&self, name: &str) -> PathBuf { self.dir.path().join(name) }

    /// Publish a JSON 1.1 resource (`modified`, `recent` or a year).
    fn publish(&self, name: &str, body: &str, published: &str) {
        let checksum = hex::encode_upper(Sha256::digest(body.as_bytes()));
        self.publish_raw(name, gzip(body.as_bytes()), &sidecar(published, body.as_bytes(), Some(checksum)));
    }

    fn publish_raw(&self, name: &str, payload: Vec<u8>, meta: &str) {
        self.transport.serve(&json_payload(name), payload);
        self.transport.serve(&json_meta(name), meta.to_string());
    }

    fn publish_all(&self) {
        for name in ["modified", "recent", "2002", "2003"] {
            self.publish(name, &format!("{{\"CVE_Items\":[\"{name}\"]}}"), PUBLISHED);
        }
    }

    fn config(&self) -> MirrorConfig {
        MirrorConfig::new(self.dir.path(), vec![FeedVersion::Json11])
            .started_at(started_at())
            .retry_backoff(Duration::ZERO)
    }

    fn orchestrator(&self) -> SyncOrchestrator<Arc<MemoryTransport>> {
        self.orchestrator_with(self.config())
    }

    fn orchestrator_with(&self, config: MirrorConfig) -> SyncOrchestrator<Arc<MemoryTransport>> {
        SyncOrchestrator::new(config, Fetcher::new(Arc::clone(&self.transport)))
    }

    fn payload_requests(&self) -> Vec<String> {
        self.transport
            .requests()
            .into_iter()
            .filter(|url| !url.ends_with(".meta"))
            .collect()
    }
}

fn json_payload(name: &str) -> String { format!("{JSON_ROOT}nvdcve-1.1-{name}.json.gz") }

fn json_meta(name: &str) -> String { format!("{JSON_ROOT}nvdcve-1.1-{name}.meta") }

fn outcome<'a>(report: &'a RunReport, version: FeedVersion, id: &str) -> &'a ResourceOutcome {
    report
        .version(version)
        .and_then(|v| v.outcome(id))
        .unwrap_or_else(|| panic!("no outcome for {id}"))
}

fn assert_failed(outcome: &ResourceOutcome, expected: ErrorCategory) {
    match outcome {
        ResourceOutcome::Failed { category, .. } => assert_eq!(*category, expected),
        other => panic!("expected a {expected} failure, got {other:?}"),
    }
}

/// Rejects the first `failures` payloads, then accepts everything.
struct FlakyVerifier {
    failures: AtomicU32,
    calls:    AtomicU32,
}

impl FlakyVerifier {
    fn new(failures: u32) -> Self {
        Self {
            failures: AtomicU32::new(failures),
            calls:    AtomicU32::new(0),
        }
    }
}

impl Verifier for &FlakyVerifier {
    fn verify(&self, _payload: &Path, expected_hex: &str) -> feedmirror_verify::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining == 0 {
            return Ok(());
        }
        self.failures.store(remaining - 1, Ordering::SeqCst);
        Err(VerificationError::Mismatch {
            expected: expected_hex.to_string(),
            actual:   "0".repeat(64),
        })
    }
}

#[tokio::test]
async fn first_run_fetches_decompresses_and_verifies() {
    let feed = Feed::new();
    feed.publish_all();

    let report = feed.orchestrator().run().await;

    assert!(!report.failed());
    let v = FeedVersion::Json11;
    assert_eq!(outcome(&report, v, "1.1/modified"), &ResourceOutcome::Fetched);
    assert_eq!(outcome(&report, v, "1.1/recent"), &ResourceOutcome::Fetched);
    assert_eq!(outcome(&report, v, "1.1/2002"), &ResourceOutcome::Verified { attempts: 1 });
    assert_eq!(outcome(&report, v, "1.1/2003"), &ResourceOutcome::Verified { attempts: 1 });

    assert_eq!(
        fs::read_to_string(feed.path("nvdcve-1.1-2002.json")).unwrap(),
        "{\"CVE_Items\":[\"2002\"]}"
    );
    assert!(feed.path("nvdcve-1.1-2002.json.gz").exists());
    assert!(feed.path("nvdcve-1.1-2003.meta").exists());
    assert!(feed.path("nvdcve-1.1-recent.json").exists());
}

#[tokio::test]
async fn resources_are_processed_in_catalog_order() {
    let feed = Feed::new();
    feed.publish_all();

    let report = feed.orchestrator().run().await;

    let ids: Vec<_> = report.versions[0].resources.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, ["1.1/modified", "1.1/recent", "1.1/2002", "1.1/2003"]);
    assert_eq!(
        feed.transport.requests(),
        vec![
            json_meta("modified"),
            json_payload("modified"),
            json_meta("recent"),
            json_payload("recent"),
            json_meta("2002"),
            json_payload("2002"),
            json_meta("2003"),
            json_payload("2003"),
        ]
    );
}

#[tokio::test]
async fn unchanged_sidecars_leave_payloads_alone() {
    let feed = Feed::new();
    feed.publish_all();
    feed.orchestrator().run().await;
    feed.transport.clear_requests();

    let report = feed.orchestrator().run().await;

    assert!(!report.failed());
    assert!(feed.payload_requests().is_empty());
    let v = FeedVersion::Json11;
    assert_eq!(outcome(&report, v, "1.1/modified"), &ResourceOutcome::UpToDate);
    assert_eq!(outcome(&report, v, "1.1/recent"), &ResourceOutcome::UpToDate);
    // Yearly payloads are still checked against the refreshed sidecar.
    assert_eq!(outcome(&report, v, "1.1/2002"), &ResourceOutcome::Verified { attempts: 1 });
}

#[tokio::test]
async fn newer_sidecar_refetches_only_that_payload() {
    let feed = Feed::new();
    feed.publish_all();
    feed.orchestrator().run().await;
    feed.transport.clear_requests();

    feed.publish("2002", "{\"CVE_Items\":[\"2002\",\"amended\"]}", "2003-05-02T03:00:01-05:00");
    let report = feed.orchestrator().run().await;

    assert!(!report.failed());
    assert_eq!(feed.payload_requests(), vec![json_payload("2002")]);
    assert_eq!(
        fs::read_to_string(feed.path("nvdcve-1.1-2002.json")).unwrap(),
        "{\"CVE_Items\":[\"2002\",\"amended\"]}"
    );
}

#[tokio::test]
async fn older_remote_sidecar_is_not_an_update() {
    let feed = Feed::new();
    feed.publish_all();
    feed.orchestrator().run().await;
    feed.transport.clear_requests();

    feed.publish("recent", "{\"CVE_Items\":[\"rolled back\"]}", "2003-04-01T00:00:00Z");
    let report = feed.orchestrator().run().await;

    assert_eq!(outcome(&report, FeedVersion::Json11, "1.1/recent"), &ResourceOutcome::UpToDate);
    assert!(feed.payload_requests().is_empty());
}

#[tokio::test]
async fn recently_modified_sidecar_skips_the_whole_version() {
    let feed = Feed::new();
    feed.publish_all();
    let an_hour_ago = (started_at() - chrono::Duration::hours(1)).to_rfc3339();
    fs::write(feed.path("nvdcve-1.1-modified.meta"), sidecar(&an_hour_ago, b"{}", None)).unwrap();

    let report = feed.orchestrator().run().await;

    assert!(!report.failed());
    assert!(feed.transport.requests().is_empty());
    let version = report.version(FeedVersion::Json11).unwrap();
    assert!(version.short_circuited);
    assert!(version.resources.is_empty());
}

#[tokio::test]
async fn stale_modified_sidecar_does_not_skip() {
    let feed = Feed::new();
    feed.publish_all();
    let three_hours_ago = (started_at() - chrono::Duration::hours(3)).to_rfc3339();
    fs::write(feed.path("nvdcve-1.1-modified.meta"), sidecar(&three_hours_ago, b"{}", None)).unwrap();

    let report = feed.orchestrator().run().await;

    let version = report.version(FeedVersion::Json11).unwrap();
    assert!(!version.short_circuited);
    assert_eq!(version.resources.len(), 4);
}

#[tokio::test]
async fn corrupt_local_sidecar_fails_only_its_resource() {
    let feed = Feed::new();
    feed.publish_all();
    fs::write(feed.path("nvdcve-1.1-2002.meta"), "size:100\nzipSize:10\ngzSize:10\n").unwrap();
    fs::write(feed.path("nvdcve-1.1-2003.meta"), "lastModifiedDate:yesterday\nsize:1\n").unwrap();

    let report = feed.orchestrator().run().await;

    assert!(report.failed());
    let v = FeedVersion::Json11;
    assert_failed(outcome(&report, v, "1.1/2002"), ErrorCategory::Configuration);
    assert_failed(outcome(&report, v, "1.1/2003"), ErrorCategory::Configuration);
    assert_eq!(outcome(&report, v, "1.1/recent"), &ResourceOutcome::Fetched);
    assert!(!feed.transport.requests().contains(&json_payload("2002")));
}

#[tokio::test]
async fn corrupt_modified_sidecar_does_not_short_circuit() {
    let feed = Feed::new();
    feed.publish_all();
    fs::write(feed.path("nvdcve-1.1-modified.meta"), "garbage").unwrap();

    let report = feed.orchestrator().run().await;

    let v = FeedVersion::Json11;
    assert!(!report.version(v).unwrap().short_circuited);
    assert_failed(outcome(&report, v, "1.1/modified"), ErrorCategory::Configuration);
    assert_eq!(outcome(&report, v, "1.1/recent"), &ResourceOutcome::Fetched);
    assert!(report.failed());
}

#[tokio::test]
async fn verification_retries_until_the_checksum_matches() {
    let feed = Feed::new();
    feed.publish_all();
    let verifier = FlakyVerifier::new(2);
    let config = feed.config().start_year(2003);

    let report = feed.orchestrator_with(config).with_verifier(&verifier).run().await;

    assert!(!report.failed());
    assert_eq!(
        outcome(&report, FeedVersion::Json11, "1.1/2003"),
        &ResourceOutcome::Verified { attempts: 3 }
    );
    assert_eq!(verifier.calls.load(Ordering::SeqCst), 3);
    let fetches = feed.payload_requests().into_iter().filter(|u| *u == json_payload("2003")).count();
    assert_eq!(fetches, 3, "each retry downloads the payload again");
}

#[tokio::test]
async fn exhausted_retries_mark_the_payload_corrupted() {
    let feed = Feed::new();
    feed.publish_all();
    let verifier = FlakyVerifier::new(u32::MAX);
    let config = feed.config().start_year(2003);

    let report = feed.orchestrator_with(config).with_verifier(&verifier).run().await;

    assert!(report.failed());
    assert_eq!(
        outcome(&report, FeedVersion::Json11, "1.1/2003"),
        &ResourceOutcome::Corrupted { attempts: 3 }
    );
    assert_eq!(verifier.calls.load(Ordering::SeqCst), 3);
    // Non-yearly resources are never verified.
    assert_eq!(outcome(&report, FeedVersion::Json11, "1.1/recent"), &ResourceOutcome::Fetched);
}

#[tokio::test]
async fn wrong_published_checksum_is_detected() {
    let feed = Feed::new();
    feed.publish_all();
    let body = b"{\"CVE_Items\":[]}";
    feed.publish_raw("2003", gzip(body), &sidecar(PUBLISHED, body, Some("AB".repeat(32))));

    let report = feed.orchestrator().run().await;

    assert!(report.failed());
    let v = FeedVersion::Json11;
    assert_eq!(outcome(&report, v, "1.1/2003"), &ResourceOutcome::Corrupted { attempts: 3 });
    assert_eq!(outcome(&report, v, "1.1/2002"), &ResourceOutcome::Verified { attempts: 1 });
}

#[tokio::test]
async fn lowercase_published_checksum_still_verifies() {
    let feed = Feed::new();
    feed.publish_all();
    let body = b"{\"CVE_Items\":[\"lower\"]}";
    let checksum = hex::encode(Sha256::digest(body));
    feed.publish_raw("2003", gzip(body), &sidecar(PUBLISHED, body, Some(checksum)));

    let report = feed.orchestrator().run().await;

    assert_eq!(
        outcome(&report, FeedVersion::Json11, "1.1/2003"),
        &ResourceOutcome::Verified { attempts: 1 }
    );
}

#[tokio::test]
async fn sidecar_without_checksum_skips_verification() {
    let feed = Feed::new();
    feed.publish_all();
    let body = b"{}";
    feed.publish_raw("2002", gzip(body), &sidecar(PUBLISHED, body, None));

    let report = feed.orchestrator().run().await;

    assert!(!report.failed());
    assert_eq!(outcome(&report, FeedVersion::Json11, "1.1/2002"), &ResourceOutcome::Fetched);
}

#[tokio::test]
async fn transport_failure_moves_on_to_the_next_resource() {
    let feed = Feed::new();
    feed.publish_all();
    feed.transport.remove(&json_payload("recent"));

    let report = feed.orchestrator().run().await;

    assert!(report.failed());
    let v = FeedVersion::Json11;
    assert_failed(outcome(&report, v, "1.1/recent"), ErrorCategory::Transport);
    assert_eq!(outcome(&report, v, "1.1/2002"), &ResourceOutcome::Verified { attempts: 1 });
    assert_eq!(outcome(&report, v, "1.1/2003"), &ResourceOutcome::Verified { attempts: 1 });
}

#[tokio::test]
async fn interrupted_download_keeps_previous_payload_and_sidecar() {
    let feed = Feed::new();
    feed.publish_all();
    feed.orchestrator().run().await;
    let sidecar_before = fs::read_to_string(feed.path("nvdcve-1.1-modified.meta")).unwrap();

    let amended = "{\"CVE_Items\":[\"modified\",\"amended\"]}";
    feed.publish("modified", amended, "2003-05-09T00:00:00Z");
    feed.transport.serve_broken(&json_payload("modified"), b"\x1f\x8b".to_vec());

    let report = feed.orchestrator().run().await;

    assert_failed(outcome(&report, FeedVersion::Json11, "1.1/modified"), ErrorCategory::Transport);
    assert_eq!(
        fs::read_to_string(feed.path("nvdcve-1.1-modified.json")).unwrap(),
        "{\"CVE_Items\":[\"modified\"]}"
    );
    assert_eq!(
        fs::read_to_string(feed.path("nvdcve-1.1-modified.meta")).unwrap(),
        sidecar_before
    );

    feed.publish("modified", amended, "2003-05-09T00:00:00Z");
    let report = feed.orchestrator().run().await;

    assert_eq!(outcome(&report, FeedVersion::Json11, "1.1/modified"), &ResourceOutcome::Fetched);
    assert_eq!(fs::read_to_string(feed.path("nvdcve-1.1-modified.json")).unwrap(), amended);
}

#[tokio::test]
async fn missing_payload_is_fetched_once_it_appears() {
    let feed = Feed::new();
    feed.publish_all();
    feed.transport.remove(&json_payload("recent"));

    let report = feed.orchestrator().run().await;

    assert!(report.failed());
    assert_failed(outcome(&report, FeedVersion::Json11, "1.1/recent"), ErrorCategory::Transport);
    assert!(!feed.path("nvdcve-1.1-recent.meta").exists());

    // Same sidecar as before; only the payload is back.
    feed.publish("recent", "{\"CVE_Items\":[\"recent\"]}", PUBLISHED);
    feed.transport.clear_requests();
    let report = feed.orchestrator().run().await;

    assert!(!report.failed());
    assert_eq!(outcome(&report, FeedVersion::Json11, "1.1/recent"), &ResourceOutcome::Fetched);
    assert_eq!(feed.payload_requests(), vec![json_payload("recent")]);
    assert_eq!(
        fs::read_to_string(feed.path("nvdcve-1.1-recent.json")).unwrap(),
        "{\"CVE_Items\":[\"recent\"]}"
    );
}

#[tokio::test]
async fn corrupt_archive_is_a_decompression_failure() {
    let feed = Feed::new();
    feed.publish_all();
    let body = b"not gzip at all";
    feed.publish_raw("2002", body.to_vec(), &sidecar(PUBLISHED, body, None));

    let report = feed.orchestrator().run().await;

    assert!(report.failed());
    let v = FeedVersion::Json11;
    assert_failed(outcome(&report, v, "1.1/2002"), ErrorCategory::Decompression);
    assert_eq!(outcome(&report, v, "1.1/2003"), &ResourceOutcome::Verified { attempts: 1 });
    assert!(!feed.path("nvdcve-1.1-2002.meta").exists());
}

#[tokio::test]
async fn zero_verify_attempts_still_tries_once() {
    let feed = Feed::new();
    feed.publish_all();
    let config = MirrorConfig {
        verify_attempts: 0,
        ..feed.config().start_year(2003)
    };

    let report = feed.orchestrator_with(config).run().await;

    assert!(!report.failed());
    assert_eq!(
        outcome(&report, FeedVersion::Json11, "1.1/2003"),
        &ResourceOutcome::Verified { attempts: 1 }
    );
    assert!(feed.payload_requests().contains(&json_payload("2003")));
}

#[tokio::test]
async fn legacy_feed_is_fetched_unconditionally() {
    let feed = Feed::new();
    for name in ["modified", "2002", "2003"] {
        feed.transport
            .serve(&format!("{XML_ROOT}nvdcve-2.0-{name}.xml"), format!("<nvd id=\"{name}\"/>"));
    }
    let config = feed.config();
    let config = MirrorConfig { versions: vec![FeedVersion::Xml20], ..config };

    for _ in 0..2 {
        feed.transport.clear_requests();
        let report = feed.orchestrator_with(config.clone()).run().await;

        assert!(!report.failed());
        let version = report.version(FeedVersion::Xml20).unwrap();
        assert!(version.resources.iter().all(|r| r.outcome == ResourceOutcome::Fetched));
        assert_eq!(feed.transport.requests().len(), 3);
    }
    assert_eq!(
        fs::read_to_string(feed.path("nvdcve-2.0-2003.xml")).unwrap(),
        "<nvd id=\"2003\"/>"
    );
}

#[tokio::test]
async fn versions_run_in_order_and_failures_stick() {
    let feed = Feed::new();
    feed.publish_all();
    feed.transport.remove(&json_payload("2003"));
    for name in ["modified", "2002", "2003"] {
        feed.transport
            .serve(&format!("{XML_ROOT}nvdcve-2.0-{name}.xml"), "<nvd/>");
    }
    let config = MirrorConfig {
        versions: vec![FeedVersion::Json11, FeedVersion::Xml20],
        ..feed.config()
    };

    let report = feed.orchestrator_with(config).run().await;

    assert!(report.failed());
    assert_eq!(report.versions.len(), 2);
    assert_eq!(report.versions[0].version, FeedVersion::Json11);
    assert!(!report.version(FeedVersion::Xml20).unwrap().has_failure());
    let summary = report.summary();
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.fetched, 2 + 3);
}

#[tokio::test]
async fn unusable_source_root_fails_the_version() {
    let feed = Feed::new();
    let config = feed.config().source_root("not a url");

    let report = feed.orchestrator_with(config).run().await;

    assert!(report.failed());
    let version = report.version(FeedVersion::Json11).unwrap();
    assert!(version.error.is_some());
    assert!(version.resources.is_empty());
    assert!(feed.transport.requests().is_empty());
}

#[tokio::test]
async fn source_root_redirects_every_url() {
    let feed = Feed::new();
    let root = "http://mirror.internal/nvd/1.1";
    for name in ["modified", "recent", "2003"] {
        let body = format!("{{\"n\":\"{name}\"}}");
        let checksum = hex::encode_upper(Sha256::digest(body.as_bytes()));
        feed.transport
            .serve(&format!("{root}/nvdcve-1.1-{name}.json.gz"), gzip(body.as_bytes()));
        feed.transport.serve(
            &format!("{root}/nvdcve-1.1-{name}.meta"),
            sidecar(PUBLISHED, body.as_bytes(), Some(checksum)),
        );
    }
    let config = feed.config().source_root(root).start_year(2003);

    let report = feed.orchestrator_with(config).run().await;

    assert!(!report.failed());
    assert!(feed.transport.requests().iter().all(|u| u.starts_with(root)));
}
