//! Streamed HTTP fetching with atomic placement.
//!
//! # Architecture
//!
//! - [`Transport`] - the byte source; opens a URL and yields a body stream
//! - [`ReqwestTransport`] - production transport, configured once from
//!   [`TransportOptions`] (proxy, credentials, certificate trust)
//! - [`Fetcher`] - streams a body into `output_dir/<last URL segment>`
//! - [`mock::MemoryTransport`] - in-memory transport for tests
//!
//! The fetcher is mechanism only: it neither retries nor decides whether a
//! fetch is needed. Callers own that policy.

mod data;
mod error;
mod fetcher;
pub mod mock;
mod transport;

pub use data::{FetchPhase, Progress, ProgressCallback};
pub use error::{FetchError, Result};
pub use fetcher::{FetchResult, Fetcher, file_name_for};
pub use transport::{BoxStream, ProxyConfig, ProxyCredentials, Transport, TransportOptions, TransportResponse};

#[cfg(feature = "reqwest")]
pub use transport::ReqwestTransport;
