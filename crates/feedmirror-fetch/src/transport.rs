use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::Stream;
use url::Url;

/// A boxed stream type for response bodies.
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = T> + Send + 'a>>;

/// An opened body stream.
pub struct TransportResponse<E> {
    /// Content-Length when the server announced one.
    pub content_length: Option<u64>,
    pub body:           BoxStream<'static, Result<Bytes, E>>,
}

impl<E> fmt::Debug for TransportResponse<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportResponse")
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Raw byte transport.
///
/// Implementations map non-success statuses, connection failures and
/// timeouts to `Self::Error`, either when opening or mid-stream.
pub trait Transport: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    fn open(
        &self,
        url: &Url,
    ) -> impl Future<Output = Result<TransportResponse<Self::Error>, Self::Error>> + Send;
}

impl<T: Transport> Transport for Arc<T> {
    type Error = T::Error;

    fn open(
        &self,
        url: &Url,
    ) -> impl Future<Output = Result<TransportResponse<Self::Error>, Self::Error>> + Send {
        (**self).open(url)
    }
}

/// Basic credentials presented to the proxy.
#[derive(Clone, PartialEq, Eq)]
pub struct ProxyCredentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for ProxyCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    pub host:        String,
    pub port:        u16,
    pub credentials: Option<ProxyCredentials>,
}

impl ProxyConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            credentials: None,
        }
    }

    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(ProxyCredentials {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    pub fn url(&self) -> String { format!("http://{}:{}", self.host, self.port) }
}

/// Transport configuration, fixed for the lifetime of a run.
///
/// # Examples
///
/// ```
/// use feedmirror_fetch::{ProxyConfig, TransportOptions};
///
/// let options = TransportOptions::default()
///     .proxy(ProxyConfig::new("proxy.internal", 3128).credentials("mirror", "s3cret"));
/// assert!(!options.accept_invalid_certs);
/// ```
#[derive(Debug, Clone)]
pub struct TransportOptions {
    pub proxy:                Option<ProxyConfig>,
    /// Trust any certificate. Only for proxies that re-sign TLS traffic.
    pub accept_invalid_certs: bool,
    pub connect_timeout:      Duration,
    pub user_agent:           String,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            proxy:                None,
            accept_invalid_certs: false,
            connect_timeout:      Duration::from_secs(30),
            user_agent:           concat!("feedmirror/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl TransportOptions {
    pub fn proxy(mut self, proxy: ProxyConfig) -> Self {
        self.proxy = Some(proxy);
        self
    }

    pub fn accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

#[cfg(feature = "reqwest")]
mod reqwest_transport {
    use futures_util::TryStreamExt;
    use tracing::{info, warn};

    use super::*;
    use crate::FetchError;

    /// Production transport backed by a single `reqwest::Client`.
    #[derive(Debug, Clone)]
    pub struct ReqwestTransport {
        client: reqwest::Client,
    }

    impl ReqwestTransport {
        pub fn new(options: &TransportOptions) -> crate::Result<Self> {
            let mut builder = reqwest::Client::builder()
                .connect_timeout(options.connect_timeout)
                .user_agent(options.user_agent.clone());

            if let Some(proxy) = &options.proxy {
                info!(host = %proxy.host, port = proxy.port, "using proxy");
                let mut p = reqwest::Proxy::all(proxy.url()).map_err(FetchError::Client)?;
                if let Some(credentials) = &proxy.credentials {
                    info!(user = %credentials.username, "using proxy credentials");
                    p = p.basic_auth(&credentials.username, &credentials.password);
                }
                builder = builder.proxy(p);
            }

            if options.accept_invalid_certs {
                warn!("TLS certificate validation is disabled");
                builder = builder.danger_accept_invalid_certs(true);
            }

            let client = builder.build().map_err(FetchError::Client)?;
            Ok(Self { client })
        }
    }

    impl Transport for ReqwestTransport {
        type Error = reqwest::Error;

        async fn open(
            &self,
            url: &Url,
        ) -> Result<TransportResponse<Self::Error>, Self::Error> {
            let response = self.client.get(url.clone()).send().await?.error_for_status()?;
            let content_length = response.content_length();
            let body = response.bytes_stream().map_ok(Bytes::from);
            Ok(TransportResponse {
                content_length,
                body: Box::pin(body),
            })
        }
    }

}

#[cfg(feature = "reqwest")]
pub use reqwest_transport::ReqwestTransport;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proxy_url() {
        assert_eq!(ProxyConfig::new("proxy.internal", 8080).url(), "http://proxy.internal:8080");
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let proxy = ProxyConfig::new("proxy.internal", 8080).credentials("mirror", "s3cret");
        let rendered = format!("{proxy:?}");
        assert!(rendered.contains("mirror"));
        assert!(!rendered.contains("s3cret"));
    }

    #[test]
    fn test_certificate_trust_is_off_by_default() {
        assert!(!TransportOptions::default().accept_invalid_certs);
    }
}
