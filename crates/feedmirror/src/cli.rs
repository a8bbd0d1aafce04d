use std::path::PathBuf;

use clap::{ArgAction, Parser};
use feedmirror_fetch::{ProxyConfig, TransportOptions};
use feedmirror_sync::{FeedVersion, MirrorConfig};

#[derive(Clone, Debug, Parser)]
#[command(name = "feedmirror", version = env!("CARGO_PKG_VERSION"), about, long_about = None)]
/// Keep a local mirror of the NVD vulnerability data feeds up to date.
pub struct App {
    /// Directory the feeds are mirrored into; created when missing.
    #[arg(value_name = "OUTPUT_DIR")]
    pub output_dir: PathBuf,

    /// Feed version to mirror: 1.1 (JSON) or 2.0 (legacy XML). Repeatable.
    #[arg(long = "feed-version", value_name = "VERSION", default_value = "1.1", action = ArgAction::Append)]
    pub versions: Vec<FeedVersion>,

    /// Fetch from this directory instead of the NVD, e.g. another mirror.
    #[arg(long, value_name = "URL", env = "FEEDMIRROR_SOURCE_URL")]
    pub source_url: Option<String>,

    #[command(flatten)]
    pub proxy: ProxyArgs,

    /// Trust any TLS certificate. Only for proxies that re-sign traffic.
    #[arg(long, env = "FEEDMIRROR_INSECURE")]
    pub insecure: bool,

    /// Print the run report as JSON on stdout.
    #[arg(long)]
    pub json: bool,

    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(Clone, Debug, clap::Args)]
pub struct ProxyArgs {
    #[arg(long = "proxy-host", value_name = "HOST", env = "HTTP_PROXY_HOST")]
    pub host: Option<String>,

    #[arg(long = "proxy-port", value_name = "PORT", env = "HTTP_PROXY_PORT", requires = "host")]
    pub port: Option<u16>,

    #[arg(long = "proxy-user", value_name = "USER", env = "HTTP_PROXY_USER", requires = "host")]
    pub user: Option<String>,

    #[arg(
        long = "proxy-password",
        value_name = "PASSWORD",
        env = "HTTP_PROXY_PASSWORD",
        hide_env_values = true,
        requires = "user"
    )]
    pub password: Option<String>,
}

const DEFAULT_PROXY_PORT: u16 = 8080;

impl ProxyArgs {
    pub fn config(&self) -> Option<ProxyConfig> {
        let host = self.host.as_deref()?;
        let proxy = ProxyConfig::new(host, self.port.unwrap_or(DEFAULT_PROXY_PORT));
        // Basic auth only when both halves are present.
        let credentials = self
            .user
            .as_deref()
            .zip(self.password.as_deref())
            .filter(|(user, password)| !user.is_empty() && !password.is_empty());
        Some(match credentials {
            Some((user, password)) => proxy.credentials(user, password),
            None => proxy,
        })
    }
}

impl App {
    pub fn mirror_config(&self) -> MirrorConfig {
        let mut versions = self.versions.clone();
        dedup_in_order(&mut versions);

        let config = MirrorConfig::new(&self.output_dir, versions);
        match &self.source_url {
            Some(root) => config.source_root(root),
            None => config,
        }
    }

    pub fn transport_options(&self) -> TransportOptions {
        let options = TransportOptions::default().accept_invalid_certs(self.insecure);
        match self.proxy.config() {
            Some(proxy) => options.proxy(proxy),
            None => options,
        }
    }

    /// Default log level when `RUST_LOG` is unset.
    pub fn log_level(&self) -> tracing::Level {
        if self.verbose {
            tracing::Level::DEBUG
        } else if self.quiet {
            tracing::Level::WARN
        } else {
            tracing::Level::INFO
        }
    }
}

fn dedup_in_order(versions: &mut Vec<FeedVersion>) {
    let mut seen = Vec::with_capacity(versions.len());
    versions.retain(|v| {
        let first = !seen.contains(v);
        seen.push(*v);
        first
    });
}
