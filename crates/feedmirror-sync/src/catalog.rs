//! The static table of feed resources per feed version.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use url::Url;

use crate::error::{Result, SyncError};

/// Feed generations the mirror knows how to lay out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FeedVersion {
    /// JSON 1.1 feeds, gzip-compressed, each with a `.meta` sidecar.
    #[serde(rename = "1.1")]
    Json11,
    /// Legacy XML 2.0 feeds, published without sidecars.
    #[serde(rename = "2.0")]
    Xml20,
}

impl FeedVersion {
    pub fn as_str(self) -> &'static str {
        match self {
            FeedVersion::Json11 => "1.1",
            FeedVersion::Xml20 => "2.0",
        }
    }

    /// Directory the feed files are published under.
    pub fn default_root(self) -> &'static str {
        match self {
            FeedVersion::Json11 => "https://nvd.nist.gov/feeds/json/cve/1.1/",
            FeedVersion::Xml20 => "https://static.nvd.nist.gov/feeds/xml/cve/",
        }
    }

    fn layout(self) -> Layout {
        match self {
            FeedVersion::Json11 => Layout {
                modified:      "nvdcve-1.1-modified.json.gz",
                modified_meta: Some("nvdcve-1.1-modified.meta"),
                recent:        Some(("nvdcve-1.1-recent.json.gz", Some("nvdcve-1.1-recent.meta"))),
                base:          "nvdcve-1.1-{year}.json.gz",
                base_meta:     Some("nvdcve-1.1-{year}.meta"),
            },
            FeedVersion::Xml20 => Layout {
                modified:      "nvdcve-2.0-modified.xml",
                modified_meta: None,
                recent:        None,
                base:          "nvdcve-2.0-{year}.xml",
                base_meta:     None,
            },
        }
    }
}

impl fmt::Display for FeedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown feed version `{0}` (expected 1.1 or 2.0)")]
pub struct UnknownFeedVersion(pub String);

impl FromStr for FeedVersion {
    type Err = UnknownFeedVersion;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "1.1" => Ok(FeedVersion::Json11),
            "2.0" => Ok(FeedVersion::Xml20),
            other => Err(UnknownFeedVersion(other.to_string())),
        }
    }
}

/// File names of one feed version, relative to its root.
struct Layout {
    modified:      &'static str,
    modified_meta: Option<&'static str>,
    recent:        Option<(&'static str, Option<&'static str>)>,
    base:          &'static str,
    base_meta:     Option<&'static str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResourceKind {
    Modified,
    Recent,
    Base { year: i32 },
}

/// One mirrored payload and, optionally, its sidecar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDescriptor {
    pub id:          String,
    pub kind:        ResourceKind,
    pub payload_url: Url,
    /// Without a sidecar there is nothing to compare, so the payload is
    /// fetched on every run.
    pub meta_url:    Option<Url>,
}

impl ResourceDescriptor {
    fn new(version: FeedVersion, kind: ResourceKind, payload: &str, meta: Option<&str>) -> Result<Self> {
        let id = match kind {
            ResourceKind::Modified => format!("{version}/modified"),
            ResourceKind::Recent => format!("{version}/recent"),
            ResourceKind::Base { year } => format!("{version}/{year}"),
        };
        Ok(Self {
            id,
            kind,
            payload_url: parse_url(payload)?,
            meta_url: meta.map(parse_url).transpose()?,
        })
    }

    pub fn is_base(&self) -> bool { matches!(self.kind, ResourceKind::Base { .. }) }
}

fn parse_url(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|source| SyncError::InvalidUrl {
        url: raw.to_string(),
        source,
    })
}

/// Every resource of one feed version, in processing order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    pub version:  FeedVersion,
    pub modified: ResourceDescriptor,
    pub recent:   Option<ResourceDescriptor>,
    /// Ascending by year.
    pub base:     Vec<ResourceDescriptor>,
}

impl Catalog {
    /// Build the catalog for `version` covering `start_year..=end_year`.
    ///
    /// `root` replaces the version's default publication directory, e.g. to
    /// mirror from another mirror.
    pub fn for_version(version: FeedVersion, root: Option<&str>, start_year: i32, end_year: i32) -> Result<Self> {
        let mut root = root.unwrap_or(version.default_root()).to_string();
        if !root.ends_with('/') {
            root.push('/');
        }
        let layout = version.layout();
        let at = |file: &str| format!("{root}{file}");
        let for_year = |file: &str, year: i32| at(&file.replace("{year}", &year.to_string()));

        let modified = ResourceDescriptor::new(
            version,
            ResourceKind::Modified,
            &at(layout.modified),
            layout.modified_meta.map(at).as_deref(),
        )?;
        let recent = layout
            .recent
            .map(|(payload, meta)| {
                ResourceDescriptor::new(version, ResourceKind::Recent, &at(payload), meta.map(at).as_deref())
            })
            .transpose()?;
        let base = (start_year..=end_year)
            .map(|year| {
                ResourceDescriptor::new(
                    version,
                    ResourceKind::Base { year },
                    &for_year(layout.base, year),
                    layout.base_meta.map(|m| for_year(m, year)).as_deref(),
                )
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            version,
            modified,
            recent,
            base,
        })
    }

    /// Modified first, then recent, then base resources by ascending year.
    pub fn resources(&self) -> impl Iterator<Item = &ResourceDescriptor> {
        std::iter::once(&self.modified)
            .chain(self.recent.iter())
            .chain(self.base.iter())
    }
}
