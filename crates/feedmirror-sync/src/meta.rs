//! Sidecar metadata descriptors.
//!
//! Feed sidecars are small line-oriented property files published next to
//! each payload:
//!
//! ```text
//! lastModifiedDate:2024-03-01T03:00:01-05:00
//! size:92016481
//! zipSize:4802123
//! gzSize:4801987
//! sha256:6C5C3B16F1D3B0E1B8C30E1C1A2A5D1F8C7E0E95E1A8E4E8B6B2C5F37A0D9F12
//! ```
//!
//! Keys are separated from values by the first `:` or `=`, as in Java
//! property files. Fields are looked up by name, never by line position.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, Utc};

use crate::error::{ParseError, ParseErrorKind, Result, SyncError};

const LAST_MODIFIED: &str = "lastModifiedDate";
const SIZE: &str = "size";
const ZIP_SIZE: &str = "zipSize";
const GZ_SIZE: &str = "gzSize";
const SHA256: &str = "sha256";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaDescriptor {
    /// Remote last-modified time, in seconds since the Unix epoch.
    pub last_modified: i64,
    pub size:          u64,
    pub zip_size:      u64,
    pub gz_size:       u64,
    /// Uppercase hex SHA-256 of the uncompressed payload, when published.
    pub sha256:        Option<String>,
}

impl MetaDescriptor {
    pub fn last_modified_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.last_modified, 0)
    }

    /// Parse the sidecar at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| SyncError::ReadSidecar {
            path: path.to_path_buf(),
            source,
        })?;
        text.parse().map_err(|source| SyncError::CorruptSidecar {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Like [`load`](Self::load), but a missing file means "no prior state".
    pub fn load_if_present(path: &Path) -> Result<Option<Self>> {
        match fs::read_to_string(path) {
            Ok(text) => text.parse().map(Some).map_err(|source| SyncError::CorruptSidecar {
                path: path.to_path_buf(),
                source,
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(SyncError::ReadSidecar {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

impl FromStr for MetaDescriptor {
    type Err = ParseError;

    fn from_str(text: &str) -> std::result::Result<Self, Self::Err> {
        let props = properties(text);

        let last_modified = parse_timestamp(required(&props, LAST_MODIFIED)?)?;
        let zip_size = parse_size(&props, ZIP_SIZE)?;
        let gz_size = parse_size(&props, GZ_SIZE)?;
        let size = parse_size(&props, SIZE)?;
        let sha256 = props
            .get(SHA256)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(str::to_ascii_uppercase);

        Ok(Self {
            last_modified,
            size,
            zip_size,
            gz_size,
            sha256,
        })
    }
}

fn properties(text: &str) -> HashMap<&str, &str> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('!'))
        .filter_map(split_property)
        .collect()
}

fn split_property(line: &str) -> Option<(&str, &str)> {
    let end = line.find(|c: char| c == '=' || c == ':' || c.is_whitespace())?;
    let key = &line[..end];
    let rest = line[end..].trim_start();
    let value = rest
        .strip_prefix('=')
        .or_else(|| rest.strip_prefix(':'))
        .unwrap_or(rest)
        .trim();
    Some((key, value))
}

fn required<'a>(props: &HashMap<&str, &'a str>, field: &'static str) -> std::result::Result<&'a str, ParseError> {
    props.get(field).copied().ok_or(ParseError {
        kind: ParseErrorKind::MissingField,
        field,
        value: None,
    })
}

fn parse_timestamp(raw: &str) -> std::result::Result<i64, ParseError> {
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::<FixedOffset>::parse_from_str(raw, "%Y-%m-%dT%H:%M%:z"))
        .map(|dt| dt.timestamp())
        .map_err(|_| ParseError {
            kind:  ParseErrorKind::MalformedTimestamp,
            field: LAST_MODIFIED,
            value: Some(raw.to_string()),
        })
}

fn parse_size(props: &HashMap<&str, &str>, field: &'static str) -> std::result::Result<u64, ParseError> {
    let raw = required(props, field)?;
    raw.parse().map_err(|_| ParseError {
        kind:  ParseErrorKind::MalformedInteger,
        field,
        value: Some(raw.to_string()),
    })
}
