//! Storage locations for records
//!
//! Builds the source and destination URLs of a record and parses such URLs
//! back into bucket and key.
//!
//! Keys are escaped the way S3 object URLs expect: each `/`-delimited
//! segment is query-escaped on its own, so a space becomes `+` and a plus
//! becomes `%2B`, while `/` stays a delimiter.

use std::str::FromStr;

use thiserror::Error;

use crate::domain::record::{InputRow, Record};

/// Errors raised while parsing a storage URL
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LocatorError {
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("not an S3 object URL: {0}")]
    NotStorageHost(String),

    #[error("URL has no object key: {0}")]
    MissingKey(String),

    #[error("key segment '{0}' is not valid UTF-8 once unescaped")]
    InvalidEscape(String),
}

/// How the result file of a record is named
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResultNaming {
    /// `{serial}.csv`
    #[default]
    Serial,
    /// The source path with its extension replaced by `.csv`
    SourcePath,
}

impl FromStr for ResultNaming {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "serial" => Ok(ResultNaming::Serial),
            "source-path" => Ok(ResultNaming::SourcePath),
            other => Err(format!(
                "unknown result naming '{}', expected 'serial' or 'source-path'",
                other
            )),
        }
    }
}

/// Resolves records against the configured buckets
#[derive(Debug, Clone)]
pub struct Locator {
    pub input_bucket: String,
    pub output_bucket: String,
    pub output_prefix: String,
    pub region: String,
    pub naming: ResultNaming,
}

impl Locator {
    /// Turns an input row into a record with both URLs filled in
    pub fn resolve(&self, row: InputRow) -> Record {
        let source_url = self.source_url(&row.original_file_path);
        let destination_url = self.destination_url(&row);

        Record {
            serial: row.serial,
            original_file_path: row.original_file_path,
            source_url,
            destination_url,
        }
    }

    /// URL of the source video in the input bucket
    pub fn source_url(&self, original_file_path: &str) -> String {
        object_url(&self.input_bucket, &self.region, original_file_path)
    }

    /// URL the generated palette is written to
    pub fn destination_url(&self, row: &InputRow) -> String {
        let key = join_key(&self.output_prefix, &self.result_file_name(row));
        object_url(&self.output_bucket, &self.region, &key)
    }

    pub fn result_file_name(&self, row: &InputRow) -> String {
        match self.naming {
            ResultNaming::Serial => format!("{}.csv", row.serial),
            ResultNaming::SourcePath => {
                replace_extension(row.original_file_path.trim_start_matches('/'), "csv")
            }
        }
    }
}

/// Bucket and key of a stored object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectLocation {
    pub bucket: String,
    pub key: String,
}

impl ObjectLocation {
    /// Parses a virtual-hosted S3 URL such as
    /// `https://bucket.s3.ap-southeast-1.amazonaws.com/some/key`
    pub fn from_url(raw: &str) -> Result<Self, LocatorError> {
        let url = url::Url::parse(raw).map_err(|e| LocatorError::InvalidUrl {
            url: raw.to_string(),
            reason: e.to_string(),
        })?;

        let host = url
            .host_str()
            .ok_or_else(|| LocatorError::NotStorageHost(raw.to_string()))?;

        let bucket = match host.split_once(".s3.") {
            Some((bucket, rest)) if !bucket.is_empty() && rest.ends_with("amazonaws.com") => {
                bucket
            }
            _ => return Err(LocatorError::NotStorageHost(raw.to_string())),
        };

        // `Url::path` resolves `.` and `..` segments, which are literal in object keys
        let escaped = raw_path(raw).trim_start_matches('/');
        if escaped.is_empty() {
            return Err(LocatorError::MissingKey(raw.to_string()));
        }

        Ok(Self {
            bucket: bucket.to_string(),
            key: key_unescape(escaped)?,
        })
    }
}

/// Path of a URL exactly as written, without query or fragment
fn raw_path(raw: &str) -> &str {
    let after_scheme = raw.split_once("://").map_or(raw, |(_, rest)| rest);
    let path = after_scheme
        .find('/')
        .map_or("", |idx| &after_scheme[idx..]);

    path.split(['?', '#']).next().unwrap_or_default()
}

/// Builds `https://{bucket}.s3.{region}.amazonaws.com/{escaped key}`
pub fn object_url(bucket: &str, region: &str, key: &str) -> String {
    format!(
        "https://{}.s3.{}.amazonaws.com/{}",
        bucket,
        region,
        key_escape(key)
    )
}

/// Query-escapes every `/`-delimited segment of a key
pub fn key_escape(key: &str) -> String {
    key.split('/')
        .map(|segment| urlencoding::encode(segment).replace("%20", "+"))
        .collect::<Vec<_>>()
        .join("/")
}

/// Reverses [`key_escape`]
pub fn key_unescape(escaped: &str) -> Result<String, LocatorError> {
    escaped
        .split('/')
        .map(|segment| {
            urlencoding::decode(&segment.replace('+', " "))
                .map(|s| s.into_owned())
                .map_err(|_| LocatorError::InvalidEscape(segment.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()
        .map(|segments| segments.join("/"))
}

/// Joins a prefix and a file name the way a relative filesystem path would
fn join_key(prefix: &str, file_name: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        file_name.to_string()
    } else {
        format!("{}/{}", prefix, file_name)
    }
}

fn replace_extension(path: &str, extension: &str) -> String {
    let (dir, name) = match path.rsplit_once('/') {
        Some((dir, name)) => (Some(dir), name),
        None => (None, path),
    };

    // Dotfiles keep their full name as the stem
    let stem = match name.rfind('.') {
        Some(idx) if idx > 0 => &name[..idx],
        _ => name,
    };

    match dir {
        Some(dir) => format!("{}/{}.{}", dir, stem, extension),
        None => format!("{}.{}", stem, extension),
    }
}
