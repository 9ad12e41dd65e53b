use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use super::file_record::TimeBucket;
use crate::error::ArchiveError;

/// Remote library a run uploads into; fixed for the whole run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadTarget {
    pub host: String,
    pub site: String,
    pub library: String,
}

impl UploadTarget {
    pub fn new(host: impl Into<String>, site: impl Into<String>, library: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            site: site.into(),
            library: library.into(),
        }
    }

    pub fn host_url(&self) -> String {
        format!("https://{}", self.host)
    }

    pub fn site_url(&self) -> String {
        format!("https://{}/sites/{}", self.host, urlencoding::encode(&self.site))
    }

    /// The library as a remote path root; fails for names like `/` or `a//b`
    pub fn library_root(&self) -> Result<RemotePath, ArchiveError> {
        RemotePath::new(&self.library).map_err(|e| ArchiveError::InvalidLibrary {
            library: self.library.clone(),
            reason: e.to_string(),
        })
    }

    /// `library/bucket`, the folder a file with this bucket is uploaded into
    pub fn folder_for(&self, bucket: &TimeBucket) -> Result<RemotePath> {
        self.library_root()?.join(bucket.as_str())
    }
}

/// Slash-separated path inside a site, e.g. `Archive/2024-01`
///
/// Segments are only ever combined through [`RemotePath::join`], so separator
/// handling lives in one place.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemotePath(String);

impl RemotePath {
    pub fn new(root: &str) -> Result<Self> {
        let trimmed = root.trim_matches('/');
        if trimmed.is_empty() {
            anyhow::bail!("Remote path root must not be empty");
        }
        if trimmed.split('/').any(|segment| segment.is_empty()) {
            anyhow::bail!("Remote path contains an empty segment: {:?}", root);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn join(&self, segment: &str) -> Result<Self> {
        let segment = segment.trim_matches('/');
        if segment.is_empty() {
            anyhow::bail!("Cannot join an empty segment onto {}", self.0);
        }
        if segment.contains('/') {
            anyhow::bail!("Segment must not contain a separator: {:?}", segment);
        }
        Ok(Self(format!("{}/{}", self.0, segment)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Quote-escaped and percent-encoded form for `('...')` OData arguments
    pub fn odata_literal(&self) -> String {
        self.0
            .split('/')
            .map(odata_literal)
            .collect::<Vec<_>>()
            .join("/")
    }
}

impl fmt::Display for RemotePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Escape a value for use inside a single-quoted OData string in a URL
pub fn odata_literal(value: &str) -> String {
    urlencoding::encode(&value.replace('\'', "''")).into_owned()
}

/// Remote folders confirmed to exist during the current run
///
/// Only successes are recorded; a failed creation is retried by the next
/// file that maps to the same folder.
#[derive(Debug, Clone, Default)]
pub struct CreatedFolderSet {
    folders: HashSet<RemotePath>,
}

impl CreatedFolderSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, folder: &RemotePath) -> bool {
        self.folders.contains(folder)
    }

    /// Returns false if the folder was already recorded
    pub fn insert(&mut self, folder: RemotePath) -> bool {
        self.folders.insert(folder)
    }

    pub fn len(&self) -> usize {
        self.folders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.folders.is_empty()
    }
}

impl FromIterator<RemotePath> for CreatedFolderSet {
    fn from_iter<I: IntoIterator<Item = RemotePath>>(iter: I) -> Self {
        Self {
            folders: iter.into_iter().collect(),
        }
    }
}
