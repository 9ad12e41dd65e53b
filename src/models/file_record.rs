use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::utils::time::{system_time_to_utc, year_month};

/// A file found on disk, identified only by its path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: PathBuf,
    pub name: String,
    pub size_bytes: u64,
    pub modified_at: DateTime<Utc>,
}

impl FileRecord {
    pub fn new(path: PathBuf, name: String, size_bytes: u64, modified_at: DateTime<Utc>) -> Self {
        Self {
            path,
            name,
            size_bytes,
            modified_at,
        }
    }

    /// Directory of this file relative to `root`, empty when it sits directly in it
    pub fn relative_dir(&self, root: &Path) -> Result<PathBuf> {
        let parent = self.path.parent().unwrap_or_else(|| Path::new(""));
        parent
            .strip_prefix(root)
            .map(Path::to_path_buf)
            .with_context(|| format!("{:?} is not under {:?}", self.path, root))
    }

    pub fn time_bucket(&self) -> TimeBucket {
        TimeBucket::from_datetime(self.modified_at)
    }
}

/// Build a FileRecord from the metadata currently on disk
pub fn create_file_record_from_path<P: AsRef<Path>>(file_path: P) -> Result<FileRecord> {
    let path = file_path.as_ref();
    let metadata = std::fs::metadata(path)
        .with_context(|| format!("Failed to read metadata for: {:?}", path))?;

    let modified = metadata
        .modified()
        .with_context(|| format!("Failed to get modification time for: {:?}", path))?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .with_context(|| format!("Path has no file name: {:?}", path))?;

    Ok(FileRecord::new(
        path.to_path_buf(),
        name,
        metadata.len(),
        system_time_to_utc(modified),
    ))
}

/// UTC year-month label used as the remote subfolder
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimeBucket(String);

impl TimeBucket {
    pub fn from_datetime(timestamp: DateTime<Utc>) -> Self {
        Self(year_month(timestamp))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TimeBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use filetime::{set_file_mtime, FileTime};
    use tempfile::TempDir;

    #[test]
    fn test_time_bucket_from_datetime() {
        let timestamp = Utc.with_ymd_and_hms(2022, 7, 14, 18, 30, 0).unwrap();
        assert_eq!(TimeBucket::from_datetime(timestamp).as_str(), "2022-07");
    }

    #[test]
    fn test_create_file_record_reads_metadata() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.csv");
        std::fs::write(&path, b"a,b,c\n").unwrap();
        set_file_mtime(&path, FileTime::from_unix_time(1_700_000_000, 0)).unwrap();

        let record = create_file_record_from_path(&path).unwrap();

        assert_eq!(record.name, "report.csv");
        assert_eq!(record.size_bytes, 6);
        assert_eq!(record.modified_at, Utc.timestamp_opt(1_700_000_000, 0).unwrap());
        assert_eq!(record.time_bucket().as_str(), "2023-11");
    }

    #[test]
    fn test_create_file_record_missing_file() {
        let dir = TempDir::new().unwrap();
        assert!(create_file_record_from_path(dir.path().join("missing.txt")).is_err());
    }

    #[test]
    fn test_relative_dir() {
        let record = FileRecord::new(
            PathBuf::from("/data/in/a/b/file.txt"),
            "file.txt".to_string(),
            0,
            Utc::now(),
        );
        assert_eq!(
            record.relative_dir(Path::new("/data/in")).unwrap(),
            PathBuf::from("a/b")
        );
        assert_eq!(
            record.relative_dir(Path::new("/data/in/a/b")).unwrap(),
            PathBuf::new()
        );
        assert!(record.relative_dir(Path::new("/elsewhere")).is_err());
    }
}
