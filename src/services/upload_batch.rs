//! Upload of the staged working set into per-month library folders.
//!
//! Files are handled one at a time in the order given. For each file the
//! month folder is created unless this run already saw it created, then the
//! content is uploaded with overwrite semantics. Only 2xx responses count as
//! success, and only successfully uploaded files are handed on to cleanup.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::models::{
    create_file_record_from_path, CreatedFolderSet, FileRecord, RemotePath, UploadTarget,
};
use crate::remote::RemoteLibrary;

/// Upload every file, recording per-file outcomes
///
/// `created_folders` is read and extended in place, so callers can start from
/// an empty set or a pre-seeded one.
pub async fn upload_files<R>(
    remote: &R,
    target: &UploadTarget,
    files: &[PathBuf],
    created_folders: &mut CreatedFolderSet,
) -> UploadReport
where
    R: RemoteLibrary + ?Sized,
{
    info!(
        "Uploading {} files to host {}, site {}, library {}",
        files.len(),
        target.host,
        target.site,
        target.library
    );

    let mut results = Vec::with_capacity(files.len());
    let mut overwritten = Vec::new();
    let mut uploaded_targets: HashMap<(RemotePath, String), PathBuf> = HashMap::new();
    for path in files {
        let result = upload_one(remote, target, path, created_folders).await;
        log_upload_result(&result);

        if let UploadResult::Uploaded { record, folder, .. } = &result {
            let key = (folder.clone(), record.name.clone());
            if let Some(earlier) = uploaded_targets.insert(key, record.path.clone()) {
                warn!(
                    "{:?} replaced {}/{} uploaded earlier in this run from {:?}",
                    record.path, folder, record.name, earlier
                );
                overwritten.push(earlier);
            }
        }
        results.push(result);
    }

    let mut report = create_upload_report(results);
    report.overwritten = overwritten;
    info!(
        "Successful uploads: {}, failed uploads: {}",
        report.successful_count(),
        report.failed_count()
    );

    report
}

async fn upload_one<R>(
    remote: &R,
    target: &UploadTarget,
    path: &Path,
    created_folders: &mut CreatedFolderSet,
) -> UploadResult
where
    R: RemoteLibrary + ?Sized,
{
    let (record, content) = match read_staged_file(path) {
        Ok(read) => read,
        Err(e) => {
            return UploadResult::Unreadable {
                path: path.to_path_buf(),
                error: format!("{:#}", e),
            }
        }
    };

    let bucket = record.time_bucket();
    let folder = match target.folder_for(&bucket) {
        Ok(folder) => folder,
        Err(e) => {
            return UploadResult::FolderFailed {
                record,
                folder: None,
                reason: e.to_string(),
            }
        }
    };

    if !created_folders.contains(&folder) {
        match remote.create_folder(&folder).await {
            Ok(status) if status.is_success() => {
                info!("Folder {} available (status {})", folder, status.as_u16());
                created_folders.insert(folder.clone());
            }
            Ok(status) => {
                return UploadResult::FolderFailed {
                    record,
                    folder: Some(folder),
                    reason: format!("status {}", status.as_u16()),
                }
            }
            Err(e) => {
                return UploadResult::FolderFailed {
                    record,
                    folder: Some(folder),
                    reason: e.to_string(),
                }
            }
        }
    }

    let sha256 = format!("{:x}", Sha256::digest(&content));
    match remote.upload_file(&folder, &record.name, content).await {
        Ok(status) if status.is_success() => UploadResult::Uploaded {
            record,
            folder,
            status: status.as_u16(),
            sha256,
        },
        Ok(status) => UploadResult::UploadFailed {
            record,
            folder,
            reason: format!("status {}", status.as_u16()),
        },
        Err(e) => UploadResult::UploadFailed {
            record,
            folder,
            reason: e.to_string(),
        },
    }
}

fn read_staged_file(path: &Path) -> anyhow::Result<(FileRecord, Vec<u8>)> {
    use anyhow::Context;

    let content = fs::read(path).with_context(|| format!("Failed to read file: {:?}", path))?;
    let record = create_file_record_from_path(path)?;
    Ok((record, content))
}

/// Log a per-file outcome as soon as it is known
fn log_upload_result(result: &UploadResult) {
    match result {
        UploadResult::Uploaded {
            record,
            folder,
            status,
            sha256,
        } => info!(
            "OK: upload of {:?} to {}/{} resulted in status {} ({} bytes, sha256 {})",
            record.path, folder, record.name, status, record.size_bytes, sha256
        ),
        UploadResult::Unreadable { path, error } => {
            error!("ERROR: could not read {:?}: {}", path, error)
        }
        UploadResult::FolderFailed {
            record,
            folder,
            reason,
        } => error!(
            "ERROR: creating folder {} for {:?} failed: {}",
            folder.as_ref().map(|f| f.as_str()).unwrap_or("<invalid>"),
            record.path,
            reason
        ),
        UploadResult::UploadFailed {
            record,
            folder,
            reason,
        } => error!(
            "ERROR: upload of {:?} to {} failed: {}",
            record.path, folder, reason
        ),
    }
}

/// Fold per-file results into the run-level report
fn create_upload_report(results: Vec<UploadResult>) -> UploadReport {
    let mut uploaded = Vec::new();
    let mut failures = Vec::new();

    for result in results {
        match result {
            UploadResult::Uploaded { record, .. } => uploaded.push(record),
            UploadResult::Unreadable { path, error } => failures.push(UploadFailure {
                path,
                stage: FailureStage::Read,
                reason: error,
            }),
            UploadResult::FolderFailed { record, reason, .. } => failures.push(UploadFailure {
                path: record.path,
                stage: FailureStage::CreateFolder,
                reason,
            }),
            UploadResult::UploadFailed { record, reason, .. } => failures.push(UploadFailure {
                path: record.path,
                stage: FailureStage::Upload,
                reason,
            }),
        }
    }

    UploadReport {
        uploaded,
        failures,
        overwritten: Vec::new(),
    }
}

/// Outcome of handling one staged file
#[derive(Debug, Clone)]
pub enum UploadResult {
    Uploaded {
        record: FileRecord,
        folder: RemotePath,
        status: u16,
        sha256: String,
    },
    Unreadable {
        path: PathBuf,
        error: String,
    },
    FolderFailed {
        record: FileRecord,
        folder: Option<RemotePath>,
        reason: String,
    },
    UploadFailed {
        record: FileRecord,
        folder: RemotePath,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    Read,
    CreateFolder,
    Upload,
}

#[derive(Debug, Clone)]
pub struct UploadFailure {
    pub path: PathBuf,
    pub stage: FailureStage,
    pub reason: String,
}

/// Run-level accounting of the upload batch
#[derive(Debug, Clone, Default)]
pub struct UploadReport {
    pub uploaded: Vec<FileRecord>,
    pub failures: Vec<UploadFailure>,
    /// Uploaded files whose remote copy a later file with the same folder and name replaced
    pub overwritten: Vec<PathBuf>,
}

impl UploadReport {
    pub fn successful_count(&self) -> usize {
        self.uploaded.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failures.len()
    }

    pub fn total_processed(&self) -> usize {
        self.successful_count() + self.failed_count()
    }

    pub fn success_rate(&self) -> f64 {
        let total = self.total_processed();
        if total == 0 {
            0.0
        } else {
            self.successful_count() as f64 / total as f64
        }
    }
}
