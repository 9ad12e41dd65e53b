use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use std::path::{Path, PathBuf};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::credentials::{resolve_password, CredentialStore};
use crate::error::ArchiveError;
use crate::models::{create_file_record_from_path, CreatedFolderSet, UploadTarget};
use crate::remote::LibraryConnector;
use crate::services::cleanup::delete_uploaded_files;
use crate::services::file_staging::{select_stale_files, stage_files};
use crate::services::upload_batch::{upload_files, UploadReport};
use crate::utils::list_files;
use crate::utils::time::{age_in_days, cutoff_for_days, format_timestamp};

/// Everything one archive run needs to know
#[derive(Debug, Clone)]
pub struct ArchiveConfig {
    pub input_dir: PathBuf,
    pub working_dir: PathBuf,
    pub target: UploadTarget,
    pub days: f64,
    pub user: String,
    pub delete: bool,
    pub dry_run: bool,
}

/// Select, stage, upload and clean up stale files
///
/// Fatal conditions (missing credential, forbidden probe, staging or
/// deletion errors) return `Err`. Per-file upload failures are reported in
/// the returned [`ArchiveReport`].
pub async fn run_archive(
    config: &ArchiveConfig,
    start: DateTime<Utc>,
    credentials: &dyn CredentialStore,
    connector: &dyn LibraryConnector,
) -> Result<ArchiveReport> {
    let run_id = Uuid::new_v4();
    let span = info_span!("archive_run", %run_id);

    execute(run_id, config, start, credentials, connector)
        .instrument(span)
        .await
}

async fn execute(
    run_id: Uuid,
    config: &ArchiveConfig,
    start: DateTime<Utc>,
    credentials: &dyn CredentialStore,
    connector: &dyn LibraryConnector,
) -> Result<ArchiveReport> {
    info!(
        "Starting archive run at {} (epoch {})",
        format_timestamp(start),
        start.timestamp()
    );

    let cutoff = cutoff_for_days(start, config.days)?;
    let library = config.target.library_root()?;
    debug!("Uploads go below library folder {}", library);

    let selection = select_stale_files(&config.input_dir, cutoff);
    info!(
        "Found {} files older than {} days ({:.2}% of discovered)",
        selection.eligible.len(),
        config.days,
        selection.eligible_rate() * 100.0
    );

    let mut report = ArchiveReport {
        run_id,
        cutoff,
        discovered: selection.discovered,
        eligible: selection.eligible,
        staged: 0,
        rediscovered: 0,
        upload: None,
        deleted: 0,
        dry_run: config.dry_run,
    };

    if config.dry_run {
        info!("DRY RUN mode - listing files");
        log_eligible_files(&report.eligible, start);
        info!("DRY RUN mode - nothing moved, uploaded or deleted");
        return Ok(report);
    }

    if report.eligible.is_empty() {
        info!("No files old enough to archive");
    }

    let target = &config.target;
    info!(
        "Using host {}, site {}, library {}",
        target.host, target.site, target.library
    );
    let password = resolve_password(credentials, &target.host, &config.user)?;

    let remote = connector
        .connect(target, &config.user, &password)
        .await
        .with_context(|| format!("Failed to open a session on {} as {}", target.host, config.user))?;

    let probe_status = remote
        .probe()
        .await
        .with_context(|| format!("Failed to reach {}", target.host_url()))?;
    check_probe_status(&target.host, probe_status)?;

    let staged = stage_files(&report.eligible, &config.input_dir, &config.working_dir)?;
    report.staged = staged.len();

    let working_files = list_files(&config.working_dir);
    report.rediscovered = working_files.len();
    info!(
        "Found {} files under working directory: {:?}",
        working_files.len(),
        config.working_dir
    );

    let mut created_folders = CreatedFolderSet::new();
    let upload = upload_files(remote.as_ref(), target, &working_files, &mut created_folders).await;

    if config.delete {
        report.deleted = delete_uploaded_files(&upload.uploaded)?;
    } else if upload.successful_count() > 0 {
        info!(
            "Deletion disabled, keeping {} uploaded files in {:?}",
            upload.successful_count(),
            config.working_dir
        );
    }

    report.upload = Some(upload);
    Ok(report)
}

/// Only an explicit 403 aborts; other statuses are left to the real requests
fn check_probe_status(host: &str, status: StatusCode) -> Result<()> {
    if status == StatusCode::FORBIDDEN {
        return Err(ArchiveError::Forbidden {
            host: host.to_string(),
        }
        .into());
    }

    if !status.is_success() {
        warn!("Probe of {} returned status {}, continuing", host, status.as_u16());
    }

    Ok(())
}

fn log_eligible_files(files: &[PathBuf], now: DateTime<Utc>) {
    for path in files {
        log_eligible_file(path, now);
    }
}

fn log_eligible_file(path: &Path, now: DateTime<Utc>) {
    match create_file_record_from_path(path) {
        Ok(record) => info!(
            "  {:?} (modified {}, {:.1} days old)",
            record.path,
            format_timestamp(record.modified_at),
            age_in_days(record.modified_at, now)
        ),
        Err(_) => info!("  {:?}", path),
    }
}

/// Summary of one archive run
#[derive(Debug, Clone)]
pub struct ArchiveReport {
    pub run_id: Uuid,
    pub cutoff: DateTime<Utc>,
    pub discovered: usize,
    pub eligible: Vec<PathBuf>,
    pub staged: usize,
    pub rediscovered: usize,
    pub upload: Option<UploadReport>,
    pub deleted: usize,
    pub dry_run: bool,
}

impl ArchiveReport {
    pub fn successful_uploads(&self) -> usize {
        self.upload.as_ref().map_or(0, UploadReport::successful_count)
    }

    pub fn failed_uploads(&self) -> usize {
        self.upload.as_ref().map_or(0, UploadReport::failed_count)
    }

    /// True when the run finished but at least one file was not uploaded
    pub fn has_failures(&self) -> bool {
        self.failed_uploads() > 0
    }
}
