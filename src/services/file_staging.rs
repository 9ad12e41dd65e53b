use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::models::create_file_record_from_path;
use crate::utils::time::format_timestamp;
use crate::utils::{filter_files_older_than, list_files, move_file_safe};

/// Files found under the input directory and the subset old enough to archive
#[derive(Debug, Clone)]
pub struct SelectionReport {
    pub discovered: usize,
    pub eligible: Vec<PathBuf>,
}

impl SelectionReport {
    pub fn eligible_rate(&self) -> f64 {
        if self.discovered == 0 {
            0.0
        } else {
            self.eligible.len() as f64 / self.discovered as f64
        }
    }
}

/// Walk `input_dir` and keep files last modified before `cutoff`
pub fn select_stale_files(input_dir: &Path, cutoff: DateTime<Utc>) -> SelectionReport {
    let files = list_files(input_dir);
    let discovered = files.len();
    info!("Found {} files under input directory: {:?}", discovered, input_dir);

    info!(
        "Filtering out files modified at or after {} (epoch {})",
        format_timestamp(cutoff),
        cutoff.timestamp()
    );
    let eligible = filter_files_older_than(files, cutoff);

    SelectionReport {
        discovered,
        eligible,
    }
}

/// Move selected files into the working directory, mirroring their layout
/// Any failure aborts; files moved before it stay in the working directory.
/// Returns the new location of every staged file.
pub fn stage_files(files: &[PathBuf], input_dir: &Path, working_dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(working_dir)
        .with_context(|| format!("Failed to create working directory: {:?}", working_dir))?;

    let staged = files
        .iter()
        .map(|file_path| stage_file(file_path, input_dir, working_dir))
        .collect::<Result<Vec<_>>>()?;
    info!("Staged {} files into {:?}", staged.len(), working_dir);

    Ok(staged)
}

/// `working_dir / (directory relative to input_dir) / name`
fn stage_file(file_path: &Path, input_dir: &Path, working_dir: &Path) -> Result<PathBuf> {
    let record = create_file_record_from_path(file_path)?;
    let destination = working_dir
        .join(record.relative_dir(input_dir)?)
        .join(&record.name);

    move_file_safe(&record.path, &destination)?;
    debug!("Moved {:?} -> {:?}", record.path, destination);

    Ok(destination)
}
