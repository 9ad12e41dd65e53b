use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::utils::time::system_time_to_utc;

/// Recursively list every regular file under a directory
/// Missing directories yield an empty list; unreadable entries are skipped.
/// Symlinks to files are listed, symlinked directories are not descended into.
pub fn list_files<P: AsRef<Path>>(directory: P) -> Vec<PathBuf> {
    let dir_path = directory.as_ref();

    if !dir_path.exists() {
        warn!("Directory does not exist: {:?}", dir_path);
        return Vec::new();
    }

    WalkDir::new(dir_path)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping unreadable entry under {:?}: {}", dir_path, e);
                None
            }
        })
        .filter(|entry| {
            entry.file_type().is_file() || (entry.path_is_symlink() && entry.path().is_file())
        })
        .map(|entry| entry.into_path())
        .collect()
}

/// Keep only files last modified strictly before `cutoff`
pub fn filter_files_older_than(files: Vec<PathBuf>, cutoff: DateTime<Utc>) -> Vec<PathBuf> {
    files
        .into_iter()
        .filter(|path| match is_modified_before(path, cutoff) {
            Ok(older) => older,
            Err(e) => {
                warn!("Skipping {:?}: {}", path, e);
                false
            }
        })
        .collect()
}

/// Read the modification time now and compare it against the cutoff
fn is_modified_before(path: &Path, cutoff: DateTime<Utc>) -> Result<bool> {
    let modified = fs::metadata(path)
        .with_context(|| format!("Failed to read metadata for: {:?}", path))?
        .modified()
        .with_context(|| format!("Failed to get modification time for: {:?}", path))?;

    Ok(system_time_to_utc(modified) < cutoff)
}

/// Move a file, creating the destination directory as needed
/// Falls back to copy + remove when a plain rename is not possible
pub fn move_file_safe<P: AsRef<Path>, Q: AsRef<Path>>(source: P, destination: Q) -> Result<()> {
    let src_path = source.as_ref();
    let dest_path = destination.as_ref();

    if !src_path.is_file() {
        anyhow::bail!("Source file does not exist: {:?}", src_path);
    }

    if let Some(parent) = dest_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {:?}", parent))?;
    }

    if let Err(rename_error) = fs::rename(src_path, dest_path) {
        debug!(
            "Rename {:?} -> {:?} failed ({}), falling back to copy",
            src_path, dest_path, rename_error
        );
        copy_then_remove(src_path, dest_path)?;
    }

    Ok(())
}

/// The copy keeps the source modification time, which later drives the time bucket
fn copy_then_remove(src_path: &Path, dest_path: &Path) -> Result<()> {
    let copied = fs::metadata(src_path)
        .and_then(|metadata| metadata.modified())
        .and_then(|modified| {
            fs::copy(src_path, dest_path)?;
            fs::OpenOptions::new()
                .write(true)
                .open(dest_path)?
                .set_modified(modified)
        });

    if let Err(e) = copied {
        let _ = fs::remove_file(dest_path);
        return Err(e).with_context(|| {
            format!("Failed to move file from {:?} to {:?}", src_path, dest_path)
        });
    }

    fs::remove_file(src_path)
        .with_context(|| format!("Failed to remove source after copy: {:?}", src_path))
}

/// Remove a single file
pub fn delete_file<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    fs::remove_file(path).with_context(|| format!("Failed to delete file: {:?}", path))
}
