use anyhow::Result;
use tracing::info;

use crate::models::FileRecord;
use crate::utils::delete_file;

/// Delete confirmed-uploaded files from the working directory
/// The first failure is returned and stops further deletion
pub fn delete_uploaded_files(uploaded: &[FileRecord]) -> Result<usize> {
    for record in uploaded {
        info!("Removing file {:?}", record.path);
        delete_file(&record.path)?;
    }

    Ok(uploaded.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::create_file_record_from_path;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_deletes_only_listed_files() {
        let dir = TempDir::new().unwrap();
        let uploaded = dir.path().join("uploaded.txt");
        let kept = dir.path().join("kept.txt");
        fs::write(&uploaded, "u").unwrap();
        fs::write(&kept, "k").unwrap();

        let records = vec![create_file_record_from_path(&uploaded).unwrap()];
        let deleted = delete_uploaded_files(&records).unwrap();

        assert_eq!(deleted, 1);
        assert!(!uploaded.exists());
        assert!(kept.exists());
    }

    #[test]
    fn test_missing_file_propagates_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gone.txt");
        fs::write(&path, "g").unwrap();
        let records = vec![create_file_record_from_path(&path).unwrap()];
        fs::remove_file(&path).unwrap();

        assert!(delete_uploaded_files(&records).is_err());
    }
}
