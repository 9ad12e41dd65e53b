pub mod archive_run;
pub mod cleanup;
pub mod file_staging;
pub mod upload_batch;

pub use archive_run::{run_archive, ArchiveConfig, ArchiveReport};
pub use cleanup::delete_uploaded_files;
pub use file_staging::{select_stale_files, stage_files, SelectionReport};
pub use upload_batch::{
    upload_files, FailureStage, UploadFailure, UploadReport, UploadResult,
};
