pub mod file_record;
pub mod upload_target;

pub use file_record::{create_file_record_from_path, FileRecord, TimeBucket};
pub use upload_target::{odata_literal, CreatedFolderSet, RemotePath, UploadTarget};
