pub mod credentials;
pub mod crypto;
pub mod error;
pub mod models;
pub mod remote;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use credentials::{CredentialStore, EnvCredentialStore};
pub use error::{ArchiveError, CredentialError, RemoteError};
pub use models::{CreatedFolderSet, FileRecord, RemotePath, TimeBucket, UploadTarget};
pub use remote::{LibraryConnector, RemoteLibrary, SharePointConnector};
pub use services::{
    run_archive, upload_files, ArchiveConfig, ArchiveReport, SelectionReport, UploadReport,
};

// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub archive: ArchiveConfig,
    pub log_level: String,
}
