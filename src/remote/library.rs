//! Seams between the upload workflow and the remote document library.
//!
//! The batch engine only ever sees [`RemoteLibrary`]; the driver obtains one
//! through a [`LibraryConnector`] once per run. Both traits are mockable so
//! whole runs can be exercised without a network.

use async_trait::async_trait;
use reqwest::StatusCode;

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

use crate::error::RemoteError;
use crate::models::{RemotePath, UploadTarget};

/// An authenticated session against one document library site
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait RemoteLibrary: Send + Sync {
    /// GET the host root; used only to detect an authorization failure
    async fn probe(&self) -> Result<StatusCode, RemoteError>;

    /// Ensure `folder` exists, returning the raw response status
    async fn create_folder(&self, folder: &RemotePath) -> Result<StatusCode, RemoteError>;

    /// Upload `content` as `folder/file_name`, overwriting any existing file
    async fn upload_file(
        &self,
        folder: &RemotePath,
        file_name: &str,
        content: Vec<u8>,
    ) -> Result<StatusCode, RemoteError>;
}

/// Opens a [`RemoteLibrary`] session for a target and user
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait LibraryConnector: Send + Sync {
    async fn connect(
        &self,
        target: &UploadTarget,
        user: &str,
        password: &str,
    ) -> Result<Box<dyn RemoteLibrary>, RemoteError>;
}
