pub mod library;
pub mod sharepoint;
pub mod sharepoint_auth;

#[cfg(any(test, feature = "test-export-mocks"))]
pub use library::{MockLibraryConnector, MockRemoteLibrary};
pub use library::{LibraryConnector, RemoteLibrary};
pub use sharepoint::{SharePointClient, SharePointConnector};
