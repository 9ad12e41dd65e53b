pub mod store;

#[cfg(any(test, feature = "test-export-mocks"))]
pub use store::MockCredentialStore;
pub use store::{credential_variable_name, resolve_password, CredentialStore, EnvCredentialStore};
