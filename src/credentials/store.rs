use anyhow::Result;
use std::env;
use tracing::debug;

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

use crate::crypto;
use crate::error::{ArchiveError, CredentialError};

/// Prefix marking a value as AES-256-GCM ciphertext
pub const ENCRYPTED_PREFIX: &str = "enc:";

/// Environment variable holding the base64 key for encrypted credentials
pub const SECRET_KEY_VAR: &str = "ARCHIVER_SECRET_KEY";

const PASSWORD_VAR_PREFIX: &str = "ARCHIVER_PASSWORD";

/// Looks up the secret for a user on a host
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait CredentialStore: Send + Sync {
    /// `Ok(None)` when no credential exists for the pair
    fn lookup(&self, host: &str, user: &str) -> Result<Option<String>>;
}

/// Credential store backed by process environment variables
///
/// The password for `user` on `host` lives in
/// `ARCHIVER_PASSWORD__<HOST>__<USER>`, upper-cased with every other
/// character replaced by `_`. Values starting with `enc:` are decrypted with
/// the key in `ARCHIVER_SECRET_KEY`.
#[derive(Debug, Clone, Default)]
pub struct EnvCredentialStore;

impl EnvCredentialStore {
    pub fn new() -> Self {
        Self
    }
}

impl CredentialStore for EnvCredentialStore {
    fn lookup(&self, host: &str, user: &str) -> Result<Option<String>> {
        let variable = credential_variable_name(host, user);
        debug!("Looking up credential in {}", variable);

        let value = match env::var(&variable) {
            Ok(value) if !value.is_empty() => value,
            Ok(_) | Err(env::VarError::NotPresent) => return Ok(None),
            Err(env::VarError::NotUnicode(_)) => {
                return Err(CredentialError::NotUnicode(variable).into())
            }
        };

        match value.strip_prefix(ENCRYPTED_PREFIX) {
            Some(cipher_text) => {
                let key = env::var(SECRET_KEY_VAR)
                    .map_err(|_| CredentialError::MissingKey(SECRET_KEY_VAR.to_string()))?;
                let secret = crypto::decrypt_from_base64_key(&key, cipher_text).map_err(|e| {
                    CredentialError::Decryption {
                        variable: variable.clone(),
                        reason: e.to_string(),
                    }
                })?;
                Ok(Some(secret).filter(|s| !s.is_empty()))
            }
            None => Ok(Some(value)),
        }
    }
}

/// `ARCHIVER_PASSWORD__<HOST>__<USER>` for the given pair
pub fn credential_variable_name(host: &str, user: &str) -> String {
    format!(
        "{}__{}__{}",
        PASSWORD_VAR_PREFIX,
        normalize_for_variable(host),
        normalize_for_variable(user)
    )
}

fn normalize_for_variable(value: &str) -> String {
    value
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// Resolve the password for a run, treating a missing credential as fatal
pub fn resolve_password(store: &dyn CredentialStore, host: &str, user: &str) -> Result<String> {
    store.lookup(host, user)?.ok_or_else(|| {
        ArchiveError::CredentialNotFound {
            user: user.to_string(),
            host: host.to_string(),
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_variable_name() {
        assert_eq!(
            credential_variable_name("contoso.sharepoint.com", "svc.archive@contoso.com"),
            "ARCHIVER_PASSWORD__CONTOSO_SHAREPOINT_COM__SVC_ARCHIVE_CONTOSO_COM"
        );
    }

    #[test]
    fn test_env_store_plain_and_missing() {
        let store = EnvCredentialStore::new();
        let host = "plain-test.example.com";

        env::set_var(credential_variable_name(host, "alice"), "s3cret");
        env::set_var(credential_variable_name(host, "blank"), "");

        assert_eq!(store.lookup(host, "alice").unwrap(), Some("s3cret".to_string()));
        assert_eq!(store.lookup(host, "blank").unwrap(), None);
        assert_eq!(store.lookup(host, "nobody").unwrap(), None);
    }

    #[test]
    fn test_env_store_encrypted_without_key_fails() {
        let store = EnvCredentialStore::new();
        let host = "encrypted-test.example.com";
        env::set_var(credential_variable_name(host, "bob"), "enc:AAAA");
        env::remove_var(SECRET_KEY_VAR);

        assert!(store.lookup(host, "bob").is_err());
    }

    #[test]
    fn test_resolve_password_not_found_is_fatal() {
        let mut store = MockCredentialStore::new();
        store.expect_lookup().returning(|_, _| Ok(None));

        let err = resolve_password(&store, "host.example.com", "carol").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ArchiveError>(),
            Some(ArchiveError::CredentialNotFound { .. })
        ));
    }

    #[test]
    fn test_resolve_password_found() {
        let mut store = MockCredentialStore::new();
        store
            .expect_lookup()
            .withf(|host, user| host == "host.example.com" && user == "carol")
            .returning(|_, _| Ok(Some("pw".to_string())));

        assert_eq!(resolve_password(&store, "host.example.com", "carol").unwrap(), "pw");
    }
}
