use thiserror::Error;

/// Fatal conditions that abort a whole archive run
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Could not get password from credential store for {user}@{host}")]
    CredentialNotFound { user: String, host: String },

    #[error("Forbidden for {host} - authentication failed")]
    Forbidden { host: String },

    #[error("Invalid days value: {0} (expected a non-negative number)")]
    InvalidDays(String),

    #[error("Invalid library name {library:?}: {reason}")]
    InvalidLibrary { library: String, reason: String },
}

/// Failures talking to the remote document library
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Authentication against {endpoint} failed: {reason}")]
    Authentication { endpoint: String, reason: String },

    #[error("Unexpected response from {endpoint}: {detail}")]
    UnexpectedResponse { endpoint: String, detail: String },
}

/// Failures reading credentials out of the environment
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Environment variable {0} is not valid unicode")]
    NotUnicode(String),

    #[error("Encrypted credential in {variable} could not be decrypted: {reason}")]
    Decryption { variable: String, reason: String },

    #[error("Encryption key variable {0} is not set")]
    MissingKey(String),
}
