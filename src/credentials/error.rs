use thiserror::Error;

/// Coarse classification used by the HTTP boundary to pick a status code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rejected before the store is contacted.
    Validation,
    /// Wrong secret, unknown subject, or expired credential. Never distinguished.
    Authentication,
    /// Another rotation for the same subject won the race.
    Conflict,
    /// Entropy, signing, or storage failures.
    Internal,
}

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("subject identifier is required")]
    InvalidSubject,
    #[error("malformed credential")]
    MalformedCredential,
    #[error("unauthorized")]
    Unauthorized,
    #[error("concurrent rotation for subject")]
    ConcurrentRotation,
    #[error("entropy source unavailable")]
    EntropyUnavailable(#[source] rand::Error),
    #[error("signing key missing")]
    SigningKeyMissing,
    #[error("invalid credential lifetime: {0}")]
    InvalidTtl(&'static str),
    #[error("failed to sign access credential")]
    SigningFailure(#[source] anyhow::Error),
    #[error("credential store failure")]
    Store(#[source] anyhow::Error),
}

impl CredentialError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidSubject | Self::MalformedCredential => ErrorKind::Validation,
            Self::Unauthorized => ErrorKind::Authentication,
            Self::ConcurrentRotation => ErrorKind::Conflict,
            Self::EntropyUnavailable(_)
            | Self::SigningKeyMissing
            | Self::InvalidTtl(_)
            | Self::SigningFailure(_)
            | Self::Store(_) => ErrorKind::Internal,
        }
    }
}
