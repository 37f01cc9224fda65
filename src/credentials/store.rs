//! Credential store contract and hashing discipline.
//!
//! The store keeps exactly one [`StoredCredential`] per subject. Raw refresh
//! credentials never reach it: callers hash with [`CredentialHasher::hash_of`]
//! and compare with [`CredentialHasher::matches`]. Hashes are Argon2id PHC
//! strings with a random salt per stored credential.
//!
//! Writes are compare-and-swap on the previous hash, so two rotations racing on
//! one subject cannot both win.

use argon2::{password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use secrecy::{ExposeSecret, SecretBox};
use std::{collections::HashMap, future::Future};
use thiserror::Error;
use tokio::sync::Mutex;

use super::{refresh::RefreshCredential, subject::Subject};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("subject not found")]
    SubjectNotFound,
    #[error("stored credential changed concurrently")]
    ConcurrentRotation,
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Persisted, one-way hashed form of the current refresh credential.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredCredential {
    pub hash: String,
    pub expires_at: DateTime<Utc>,
}

impl StoredCredential {
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Storage boundary consumed by the rotation logic.
pub trait CredentialStore: Send + Sync {
    /// Replace the subject's stored credential.
    ///
    /// With `expected = None` the write is unconditional (first issuance). With
    /// `Some(previous)` it only succeeds while the stored hash still equals
    /// `previous.hash`, otherwise [`StoreError::ConcurrentRotation`].
    fn update_credential(
        &self,
        subject: &Subject,
        credential: &StoredCredential,
        expected: Option<&StoredCredential>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// The subject's current stored credential, or [`StoreError::SubjectNotFound`]
    /// when the subject is unknown or has never been issued one.
    fn current_credential(
        &self,
        subject: &Subject,
    ) -> impl Future<Output = Result<StoredCredential, StoreError>> + Send;

    /// Notification address, used only by the anomaly path.
    fn select_mail(
        &self,
        subject: &Subject,
    ) -> impl Future<Output = Result<String, StoreError>> + Send;
}

/// Argon2id hashing for refresh credentials, optionally peppered.
#[derive(Default)]
pub struct CredentialHasher {
    pepper: Option<SecretBox<Vec<u8>>>,
}

impl CredentialHasher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_pepper(mut self, pepper: Vec<u8>) -> Self {
        self.pepper = Some(SecretBox::new(Box::new(pepper)));
        self
    }

    fn argon2(&self) -> anyhow::Result<Argon2<'_>> {
        match &self.pepper {
            Some(pepper) => Argon2::new_with_secret(
                pepper.expose_secret(),
                argon2::Algorithm::Argon2id,
                argon2::Version::V0x13,
                argon2::Params::default(),
            )
            .map_err(|_| anyhow::anyhow!("failed to initialize Argon2id")),
            None => Ok(Argon2::default()),
        }
    }

    /// Hash a refresh credential with a fresh random salt.
    ///
    /// # Errors
    /// Returns an error if Argon2id fails.
    pub fn hash_of(&self, credential: &RefreshCredential) -> anyhow::Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()?
            .hash_password(credential.expose().as_bytes(), &salt)
            .map_err(|_| anyhow::anyhow!("failed to hash refresh credential"))?
            .to_string();
        Ok(hash)
    }

    /// Re-hash `candidate` with the salt embedded in `stored_hash` and compare.
    ///
    /// # Errors
    /// Returns an error if the stored hash is not a valid PHC string.
    pub fn matches(
        &self,
        candidate: &RefreshCredential,
        stored_hash: &str,
    ) -> anyhow::Result<bool> {
        let parsed = PasswordHash::new(stored_hash)
            .map_err(|_| anyhow::anyhow!("invalid stored credential hash"))?;
        Ok(self
            .argon2()?
            .verify_password(candidate.expose().as_bytes(), &parsed)
            .is_ok())
    }
}

impl std::fmt::Debug for CredentialHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialHasher")
            .field("pepper", &self.pepper.as_ref().map(|_| "***"))
            .finish()
    }
}

#[derive(Debug)]
struct MemoryRecord {
    mail: String,
    credential: Option<StoredCredential>,
}

/// Process-local store for tests and embedding. Subjects must be enrolled first.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<Subject, MemoryRecord>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Provision a subject with its notification address.
    pub async fn enroll(&self, subject: Subject, mail: impl Into<String>) {
        self.records.lock().await.insert(
            subject,
            MemoryRecord {
                mail: mail.into(),
                credential: None,
            },
        );
    }
}

impl CredentialStore for MemoryStore {
    async fn update_credential(
        &self,
        subject: &Subject,
        credential: &StoredCredential,
        expected: Option<&StoredCredential>,
    ) -> Result<(), StoreError> {
        let mut records = self.records.lock().await;
        let record = records
            .get_mut(subject)
            .ok_or(StoreError::SubjectNotFound)?;

        if let Some(expected) = expected {
            let current_hash = record.credential.as_ref().map(|c| c.hash.as_str());
            if current_hash != Some(expected.hash.as_str()) {
                return Err(StoreError::ConcurrentRotation);
            }
        }

        record.credential = Some(credential.clone());
        Ok(())
    }

    async fn current_credential(&self, subject: &Subject) -> Result<StoredCredential, StoreError> {
        self.records
            .lock()
            .await
            .get(subject)
            .and_then(|record| record.credential.clone())
            .ok_or(StoreError::SubjectNotFound)
    }

    async fn select_mail(&self, subject: &Subject) -> Result<String, StoreError> {
        self.records
            .lock()
            .await
            .get(subject)
            .map(|record| record.mail.clone())
            .ok_or(StoreError::SubjectNotFound)
    }
}
