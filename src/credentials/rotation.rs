//! Issue and refresh orchestration.
//!
//! ```text
//! Unenrolled --issue--> Active --refresh--> Active' (stored hash overwritten)
//!                         \--refresh fails--> Rejected (outcome only, nothing stored)
//! ```
//!
//! Every successful issue or refresh overwrites the subject's single stored
//! credential, so the refresh credential that was just presented can never be
//! used again.

use chrono::Utc;
use std::{sync::Arc, time::Duration};
use tracing::{debug, error, info, instrument, warn, Instrument};

use super::{
    access::verify_hs512,
    error::CredentialError,
    issuer::{CredentialIssuer, IssuedPair},
    notify::{AnomalyNotice, AnomalyNotifier},
    refresh::RefreshCredential,
    store::{CredentialHasher, CredentialStore, StoreError, StoredCredential},
    subject::Subject,
};

const NOTIFY_TIMEOUT: Duration = Duration::from_secs(5);

/// What to do when a refresh comes from a host other than the one bound at issuance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HostMismatchPolicy {
    /// Notify and rotate anyway.
    #[default]
    WarnAndAllow,
    /// Notify and reject with `Unauthorized`.
    WarnAndDeny,
}

/// Pair handed back to the transport layer.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: RefreshCredential,
    pub access_expires_at: chrono::DateTime<Utc>,
    pub refresh_expires_at: chrono::DateTime<Utc>,
}

impl TokenPair {
    /// Base64 transport form of the refresh credential.
    #[must_use]
    pub fn refresh_transport(&self) -> String {
        self.refresh_token.encode()
    }
}

impl From<IssuedPair> for TokenPair {
    fn from(pair: IssuedPair) -> Self {
        Self {
            access_token: pair.access.into_token(),
            refresh_token: pair.refresh,
            access_expires_at: pair.access_expires_at,
            refresh_expires_at: pair.refresh_expires_at,
        }
    }
}

#[derive(Debug)]
pub struct Rotator<S, N> {
    issuer: CredentialIssuer,
    hasher: CredentialHasher,
    store: S,
    notifier: Arc<N>,
    host_policy: HostMismatchPolicy,
}

impl<S: CredentialStore, N: AnomalyNotifier + 'static> Rotator<S, N> {
    #[must_use]
    pub fn new(issuer: CredentialIssuer, hasher: CredentialHasher, store: S, notifier: N) -> Self {
        Self {
            issuer,
            hasher,
            store,
            notifier: Arc::new(notifier),
            host_policy: HostMismatchPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_host_policy(mut self, policy: HostMismatchPolicy) -> Self {
        self.host_policy = policy;
        self
    }

    #[must_use]
    pub fn issuer(&self) -> &CredentialIssuer {
        &self.issuer
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Issue a first (or replacement) pair for `subject`, bound to `host`.
    ///
    /// # Errors
    /// `InvalidSubject` for an empty subject, `Unauthorized` for an unknown subject,
    /// internal errors for entropy, signing, or storage failures.
    #[instrument(skip(self))]
    pub async fn issue(&self, subject: &str, host: &str) -> Result<TokenPair, CredentialError> {
        let subject = Subject::parse(subject)?;

        let pair = self.issuer.generate_tokens(host)?;
        self.persist(&subject, &pair, None).await?;

        info!("credential pair issued");
        Ok(pair.into())
    }

    /// Exchange a refresh credential for a new pair.
    ///
    /// `presented_refresh` is the base64 transport form; `prior_access` is the
    /// access credential issued alongside it.
    ///
    /// # Errors
    /// `InvalidSubject`/`MalformedCredential` before the store is touched,
    /// `Unauthorized` for an absent refresh credential or any authentication
    /// failure, `ConcurrentRotation` when another refresh for the same subject
    /// won, internal errors otherwise.
    #[instrument(skip(self, presented_refresh, prior_access))]
    pub async fn refresh(
        &self,
        subject: &str,
        presented_refresh: &str,
        prior_access: &str,
        request_host: &str,
    ) -> Result<TokenPair, CredentialError> {
        let subject = Subject::parse(subject)?;
        if presented_refresh.trim().is_empty() {
            debug!("no refresh credential presented");
            return Err(CredentialError::Unauthorized);
        }
        let presented = RefreshCredential::decode(presented_refresh)?;

        let current = self.authenticate(&subject, &presented).await?;

        let prior = verify_hs512(self.issuer.config().signing_key(), prior_access).map_err(|e| {
            debug!("prior access credential rejected: {e}");
            CredentialError::Unauthorized
        })?;
        if !presented.is_paired_with(&prior) {
            debug!("refresh credential is not paired with the presented access credential");
            return Err(CredentialError::Unauthorized);
        }

        let bound_host = prior.claims().host.as_str();
        if bound_host != request_host {
            warn!(bound_host, "refresh requested from a different host");
            self.notify_anomaly(&subject, bound_host, request_host).await;
            if self.host_policy == HostMismatchPolicy::WarnAndDeny {
                return Err(CredentialError::Unauthorized);
            }
        }

        let pair = self.issuer.generate_tokens(request_host)?;
        self.persist(&subject, &pair, Some(&current)).await?;

        info!("credential pair rotated");
        Ok(pair.into())
    }

    /// Compare the presented value against the stored hash. Unknown subjects,
    /// missing or expired credentials, and mismatches all collapse into `Unauthorized`.
    async fn authenticate(
        &self,
        subject: &Subject,
        presented: &RefreshCredential,
    ) -> Result<StoredCredential, CredentialError> {
        let current = match self.store.current_credential(subject).await {
            Ok(current) => current,
            Err(StoreError::SubjectNotFound) => {
                debug!("no stored credential for subject");
                return Err(CredentialError::Unauthorized);
            }
            Err(err) => return Err(store_failure(err)),
        };

        if current.is_expired_at(Utc::now()) {
            debug!("stored credential expired");
            return Err(CredentialError::Unauthorized);
        }

        let matches = self
            .hasher
            .matches(presented, &current.hash)
            .map_err(CredentialError::Store)?;
        if !matches {
            debug!("refresh credential does not match stored hash");
            return Err(CredentialError::Unauthorized);
        }

        Ok(current)
    }

    async fn persist(
        &self,
        subject: &Subject,
        pair: &IssuedPair,
        expected: Option<&StoredCredential>,
    ) -> Result<(), CredentialError> {
        let stored = StoredCredential {
            hash: self
                .hasher
                .hash_of(&pair.refresh)
                .map_err(CredentialError::Store)?,
            expires_at: pair.refresh_expires_at,
        };

        match self.store.update_credential(subject, &stored, expected).await {
            Ok(()) => Ok(()),
            Err(StoreError::SubjectNotFound) => Err(CredentialError::Unauthorized),
            Err(StoreError::ConcurrentRotation) => {
                warn!("lost rotation race");
                Err(CredentialError::ConcurrentRotation)
            }
            Err(err) => Err(store_failure(err)),
        }
    }

    async fn notify_anomaly(&self, subject: &Subject, bound_host: &str, request_host: &str) {
        let mail = match self.store.select_mail(subject).await {
            Ok(mail) => mail,
            Err(err) => {
                error!("Failed to look up notification address: {err}");
                return;
            }
        };

        let notice = AnomalyNotice {
            subject: subject.to_string(),
            mail,
            bound_host: bound_host.to_string(),
            request_host: request_host.to_string(),
        };

        // A denial is only returned once the subject has been warned.
        if self.host_policy == HostMismatchPolicy::WarnAndDeny {
            deliver(self.notifier.as_ref(), &notice).await;
            return;
        }

        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(
            async move { deliver(notifier.as_ref(), &notice).await }.in_current_span(),
        );
    }
}

async fn deliver<N: AnomalyNotifier>(notifier: &N, notice: &AnomalyNotice) {
    match tokio::time::timeout(NOTIFY_TIMEOUT, notifier.notify(notice)).await {
        Ok(Ok(())) => debug!("anomaly notification dispatched"),
        Ok(Err(err)) => error!("Failed to send anomaly notification: {err:#}"),
        Err(_) => error!("Anomaly notification timed out"),
    }
}

fn store_failure(err: StoreError) -> CredentialError {
    error!("credential store failure: {err:#}");
    CredentialError::Store(err.into())
}
