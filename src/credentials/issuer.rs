//! Credential issuance: one link secret in, one access/refresh pair out.

use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use tracing::warn;

use super::{
    access::{sign_hs512, AccessClaims, AccessCredential},
    error::CredentialError,
    link::create_link,
    refresh::RefreshCredential,
};

const DEFAULT_ACCESS_TTL_SECONDS: i64 = 30 * 60;
const DEFAULT_REFRESH_TTL_SECONDS: i64 = 720 * 60 * 60;
const RECOMMENDED_KEY_LEN: usize = 64;

/// Signing key and lifetimes, injected once at construction.
#[derive(Clone)]
pub struct IssuerConfig {
    signing_key: SecretString,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl IssuerConfig {
    /// # Errors
    /// Returns [`CredentialError::SigningKeyMissing`] for an empty key.
    pub fn new(signing_key: SecretString) -> Result<Self, CredentialError> {
        let key_len = signing_key.expose_secret().len();
        if key_len == 0 {
            return Err(CredentialError::SigningKeyMissing);
        }
        if key_len < RECOMMENDED_KEY_LEN {
            warn!(
                "signing key is {key_len} bytes; HS512 keys should be at least {RECOMMENDED_KEY_LEN}"
            );
        }
        Ok(Self {
            signing_key,
            access_ttl: Duration::seconds(DEFAULT_ACCESS_TTL_SECONDS),
            refresh_ttl: Duration::seconds(DEFAULT_REFRESH_TTL_SECONDS),
        })
    }

    /// # Errors
    /// Returns [`CredentialError::InvalidTtl`] unless `seconds` is positive.
    pub fn with_access_ttl_seconds(mut self, seconds: i64) -> Result<Self, CredentialError> {
        if seconds <= 0 {
            return Err(CredentialError::InvalidTtl("access ttl must be positive"));
        }
        self.access_ttl = Duration::seconds(seconds);
        Ok(self)
    }

    /// # Errors
    /// Returns [`CredentialError::InvalidTtl`] unless `seconds` is positive.
    pub fn with_refresh_ttl_seconds(mut self, seconds: i64) -> Result<Self, CredentialError> {
        if seconds <= 0 {
            return Err(CredentialError::InvalidTtl("refresh ttl must be positive"));
        }
        self.refresh_ttl = Duration::seconds(seconds);
        Ok(self)
    }

    #[must_use]
    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    #[must_use]
    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    pub(crate) fn signing_key(&self) -> &[u8] {
        self.signing_key.expose_secret().as_bytes()
    }
}

impl std::fmt::Debug for IssuerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuerConfig")
            .field("signing_key", &"***")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish()
    }
}

/// A freshly minted pair, before anything is persisted.
#[derive(Debug, Clone)]
pub struct IssuedPair {
    pub access: AccessCredential,
    pub refresh: RefreshCredential,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CredentialIssuer {
    config: IssuerConfig,
}

impl CredentialIssuer {
    #[must_use]
    pub fn new(config: IssuerConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &IssuerConfig {
        &self.config
    }

    /// Mint a host-bound pair. The only side effect is the entropy read.
    ///
    /// # Errors
    /// Returns an error if entropy is unavailable or signing fails.
    pub fn generate_tokens(&self, host: &str) -> Result<IssuedPair, CredentialError> {
        self.generate_tokens_at(host, Utc::now())
    }

    pub(crate) fn generate_tokens_at(
        &self,
        host: &str,
        now: DateTime<Utc>,
    ) -> Result<IssuedPair, CredentialError> {
        let link = create_link()?;

        let access_expires_at = now + self.config.access_ttl;
        let claims = AccessClaims {
            host: host.to_string(),
            expires_at: access_expires_at.timestamp(),
            link,
        };
        let access = sign_hs512(self.config.signing_key(), claims)
            .map_err(|e| CredentialError::SigningFailure(e.into()))?;

        let refresh = RefreshCredential::derive(&access.claims().link, &access);

        Ok(IssuedPair {
            access,
            refresh,
            access_expires_at,
            refresh_expires_at: now + self.config.refresh_ttl,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::access::verify_hs512;
    use anyhow::Result;

    fn issuer() -> Result<CredentialIssuer> {
        let config = IssuerConfig::new(SecretString::from("jwt_secret".to_string()))?
            .with_access_ttl_seconds(60)?
            .with_refresh_ttl_seconds(3600)?;
        Ok(CredentialIssuer::new(config))
    }

    #[test]
    fn empty_key_is_rejected() {
        let result = IssuerConfig::new(SecretString::from(String::new()));
        assert!(matches!(result, Err(CredentialError::SigningKeyMissing)));
    }

    #[test]
    fn non_positive_ttls_are_rejected() -> Result<()> {
        let config = IssuerConfig::new(SecretString::from("jwt_secret".to_string()))?;
        assert!(config.clone().with_access_ttl_seconds(0).is_err());
        assert!(config.with_refresh_ttl_seconds(-5).is_err());
        Ok(())
    }

    #[test]
    fn debug_hides_signing_key() -> Result<()> {
        let config = IssuerConfig::new(SecretString::from("jwt_secret".to_string()))?;
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("jwt_secret"));
        Ok(())
    }

    #[test]
    fn access_credential_carries_host_and_expiry() -> Result<()> {
        let issuer = issuer()?;
        let now = Utc::now();
        let pair = issuer.generate_tokens_at("host-a", now)?;

        let verified = verify_hs512(b"jwt_secret", pair.access.token())?;
        assert_eq!(verified.claims().host, "host-a");
        assert_eq!(verified.claims().expires_at, now.timestamp() + 60);
        assert!(verified.claims().expires_at > Utc::now().timestamp());
        assert_eq!(pair.refresh_expires_at, now + Duration::seconds(3600));
        Ok(())
    }

    #[test]
    fn refresh_is_derived_from_link_and_signature() -> Result<()> {
        let pair = issuer()?.generate_tokens("host-a")?;
        assert!(pair.refresh.is_paired_with(&pair.access));
        assert!(pair.access.token().ends_with(&pair.refresh.expose()[64..]));
        Ok(())
    }

    #[test]
    fn independent_issuances_differ() -> Result<()> {
        let issuer = issuer()?;
        let first = issuer.generate_tokens("host-a")?;
        let second = issuer.generate_tokens("host-a")?;
        assert_ne!(first.access.claims().link, second.access.claims().link);
        assert_ne!(first.refresh, second.refresh);
        Ok(())
    }
}
