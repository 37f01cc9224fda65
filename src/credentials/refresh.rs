//! Refresh credential derivation and transport encoding.
//!
//! `refresh = hex(SHA-256(link)) || last 6 chars of the access signature`. The
//! suffix ties a refresh credential to the exact access credential minted with it.

use base64ct::{Base64, Encoding};
use sha2::{Digest, Sha256};
use std::fmt;
use subtle::ConstantTimeEq;

use super::{access::AccessCredential, error::CredentialError};

pub const SIGNATURE_SUFFIX_LEN: usize = 6;

/// Raw (decoded) refresh credential value.
#[derive(Clone, PartialEq, Eq)]
pub struct RefreshCredential(String);

impl RefreshCredential {
    /// Derive the refresh credential paired with `access`.
    #[must_use]
    pub fn derive(link: &str, access: &AccessCredential) -> Self {
        let digest = Sha256::digest(link.as_bytes());
        let signature = access.signature();
        let suffix = signature
            .get(signature.len().saturating_sub(SIGNATURE_SUFFIX_LEN)..)
            .unwrap_or_default();
        Self(format!("{}{suffix}", hex::encode(digest)))
    }

    /// Decode the base64 transport form presented by a client.
    ///
    /// # Errors
    /// Returns [`CredentialError::MalformedCredential`] if the value is empty, not
    /// base64, or not UTF-8.
    pub fn decode(transport: &str) -> Result<Self, CredentialError> {
        let trimmed = transport.trim();
        if trimmed.is_empty() {
            return Err(CredentialError::MalformedCredential);
        }
        let bytes =
            Base64::decode_vec(trimmed).map_err(|_| CredentialError::MalformedCredential)?;
        let value = String::from_utf8(bytes).map_err(|_| CredentialError::MalformedCredential)?;
        if value.is_empty() {
            return Err(CredentialError::MalformedCredential);
        }
        Ok(Self(value))
    }

    /// Base64 transport form used for the `rt` cookie.
    #[must_use]
    pub fn encode(&self) -> String {
        Base64::encode_string(self.0.as_bytes())
    }

    /// Whether this value is the one derived from `access`.
    ///
    /// Compared in constant time.
    #[must_use]
    pub fn is_paired_with(&self, access: &AccessCredential) -> bool {
        let expected = Self::derive(&access.claims().link, access);
        self.0.len() == expected.0.len()
            && bool::from(self.0.as_bytes().ct_eq(expected.0.as_bytes()))
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for RefreshCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RefreshCredential(***)")
    }
}
