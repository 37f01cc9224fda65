//! Access credential codec: a compact HS512 JWT carrying fixed claims.
//!
//! The token is integrity-protected but not confidential; the holder can read
//! the claims. Expiry is passive: nothing server-side revokes an access credential.

use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha512;
use thiserror::Error;

type HmacSha512 = Hmac<Sha512>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessHeader {
    pub alg: String,
    pub typ: String,
}

impl AccessHeader {
    fn hs512() -> Self {
        Self {
            alg: "HS512".to_string(),
            typ: "JWT".to_string(),
        }
    }
}

/// Claims bound into every access credential.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessClaims {
    #[serde(rename = "Host")]
    pub host: String,
    #[serde(rename = "ExpiresAt")]
    pub expires_at: i64,
    #[serde(rename = "LinkString")]
    pub link: String,
}

#[derive(Debug, Error)]
pub enum AccessError {
    #[error("invalid token format")]
    TokenFormat,
    #[error("invalid base64url encoding")]
    Base64,
    #[error("invalid json")]
    Json(#[from] serde_json::Error),
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlg(String),
    #[error("invalid signing key")]
    InvalidKey,
    #[error("invalid signature")]
    InvalidSignature,
}

/// A verified access credential: the raw token plus its decoded claims.
#[derive(Debug, Clone)]
pub struct AccessCredential {
    token: String,
    claims: AccessClaims,
}

impl AccessCredential {
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    #[must_use]
    pub fn claims(&self) -> &AccessClaims {
        &self.claims
    }

    /// The base64url signature segment, the last part of the token.
    #[must_use]
    pub fn signature(&self) -> &str {
        self.token.rsplit('.').next().unwrap_or_default()
    }

    #[must_use]
    pub fn into_token(self) -> String {
        self.token
    }
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, AccessError> {
    let json = serde_json::to_vec(value)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn b64d_json<T: for<'de> Deserialize<'de>>(s: &str) -> Result<T, AccessError> {
    let bytes = Base64UrlUnpadded::decode_vec(s).map_err(|_| AccessError::Base64)?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn mac(key: &[u8]) -> Result<HmacSha512, AccessError> {
    HmacSha512::new_from_slice(key).map_err(|_| AccessError::InvalidKey)
}

/// Sign claims into an HS512 token.
///
/// # Errors
/// Returns an error if the claims cannot be encoded or the key is rejected.
pub fn sign_hs512(key: &[u8], claims: AccessClaims) -> Result<AccessCredential, AccessError> {
    let header_b64 = b64e_json(&AccessHeader::hs512())?;
    let claims_b64 = b64e_json(&claims)?;
    let signing_input = format!("{header_b64}.{claims_b64}");

    let mut mac = mac(key)?;
    mac.update(signing_input.as_bytes());
    let signature_b64 = Base64UrlUnpadded::encode_string(&mac.finalize().into_bytes());

    Ok(AccessCredential {
        token: format!("{signing_input}.{signature_b64}"),
        claims,
    })
}

/// Verify an HS512 token and decode its claims.
///
/// Expiry is not checked: a refresh normally presents an
/// access credential that has already expired.
///
/// # Errors
/// Returns an error if the token is malformed, uses another algorithm, or the
/// signature does not verify.
pub fn verify_hs512(key: &[u8], token: &str) -> Result<AccessCredential, AccessError> {
    let mut parts = token.split('.');
    let header_b64 = parts.next().ok_or(AccessError::TokenFormat)?;
    let claims_b64 = parts.next().ok_or(AccessError::TokenFormat)?;
    let sig_b64 = parts.next().ok_or(AccessError::TokenFormat)?;
    if parts.next().is_some() {
        return Err(AccessError::TokenFormat);
    }

    let header: AccessHeader = b64d_json(header_b64)?;
    if header.alg != "HS512" {
        return Err(AccessError::UnsupportedAlg(header.alg));
    }

    let signature = Base64UrlUnpadded::decode_vec(sig_b64).map_err(|_| AccessError::Base64)?;
    let mut mac = mac(key)?;
    mac.update(header_b64.as_bytes());
    mac.update(b".");
    mac.update(claims_b64.as_bytes());
    mac.verify_slice(&signature)
        .map_err(|_| AccessError::InvalidSignature)?;

    let claims: AccessClaims = b64d_json(claims_b64)?;

    Ok(AccessCredential {
        token: token.to_string(),
        claims,
    })
}
