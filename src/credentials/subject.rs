//! Validated subject identifier.

use std::fmt;

use super::error::CredentialError;

const MAX_SUBJECT_LEN: usize = 255;

/// Opaque identifier (usually a GUID) of the identity a credential pair is issued for.
///
/// Subjects are provisioned externally; this type only guarantees the value is
/// non-empty, trimmed, and free of control characters.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Subject(String);

impl Subject {
    /// # Errors
    /// Returns [`CredentialError::InvalidSubject`] for empty, oversized, or control-character input.
    pub fn parse(raw: &str) -> Result<Self, CredentialError> {
        let trimmed = raw.trim();
        if trimmed.is_empty()
            || trimmed.len() > MAX_SUBJECT_LEN
            || trimmed.chars().any(char::is_control)
        {
            return Err(CredentialError::InvalidSubject);
        }
        Ok(Self(trimmed.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
