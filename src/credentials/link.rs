//! Link secret generation.
//!
//! A link secret is the entropy root of one access/refresh pair. It is embedded
//! in the access credential claims and hashed into the refresh credential, and
//! never persisted on its own.

use rand::{rngs::OsRng, RngCore};

use super::error::CredentialError;

pub const LINK_LEN: usize = 32;

pub const LINK_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz-";

// Largest multiple of the alphabet size that fits in a byte; anything at or above
// it is discarded so `byte % len` stays uniform.
const ACCEPT_BELOW: u8 = (256 / LINK_ALPHABET.len() * LINK_ALPHABET.len()) as u8;

/// Generate a link secret from the operating system CSPRNG.
///
/// # Errors
/// Returns [`CredentialError::EntropyUnavailable`] if the random source cannot be read.
pub fn create_link() -> Result<String, CredentialError> {
    create_link_with_rng(&mut OsRng)
}

pub(crate) fn create_link_with_rng<R: RngCore + ?Sized>(
    rng: &mut R,
) -> Result<String, CredentialError> {
    let mut link = String::with_capacity(LINK_LEN);
    let mut buf = [0u8; LINK_LEN];

    while link.len() < LINK_LEN {
        rng.try_fill_bytes(&mut buf)
            .map_err(CredentialError::EntropyUnavailable)?;
        for byte in buf {
            if byte >= ACCEPT_BELOW {
                continue;
            }
            let idx = usize::from(byte) % LINK_ALPHABET.len();
            if let Some(&symbol) = LINK_ALPHABET.get(idx) {
                link.push(char::from(symbol));
            }
            if link.len() == LINK_LEN {
                break;
            }
        }
    }

    Ok(link)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;
    use std::collections::HashSet;

    struct BrokenRng;

    impl RngCore for BrokenRng {
        fn next_u32(&mut self) -> u32 {
            0
        }

        fn next_u64(&mut self) -> u64 {
            0
        }

        fn fill_bytes(&mut self, dest: &mut [u8]) {
            dest.fill(0);
        }

        fn try_fill_bytes(&mut self, _dest: &mut [u8]) -> Result<(), rand::Error> {
            Err(rand::Error::new(std::io::Error::other("no entropy")))
        }
    }

    #[test]
    fn link_has_fixed_length_and_alphabet() -> Result<(), CredentialError> {
        let link = create_link()?;
        assert_eq!(link.len(), LINK_LEN);
        assert!(link.bytes().all(|b| LINK_ALPHABET.contains(&b)));
        Ok(())
    }

    #[test]
    fn links_are_unique() -> Result<(), CredentialError> {
        let mut seen = HashSet::new();
        for _ in 0..256 {
            assert!(seen.insert(create_link()?));
        }
        Ok(())
    }

    #[test]
    fn accept_bound_is_multiple_of_alphabet() {
        assert_eq!(ACCEPT_BELOW, 252);
        assert_eq!(usize::from(ACCEPT_BELOW) % LINK_ALPHABET.len(), 0);
    }

    #[test]
    fn bytes_above_bound_are_rejected() -> Result<(), CredentialError> {
        // StepRng yields little-endian u64 words; 0xFF bytes must be skipped and
        // the low counter bytes must still fill the link.
        let mut rng = StepRng::new(0xFFFF_FFFF_FFFF_FF00, 1);
        let link = create_link_with_rng(&mut rng)?;
        assert_eq!(link.len(), LINK_LEN);
        assert!(link.bytes().all(|b| LINK_ALPHABET.contains(&b)));
        Ok(())
    }

    #[test]
    fn broken_rng_reports_entropy_unavailable() {
        let result = create_link_with_rng(&mut BrokenRng);
        assert!(matches!(result, Err(CredentialError::EntropyUnavailable(_))));
    }
}
