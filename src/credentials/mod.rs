//! Paired access/refresh credentials.
//!
//! ## Issuance
//!
//! Every issuance draws a fresh 32-symbol link secret. The access credential is
//! an HS512-signed token carrying the link, the requesting host and an expiry.
//! The refresh credential is `hex(SHA-256(link))` followed by the last six
//! characters of the access signature, so a refresh credential is only ever valid
//! next to the access credential it was minted with.
//!
//! ## Single active session
//!
//! A subject has one stored credential. Issuing or rotating overwrites it, which
//! revokes whatever pair was handed out before. The store only ever sees an
//! Argon2id hash of the refresh credential.
//!
//! ## Host binding
//!
//! A refresh from a host other than the one in the prior access credential sends
//! a best-effort notice to the subject's address. By default the rotation still
//! succeeds; [`HostMismatchPolicy::WarnAndDeny`] rejects it instead.

mod access;
mod error;
mod issuer;
mod link;
mod notify;
mod refresh;
mod rotation;
mod store;
mod subject;

pub use access::{sign_hs512, verify_hs512, AccessClaims, AccessCredential, AccessError};
pub use error::{CredentialError, ErrorKind};
pub use issuer::{CredentialIssuer, IssuedPair, IssuerConfig};
pub use link::{create_link, LINK_ALPHABET, LINK_LEN};
pub use notify::{AnomalyNotice, AnomalyNotifier, LogNotifier, Notifier, WebhookNotifier};
pub use refresh::RefreshCredential;
pub use rotation::{HostMismatchPolicy, Rotator, TokenPair};
pub use store::{CredentialHasher, CredentialStore, MemoryStore, StoreError, StoredCredential};
pub use subject::Subject;
