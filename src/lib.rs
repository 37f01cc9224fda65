//! # Tandem (paired credential issuance)
//!
//! `tandem` issues a short-lived access credential and a long-lived refresh
//! credential for a subject, binds the pair to the requesting host and rotates it
//! on every refresh.
//!
//! - **One session per subject:** only the latest refresh credential is stored
//!   (as an Argon2id hash). Issuing or refreshing revokes the previous pair.
//! - **Paired credentials:** the refresh credential embeds the tail of the access
//!   signature, so it is rejected next to any other access credential.
//! - **Host anomalies:** refreshing from a different host notifies the subject.
//!
//! The [`credentials`] module holds the protocol. [`api`] exposes it over HTTP
//! with cookies `at` and `rt`, backed by Postgres.

pub mod api;
pub mod cli;
pub mod credentials;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
