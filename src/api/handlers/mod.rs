//! HTTP handlers.
//!
//! Credentials travel as cookies: `at` holds the access credential verbatim and
//! `rt` the base64 refresh credential. Both routes take the subject as `?guid=`.

pub mod cookies;
pub mod health;
pub mod tokens;

pub use health::Health;
pub use tokens::TokenExpiry;
