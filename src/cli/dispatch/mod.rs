//! Map validated CLI arguments to an [`Action`].

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::credentials;
use anyhow::{Context, Result};

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;

    let credentials = credentials::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn,
        signing_key: credentials.signing_key,
        access_ttl_seconds: credentials.access_ttl_seconds,
        refresh_ttl_seconds: credentials.refresh_ttl_seconds,
        hash_pepper: credentials.hash_pepper,
        cookie_secure: credentials.cookie_secure,
        deny_host_mismatch: credentials.deny_host_mismatch,
        notify_webhook_url: credentials.notify_webhook_url,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    const DSN: &str = "postgres://user@localhost:5432/tandem";

    #[test]
    fn builds_server_action_from_env() {
        temp_env::with_vars(
            [
                ("TANDEM_DSN", Some(DSN)),
                ("TANDEM_SIGNING_KEY", Some("jwt_secret")),
                ("TANDEM_HASH_PEPPER", Some("pepper")),
                ("TANDEM_DENY_HOST_MISMATCH", Some("true")),
                ("TANDEM_PORT", None),
                ("TANDEM_ACCESS_TTL_SECONDS", None),
                ("TANDEM_NOTIFY_WEBHOOK_URL", None),
            ],
            || {
                let matches = crate::cli::commands::new().get_matches_from(vec!["tandem"]);
                let result = handler(&matches);
                assert!(result.is_ok());
                if let Ok(Action::Server(args)) = result {
                    assert_eq!(args.port, 8080);
                    assert_eq!(args.dsn, DSN);
                    assert_eq!(args.signing_key.expose_secret(), "jwt_secret");
                    assert_eq!(args.access_ttl_seconds, 1800);
                    assert_eq!(
                        args.hash_pepper.as_ref().map(|p| p.expose_secret()),
                        Some("pepper")
                    );
                    assert!(args.deny_host_mismatch);
                    assert!(args.notify_webhook_url.is_none());
                }
            },
        );
    }

    #[test]
    fn empty_signing_key_is_rejected() {
        temp_env::with_vars(
            [
                ("TANDEM_DSN", Some(DSN)),
                ("TANDEM_SIGNING_KEY", Some("  ")),
            ],
            || {
                let matches = crate::cli::commands::new().get_matches_from(vec!["tandem"]);
                let result = handler(&matches);
                assert!(result.is_err());
                if let Err(err) = result {
                    assert!(err
                        .to_string()
                        .contains("missing required argument: --signing-key"));
                }
            },
        );
    }

    #[test]
    fn non_positive_ttl_is_rejected() {
        temp_env::with_vars(
            [
                ("TANDEM_DSN", Some(DSN)),
                ("TANDEM_SIGNING_KEY", Some("jwt_secret")),
                ("TANDEM_REFRESH_TTL_SECONDS", Some("0")),
            ],
            || {
                let matches = crate::cli::commands::new().get_matches_from(vec!["tandem"]);
                assert!(handler(&matches).is_err());
            },
        );
    }
}
