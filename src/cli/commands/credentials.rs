use clap::{Arg, ArgAction, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_SIGNING_KEY: &str = "signing-key";
pub const ARG_ACCESS_TTL_SECONDS: &str = "access-ttl-seconds";
pub const ARG_REFRESH_TTL_SECONDS: &str = "refresh-ttl-seconds";
pub const ARG_HASH_PEPPER: &str = "hash-pepper";
pub const ARG_COOKIE_SECURE: &str = "cookie-secure";
pub const ARG_DENY_HOST_MISMATCH: &str = "deny-host-mismatch";
pub const ARG_NOTIFY_WEBHOOK_URL: &str = "notify-webhook-url";

#[derive(Debug)]
pub struct Options {
    pub signing_key: SecretString,
    pub access_ttl_seconds: i64,
    pub refresh_ttl_seconds: i64,
    pub hash_pepper: Option<SecretString>,
    pub cookie_secure: bool,
    pub deny_host_mismatch: bool,
    pub notify_webhook_url: Option<String>,
}

impl Options {
    /// Parse credential arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the signing key is missing or a TTL is not positive.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        // clap passes empty env vars through as ""
        let get_non_empty = |id: &str| {
            matches
                .get_one::<String>(id)
                .cloned()
                .filter(|v| !v.trim().is_empty())
        };

        let signing_key = get_non_empty(ARG_SIGNING_KEY)
            .map(SecretString::from)
            .ok_or_else(|| anyhow::anyhow!("missing required argument: --{ARG_SIGNING_KEY}"))?;

        let read_ttl = |id: &str| -> anyhow::Result<i64> {
            let seconds = matches
                .get_one::<i64>(id)
                .copied()
                .ok_or_else(|| anyhow::anyhow!("missing required argument: --{id}"))?;
            if seconds <= 0 {
                anyhow::bail!("--{id} must be greater than zero");
            }
            Ok(seconds)
        };

        Ok(Self {
            signing_key,
            access_ttl_seconds: read_ttl(ARG_ACCESS_TTL_SECONDS)?,
            refresh_ttl_seconds: read_ttl(ARG_REFRESH_TTL_SECONDS)?,
            hash_pepper: get_non_empty(ARG_HASH_PEPPER).map(SecretString::from),
            cookie_secure: matches.get_flag(ARG_COOKIE_SECURE),
            deny_host_mismatch: matches.get_flag(ARG_DENY_HOST_MISMATCH),
            notify_webhook_url: get_non_empty(ARG_NOTIFY_WEBHOOK_URL),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    let command = with_signing_args(command);
    with_transport_args(command)
}

fn with_signing_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SIGNING_KEY)
                .long(ARG_SIGNING_KEY)
                .help("HMAC-SHA512 key for access credentials")
                .long_help(
                    "HMAC-SHA512 key for access credentials. Keys shorter than 64 bytes are accepted with a warning.",
                )
                .env("TANDEM_SIGNING_KEY")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_ACCESS_TTL_SECONDS)
                .long(ARG_ACCESS_TTL_SECONDS)
                .help("Access credential TTL in seconds")
                .env("TANDEM_ACCESS_TTL_SECONDS")
                .default_value("1800")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_REFRESH_TTL_SECONDS)
                .long(ARG_REFRESH_TTL_SECONDS)
                .help("Refresh credential TTL in seconds")
                .env("TANDEM_REFRESH_TTL_SECONDS")
                .default_value("2592000")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_HASH_PEPPER)
                .long(ARG_HASH_PEPPER)
                .help("Optional Argon2id secret mixed into stored credential hashes")
                .env("TANDEM_HASH_PEPPER")
                .hide_env_values(true),
        )
}

fn with_transport_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_COOKIE_SECURE)
                .long(ARG_COOKIE_SECURE)
                .help("Mark credential cookies as Secure")
                .env("TANDEM_COOKIE_SECURE")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(ARG_DENY_HOST_MISMATCH)
                .long(ARG_DENY_HOST_MISMATCH)
                .help("Reject refreshes from a host other than the one the pair was issued to")
                .env("TANDEM_DENY_HOST_MISMATCH")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(ARG_NOTIFY_WEBHOOK_URL)
                .long(ARG_NOTIFY_WEBHOOK_URL)
                .help("Webhook that receives host anomaly notices (logged only when unset)")
                .env("TANDEM_NOTIFY_WEBHOOK_URL"),
        )
}
