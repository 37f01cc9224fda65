use crate::{
    api::{self, ServiceConfig},
    cli::telemetry,
    credentials::{
        CredentialHasher, CredentialIssuer, HostMismatchPolicy, IssuerConfig, LogNotifier,
        Notifier, WebhookNotifier,
    },
};
use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info};

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub signing_key: SecretString,
    pub access_ttl_seconds: i64,
    pub refresh_ttl_seconds: i64,
    pub hash_pepper: Option<SecretString>,
    pub cookie_secure: bool,
    pub deny_host_mismatch: bool,
    pub notify_webhook_url: Option<String>,
}

impl Args {
    /// Build the service configuration from parsed arguments.
    ///
    /// # Errors
    /// Returns an error if the signing key, a TTL or the webhook URL is invalid.
    pub fn service_config(&self) -> Result<ServiceConfig> {
        let issuer_config = IssuerConfig::new(self.signing_key.clone())
            .context("Invalid signing key")?
            .with_access_ttl_seconds(self.access_ttl_seconds)?
            .with_refresh_ttl_seconds(self.refresh_ttl_seconds)?;

        let hasher = match &self.hash_pepper {
            Some(pepper) => {
                CredentialHasher::new().with_pepper(pepper.expose_secret().as_bytes().to_vec())
            }
            None => CredentialHasher::new(),
        };

        let notifier = match &self.notify_webhook_url {
            Some(url) => {
                let webhook = WebhookNotifier::new(url)?;
                info!("Anomaly notices go to {}", webhook.url());
                Notifier::Webhook(webhook)
            }
            None => {
                info!("No notification webhook configured, anomaly notices are only logged");
                Notifier::Log(LogNotifier)
            }
        };

        let host_policy = if self.deny_host_mismatch {
            HostMismatchPolicy::WarnAndDeny
        } else {
            HostMismatchPolicy::WarnAndAllow
        };

        Ok(ServiceConfig {
            issuer: CredentialIssuer::new(issuer_config),
            hasher,
            notifier,
            host_policy,
            cookie_secure: self.cookie_secure,
        })
    }
}

/// Execute the server action.
/// # Errors
/// Returns an error if the configuration is invalid or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let config = args.service_config()?;
    debug!("service config: {:?}", config);

    let result = api::new(args.port, args.dsn, config).await;

    telemetry::shutdown_tracer();

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> Args {
        Args {
            port: 8080,
            dsn: "postgres://tandem@localhost:5432/tandem".to_string(),
            signing_key: SecretString::from("jwt_secret".to_string()),
            access_ttl_seconds: 60,
            refresh_ttl_seconds: 3600,
            hash_pepper: None,
            cookie_secure: false,
            deny_host_mismatch: false,
            notify_webhook_url: None,
        }
    }

    #[test]
    fn defaults_to_log_notifier_and_allow() -> Result<()> {
        let config = args().service_config()?;
        assert!(matches!(config.notifier, Notifier::Log(_)));
        assert_eq!(config.host_policy, HostMismatchPolicy::WarnAndAllow);
        assert_eq!(config.issuer.config().access_ttl().num_seconds(), 60);
        assert_eq!(config.issuer.config().refresh_ttl().num_seconds(), 3600);
        Ok(())
    }

    #[test]
    fn webhook_and_deny_policy() -> Result<()> {
        let mut args = args();
        args.notify_webhook_url = Some("https://notify.tandem.dev/hook".to_string());
        args.deny_host_mismatch = true;
        args.hash_pepper = Some(SecretString::from("pepper".to_string()));

        let config = args.service_config()?;
        assert!(matches!(config.notifier, Notifier::Webhook(_)));
        assert_eq!(config.host_policy, HostMismatchPolicy::WarnAndDeny);
        Ok(())
    }

    #[test]
    fn invalid_webhook_is_rejected() {
        let mut args = args();
        args.notify_webhook_url = Some("ftp://notify.tandem.dev".to_string());
        assert!(args.service_config().is_err());
    }

    #[test]
    fn debug_output_hides_secrets() -> Result<()> {
        let mut args = args();
        args.hash_pepper = Some(SecretString::from("s3cr3t-pepper".to_string()));
        let rendered = format!("{:?}", args.service_config()?);
        assert!(!rendered.contains("jwt_secret"));
        assert!(!rendered.contains("s3cr3t-pepper"));
        assert!(rendered.contains("pepper: Some(\"***\")"));
        assert!(rendered.contains("signing_key: \"***\""));
        Ok(())
    }
}
