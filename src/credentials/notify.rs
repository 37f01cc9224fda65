//! Anomaly notification delivery.
//!
//! A host mismatch on refresh produces an [`AnomalyNotice`]. Delivery is best
//! effort: the rotation logs failures and carries on.

use anyhow::{anyhow, Context, Result};
use regex::Regex;
use reqwest::Client;
use serde::Serialize;
use std::{future::Future, time::Duration};
use tracing::{info, instrument};
use url::Url;

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AnomalyNotice {
    pub subject: String,
    pub mail: String,
    pub bound_host: String,
    pub request_host: String,
}

pub trait AnomalyNotifier: Send + Sync {
    /// Deliver a notice or return an error; the caller never propagates it.
    fn notify(&self, notice: &AnomalyNotice) -> impl Future<Output = Result<()>> + Send;
}

pub(crate) fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email))
}

/// Logs the warning instead of sending it anywhere.
#[derive(Clone, Debug)]
pub struct LogNotifier;

impl AnomalyNotifier for LogNotifier {
    async fn notify(&self, notice: &AnomalyNotice) -> Result<()> {
        info!(
            subject = %notice.subject,
            mail = %notice.mail,
            bound_host = %notice.bound_host,
            request_host = %notice.request_host,
            "host anomaly notification stub"
        );
        Ok(())
    }
}

/// Posts the notice as JSON to an external delivery service.
#[derive(Clone, Debug)]
pub struct WebhookNotifier {
    client: Client,
    url: Url,
}

impl WebhookNotifier {
    /// # Errors
    /// Returns an error if the URL is not http(s) or the HTTP client cannot be built.
    pub fn new(url: &str) -> Result<Self> {
        let url = Url::parse(url).with_context(|| format!("Invalid webhook URL: {url}"))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(anyhow!("Unsupported webhook scheme: {}", url.scheme()));
        }
        let client = Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .timeout(WEBHOOK_TIMEOUT)
            .build()?;
        Ok(Self { client, url })
    }

    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl AnomalyNotifier for WebhookNotifier {
    #[instrument(skip(self, notice), fields(subject = %notice.subject))]
    async fn notify(&self, notice: &AnomalyNotice) -> Result<()> {
        if !valid_email(&notice.mail) {
            return Err(anyhow!("invalid notification address"));
        }

        let response = self
            .client
            .post(self.url.clone())
            .json(notice)
            .send()
            .await
            .context("failed to reach notification webhook")?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "notification webhook returned {}",
                response.status()
            ));
        }

        Ok(())
    }
}

/// Notifier selected at startup.
#[derive(Clone, Debug)]
pub enum Notifier {
    Log(LogNotifier),
    Webhook(WebhookNotifier),
}

impl AnomalyNotifier for Notifier {
    async fn notify(&self, notice: &AnomalyNotice) -> Result<()> {
        match self {
            Self::Log(notifier) => notifier.notify(notice).await,
            Self::Webhook(notifier) => notifier.notify(notice).await,
        }
    }
}
