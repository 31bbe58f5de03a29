use std::{sync::Arc, time::Duration};

use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info};

use crate::{
    clients::circuit_breaker::CircuitBreaker,
    config::Config,
    models::{mail::OutgoingEmail, retry::RetryConfig},
    traits::Mailer,
    utils::retry_with_backoff,
};

/// Delivers email through an HTTP mail API.
pub struct HttpMailer {
    http_client: Client,
    endpoint: String,
    token: String,
    retry_config: RetryConfig,
    circuit_breaker: Arc<CircuitBreaker>,
}

impl HttpMailer {
    pub fn new(config: &Config, circuit_breaker: Arc<CircuitBreaker>) -> Result<Self, Error> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.mail_api_timeout_seconds))
            .build()
            .map_err(|e| anyhow!("Failed to create HTTP client: {}", e))?;

        info!(endpoint = %config.mail_api_url, "Mail client initialized");

        Ok(Self {
            http_client,
            endpoint: config.mail_api_url.clone(),
            token: config.mail_api_token.clone(),
            retry_config: config.retry_config(),
            circuit_breaker,
        })
    }

    async fn send_once(
        http_client: Client,
        endpoint: String,
        token: String,
        email: &OutgoingEmail,
    ) -> Result<(), Error> {
        let response = http_client
            .post(&endpoint)
            .bearer_auth(token)
            .json(email)
            .send()
            .await?;

        if response.status().is_success() {
            debug!(to = %email.to, subject = %email.subject, "Mail API accepted message");
            Ok(())
        } else {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            Err(anyhow!("Mail API returned {}: {}", status, error_text))
        }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), Error> {
        debug!(to = %email.to, subject = %email.subject, "Sending email");

        let http_client = self.http_client.clone();
        let endpoint = self.endpoint.clone();
        let token = self.token.clone();
        let retry_config = self.retry_config.clone();

        self.circuit_breaker
            .call(|| async move {
                retry_with_backoff(&retry_config, || {
                    Self::send_once(http_client.clone(), endpoint.clone(), token.clone(), email)
                })
                .await
            })
            .await
    }
}
