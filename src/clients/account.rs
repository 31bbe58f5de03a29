use std::{collections::HashMap, sync::Arc, time::Duration};

use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, de::DeserializeOwned};
use tracing::{debug, info};

use crate::{
    clients::circuit_breaker::CircuitBreaker,
    config::Config,
    models::{
        event::{MailHeader, NotificationBody, NotificationHeader},
        relay_config::AccountCredentials,
        retry::RetryConfig,
    },
    traits::{AccountApi, AccountApiProvider},
    utils::retry_with_backoff,
};

#[derive(Debug, Deserialize)]
struct MailRecipients {
    org_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct MailHeaderDto {
    id: i64,
    sender_id: i64,
    timestamp: i64,
    title: String,
    to: MailRecipients,
}

impl From<MailHeaderDto> for MailHeader {
    fn from(dto: MailHeaderDto) -> Self {
        MailHeader {
            id: dto.id,
            sender_id: dto.sender_id,
            timestamp: dto.timestamp,
            recipient_org_id: dto.to.org_id,
            title: dto.title,
        }
    }
}

/// HTTP client for the account API gateway.
#[derive(Clone)]
pub struct AccountApiClient {
    http_client: Client,
    base_url: String,
    retry_config: RetryConfig,
    circuit_breaker: Arc<CircuitBreaker>,
}

impl AccountApiClient {
    pub fn new(config: &Config, circuit_breaker: Arc<CircuitBreaker>) -> Result<Self, Error> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.account_api_timeout_seconds))
            .build()
            .map_err(|e| anyhow!("Failed to create HTTP client: {}", e))?;

        info!(base_url = %config.account_api_url, "Account API client initialized");

        Ok(Self {
            http_client,
            base_url: config.account_api_url.trim_end_matches('/').to_string(),
            retry_config: config.retry_config(),
            circuit_breaker,
        })
    }
}

impl AccountApiProvider for AccountApiClient {
    fn session(&self, account: &AccountCredentials) -> Arc<dyn AccountApi> {
        Arc::new(AccountSession {
            client: self.clone(),
            account: account.clone(),
        })
    }
}

/// [`AccountApi`] bound to one character's credentials.
pub struct AccountSession {
    client: AccountApiClient,
    account: AccountCredentials,
}

impl AccountSession {
    async fn get<T: DeserializeOwned + Send>(
        &self,
        path: &str,
        ids: Option<&[i64]>,
    ) -> Result<T, Error> {
        let url = format!("{}{}", self.client.base_url, path);

        let mut query = vec![
            ("keyID", self.account.key_id.to_string()),
            ("vCode", self.account.vcode.clone()),
            ("characterID", self.account.character_id.to_string()),
        ];
        if let Some(ids) = ids {
            let joined = ids
                .iter()
                .map(|id| id.to_string())
                .collect::<Vec<_>>()
                .join(",");
            query.push(("ids", joined));
        }

        debug!(path, id_count = ids.map_or(0, <[i64]>::len), "Calling account API");

        let http_client = self.client.http_client.clone();
        let retry_config = self.client.retry_config.clone();

        self.client
            .circuit_breaker
            .call(|| async move {
                retry_with_backoff(&retry_config, || {
                    let client = http_client.clone();
                    let url = url.clone();
                    let query = query.clone();

                    async move {
                        let response = client
                            .get(&url)
                            .query(&query)
                            .send()
                            .await
                            .map_err(|e| e.to_string())?;

                        let status = response.status();
                        if !status.is_success() {
                            return Err(format!(
                                "Account API returned status {} for {}",
                                status, url
                            ));
                        }

                        response
                            .json::<T>()
                            .await
                            .map_err(|e| format!("Failed to parse account API response: {}", e))
                    }
                })
                .await
                .map_err(|e| anyhow!(e))
            })
            .await
    }
}

#[async_trait]
impl AccountApi for AccountSession {
    async fn list_mail_headers(&self) -> Result<Vec<MailHeader>, Error> {
        let headers: Vec<MailHeaderDto> = self.get("/char/messages", None).await?;
        Ok(headers.into_iter().map(MailHeader::from).collect())
    }

    async fn fetch_mail_bodies(&self, ids: &[i64]) -> Result<HashMap<i64, String>, Error> {
        self.get("/char/message_bodies", Some(ids)).await
    }

    async fn list_notification_headers(&self) -> Result<Vec<NotificationHeader>, Error> {
        self.get("/char/notifications", None).await
    }

    async fn fetch_notification_bodies(
        &self,
        ids: &[i64],
    ) -> Result<HashMap<i64, NotificationBody>, Error> {
        self.get("/char/notification_texts", Some(ids)).await
    }

    async fn resolve_character_names(&self, ids: &[i64]) -> Result<HashMap<i64, String>, Error> {
        self.get("/eve/character_names", Some(ids)).await
    }
}
