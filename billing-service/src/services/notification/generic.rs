//! Generic HTTP provider for gateways without a dedicated integration.
//!
//! Posts `{sender, to, message}` as JSON to the configured URL with a bearer
//! key. Any 2xx response counts as sent; the body (truncated) doubles as the
//! provider message id.

use super::{MessageProvider, ProviderError, ProviderSendResponse};
use crate::models::ChannelSettings;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

const MESSAGE_ID_MAX_LEN: usize = 100;

pub struct GenericHttpProvider {
    api_url: String,
    api_key: String,
    sender: String,
    client: Client,
}

#[derive(Debug, Serialize)]
struct GenericRequest<'a> {
    sender: &'a str,
    to: &'a str,
    message: &'a str,
}

impl GenericHttpProvider {
    pub fn new(cfg: &ChannelSettings, client: Client) -> Result<Self, ProviderError> {
        let api_url = match &cfg.api_url {
            Some(url) if !url.is_empty() => url.clone(),
            _ => {
                return Err(ProviderError::Configuration(
                    "API URL is not configured".to_string(),
                ))
            }
        };
        Ok(Self {
            api_url,
            api_key: cfg.api_key.clone(),
            sender: cfg.sender.clone(),
            client,
        })
    }
}

#[async_trait]
impl MessageProvider for GenericHttpProvider {
    async fn send(&self, to: &str, body: &str) -> Result<ProviderSendResponse, ProviderError> {
        let mut request = self.client.post(&self.api_url).json(&GenericRequest {
            sender: &self.sender,
            to,
            message: body,
        });
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::Connection(format!("Failed to reach gateway: {e}")))?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(ProviderError::SendFailed(format!(
                "Gateway returned error status {status}: {text}"
            )));
        }

        let message_id = if text.is_empty() {
            None
        } else {
            Some(text.chars().take(MESSAGE_ID_MAX_LEN).collect())
        };

        Ok(ProviderSendResponse { message_id })
    }
}
