//! MSG91 provider: SMS through the flow API.

use super::{MessageProvider, ProviderError, ProviderSendResponse};
use crate::models::ChannelSettings;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const MSG91_API_URL: &str = "https://control.msg91.com/api/v5/flow/";

pub struct Msg91Provider {
    auth_key: String,
    sender: String,
    client: Client,
}

#[derive(Debug, Serialize)]
struct Msg91Request {
    sender: String,
    route: String,
    country: String,
    sms: Vec<Msg91Sms>,
}

#[derive(Debug, Serialize)]
struct Msg91Sms {
    message: String,
    to: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Msg91Response {
    #[serde(rename = "type")]
    response_type: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    request_id: Option<String>,
}

impl Msg91Provider {
    pub fn new(cfg: &ChannelSettings, client: Client) -> Result<Self, ProviderError> {
        if cfg.api_key.is_empty() {
            return Err(ProviderError::Configuration(
                "msg91 auth key is not configured".to_string(),
            ));
        }
        let sender = if cfg.sender.is_empty() {
            "SENDER".to_string()
        } else {
            cfg.sender.clone()
        };
        Ok(Self {
            auth_key: cfg.api_key.clone(),
            sender,
            client,
        })
    }
}

#[async_trait]
impl MessageProvider for Msg91Provider {
    async fn send(&self, to: &str, body: &str) -> Result<ProviderSendResponse, ProviderError> {
        let request = Msg91Request {
            sender: self.sender.clone(),
            route: "4".to_string(),    // transactional route
            country: "91".to_string(),
            sms: vec![Msg91Sms {
                message: body.to_string(),
                to: vec![to.to_string()],
            }],
        };

        let response = self
            .client
            .post(MSG91_API_URL)
            .header("authkey", &self.auth_key)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::Connection(format!("Failed to reach MSG91: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::SendFailed(format!(
                "MSG91 API returned error status {status}: {body}"
            )));
        }

        let msg91_response: Msg91Response = response.json().await.map_err(|e| {
            ProviderError::SendFailed(format!("Failed to parse MSG91 response: {e}"))
        })?;

        if msg91_response.response_type != "success" {
            return Err(ProviderError::SendFailed(format!(
                "MSG91 error: {}",
                msg91_response.message
            )));
        }

        Ok(ProviderSendResponse {
            message_id: msg91_response.request_id,
        })
    }
}
