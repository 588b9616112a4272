//! Twilio provider: SMS and WhatsApp through the Messages API.

use super::{MessageProvider, ProviderError, ProviderSendResponse};
use crate::models::ChannelSettings;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

pub struct TwilioProvider {
    account_sid: String,
    auth_token: String,
    from: String,
    whatsapp: bool,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct TwilioResponse {
    sid: Option<String>,
}

/// WhatsApp addresses carry a `whatsapp:` prefix on both sides of the
/// message.
fn whatsapp_address(number: &str) -> String {
    if number.starts_with("whatsapp:") {
        number.to_string()
    } else {
        format!("whatsapp:{number}")
    }
}

impl TwilioProvider {
    /// `api_key` is the Account SID; `api_secret` the auth token, falling
    /// back to the SID when unset.
    pub fn new(
        cfg: &ChannelSettings,
        whatsapp: bool,
        client: Client,
    ) -> Result<Self, ProviderError> {
        if cfg.api_key.is_empty() {
            return Err(ProviderError::Configuration(
                "twilio account sid is not configured".to_string(),
            ));
        }
        if cfg.sender.is_empty() {
            return Err(ProviderError::Configuration(
                "twilio sender number is not configured".to_string(),
            ));
        }
        let auth_token = match &cfg.api_secret {
            Some(secret) if !secret.is_empty() => secret.clone(),
            _ => cfg.api_key.clone(),
        };
        Ok(Self {
            account_sid: cfg.api_key.clone(),
            auth_token,
            from: cfg.sender.clone(),
            whatsapp,
            client,
        })
    }
}

#[async_trait]
impl MessageProvider for TwilioProvider {
    async fn send(&self, to: &str, body: &str) -> Result<ProviderSendResponse, ProviderError> {
        let url = format!(
            "https://api.twilio.com/2010-04-01/Accounts/{}/Messages.json",
            self.account_sid
        );

        let (from, to) = if self.whatsapp {
            (whatsapp_address(&self.from), whatsapp_address(to))
        } else {
            (self.from.clone(), to.to_string())
        };

        let params = [("To", to.as_str()), ("From", from.as_str()), ("Body", body)];

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&params)
            .send()
            .await
            .map_err(|e| ProviderError::Connection(format!("Failed to reach Twilio: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::SendFailed(format!(
                "Twilio API returned error status {status}: {body}"
            )));
        }

        let twilio_response: TwilioResponse = response.json().await.map_err(|e| {
            ProviderError::SendFailed(format!("Failed to parse Twilio response: {e}"))
        })?;

        Ok(ProviderSendResponse {
            message_id: twilio_response.sid,
        })
    }
}
