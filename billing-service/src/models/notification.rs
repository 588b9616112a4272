//! Notification channel types and per-channel dispatch outcomes.
//!
//! Outcomes are transient: returned and logged, never persisted, and never
//! able to affect the invoice they describe.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Sms,
    Whatsapp,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Sms => "sms",
            Channel::Whatsapp => "whatsapp",
        }
    }
}

/// Outcome of a single channel's dispatch attempt.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationOutcome {
    pub channel: Channel,
    pub success: bool,
    pub provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl NotificationOutcome {
    pub fn sent(channel: Channel, provider: &str, message_id: Option<String>) -> Self {
        Self {
            channel,
            success: true,
            provider: provider.to_string(),
            message_id,
            error: None,
        }
    }

    pub fn failed(channel: Channel, provider: &str, error: String) -> Self {
        Self {
            channel,
            success: false,
            provider: provider.to_string(),
            message_id: None,
            error: Some(error),
        }
    }
}

/// Combined report for one invoice notification: the two channels are
/// attempted independently, so each slot is filled (or skipped) on its own.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NotificationReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sms: Option<NotificationOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub whatsapp: Option<NotificationOutcome>,
}
