//! Best-effort invoice notification over SMS and WhatsApp.
//!
//! Providers are selected from the channel's stored configuration at
//! dispatch time and called through one [`MessageProvider`] trait; the two
//! channels are attempted independently and an outcome on one never affects
//! the other. Dispatch results are informational only: they are logged and
//! returned, never allowed to fail or roll back the invoice they describe.

pub mod generic;
pub mod msg91;
pub mod template;
pub mod twilio;

pub use generic::GenericHttpProvider;
pub use msg91::Msg91Provider;
pub use twilio::TwilioProvider;

use crate::models::{Channel, ChannelSettings, NotificationOutcome, NotificationReport, ProviderKind, Settings};
use crate::services::metrics::NOTIFICATIONS_TOTAL;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use service_core::error::AppError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// One attempt per provider call, bounded by this timeout. No retries.
const PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Send error: {0}")]
    SendFailed(String),

    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),
}

#[derive(Debug, Clone)]
pub struct ProviderSendResponse {
    pub message_id: Option<String>,
}

#[async_trait]
pub trait MessageProvider: Send + Sync {
    async fn send(&self, to: &str, body: &str) -> Result<ProviderSendResponse, ProviderError>;
}

/// Normalize a recipient phone number to the `+91`-prefixed international
/// convention used by every provider.
pub fn normalize_phone(raw: &str) -> Result<String, ProviderError> {
    let trimmed = raw.trim();
    let has_plus = trimmed.starts_with('+');
    let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();

    if digits.is_empty() {
        return Err(ProviderError::InvalidRecipient(
            "phone number is empty".to_string(),
        ));
    }

    if has_plus {
        return Ok(format!("+{digits}"));
    }
    if digits.len() == 12 && digits.starts_with("91") {
        return Ok(format!("+{digits}"));
    }
    if let Some(rest) = digits.strip_prefix('0') {
        return Ok(format!("+91{rest}"));
    }
    Ok(format!("+91{digits}"))
}

/// The invoice facts a notification message is rendered from.
#[derive(Debug, Clone)]
pub struct InvoiceNotice {
    pub invoice_id: Uuid,
    pub bill_no: String,
    pub customer_name: String,
    pub phone: Option<String>,
    pub grand_total: Decimal,
    pub issued_at: DateTime<Utc>,
}

/// Auto-send honors each channel's `auto_send` flag; an explicit request
/// attempts every configured channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyMode {
    Auto,
    Manual,
}

pub struct NotificationDispatcher {
    http: reqwest::Client,
    public_base_url: String,
}

static MOCK_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// In-memory provider for tests and unconfigured deployments.
pub struct MockProvider;

#[async_trait]
impl MessageProvider for MockProvider {
    async fn send(&self, to: &str, body: &str) -> Result<ProviderSendResponse, ProviderError> {
        let n = MOCK_SEQUENCE.fetch_add(1, Ordering::SeqCst) + 1;
        info!(to = %to, body_length = body.len(), "[MOCK] message would be sent");
        Ok(ProviderSendResponse {
            message_id: Some(format!("mock-{n}")),
        })
    }
}

impl NotificationDispatcher {
    pub fn new(public_base_url: String) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(PROVIDER_TIMEOUT)
            .build()
            .map_err(|e| {
                AppError::ConfigError(anyhow::anyhow!("Failed to build HTTP client: {}", e))
            })?;
        Ok(Self {
            http,
            public_base_url,
        })
    }

    fn provider_for(
        &self,
        channel: Channel,
        cfg: &ChannelSettings,
    ) -> Result<Box<dyn MessageProvider>, ProviderError> {
        match cfg.provider {
            ProviderKind::Twilio => Ok(Box::new(TwilioProvider::new(
                cfg,
                channel == Channel::Whatsapp,
                self.http.clone(),
            )?)),
            ProviderKind::Msg91 => match channel {
                Channel::Sms => Ok(Box::new(Msg91Provider::new(cfg, self.http.clone())?)),
                Channel::Whatsapp => Err(ProviderError::Configuration(
                    "msg91 does not support whatsapp".to_string(),
                )),
            },
            ProviderKind::Generic => {
                Ok(Box::new(GenericHttpProvider::new(cfg, self.http.clone())?))
            }
            ProviderKind::Mock => Ok(Box::new(MockProvider)),
        }
    }

    fn template_vars(&self, notice: &InvoiceNotice) -> HashMap<&'static str, String> {
        let base = self.public_base_url.trim_end_matches('/');
        HashMap::from([
            ("customer", notice.customer_name.clone()),
            ("amount", format!("₹{:.2}", notice.grand_total)),
            ("bill_no", notice.bill_no.clone()),
            ("date", notice.issued_at.format("%d-%m-%Y").to_string()),
            (
                "pdf_link",
                format!("{base}/invoices/{}/pdf", notice.invoice_id),
            ),
        ])
    }

    /// Attempt one channel. Never errors: every failure mode becomes a
    /// failed outcome.
    #[instrument(skip(self, settings, vars), fields(channel = channel.as_str()))]
    pub async fn dispatch(
        &self,
        channel: Channel,
        settings: &Settings,
        to: &str,
        vars: &HashMap<&'static str, String>,
    ) -> NotificationOutcome {
        let cfg = settings.channel(channel);
        let provider_name = cfg.provider.as_str();

        if !cfg.is_configured(channel) {
            NOTIFICATIONS_TOTAL
                .with_label_values(&[channel.as_str(), "skipped"])
                .inc();
            return NotificationOutcome::failed(
                channel,
                provider_name,
                "channel is not configured".to_string(),
            );
        }

        let body = template::render(&cfg.template, vars);

        let outcome = match self.provider_for(channel, cfg) {
            Ok(provider) => match provider.send(to, &body).await {
                Ok(response) => {
                    info!(to = %to, provider = provider_name, "notification sent");
                    NotificationOutcome::sent(channel, provider_name, response.message_id)
                }
                Err(e) => {
                    warn!(to = %to, provider = provider_name, error = %e, "notification failed");
                    NotificationOutcome::failed(channel, provider_name, e.to_string())
                }
            },
            Err(e) => {
                warn!(provider = provider_name, error = %e, "provider unavailable");
                NotificationOutcome::failed(channel, provider_name, e.to_string())
            }
        };

        let label = if outcome.success { "sent" } else { "failed" };
        NOTIFICATIONS_TOTAL
            .with_label_values(&[channel.as_str(), label])
            .inc();
        outcome
    }

    /// Notify the customer about an issued invoice over both channels,
    /// independently. A missing or unusable phone number fails each
    /// attempted channel without touching the other.
    pub async fn notify_invoice(
        &self,
        settings: &Settings,
        notice: &InvoiceNotice,
        mode: NotifyMode,
    ) -> NotificationReport {
        let send_sms = mode == NotifyMode::Manual || settings.sms.auto_send;
        let send_whatsapp = mode == NotifyMode::Manual || settings.whatsapp.auto_send;

        let mut report = NotificationReport::default();
        if !send_sms && !send_whatsapp {
            return report;
        }

        let to = match notice.phone.as_deref().map(normalize_phone) {
            Some(Ok(to)) => to,
            Some(Err(e)) => {
                let fail = |channel| {
                    NotificationOutcome::failed(
                        channel,
                        settings.channel(channel).provider.as_str(),
                        e.to_string(),
                    )
                };
                report.sms = send_sms.then(|| fail(Channel::Sms));
                report.whatsapp = send_whatsapp.then(|| fail(Channel::Whatsapp));
                return report;
            }
            None => {
                let fail = |channel| {
                    NotificationOutcome::failed(
                        channel,
                        settings.channel(channel).provider.as_str(),
                        "customer phone number not available".to_string(),
                    )
                };
                report.sms = send_sms.then(|| fail(Channel::Sms));
                report.whatsapp = send_whatsapp.then(|| fail(Channel::Whatsapp));
                return report;
            }
        };

        let vars = self.template_vars(notice);

        let (sms, whatsapp) = futures::join!(
            async {
                if send_sms {
                    Some(self.dispatch(Channel::Sms, settings, &to, &vars).await)
                } else {
                    None
                }
            },
            async {
                if send_whatsapp {
                    Some(self.dispatch(Channel::Whatsapp, settings, &to, &vars).await)
                } else {
                    None
                }
            },
        );

        report.sms = sms;
        report.whatsapp = whatsapp;
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phone_numbers_normalize_to_one_convention() {
        assert_eq!(normalize_phone("+919788388823").unwrap(), "+919788388823");
        assert_eq!(normalize_phone("919788388823").unwrap(), "+919788388823");
        assert_eq!(normalize_phone("09788388823").unwrap(), "+919788388823");
        assert_eq!(normalize_phone("9788388823").unwrap(), "+919788388823");
        assert_eq!(normalize_phone("97883 88823").unwrap(), "+919788388823");
    }

    #[test]
    fn empty_phone_is_invalid() {
        assert!(normalize_phone("").is_err());
        assert!(normalize_phone("  +  ").is_err());
    }

    fn dispatcher() -> NotificationDispatcher {
        NotificationDispatcher::new("http://localhost:8080".to_string()).expect("dispatcher")
    }

    fn notice() -> InvoiceNotice {
        InvoiceNotice {
            invoice_id: Uuid::new_v4(),
            bill_no: "INV-0042".to_string(),
            customer_name: "Murugan Traders".to_string(),
            phone: Some("9788388823".to_string()),
            grand_total: Decimal::new(630000, 2),
            issued_at: Utc::now(),
        }
    }

    fn mock_channel() -> ChannelSettings {
        ChannelSettings {
            provider: ProviderKind::Mock,
            template: "Dear {customer}, bill {bill_no} for {amount}".to_string(),
            ..ChannelSettings::default()
        }
    }

    #[tokio::test]
    async fn channels_fail_independently() {
        let mut settings = Settings::with_defaults(Utc::now());
        // SMS misconfigured (no api key), WhatsApp on the mock provider
        settings.sms = ChannelSettings {
            provider: ProviderKind::Twilio,
            template: "Dear {customer}".to_string(),
            ..ChannelSettings::default()
        };
        settings.whatsapp = ChannelSettings {
            sender: "+910000000000".to_string(),
            ..mock_channel()
        };

        let report = dispatcher()
            .notify_invoice(&settings, &notice(), NotifyMode::Manual)
            .await;

        let sms = report.sms.expect("sms attempted");
        let whatsapp = report.whatsapp.expect("whatsapp attempted");
        assert!(!sms.success);
        assert!(whatsapp.success);
        assert!(whatsapp.message_id.is_some());
    }

    #[tokio::test]
    async fn missing_phone_fails_both_channels_without_sending() {
        let mut settings = Settings::with_defaults(Utc::now());
        settings.sms = mock_channel();
        settings.sms.api_key = "key".to_string();
        settings.whatsapp = ChannelSettings {
            sender: "+910000000000".to_string(),
            ..mock_channel()
        };

        let mut no_phone = notice();
        no_phone.phone = None;

        let report = dispatcher()
            .notify_invoice(&settings, &no_phone, NotifyMode::Manual)
            .await;

        assert!(!report.sms.expect("sms outcome").success);
        assert!(!report.whatsapp.expect("whatsapp outcome").success);
    }

    #[tokio::test]
    async fn auto_mode_honors_per_channel_flags() {
        let mut settings = Settings::with_defaults(Utc::now());
        settings.sms = mock_channel();
        settings.sms.api_key = "key".to_string();
        settings.sms.auto_send = true;
        // whatsapp configured but not auto-send
        settings.whatsapp = ChannelSettings {
            sender: "+910000000000".to_string(),
            ..mock_channel()
        };

        let report = dispatcher()
            .notify_invoice(&settings, &notice(), NotifyMode::Auto)
            .await;

        assert!(report.sms.expect("sms outcome").success);
        assert!(report.whatsapp.is_none());
    }
}
