//! Settings: a lazily-created singleton holding tax rates, company identity
//! and per-channel messaging configuration.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::notification::Channel;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub cgst_percent: Decimal,
    pub sgst_percent: Decimal,
    pub from_location: Option<String>,
    pub company_name: Option<String>,
    pub company_address: Option<String>,
    pub gstin: Option<String>,
    pub phone_numbers: Option<String>,
    pub footer_message: Option<String>,
    pub sms: ChannelSettings,
    pub whatsapp: ChannelSettings,
    pub updated_at: DateTime<Utc>,
}

/// Messaging provider backend selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Twilio,
    Msg91,
    Generic,
    Mock,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Twilio => "twilio",
            ProviderKind::Msg91 => "msg91",
            ProviderKind::Generic => "generic",
            ProviderKind::Mock => "mock",
        }
    }
}

/// Per-channel messaging configuration. `sender` is the sender id for SMS
/// gateways and the sender number for WhatsApp; `api_url` is only used by
/// the generic HTTP provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelSettings {
    pub provider: ProviderKind,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_secret: Option<String>,
    #[serde(default)]
    pub sender: String,
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub template: String,
    #[serde(default)]
    pub auto_send: bool,
}

impl ChannelSettings {
    /// Whether this channel has the minimum configuration to attempt a send.
    pub fn is_configured(&self, channel: Channel) -> bool {
        match channel {
            Channel::Sms => !self.api_key.is_empty() && !self.template.is_empty(),
            Channel::Whatsapp => !self.sender.is_empty() && !self.template.is_empty(),
        }
    }
}

/// Subset of settings safe to hand to external renderers/exporters: no
/// provider credentials.
#[derive(Debug, Clone, Serialize)]
pub struct CompanyIdentity {
    pub company_name: Option<String>,
    pub company_address: Option<String>,
    pub gstin: Option<String>,
    pub phone_numbers: Option<String>,
    pub footer_message: Option<String>,
    pub from_location: Option<String>,
}

/// Partial settings update; omitted fields are left unchanged. Tax rates
/// arrive as raw JSON values so a non-numeric rate can be rejected with a
/// meaningful error instead of a deserialization failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateSettings {
    #[serde(default)]
    pub cgst_percent: Option<serde_json::Value>,
    #[serde(default)]
    pub sgst_percent: Option<serde_json::Value>,
    #[serde(default)]
    pub from_location: Option<String>,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub company_address: Option<String>,
    #[serde(default)]
    pub gstin: Option<String>,
    #[serde(default)]
    pub phone_numbers: Option<String>,
    #[serde(default)]
    pub footer_message: Option<String>,
    #[serde(default)]
    pub sms: Option<ChannelSettings>,
    #[serde(default)]
    pub whatsapp: Option<ChannelSettings>,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Twilio,
            api_key: String::new(),
            api_secret: None,
            sender: String::new(),
            api_url: None,
            template: String::new(),
            auto_send: false,
        }
    }
}

impl Settings {
    /// Defaults applied when the singleton row is created on first access.
    /// CGST and SGST default to the 2.5% + 2.5% split.
    pub fn with_defaults(now: DateTime<Utc>) -> Self {
        let default_template = "Dear {customer}, bill {bill_no} dated {date} for {amount} \
                                has been generated. View: {pdf_link}";
        Self {
            cgst_percent: Decimal::new(25, 1),
            sgst_percent: Decimal::new(25, 1),
            from_location: None,
            company_name: None,
            company_address: None,
            gstin: None,
            phone_numbers: None,
            footer_message: None,
            sms: ChannelSettings {
                template: default_template.to_string(),
                ..ChannelSettings::default()
            },
            whatsapp: ChannelSettings {
                template: default_template.to_string(),
                ..ChannelSettings::default()
            },
            updated_at: now,
        }
    }

    pub fn channel(&self, channel: Channel) -> &ChannelSettings {
        match channel {
            Channel::Sms => &self.sms,
            Channel::Whatsapp => &self.whatsapp,
        }
    }

    pub fn company(&self) -> CompanyIdentity {
        CompanyIdentity {
            company_name: self.company_name.clone(),
            company_address: self.company_address.clone(),
            gstin: self.gstin.clone(),
            phone_numbers: self.phone_numbers.clone(),
            footer_message: self.footer_message.clone(),
            from_location: self.from_location.clone(),
        }
    }
}
