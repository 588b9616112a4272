//! Customer master records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Customer record. Created on first reference from an invoice, then only
/// ever updated; never deleted while invoices reference it.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Customer {
    pub id: Uuid,
    pub name: String,
    pub gst_number: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Optional fields accompanying a customer reference on an invoice request.
#[derive(Debug, Clone, Default)]
pub struct CustomerFields {
    pub gst_number: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

impl Customer {
    pub fn new(name: String, fields: CustomerFields, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            gst_number: fields.gst_number,
            phone: fields.phone,
            address: fields.address,
            created_at: now,
        }
    }

    /// First-write-wins merge: fill fields that are currently empty from
    /// `incoming`, leave populated fields untouched. Returns whether anything
    /// changed.
    pub fn merge_missing(&mut self, incoming: &CustomerFields) -> bool {
        let mut changed = false;
        if self.gst_number.is_none() && incoming.gst_number.is_some() {
            self.gst_number.clone_from(&incoming.gst_number);
            changed = true;
        }
        if self.phone.is_none() && incoming.phone.is_some() {
            self.phone.clone_from(&incoming.phone);
            changed = true;
        }
        if self.address.is_none() && incoming.address.is_some() {
            self.address.clone_from(&incoming.address);
            changed = true;
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_fills_only_empty_fields() {
        let mut customer = Customer::new(
            "Murugan Traders".to_string(),
            CustomerFields {
                phone: Some("9788388823".to_string()),
                ..Default::default()
            },
            Utc::now(),
        );

        let changed = customer.merge_missing(&CustomerFields {
            gst_number: Some("33AAAAA0000A1Z5".to_string()),
            phone: Some("1234567890".to_string()),
            address: None,
        });

        assert!(changed);
        assert_eq!(customer.gst_number.as_deref(), Some("33AAAAA0000A1Z5"));
        // existing phone wins over the incoming one
        assert_eq!(customer.phone.as_deref(), Some("9788388823"));
        assert!(customer.address.is_none());
    }

    #[test]
    fn merge_reports_no_change_when_nothing_fillable() {
        let mut customer = Customer::new("A".to_string(), CustomerFields::default(), Utc::now());
        assert!(!customer.merge_missing(&CustomerFields::default()));
    }
}
