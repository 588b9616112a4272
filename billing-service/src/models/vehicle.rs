//! Vehicle records and plate validation.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use uuid::Uuid;

/// Two letters, two digits, one or two letters, four digits (e.g. TN32AX3344).
static PLATE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Z]{2}[0-9]{2}[A-Z]{1,2}[0-9]{4}$").expect("invalid plate pattern")
});

#[derive(Debug, Error)]
#[error("invalid vehicle number '{0}', expected format like TN32AX3344")]
pub struct PlateError(pub String);

/// A validated, uppercase-normalized vehicle registration number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlateNumber(String);

impl PlateNumber {
    /// Normalize (trim, uppercase) and validate. Rejection happens before any
    /// persistence is attempted.
    pub fn parse(raw: &str) -> Result<Self, PlateError> {
        let normalized = raw.trim().to_ascii_uppercase();
        if PLATE_PATTERN.is_match(&normalized) {
            Ok(Self(normalized))
        } else {
            Err(PlateError(raw.trim().to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Vehicle record, created lazily the first time a new plate is billed.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Vehicle {
    pub id: Uuid,
    pub plate: String,
    pub vehicle_type: Option<String>,
    pub customer_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Optional fields accompanying a vehicle reference on an invoice request.
#[derive(Debug, Clone, Default)]
pub struct VehicleFields {
    pub vehicle_type: Option<String>,
    pub customer_id: Option<Uuid>,
}

impl Vehicle {
    pub fn new(plate: &PlateNumber, fields: VehicleFields, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            plate: plate.as_str().to_string(),
            vehicle_type: fields.vehicle_type,
            customer_id: fields.customer_id,
            created_at: now,
        }
    }

    /// First-write-wins merge, same policy as [`Customer::merge_missing`].
    ///
    /// [`Customer::merge_missing`]: crate::models::Customer::merge_missing
    pub fn merge_missing(&mut self, incoming: &VehicleFields) -> bool {
        let mut changed = false;
        if self.vehicle_type.is_none() && incoming.vehicle_type.is_some() {
            self.vehicle_type.clone_from(&incoming.vehicle_type);
            changed = true;
        }
        if self.customer_id.is_none() && incoming.customer_id.is_some() {
            self.customer_id = incoming.customer_id;
            changed = true;
        }
        changed
    }
}
