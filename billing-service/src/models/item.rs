//! Item master catalog.
//!
//! Invoices copy item name and rate at billing time; a later catalog rate
//! change never alters an existing invoice line.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Item {
    pub id: Uuid,
    pub name: String,
    pub rate: Decimal,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}
