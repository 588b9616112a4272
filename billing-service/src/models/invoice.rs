//! Invoice aggregate and its wire contracts.

use crate::models::customer::Customer;
use crate::models::settings::CompanyIdentity;
use crate::models::vehicle::Vehicle;
use crate::models::waybill::{Waybill, WaybillRequest};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

/// Issued invoice. Immutable after creation except for administrative
/// deletion.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Invoice {
    pub id: Uuid,
    pub bill_no: String,
    pub issued_at: DateTime<Utc>,
    pub customer_id: Uuid,
    pub vehicle_id: Option<Uuid>,
    pub subtotal: Decimal,
    pub cgst_amount: Decimal,
    pub sgst_amount: Decimal,
    pub round_off: Decimal,
    pub grand_total: Decimal,
    pub issued_by: Uuid,
    pub delivery_location: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A single line on an invoice. Item name and rate are copied from the
/// request at billing time, never referenced from the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InvoiceLine {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub line_no: i32,
    pub item_name: String,
    pub quantity: Decimal,
    pub rate: Decimal,
    pub amount: Decimal,
}

/// Invoice creation input. Line items arrive as parallel arrays; individual
/// malformed rows are skipped rather than failing the request, so quantities
/// and rates are accepted as raw JSON values and parsed leniently.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateInvoiceRequest {
    #[validate(length(min = 1, message = "customer name is required"))]
    pub customer_name: String,
    #[serde(default)]
    pub customer_gst: Option<String>,
    #[serde(default)]
    pub customer_phone: Option<String>,
    #[serde(default)]
    pub customer_address: Option<String>,
    #[validate(length(min = 1, message = "vehicle number is required"))]
    pub vehicle_number: String,
    #[serde(default)]
    pub vehicle_type: Option<String>,
    #[serde(default)]
    pub item_names: Vec<String>,
    #[serde(default)]
    pub quantities: Vec<serde_json::Value>,
    #[serde(default)]
    pub rates: Vec<serde_json::Value>,
    #[serde(default)]
    pub round_off: Option<serde_json::Value>,
    #[serde(default)]
    pub delivery_location: Option<String>,
    #[serde(default)]
    pub waybill: Option<WaybillRequest>,
}

/// Creation success payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedInvoice {
    pub invoice_id: Uuid,
    pub bill_no: String,
}

/// Invoice with its lines and optional waybill.
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceDetail {
    pub invoice: Invoice,
    pub lines: Vec<InvoiceLine>,
    pub waybill: Option<Waybill>,
}

/// The assembled data an external document renderer consumes. The engine
/// supplies data only, never formatting.
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceDocument {
    pub invoice: Invoice,
    pub lines: Vec<InvoiceLine>,
    pub waybill: Option<Waybill>,
    pub customer: Customer,
    pub vehicle: Option<Vehicle>,
    pub company: CompanyIdentity,
}

/// One row of the tabular data an external export formatter consumes.
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceExportRow {
    pub bill_no: String,
    pub issued_at: DateTime<Utc>,
    pub customer_name: String,
    pub vehicle_plate: Option<String>,
    pub subtotal: Decimal,
    pub cgst_amount: Decimal,
    pub sgst_amount: Decimal,
    pub grand_total: Decimal,
}

/// Filter for invoice listings. The customer restriction is set by the
/// caller's access scope, never by the caller directly.
#[derive(Debug, Clone, Default)]
pub struct ListInvoicesFilter {
    pub customer_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: i64,
}

/// Lenient numeric parsing for line-item quantities and rates: JSON numbers
/// and numeric strings are accepted, anything else yields `None`.
pub fn decimal_from_value(value: &serde_json::Value) -> Option<Decimal> {
    match value {
        serde_json::Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        serde_json::Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Decimal::from_str(trimmed).ok()
            }
        }
        _ => None,
    }
}
