//! Storage abstraction for the billing engine.
//!
//! All persistence goes through [`BillingStore`], kept object-safe so the
//! engine holds an `Arc<dyn BillingStore>`. Two backends ship in-tree: the
//! PostgreSQL pool used in deployment and an in-process store for tests and
//! local development. Both enforce the same uniqueness constraints, so the
//! conflict-retry paths behave identically against either.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::models::{
    Customer, Invoice, InvoiceLine, Item, ListInvoicesFilter, Settings, Vehicle, Waybill,
};
use async_trait::async_trait;
use rust_decimal::Decimal;
use service_core::error::AppError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("bill number already allocated")]
    DuplicateBillNo,

    #[error("customer name already exists")]
    DuplicateCustomerName,

    #[error("vehicle plate already exists")]
    DuplicateVehiclePlate,

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(entity) => {
                AppError::NotFound(anyhow::anyhow!("{} not found", entity))
            }
            StoreError::DuplicateBillNo
            | StoreError::DuplicateCustomerName
            | StoreError::DuplicateVehiclePlate => AppError::Conflict(anyhow::anyhow!("{}", err)),
            StoreError::Backend(err) => AppError::DatabaseError(err),
        }
    }
}

#[async_trait]
pub trait BillingStore: Send + Sync {
    /// Backend liveness, for readiness probes.
    async fn health_check(&self) -> Result<(), StoreError>;

    // Customers
    async fn find_customer_by_name(&self, name: &str) -> Result<Option<Customer>, StoreError>;
    async fn get_customer(&self, id: Uuid) -> Result<Option<Customer>, StoreError>;
    async fn insert_customer(&self, customer: &Customer) -> Result<(), StoreError>;
    async fn update_customer(&self, customer: &Customer) -> Result<(), StoreError>;

    // Vehicles
    async fn find_vehicle_by_plate(&self, plate: &str) -> Result<Option<Vehicle>, StoreError>;
    async fn get_vehicle(&self, id: Uuid) -> Result<Option<Vehicle>, StoreError>;
    async fn insert_vehicle(&self, vehicle: &Vehicle) -> Result<(), StoreError>;
    async fn update_vehicle(&self, vehicle: &Vehicle) -> Result<(), StoreError>;

    // Invoices
    /// Bill number of the most recently inserted invoice, if any.
    async fn last_bill_no(&self) -> Result<Option<String>, StoreError>;
    async fn invoice_count(&self) -> Result<u64, StoreError>;
    /// Persist invoice, lines and optional waybill as one atomic unit.
    async fn insert_invoice(
        &self,
        invoice: &Invoice,
        lines: &[InvoiceLine],
        waybill: Option<&Waybill>,
    ) -> Result<(), StoreError>;
    async fn get_invoice(&self, id: Uuid) -> Result<Option<Invoice>, StoreError>;
    async fn get_invoice_lines(&self, invoice_id: Uuid) -> Result<Vec<InvoiceLine>, StoreError>;
    async fn get_waybill(&self, invoice_id: Uuid) -> Result<Option<Waybill>, StoreError>;
    async fn list_invoices(&self, filter: &ListInvoicesFilter)
        -> Result<Vec<Invoice>, StoreError>;
    async fn delete_invoice(&self, id: Uuid) -> Result<bool, StoreError>;

    // Item catalog
    async fn list_active_items(&self) -> Result<Vec<Item>, StoreError>;
    async fn upsert_item(&self, item: &Item) -> Result<(), StoreError>;
    /// Rates from the most recent invoice lines billed for this item,
    /// newest first.
    async fn recent_rates_for_item(
        &self,
        item_name: &str,
        limit: i64,
    ) -> Result<Vec<Decimal>, StoreError>;

    // Settings
    async fn load_settings(&self) -> Result<Option<Settings>, StoreError>;
    async fn save_settings(&self, settings: &Settings) -> Result<(), StoreError>;
}
