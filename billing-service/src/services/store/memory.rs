//! In-process backend for [`BillingStore`], used by tests and local
//! development. Uniqueness constraints mirror the PostgreSQL schema so the
//! engine's conflict-retry paths behave the same against either backend.

use super::{BillingStore, StoreError};
use crate::models::{
    Customer, Invoice, InvoiceLine, Item, ListInvoicesFilter, Settings, Vehicle, Waybill,
};
use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    customers: Vec<Customer>,
    vehicles: Vec<Vehicle>,
    // insertion order stands in for the bigserial sequence
    invoices: Vec<Invoice>,
    lines: Vec<InvoiceLine>,
    waybills: Vec<Waybill>,
    items: Vec<Item>,
    settings: Option<Settings>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Row counts across entity tables, handy for zero-side-effect
    /// assertions in tests.
    pub async fn row_counts(&self) -> (usize, usize, usize, usize, usize) {
        let t = self.tables.lock().await;
        (
            t.customers.len(),
            t.vehicles.len(),
            t.invoices.len(),
            t.lines.len(),
            t.waybills.len(),
        )
    }
}

#[async_trait]
impl BillingStore for MemoryStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn find_customer_by_name(&self, name: &str) -> Result<Option<Customer>, StoreError> {
        let t = self.tables.lock().await;
        Ok(t.customers.iter().find(|c| c.name == name).cloned())
    }

    async fn get_customer(&self, id: Uuid) -> Result<Option<Customer>, StoreError> {
        let t = self.tables.lock().await;
        Ok(t.customers.iter().find(|c| c.id == id).cloned())
    }

    async fn insert_customer(&self, customer: &Customer) -> Result<(), StoreError> {
        let mut t = self.tables.lock().await;
        if t.customers.iter().any(|c| c.name == customer.name) {
            return Err(StoreError::DuplicateCustomerName);
        }
        t.customers.push(customer.clone());
        Ok(())
    }

    async fn update_customer(&self, customer: &Customer) -> Result<(), StoreError> {
        let mut t = self.tables.lock().await;
        match t.customers.iter_mut().find(|c| c.id == customer.id) {
            Some(existing) => {
                *existing = customer.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound("customer")),
        }
    }

    async fn find_vehicle_by_plate(&self, plate: &str) -> Result<Option<Vehicle>, StoreError> {
        let t = self.tables.lock().await;
        Ok(t.vehicles.iter().find(|v| v.plate == plate).cloned())
    }

    async fn get_vehicle(&self, id: Uuid) -> Result<Option<Vehicle>, StoreError> {
        let t = self.tables.lock().await;
        Ok(t.vehicles.iter().find(|v| v.id == id).cloned())
    }

    async fn insert_vehicle(&self, vehicle: &Vehicle) -> Result<(), StoreError> {
        let mut t = self.tables.lock().await;
        if t.vehicles.iter().any(|v| v.plate == vehicle.plate) {
            return Err(StoreError::DuplicateVehiclePlate);
        }
        t.vehicles.push(vehicle.clone());
        Ok(())
    }

    async fn update_vehicle(&self, vehicle: &Vehicle) -> Result<(), StoreError> {
        let mut t = self.tables.lock().await;
        match t.vehicles.iter_mut().find(|v| v.id == vehicle.id) {
            Some(existing) => {
                *existing = vehicle.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound("vehicle")),
        }
    }

    async fn last_bill_no(&self) -> Result<Option<String>, StoreError> {
        let t = self.tables.lock().await;
        Ok(t.invoices.last().map(|i| i.bill_no.clone()))
    }

    async fn invoice_count(&self) -> Result<u64, StoreError> {
        let t = self.tables.lock().await;
        Ok(t.invoices.len() as u64)
    }

    async fn insert_invoice(
        &self,
        invoice: &Invoice,
        lines: &[InvoiceLine],
        waybill: Option<&Waybill>,
    ) -> Result<(), StoreError> {
        let mut t = self.tables.lock().await;
        if t.invoices.iter().any(|i| i.bill_no == invoice.bill_no) {
            return Err(StoreError::DuplicateBillNo);
        }
        t.invoices.push(invoice.clone());
        t.lines.extend(lines.iter().cloned());
        if let Some(waybill) = waybill {
            t.waybills.push(waybill.clone());
        }
        Ok(())
    }

    async fn get_invoice(&self, id: Uuid) -> Result<Option<Invoice>, StoreError> {
        let t = self.tables.lock().await;
        Ok(t.invoices.iter().find(|i| i.id == id).cloned())
    }

    async fn get_invoice_lines(&self, invoice_id: Uuid) -> Result<Vec<InvoiceLine>, StoreError> {
        let t = self.tables.lock().await;
        let mut lines: Vec<InvoiceLine> = t
            .lines
            .iter()
            .filter(|l| l.invoice_id == invoice_id)
            .cloned()
            .collect();
        lines.sort_by_key(|l| l.line_no);
        Ok(lines)
    }

    async fn get_waybill(&self, invoice_id: Uuid) -> Result<Option<Waybill>, StoreError> {
        let t = self.tables.lock().await;
        Ok(t.waybills.iter().find(|w| w.invoice_id == invoice_id).cloned())
    }

    async fn list_invoices(
        &self,
        filter: &ListInvoicesFilter,
    ) -> Result<Vec<Invoice>, StoreError> {
        let t = self.tables.lock().await;
        let limit = filter.limit.clamp(1, 500) as usize;
        let invoices = t
            .invoices
            .iter()
            .rev()
            .filter(|i| filter.customer_id.is_none_or(|id| i.customer_id == id))
            .filter(|i| filter.from.is_none_or(|from| i.issued_at >= from))
            .filter(|i| filter.to.is_none_or(|to| i.issued_at <= to))
            .take(limit)
            .cloned()
            .collect();
        Ok(invoices)
    }

    async fn delete_invoice(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut t = self.tables.lock().await;
        let before = t.invoices.len();
        t.invoices.retain(|i| i.id != id);
        let deleted = t.invoices.len() < before;
        if deleted {
            t.lines.retain(|l| l.invoice_id != id);
            t.waybills.retain(|w| w.invoice_id != id);
        }
        Ok(deleted)
    }

    async fn list_active_items(&self) -> Result<Vec<Item>, StoreError> {
        let t = self.tables.lock().await;
        let mut items: Vec<Item> = t.items.iter().filter(|i| i.active).cloned().collect();
        items.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(items)
    }

    async fn upsert_item(&self, item: &Item) -> Result<(), StoreError> {
        let mut t = self.tables.lock().await;
        match t.items.iter_mut().find(|i| i.name == item.name) {
            Some(existing) => {
                existing.rate = item.rate;
                existing.active = item.active;
            }
            None => t.items.push(item.clone()),
        }
        Ok(())
    }

    async fn recent_rates_for_item(
        &self,
        item_name: &str,
        limit: i64,
    ) -> Result<Vec<Decimal>, StoreError> {
        let t = self.tables.lock().await;
        // invoice insertion order is the recency order
        let mut rates = Vec::new();
        for invoice in t.invoices.iter().rev() {
            for line in t.lines.iter().filter(|l| l.invoice_id == invoice.id) {
                if line.item_name == item_name {
                    rates.push(line.rate);
                    if rates.len() as i64 >= limit {
                        return Ok(rates);
                    }
                }
            }
        }
        Ok(rates)
    }

    async fn load_settings(&self) -> Result<Option<Settings>, StoreError> {
        let t = self.tables.lock().await;
        Ok(t.settings.clone())
    }

    async fn save_settings(&self, settings: &Settings) -> Result<(), StoreError> {
        let mut t = self.tables.lock().await;
        t.settings = Some(settings.clone());
        Ok(())
    }
}
