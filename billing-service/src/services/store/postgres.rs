//! PostgreSQL backend for [`BillingStore`].

use super::{BillingStore, StoreError};
use crate::models::{
    ChannelSettings, Customer, Invoice, InvoiceLine, Item, ListInvoicesFilter, Settings, Vehicle,
    Waybill,
};
use crate::services::metrics::STORE_QUERY_DURATION;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::FromRow;
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

const INVOICE_COLUMNS: &str = "id, bill_no, issued_at, customer_id, vehicle_id, subtotal, \
     cgst_amount, sgst_amount, round_off, grand_total, issued_by, delivery_location, created_at";

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "billing-service"))]
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, StoreError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Backend(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), StoreError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }
}

/// Map a sqlx error, converting unique violations on known constraints to
/// their typed variants so callers can drive conflict-retry logic.
fn store_err(op: &'static str, e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = e {
        if db_err.is_unique_violation() {
            return match db_err.constraint() {
                Some("invoices_bill_no_key") => StoreError::DuplicateBillNo,
                Some("customers_name_key") => StoreError::DuplicateCustomerName,
                Some("vehicles_plate_key") => StoreError::DuplicateVehiclePlate,
                _ => StoreError::Backend(anyhow::anyhow!("{}: {}", op, e)),
            };
        }
    }
    StoreError::Backend(anyhow::anyhow!("{}: {}", op, e))
}

#[derive(FromRow)]
struct SettingsRow {
    cgst_percent: Decimal,
    sgst_percent: Decimal,
    from_location: Option<String>,
    company_name: Option<String>,
    company_address: Option<String>,
    gstin: Option<String>,
    phone_numbers: Option<String>,
    footer_message: Option<String>,
    sms: Json<ChannelSettings>,
    whatsapp: Json<ChannelSettings>,
    updated_at: DateTime<Utc>,
}

impl From<SettingsRow> for Settings {
    fn from(row: SettingsRow) -> Self {
        Settings {
            cgst_percent: row.cgst_percent,
            sgst_percent: row.sgst_percent,
            from_location: row.from_location,
            company_name: row.company_name,
            company_address: row.company_address,
            gstin: row.gstin,
            phone_numbers: row.phone_numbers,
            footer_message: row.footer_message,
            sms: row.sms.0,
            whatsapp: row.whatsapp.0,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl BillingStore for PgStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        PgStore::health_check(self).await
    }

    #[instrument(skip(self))]
    async fn find_customer_by_name(&self, name: &str) -> Result<Option<Customer>, StoreError> {
        sqlx::query_as::<_, Customer>(
            "SELECT id, name, gst_number, phone, address, created_at FROM customers WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| store_err("find_customer_by_name", e))
    }

    #[instrument(skip(self))]
    async fn get_customer(&self, id: Uuid) -> Result<Option<Customer>, StoreError> {
        sqlx::query_as::<_, Customer>(
            "SELECT id, name, gst_number, phone, address, created_at FROM customers WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| store_err("get_customer", e))
    }

    #[instrument(skip(self, customer), fields(customer_id = %customer.id))]
    async fn insert_customer(&self, customer: &Customer) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO customers (id, name, gst_number, phone, address, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(customer.id)
        .bind(&customer.name)
        .bind(&customer.gst_number)
        .bind(&customer.phone)
        .bind(&customer.address)
        .bind(customer.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| store_err("insert_customer", e))?;
        Ok(())
    }

    #[instrument(skip(self, customer), fields(customer_id = %customer.id))]
    async fn update_customer(&self, customer: &Customer) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE customers
            SET gst_number = $2, phone = $3, address = $4
            WHERE id = $1
            "#,
        )
        .bind(customer.id)
        .bind(&customer.gst_number)
        .bind(&customer.phone)
        .bind(&customer.address)
        .execute(&self.pool)
        .await
        .map_err(|e| store_err("update_customer", e))?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn find_vehicle_by_plate(&self, plate: &str) -> Result<Option<Vehicle>, StoreError> {
        sqlx::query_as::<_, Vehicle>(
            "SELECT id, plate, vehicle_type, customer_id, created_at FROM vehicles WHERE plate = $1",
        )
        .bind(plate)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| store_err("find_vehicle_by_plate", e))
    }

    #[instrument(skip(self))]
    async fn get_vehicle(&self, id: Uuid) -> Result<Option<Vehicle>, StoreError> {
        sqlx::query_as::<_, Vehicle>(
            "SELECT id, plate, vehicle_type, customer_id, created_at FROM vehicles WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| store_err("get_vehicle", e))
    }

    #[instrument(skip(self, vehicle), fields(plate = %vehicle.plate))]
    async fn insert_vehicle(&self, vehicle: &Vehicle) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO vehicles (id, plate, vehicle_type, customer_id, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(vehicle.id)
        .bind(&vehicle.plate)
        .bind(&vehicle.vehicle_type)
        .bind(vehicle.customer_id)
        .bind(vehicle.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| store_err("insert_vehicle", e))?;
        Ok(())
    }

    #[instrument(skip(self, vehicle), fields(plate = %vehicle.plate))]
    async fn update_vehicle(&self, vehicle: &Vehicle) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE vehicles
            SET vehicle_type = $2, customer_id = $3
            WHERE id = $1
            "#,
        )
        .bind(vehicle.id)
        .bind(&vehicle.vehicle_type)
        .bind(vehicle.customer_id)
        .execute(&self.pool)
        .await
        .map_err(|e| store_err("update_vehicle", e))?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn last_bill_no(&self) -> Result<Option<String>, StoreError> {
        sqlx::query_scalar::<_, String>(
            "SELECT bill_no FROM invoices ORDER BY seq DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| store_err("last_bill_no", e))
    }

    #[instrument(skip(self))]
    async fn invoice_count(&self) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM invoices")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| store_err("invoice_count", e))?;
        Ok(count as u64)
    }

    #[instrument(skip(self, invoice, lines, waybill), fields(bill_no = %invoice.bill_no))]
    async fn insert_invoice(
        &self,
        invoice: &Invoice,
        lines: &[InvoiceLine],
        waybill: Option<&Waybill>,
    ) -> Result<(), StoreError> {
        let timer = STORE_QUERY_DURATION
            .with_label_values(&["insert_invoice"])
            .start_timer();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| store_err("insert_invoice", e))?;

        sqlx::query(
            r#"
            INSERT INTO invoices (
                id, bill_no, issued_at, customer_id, vehicle_id, subtotal,
                cgst_amount, sgst_amount, round_off, grand_total, issued_by,
                delivery_location, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(invoice.id)
        .bind(&invoice.bill_no)
        .bind(invoice.issued_at)
        .bind(invoice.customer_id)
        .bind(invoice.vehicle_id)
        .bind(invoice.subtotal)
        .bind(invoice.cgst_amount)
        .bind(invoice.sgst_amount)
        .bind(invoice.round_off)
        .bind(invoice.grand_total)
        .bind(invoice.issued_by)
        .bind(&invoice.delivery_location)
        .bind(invoice.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| store_err("insert_invoice", e))?;

        for line in lines {
            sqlx::query(
                r#"
                INSERT INTO invoice_lines (id, invoice_id, line_no, item_name, quantity, rate, amount)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(line.id)
            .bind(line.invoice_id)
            .bind(line.line_no)
            .bind(&line.item_name)
            .bind(line.quantity)
            .bind(line.rate)
            .bind(line.amount)
            .execute(&mut *tx)
            .await
            .map_err(|e| store_err("insert_invoice_line", e))?;
        }

        if let Some(waybill) = waybill {
            sqlx::query(
                r#"
                INSERT INTO waybills (
                    id, invoice_id, driver_name, material_type, vehicle_capacity,
                    delivery_location, loading_at, unloading_at, created_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(waybill.id)
            .bind(waybill.invoice_id)
            .bind(&waybill.driver_name)
            .bind(&waybill.material_type)
            .bind(&waybill.vehicle_capacity)
            .bind(&waybill.delivery_location)
            .bind(waybill.loading_at)
            .bind(waybill.unloading_at)
            .bind(waybill.created_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| store_err("insert_waybill", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| store_err("insert_invoice", e))?;

        timer.observe_duration();

        info!(invoice_id = %invoice.id, bill_no = %invoice.bill_no, "Invoice persisted");

        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_invoice(&self, id: Uuid) -> Result<Option<Invoice>, StoreError> {
        sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| store_err("get_invoice", e))
    }

    #[instrument(skip(self))]
    async fn get_invoice_lines(&self, invoice_id: Uuid) -> Result<Vec<InvoiceLine>, StoreError> {
        sqlx::query_as::<_, InvoiceLine>(
            r#"
            SELECT id, invoice_id, line_no, item_name, quantity, rate, amount
            FROM invoice_lines
            WHERE invoice_id = $1
            ORDER BY line_no
            "#,
        )
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| store_err("get_invoice_lines", e))
    }

    #[instrument(skip(self))]
    async fn get_waybill(&self, invoice_id: Uuid) -> Result<Option<Waybill>, StoreError> {
        sqlx::query_as::<_, Waybill>(
            r#"
            SELECT id, invoice_id, driver_name, material_type, vehicle_capacity,
                delivery_location, loading_at, unloading_at, created_at
            FROM waybills
            WHERE invoice_id = $1
            "#,
        )
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| store_err("get_waybill", e))
    }

    #[instrument(skip(self, filter))]
    async fn list_invoices(
        &self,
        filter: &ListInvoicesFilter,
    ) -> Result<Vec<Invoice>, StoreError> {
        let timer = STORE_QUERY_DURATION
            .with_label_values(&["list_invoices"])
            .start_timer();

        let limit = filter.limit.clamp(1, 500);

        let invoices = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            SELECT {INVOICE_COLUMNS}
            FROM invoices
            WHERE ($1::uuid IS NULL OR customer_id = $1)
              AND ($2::timestamptz IS NULL OR issued_at >= $2)
              AND ($3::timestamptz IS NULL OR issued_at <= $3)
            ORDER BY seq DESC
            LIMIT $4
            "#
        ))
        .bind(filter.customer_id)
        .bind(filter.from)
        .bind(filter.to)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| store_err("list_invoices", e))?;

        timer.observe_duration();

        Ok(invoices)
    }

    #[instrument(skip(self))]
    async fn delete_invoice(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM invoices WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| store_err("delete_invoice", e))?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(invoice_id = %id, "Invoice deleted");
        }
        Ok(deleted)
    }

    #[instrument(skip(self))]
    async fn list_active_items(&self) -> Result<Vec<Item>, StoreError> {
        sqlx::query_as::<_, Item>(
            "SELECT id, name, rate, active, created_at FROM items WHERE active = TRUE ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| store_err("list_active_items", e))
    }

    #[instrument(skip(self, item), fields(name = %item.name))]
    async fn upsert_item(&self, item: &Item) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO items (id, name, rate, active, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (name) DO UPDATE SET rate = EXCLUDED.rate, active = EXCLUDED.active
            "#,
        )
        .bind(item.id)
        .bind(&item.name)
        .bind(item.rate)
        .bind(item.active)
        .bind(item.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| store_err("upsert_item", e))?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn recent_rates_for_item(
        &self,
        item_name: &str,
        limit: i64,
    ) -> Result<Vec<Decimal>, StoreError> {
        sqlx::query_scalar::<_, Decimal>(
            r#"
            SELECT l.rate
            FROM invoice_lines l
            JOIN invoices i ON i.id = l.invoice_id
            WHERE l.item_name = $1
            ORDER BY i.seq DESC
            LIMIT $2
            "#,
        )
        .bind(item_name)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| store_err("recent_rates_for_item", e))
    }

    #[instrument(skip(self))]
    async fn load_settings(&self) -> Result<Option<Settings>, StoreError> {
        let row = sqlx::query_as::<_, SettingsRow>(
            r#"
            SELECT cgst_percent, sgst_percent, from_location, company_name, company_address,
                gstin, phone_numbers, footer_message, sms, whatsapp, updated_at
            FROM settings
            WHERE id = TRUE
            "#,
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| store_err("load_settings", e))?;

        Ok(row.map(Settings::from))
    }

    #[instrument(skip(self, settings))]
    async fn save_settings(&self, settings: &Settings) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO settings (
                id, cgst_percent, sgst_percent, from_location, company_name, company_address,
                gstin, phone_numbers, footer_message, sms, whatsapp, updated_at
            )
            VALUES (TRUE, $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (id) DO UPDATE SET
                cgst_percent = EXCLUDED.cgst_percent,
                sgst_percent = EXCLUDED.sgst_percent,
                from_location = EXCLUDED.from_location,
                company_name = EXCLUDED.company_name,
                company_address = EXCLUDED.company_address,
                gstin = EXCLUDED.gstin,
                phone_numbers = EXCLUDED.phone_numbers,
                footer_message = EXCLUDED.footer_message,
                sms = EXCLUDED.sms,
                whatsapp = EXCLUDED.whatsapp,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(settings.cgst_percent)
        .bind(settings.sgst_percent)
        .bind(&settings.from_location)
        .bind(&settings.company_name)
        .bind(&settings.company_address)
        .bind(&settings.gstin)
        .bind(&settings.phone_numbers)
        .bind(&settings.footer_message)
        .bind(Json(&settings.sms))
        .bind(Json(&settings.whatsapp))
        .bind(settings.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| store_err("save_settings", e))?;
        Ok(())
    }
}
