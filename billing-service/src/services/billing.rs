//! The invoice issuance workflow and every scoped read over invoice data.
//!
//! Creation order matters: all validation (input, line rows, waybill) runs
//! before entity resolution, and bill-number allocation is the last step
//! before the atomic persist, so a rejected request leaves no partial state
//! behind and never consumes a number.

use crate::models::{
    decimal_from_value, CreateInvoiceRequest, CustomerFields, Invoice, InvoiceDetail,
    InvoiceDocument, InvoiceExportRow, InvoiceLine, IssuedInvoice, Item, ListInvoicesFilter,
    NotificationReport, PlateNumber, Settings, UpdateSettings, VehicleFields, Waybill,
};
use crate::services::access::{AccessScope, Caller};
use crate::services::metrics::{INVOICES_ISSUED_TOTAL, LINES_SKIPPED_TOTAL};
use crate::services::notification::{InvoiceNotice, NotificationDispatcher, NotifyMode};
use crate::services::resolver::EntityResolver;
use crate::services::sequence::SequenceAllocator;
use crate::services::store::BillingStore;
use crate::services::tax;
use chrono::Utc;
use rust_decimal::Decimal;
use service_core::error::AppError;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

const SUGGESTED_RATE_SAMPLE: i64 = 3;
const DEFAULT_LIST_LIMIT: i64 = 100;

pub struct BillingService {
    store: Arc<dyn BillingStore>,
    resolver: EntityResolver,
    allocator: SequenceAllocator,
    dispatcher: Arc<NotificationDispatcher>,
}

impl BillingService {
    pub fn new(store: Arc<dyn BillingStore>, dispatcher: Arc<NotificationDispatcher>) -> Self {
        Self {
            resolver: EntityResolver::new(store.clone()),
            allocator: SequenceAllocator::new(store.clone()),
            store,
            dispatcher,
        }
    }

    /// Load the settings singleton, creating it with defaults on first
    /// access.
    pub async fn settings(&self) -> Result<Settings, AppError> {
        if let Some(settings) = self.store.load_settings().await? {
            return Ok(settings);
        }
        let defaults = Settings::with_defaults(Utc::now());
        self.store.save_settings(&defaults).await?;
        info!("settings singleton created with defaults");
        Ok(defaults)
    }

    /// Issue an invoice: validate, resolve entities, total, tax, allocate a
    /// bill number and persist atomically, then kick off auto notifications
    /// out of band.
    #[instrument(skip(self, caller, request), fields(user_id = %caller.user_id))]
    pub async fn create_invoice(
        &self,
        caller: &Caller,
        request: CreateInvoiceRequest,
    ) -> Result<IssuedInvoice, AppError> {
        let customer_name = request.customer_name.trim();
        if customer_name.is_empty() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "customer name is required"
            )));
        }
        let plate = PlateNumber::parse(&request.vehicle_number)
            .map_err(|e| AppError::BadRequest(anyhow::anyhow!(e)))?;

        if let Some(waybill) = &request.waybill {
            if waybill.driver_name.trim().is_empty() {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "waybill requires a driver name"
                )));
            }
        }

        let round_off = match &request.round_off {
            Some(value) => decimal_from_value(value).ok_or_else(|| {
                AppError::BadRequest(anyhow::anyhow!("round off must be numeric"))
            })?,
            None => Decimal::ZERO,
        };

        let invoice_id = Uuid::new_v4();
        let lines = collect_lines(
            invoice_id,
            &request.item_names,
            &request.quantities,
            &request.rates,
        );
        if lines.is_empty() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "no valid line items in request"
            )));
        }
        let subtotal: Decimal = lines.iter().map(|l| l.amount).sum();

        // nothing persisted until this point
        let customer = self
            .resolver
            .resolve_customer(
                customer_name,
                &CustomerFields {
                    gst_number: non_empty(request.customer_gst.clone()),
                    phone: non_empty(request.customer_phone.clone()),
                    address: non_empty(request.customer_address.clone()),
                },
            )
            .await?;
        let vehicle = self
            .resolver
            .resolve_vehicle(
                &plate,
                &VehicleFields {
                    vehicle_type: non_empty(request.vehicle_type.clone()),
                    customer_id: Some(customer.id),
                },
            )
            .await?;

        let settings = self.settings().await?;
        let breakdown = tax::compute(
            subtotal,
            settings.cgst_percent,
            settings.sgst_percent,
            round_off,
        )
        .map_err(|e| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let now = Utc::now();
        let invoice = Invoice {
            id: invoice_id,
            bill_no: String::new(), // assigned at allocation
            issued_at: now,
            customer_id: customer.id,
            vehicle_id: Some(vehicle.id),
            subtotal,
            cgst_amount: breakdown.cgst_amount,
            sgst_amount: breakdown.sgst_amount,
            round_off,
            grand_total: breakdown.grand_total,
            issued_by: caller.user_id,
            delivery_location: non_empty(request.delivery_location.clone()),
            created_at: now,
        };

        let waybill = request.waybill.as_ref().map(|wb| {
            let loading_at = wb.loading_at.unwrap_or(now);
            Waybill {
                id: Uuid::new_v4(),
                invoice_id,
                driver_name: wb.driver_name.trim().to_string(),
                material_type: wb.material_type.clone(),
                vehicle_capacity: wb.vehicle_capacity.clone(),
                delivery_location: wb
                    .delivery_location
                    .clone()
                    .or_else(|| invoice.delivery_location.clone()),
                loading_at,
                unloading_at: wb.unloading_after(loading_at),
                created_at: now,
            }
        });

        let bill_no = self
            .allocator
            .allocate_and_commit(|bill_no| {
                let store = self.store.clone();
                let mut invoice = invoice.clone();
                let lines = lines.clone();
                let waybill = waybill.clone();
                async move {
                    invoice.bill_no = bill_no;
                    store.insert_invoice(&invoice, &lines, waybill.as_ref()).await
                }
            })
            .await?;

        INVOICES_ISSUED_TOTAL.inc();
        info!(invoice_id = %invoice_id, bill_no = %bill_no, "invoice issued");

        if settings.sms.auto_send || settings.whatsapp.auto_send {
            let dispatcher = self.dispatcher.clone();
            let notice = InvoiceNotice {
                invoice_id,
                bill_no: bill_no.clone(),
                customer_name: customer.name.clone(),
                phone: customer.phone.clone(),
                grand_total: breakdown.grand_total,
                issued_at: now,
            };
            // out of band: the outcome never affects the persisted invoice
            tokio::spawn(async move {
                let report = dispatcher
                    .notify_invoice(&settings, &notice, NotifyMode::Auto)
                    .await;
                debug!(?report, "auto notification dispatched");
            });
        }

        Ok(IssuedInvoice {
            invoice_id,
            bill_no,
        })
    }

    #[instrument(skip(self, scope, filter))]
    pub async fn list_invoices(
        &self,
        scope: AccessScope,
        mut filter: ListInvoicesFilter,
    ) -> Result<Vec<Invoice>, AppError> {
        if scope.denies_everything() {
            return Ok(Vec::new());
        }
        filter.customer_id = scope.customer_filter();
        if filter.limit <= 0 {
            filter.limit = DEFAULT_LIST_LIMIT;
        }
        Ok(self.store.list_invoices(&filter).await?)
    }

    #[instrument(skip(self, scope))]
    pub async fn get_invoice_detail(
        &self,
        scope: AccessScope,
        id: Uuid,
    ) -> Result<InvoiceDetail, AppError> {
        let invoice = self
            .store
            .get_invoice(id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("invoice not found")))?;
        if !scope.permits(&invoice) {
            return Err(AppError::Forbidden(anyhow::anyhow!("access denied")));
        }
        let lines = self.store.get_invoice_lines(id).await?;
        let waybill = self.store.get_waybill(id).await?;
        Ok(InvoiceDetail {
            invoice,
            lines,
            waybill,
        })
    }

    /// Assembled data for the external document renderer.
    #[instrument(skip(self, scope))]
    pub async fn get_invoice_document(
        &self,
        scope: AccessScope,
        id: Uuid,
    ) -> Result<InvoiceDocument, AppError> {
        let detail = self.get_invoice_detail(scope, id).await?;
        let customer = self
            .store
            .get_customer(detail.invoice.customer_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("customer not found")))?;
        let vehicle = match detail.invoice.vehicle_id {
            Some(vehicle_id) => self.store.get_vehicle(vehicle_id).await?,
            None => None,
        };
        let settings = self.settings().await?;
        Ok(InvoiceDocument {
            invoice: detail.invoice,
            lines: detail.lines,
            waybill: detail.waybill,
            customer,
            vehicle,
            company: settings.company(),
        })
    }

    /// Post-scope tabular rows for the external export formatter.
    #[instrument(skip(self, scope, filter))]
    pub async fn export_invoices(
        &self,
        scope: AccessScope,
        filter: ListInvoicesFilter,
    ) -> Result<Vec<InvoiceExportRow>, AppError> {
        let invoices = self.list_invoices(scope, filter).await?;

        let mut customer_names: HashMap<Uuid, String> = HashMap::new();
        let mut vehicle_plates: HashMap<Uuid, String> = HashMap::new();
        let mut rows = Vec::with_capacity(invoices.len());

        for invoice in invoices {
            let customer_name = match customer_names.get(&invoice.customer_id) {
                Some(name) => name.clone(),
                None => {
                    let name = self
                        .store
                        .get_customer(invoice.customer_id)
                        .await?
                        .map(|c| c.name)
                        .unwrap_or_default();
                    customer_names.insert(invoice.customer_id, name.clone());
                    name
                }
            };
            let vehicle_plate = match invoice.vehicle_id {
                Some(vehicle_id) => match vehicle_plates.get(&vehicle_id) {
                    Some(plate) => Some(plate.clone()),
                    None => {
                        let plate = self
                            .store
                            .get_vehicle(vehicle_id)
                            .await?
                            .map(|v| v.plate);
                        if let Some(ref plate) = plate {
                            vehicle_plates.insert(vehicle_id, plate.clone());
                        }
                        plate
                    }
                },
                None => None,
            };

            rows.push(InvoiceExportRow {
                bill_no: invoice.bill_no,
                issued_at: invoice.issued_at,
                customer_name,
                vehicle_plate,
                subtotal: invoice.subtotal,
                cgst_amount: invoice.cgst_amount,
                sgst_amount: invoice.sgst_amount,
                grand_total: invoice.grand_total,
            });
        }

        Ok(rows)
    }

    /// Administrative deletion; the caller's role is checked at the handler
    /// boundary.
    #[instrument(skip(self))]
    pub async fn delete_invoice(&self, id: Uuid) -> Result<(), AppError> {
        if self.store.delete_invoice(id).await? {
            Ok(())
        } else {
            Err(AppError::NotFound(anyhow::anyhow!("invoice not found")))
        }
    }

    /// Explicitly (re)send the notification for an existing invoice.
    #[instrument(skip(self, scope))]
    pub async fn notify_invoice(
        &self,
        scope: AccessScope,
        id: Uuid,
    ) -> Result<NotificationReport, AppError> {
        let detail = self.get_invoice_detail(scope, id).await?;
        let customer = self
            .store
            .get_customer(detail.invoice.customer_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("customer not found")))?;
        let settings = self.settings().await?;

        let notice = InvoiceNotice {
            invoice_id: detail.invoice.id,
            bill_no: detail.invoice.bill_no.clone(),
            customer_name: customer.name,
            phone: customer.phone,
            grand_total: detail.invoice.grand_total,
            issued_at: detail.invoice.issued_at,
        };

        Ok(self
            .dispatcher
            .notify_invoice(&settings, &notice, NotifyMode::Manual)
            .await)
    }

    pub async fn list_items(&self) -> Result<Vec<Item>, AppError> {
        Ok(self.store.list_active_items().await?)
    }

    pub async fn upsert_item(&self, item: &Item) -> Result<(), AppError> {
        Ok(self.store.upsert_item(item).await?)
    }

    /// Average rate over the item's most recent billed lines, if it has ever
    /// been billed.
    #[instrument(skip(self))]
    pub async fn suggested_rate(&self, item_name: &str) -> Result<Option<Decimal>, AppError> {
        let rates = self
            .store
            .recent_rates_for_item(item_name, SUGGESTED_RATE_SAMPLE)
            .await?;
        if rates.is_empty() {
            return Ok(None);
        }
        let count = Decimal::from(rates.len() as i64);
        let sum: Decimal = rates.iter().copied().sum();
        Ok(Some(tax::round_money(sum / count)))
    }

    #[instrument(skip(self, update))]
    pub async fn update_settings(&self, update: UpdateSettings) -> Result<Settings, AppError> {
        let mut settings = self.settings().await?;

        if let Some(value) = &update.cgst_percent {
            settings.cgst_percent = parse_rate("cgst_percent", value)?;
        }
        if let Some(value) = &update.sgst_percent {
            settings.sgst_percent = parse_rate("sgst_percent", value)?;
        }
        if let Some(value) = update.from_location {
            settings.from_location = non_empty(Some(value));
        }
        if let Some(value) = update.company_name {
            settings.company_name = non_empty(Some(value));
        }
        if let Some(value) = update.company_address {
            settings.company_address = non_empty(Some(value));
        }
        if let Some(value) = update.gstin {
            settings.gstin = non_empty(Some(value));
        }
        if let Some(value) = update.phone_numbers {
            settings.phone_numbers = non_empty(Some(value));
        }
        if let Some(value) = update.footer_message {
            settings.footer_message = non_empty(Some(value));
        }
        if let Some(sms) = update.sms {
            settings.sms = sms;
        }
        if let Some(whatsapp) = update.whatsapp {
            settings.whatsapp = whatsapp;
        }
        settings.updated_at = Utc::now();

        self.store.save_settings(&settings).await?;
        info!("settings updated");
        Ok(settings)
    }
}

fn parse_rate(field: &str, value: &serde_json::Value) -> Result<Decimal, AppError> {
    let rate = decimal_from_value(value)
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("{} must be numeric", field)))?;
    if rate < Decimal::ZERO || rate > Decimal::ONE_HUNDRED {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "{} must be between 0 and 100",
            field
        )));
    }
    Ok(rate)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Validate the parallel line-item arrays row by row. A row missing a name,
/// with a non-positive or non-numeric quantity, or with a negative or
/// non-numeric rate is skipped; only the surviving rows become lines.
fn collect_lines(
    invoice_id: Uuid,
    item_names: &[String],
    quantities: &[serde_json::Value],
    rates: &[serde_json::Value],
) -> Vec<InvoiceLine> {
    let rows = item_names
        .len()
        .max(quantities.len())
        .max(rates.len());

    let mut lines = Vec::new();
    for row in 0..rows {
        let name = item_names
            .get(row)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty());
        let quantity = quantities
            .get(row)
            .and_then(decimal_from_value)
            .filter(|q| *q > Decimal::ZERO);
        let rate = rates
            .get(row)
            .and_then(decimal_from_value)
            .filter(|r| *r >= Decimal::ZERO);

        match (name, quantity, rate) {
            (Some(name), Some(quantity), Some(rate)) => {
                lines.push(InvoiceLine {
                    id: Uuid::new_v4(),
                    invoice_id,
                    line_no: lines.len() as i32 + 1,
                    item_name: name.to_string(),
                    quantity,
                    rate,
                    amount: tax::round_money(quantity * rate),
                });
            }
            _ => {
                LINES_SKIPPED_TOTAL.inc();
                debug!(row = row, "skipping malformed line row");
            }
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::str::FromStr;

    fn values(raw: &[serde_json::Value]) -> Vec<serde_json::Value> {
        raw.to_vec()
    }

    #[test]
    fn malformed_rows_are_skipped_not_fatal() {
        let lines = collect_lines(
            Uuid::new_v4(),
            &[
                "Blue Metal 20mm".to_string(),
                "".to_string(),
                "M Sand".to_string(),
                "Gravel".to_string(),
            ],
            &values(&[json!(2), json!(1), json!("three"), json!(1.5)]),
            &values(&[json!(3000), json!(100), json!(250), json!(-5)]),
        );

        // row 1 has no name, row 2 a non-numeric quantity, row 3 a negative
        // rate; only row 0 survives
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].item_name, "Blue Metal 20mm");
        assert_eq!(lines[0].amount, Decimal::from_str("6000").unwrap());
        assert_eq!(lines[0].line_no, 1);
    }

    #[test]
    fn zero_quantity_rows_are_skipped() {
        let lines = collect_lines(
            Uuid::new_v4(),
            &["A".to_string()],
            &values(&[json!(0)]),
            &values(&[json!(10)]),
        );
        assert!(lines.is_empty());
    }

    #[test]
    fn uneven_arrays_only_yield_complete_rows() {
        let lines = collect_lines(
            Uuid::new_v4(),
            &["A".to_string(), "B".to_string()],
            &values(&[json!(1)]),
            &values(&[json!(10), json!(20)]),
        );
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].item_name, "A");
    }

    #[test]
    fn line_amounts_are_rounded_per_line() {
        let lines = collect_lines(
            Uuid::new_v4(),
            &["A".to_string()],
            &values(&[json!(1.333)]),
            &values(&[json!(9.99)]),
        );
        // 1.333 * 9.99 = 13.316... rounds half-up to 13.32
        assert_eq!(lines[0].amount, Decimal::from_str("13.32").unwrap());
    }
}
