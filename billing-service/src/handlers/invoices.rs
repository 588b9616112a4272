use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::handlers::require_admin;
use crate::models::{
    CreateInvoiceRequest, Invoice, InvoiceDetail, InvoiceDocument, InvoiceExportRow, IssuedInvoice,
    ListInvoicesFilter, NotificationReport,
};
use crate::services::Caller;
use crate::startup::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub limit: Option<i64>,
}

impl ListQuery {
    fn into_filter(self) -> ListInvoicesFilter {
        let end_of_day = NaiveTime::from_hms_opt(23, 59, 59).expect("valid end-of-day time");
        ListInvoicesFilter {
            customer_id: None, // set by the caller's access scope
            from: self.from.map(|d| d.and_time(NaiveTime::MIN).and_utc()),
            to: self.to.map(|d| d.and_time(end_of_day).and_utc()),
            limit: self.limit.unwrap_or(0),
        }
    }
}

#[tracing::instrument(skip(state, caller, request))]
pub async fn create_invoice(
    State(state): State<AppState>,
    caller: Caller,
    Json(request): Json<CreateInvoiceRequest>,
) -> Result<(StatusCode, Json<IssuedInvoice>), AppError> {
    request.validate()?;
    let issued = state.service.create_invoice(&caller, request).await?;
    Ok((StatusCode::CREATED, Json(issued)))
}

#[tracing::instrument(skip(state, caller))]
pub async fn list_invoices(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Invoice>>, AppError> {
    let invoices = state
        .service
        .list_invoices(caller.scope(), query.into_filter())
        .await?;
    Ok(Json(invoices))
}

#[tracing::instrument(skip(state, caller))]
pub async fn get_invoice(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<InvoiceDetail>, AppError> {
    let detail = state.service.get_invoice_detail(caller.scope(), id).await?;
    Ok(Json(detail))
}

/// Data supply for the external document renderer.
#[tracing::instrument(skip(state, caller))]
pub async fn get_invoice_document(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<InvoiceDocument>, AppError> {
    let document = state
        .service
        .get_invoice_document(caller.scope(), id)
        .await?;
    Ok(Json(document))
}

/// Data supply for the external export formatter.
#[tracing::instrument(skip(state, caller))]
pub async fn export_invoices(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<InvoiceExportRow>>, AppError> {
    let rows = state
        .service
        .export_invoices(caller.scope(), query.into_filter())
        .await?;
    Ok(Json(rows))
}

#[tracing::instrument(skip(state, caller))]
pub async fn delete_invoice(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    require_admin(&caller)?;
    state.service.delete_invoice(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[tracing::instrument(skip(state, caller))]
pub async fn notify_invoice(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<NotificationReport>, AppError> {
    let report = state.service.notify_invoice(caller.scope(), id).await?;
    Ok(Json(report))
}
