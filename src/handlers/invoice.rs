use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::json;
use tracing::instrument;
use uuid::Uuid;

use crate::dtos::{InvoiceListQuery, UpdateStatusRequest};
use crate::error::AppError;
use crate::middleware::AuthUser;
use crate::models::{
    actions, entities, AuditEntry, BillingPeriod, CreateInvoice, InvoiceStats, InvoiceStatus,
    Role,
};
use crate::services::{render_invoice_pdf, InvoiceDocument, UploadKind};
use crate::AppState;

/// Raw multipart fields for invoice creation.
#[derive(Default)]
struct InvoiceForm {
    facility_id: Option<String>,
    invoice_number: Option<String>,
    amount: Option<String>,
    due_date: Option<String>,
    billing_period: Option<String>,
    period_start: Option<String>,
    period_end: Option<String>,
    notes: Option<String>,
    file: Option<(String, String, Vec<u8>)>,
}

async fn read_invoice_form(mut multipart: Multipart) -> Result<InvoiceForm, AppError> {
    let mut form = InvoiceForm::default();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        AppError::ValidationError(format!("Invalid multipart payload: {}", e))
    })? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "file" {
            let file_name = field.file_name().unwrap_or("upload").to_string();
            let content_type = field.content_type().unwrap_or_default().to_string();
            let data = field.bytes().await.map_err(|e| {
                AppError::ValidationError(format!("Failed to read uploaded file: {}", e))
            })?;
            form.file = Some((file_name, content_type, data.to_vec()));
            continue;
        }

        let value = field.text().await.map_err(|e| {
            AppError::ValidationError(format!("Invalid multipart payload: {}", e))
        })?;
        match name.as_str() {
            "facility_id" => form.facility_id = Some(value),
            "invoice_number" => form.invoice_number = Some(value),
            "amount" => form.amount = Some(value),
            "due_date" => form.due_date = Some(value),
            "billing_period" => form.billing_period = Some(value),
            "period_start" => form.period_start = Some(value),
            "period_end" => form.period_end = Some(value),
            "notes" => form.notes = Some(value),
            _ => {}
        }
    }

    Ok(form)
}

fn parse_date(value: &str, field: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| AppError::ValidationError(format!("Invalid date for {}", field)))
}

/// POST /invoices
///
/// Multipart create: form fields plus an optional source document. A
/// printable PDF is generated for every invoice regardless of whether
/// a source file was attached.
#[instrument(skip(state, user, multipart))]
pub async fn create_invoice(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    user.require_role(Role::Organization, "Only organizations can create invoices")?;

    let form = read_invoice_form(multipart).await?;

    let mut missing = Vec::new();
    for (value, name) in [
        (&form.facility_id, "facility_id"),
        (&form.invoice_number, "invoice_number"),
        (&form.amount, "amount"),
        (&form.due_date, "due_date"),
        (&form.billing_period, "billing_period"),
        (&form.period_start, "period_start"),
        (&form.period_end, "period_end"),
    ] {
        match value {
            Some(v) if !v.is_empty() => {}
            _ => missing.push(name),
        }
    }
    if !missing.is_empty() {
        return Err(AppError::ValidationError(format!(
            "Missing required fields: {}",
            missing.join(", ")
        )));
    }

    // Presence was just checked above.
    let facility_id_raw = form.facility_id.unwrap_or_default();
    let invoice_number = form.invoice_number.unwrap_or_default();
    let amount_raw = form.amount.unwrap_or_default();
    let due_date_raw = form.due_date.unwrap_or_default();
    let billing_period_raw = form.billing_period.unwrap_or_default();
    let period_start_raw = form.period_start.unwrap_or_default();
    let period_end_raw = form.period_end.unwrap_or_default();

    let facility_id: Uuid = facility_id_raw
        .parse()
        .map_err(|_| AppError::ValidationError("Invalid facility_id".to_string()))?;
    let amount: Decimal = amount_raw
        .parse()
        .map_err(|_| AppError::ValidationError("Amount must be a valid number".to_string()))?;
    if amount.is_sign_negative() {
        return Err(AppError::ValidationError(
            "Amount must not be negative".to_string(),
        ));
    }
    let due_date = parse_date(&due_date_raw, "due_date")?;
    let period_start = parse_date(&period_start_raw, "period_start")?;
    let period_end = parse_date(&period_end_raw, "period_end")?;
    let billing_period = BillingPeriod::parse(&billing_period_raw)
        .ok_or_else(|| AppError::ValidationError("Invalid billing period".to_string()))?;

    if state.db.invoice_number_exists(&invoice_number).await? {
        return Err(AppError::Conflict(anyhow::anyhow!(
            "Invoice number already exists"
        )));
    }

    let facility = state
        .db
        .get_owned_facility(facility_id, user.sub)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Facility not found")))?;

    // Staged on disk but only persisted once the row exists: the drop
    // guard removes the file on any error path below.
    let staged = match &form.file {
        Some((file_name, content_type, data)) => Some(state.files.stage(
            UploadKind::Invoice,
            file_name,
            content_type,
            data,
        )?),
        None => None,
    };

    let pdf_bytes = render_invoice_pdf(&InvoiceDocument {
        invoice_number: invoice_number.clone(),
        facility_name: facility.name.clone(),
        facility_address: facility.address.clone(),
        amount,
        due_date,
        billing_period: billing_period.as_str().to_string(),
        period_start,
        period_end,
        notes: form.notes.clone(),
        created_at: Utc::now(),
    })?;
    let generated_pdf_path = state.files.write_generated_pdf(&invoice_number, &pdf_bytes)?;

    let invoice = state
        .db
        .create_invoice(&CreateInvoice {
            organization_id: user.sub,
            facility_id,
            invoice_number,
            amount,
            due_date,
            billing_period,
            period_start,
            period_end,
            file_path: staged
                .as_ref()
                .map(|s| s.path().to_string_lossy().into_owned()),
            generated_pdf_path: Some(generated_pdf_path),
            notes: form.notes,
        })
        .await?;

    if let Some(staged) = staged {
        staged.persist();
    }

    state
        .audit
        .record(
            AuditEntry::new(user.sub, user.role, actions::CREATE_INVOICE, entities::INVOICE)
                .entity(invoice.id)
                .details(json!({
                    "invoice_number": &invoice.invoice_number,
                    "amount": invoice.amount,
                    "facility_id": invoice.facility_id,
                })),
        )
        .await;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Invoice created successfully",
            "invoice": invoice,
        })),
    ))
}

/// GET /invoices
///
/// Organizations see the invoices they issued; facilities see the
/// invoices issued to them. Optional status and facility filters.
#[instrument(skip(state, user))]
pub async fn list_invoices(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(query): Query<InvoiceListQuery>,
) -> Result<impl IntoResponse, AppError> {
    if let Some(status) = query.status.as_deref() {
        InvoiceStatus::parse(status)
            .ok_or_else(|| AppError::ValidationError("Invalid status value".to_string()))?;
    }

    let invoices = match user.role {
        Role::Organization => {
            state
                .db
                .list_invoices_for_org(user.sub, query.status.as_deref(), query.facility_id)
                .await?
        }
        Role::Facility => {
            state
                .db
                .list_invoices_for_facility(user.sub, query.status.as_deref())
                .await?
        }
    };
    let total = invoices.len();

    Ok(Json(json!({ "invoices": invoices, "total": total })))
}

/// GET /invoices/stats
#[instrument(skip(state, user))]
pub async fn invoice_stats(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<impl IntoResponse, AppError> {
    user.require_role(Role::Organization, "Only organizations can view invoice stats")?;

    let overall = state.db.invoice_totals(user.sub).await?;
    let by_facility = state.db.facility_invoice_stats(user.sub).await?;

    Ok(Json(InvoiceStats {
        overall,
        by_facility,
    }))
}

/// GET /invoices/:id
///
/// Returns the invoice with its payment proofs, newest proof first.
#[instrument(skip(state, user), fields(invoice_id = %id))]
pub async fn get_invoice(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let invoice = match user.role {
        Role::Organization => state.db.get_invoice_for_org(id, user.sub).await?,
        Role::Facility => state.db.get_invoice_for_facility(id, user.sub).await?,
    }
    .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

    let payment_proofs = state.db.list_proofs_for_invoice(invoice.id).await?;

    Ok(Json(json!({
        "invoice": invoice,
        "payment_proofs": payment_proofs,
    })))
}

/// PUT /invoices/:id/status
#[instrument(skip(state, user, payload), fields(invoice_id = %id))]
pub async fn update_invoice_status(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<impl IntoResponse, AppError> {
    user.require_role(Role::Organization, "Only organizations can update invoice status")?;

    let status = payload
        .status
        .as_deref()
        .and_then(InvoiceStatus::parse)
        .ok_or_else(|| AppError::ValidationError("Invalid status value".to_string()))?;

    let invoice = state
        .db
        .update_invoice_status(id, user.sub, status.as_str())
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

    state
        .audit
        .record(
            AuditEntry::new(
                user.sub,
                user.role,
                actions::UPDATE_INVOICE_STATUS,
                entities::INVOICE,
            )
            .entity(invoice.id)
            .details(json!({ "status": &invoice.status })),
        )
        .await;

    Ok(Json(json!({
        "message": "Invoice status updated successfully",
        "invoice": invoice,
    })))
}

/// DELETE /invoices/:id
///
/// Removes the uploaded source document from disk; attached payment
/// proof rows cascade in the database.
#[instrument(skip(state, user), fields(invoice_id = %id))]
pub async fn delete_invoice(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    user.require_role(Role::Organization, "Only organizations can delete invoices")?;

    let invoice = state
        .db
        .get_invoice_for_org(id, user.sub)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

    let deleted = state.db.delete_invoice(id, user.sub).await?;
    if !deleted {
        return Err(AppError::NotFound(anyhow::anyhow!("Invoice not found")));
    }

    if let Some(file_path) = &invoice.file_path {
        state.files.remove_quiet(file_path);
    }

    state
        .audit
        .record(
            AuditEntry::new(user.sub, user.role, actions::DELETE_INVOICE, entities::INVOICE)
                .entity(id)
                .details(json!({ "invoice_number": invoice.invoice_number })),
        )
        .await;

    Ok(Json(json!({ "message": "Invoice deleted successfully" })))
}
