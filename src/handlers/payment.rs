use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::NaiveDate;
use serde_json::json;
use tracing::instrument;
use uuid::Uuid;

use crate::dtos::PaymentProofForm;
use crate::error::AppError;
use crate::middleware::AuthUser;
use crate::models::{actions, entities, AuditEntry, CreatePaymentProof, Role};
use crate::services::{StagedUpload, UploadKind};
use crate::AppState;

async fn read_proof_form(
    state: &AppState,
    mut multipart: Multipart,
) -> Result<(PaymentProofForm, Option<StagedUpload>), AppError> {
    let mut form = PaymentProofForm::default();
    let mut staged = None;

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
            staged = Some(
                state
                    .files
                    .stage(UploadKind::Payment, &file_name, &content_type, &data)?,
            );
            continue;
        }

        let value = field.text().await.map_err(|e| {
            AppError::ValidationError(format!("Invalid multipart payload: {}", e))
        })?;
        match name.as_str() {
            "invoice_id" => {
                form.invoice_id = Some(value.parse().map_err(|_| {
                    AppError::ValidationError("Invalid invoice_id".to_string())
                })?)
            }
            "payment_date" => {
                form.payment_date =
                    Some(NaiveDate::parse_from_str(&value, "%Y-%m-%d").map_err(|_| {
                        AppError::ValidationError("Invalid date for payment_date".to_string())
                    })?)
            }
            "payment_method" => form.payment_method = Some(value),
            "reference_number" => form.reference_number = Some(value),
            "notes" => form.notes = Some(value),
            _ => {}
        }
    }

    Ok((form, staged))
}

/// POST /payments
///
/// Facility-only multipart upload. The staged file is dropped (and
/// removed from disk) on every rejection path, including an invoice
/// the facility was never billed for.
#[instrument(skip(state, user, multipart))]
pub async fn upload_payment_proof(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    user.require_role(Role::Facility, "Only facilities can upload payment proofs")?;

    let (form, staged) = read_proof_form(&state, multipart).await?;

    let staged = staged.ok_or_else(|| {
        AppError::ValidationError("Payment proof file is required".to_string())
    })?;
    let invoice_id = form.invoice_id.ok_or_else(|| {
        AppError::ValidationError("Missing required fields: invoice_id".to_string())
    })?;
    let payment_date = form.payment_date.ok_or_else(|| {
        AppError::ValidationError("Missing required fields: payment_date".to_string())
    })?;

    // Scoped lookup: a foreign invoice reads as not found, never as
    // forbidden, so existence does not leak across tenants.
    if !state
        .db
        .invoice_owned_by_facility(invoice_id, user.sub)
        .await?
    {
        return Err(AppError::NotFound(anyhow::anyhow!("Invoice not found")));
    }

    let file_path = staged.path().to_string_lossy().into_owned();
    let proof = state
        .db
        .create_payment_proof(&CreatePaymentProof {
            invoice_id,
            facility_id: user.sub,
            file_path,
            payment_date,
            payment_method: form.payment_method,
            reference_number: form.reference_number,
            notes: form.notes,
        })
        .await?;
    staged.persist();

    state
        .audit
        .record(
            AuditEntry::new(
                user.sub,
                user.role,
                actions::UPLOAD_PAYMENT_PROOF,
                entities::PAYMENT_PROOF,
            )
            .entity(proof.id)
            .details(json!({ "invoice_id": proof.invoice_id })),
        )
        .await;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Payment proof uploaded successfully",
            "payment_proof": proof,
        })),
    ))
}

/// GET /payments/invoice/:invoice_id
#[instrument(skip(state, user), fields(invoice_id = %invoice_id))]
pub async fn list_invoice_proofs(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(invoice_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let proofs = match user.role {
        Role::Organization => {
            state
                .db
                .list_invoice_proofs_for_org(invoice_id, user.sub)
                .await?
        }
        Role::Facility => {
            state
                .db
                .list_invoice_proofs_for_facility(invoice_id, user.sub)
                .await?
        }
    };
    let total = proofs.len();

    Ok(Json(json!({ "payment_proofs": proofs, "total": total })))
}

/// GET /payments/all
///
/// Every proof across the organization's invoices.
#[instrument(skip(state, user))]
pub async fn list_all_proofs(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<impl IntoResponse, AppError> {
    user.require_role(Role::Organization, "Only organizations can list all payment proofs")?;

    let proofs = state.db.list_all_proofs(user.sub).await?;
    let total = proofs.len();

    Ok(Json(json!({ "payment_proofs": proofs, "total": total })))
}

/// DELETE /payments/:id
///
/// An organization can remove a proof on any invoice it issued; a
/// facility can remove only its own uploads. The stored file is
/// removed best-effort after the row is gone.
#[instrument(skip(state, user), fields(proof_id = %id))]
pub async fn delete_payment_proof(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let file_path = match user.role {
        Role::Organization => state.db.delete_proof_for_org(id, user.sub).await?,
        Role::Facility => state.db.delete_proof_for_facility(id, user.sub).await?,
    }
    .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Payment proof not found")))?;

    state.files.remove_quiet(&file_path);

    state
        .audit
        .record(
            AuditEntry::new(
                user.sub,
                user.role,
                actions::DELETE_PAYMENT_PROOF,
                entities::PAYMENT_PROOF,
            )
            .entity(id),
        )
        .await;

    Ok(Json(json!({ "message": "Payment proof deleted successfully" })))
}
