use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use tracing::instrument;
use uuid::Uuid;

use crate::dtos::{CreateFacilityRequest, UpdateFacilityRequest};
use crate::error::AppError;
use crate::middleware::AuthUser;
use crate::models::{
    actions, entities, AuditEntry, BillingPeriod, CreateFacility, Role, UpdateFacility,
};
use crate::utils::{hash_password, password::Password};
use crate::AppState;

/// POST /facilities
#[instrument(skip(state, user, payload))]
pub async fn create_facility(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(payload): Json<CreateFacilityRequest>,
) -> Result<impl IntoResponse, AppError> {
    user.require_role(Role::Organization, "Only organizations can create facilities")?;

    let (name, email, password) = match (payload.name, payload.email, payload.password) {
        (Some(name), Some(email), Some(password))
            if !name.is_empty() && !email.is_empty() && !password.is_empty() =>
        {
            (name, email, password)
        }
        _ => {
            return Err(AppError::ValidationError(
                "Name, email, and password are required".to_string(),
            ))
        }
    };

    let billing_period = match payload.billing_period.as_deref() {
        None => BillingPeriod::Monthly,
        Some(raw) => BillingPeriod::parse(raw).ok_or_else(|| {
            AppError::ValidationError("Invalid billing period".to_string())
        })?,
    };

    // Logins resolve the email across both account tables, so an
    // address held by either kind is taken.
    if state.db.email_in_use(&email).await? {
        return Err(AppError::Conflict(anyhow::anyhow!("Email already exists")));
    }

    let facility = state
        .db
        .create_facility(&CreateFacility {
            organization_id: user.sub,
            name,
            email,
            password_hash: hash_password(&Password::new(password))?,
            contact_person: payload.contact_person,
            phone: payload.phone,
            address: payload.address,
            billing_period: billing_period.as_str().to_string(),
        })
        .await?;

    state
        .audit
        .record(
            AuditEntry::new(user.sub, user.role, actions::CREATE_FACILITY, entities::FACILITY)
                .entity(facility.id)
                .details(json!({ "name": &facility.name, "email": &facility.email })),
        )
        .await;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Facility created successfully",
            "facility": facility,
        })),
    ))
}

/// GET /facilities
#[instrument(skip(state, user))]
pub async fn list_facilities(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<impl IntoResponse, AppError> {
    user.require_role(Role::Organization, "Only organizations can list facilities")?;

    let facilities = state.db.list_facilities(user.sub).await?;
    let total = facilities.len();

    Ok(Json(json!({ "facilities": facilities, "total": total })))
}

/// GET /facilities/:id
///
/// An organization can read any facility it owns; a facility can read
/// only itself. Anything out of scope reads as not found.
#[instrument(skip(state, user), fields(facility_id = %id))]
pub async fn get_facility(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let (org_scope, self_scope) = match user.role {
        Role::Organization => (Some(user.sub), None),
        Role::Facility => (None, Some(user.sub)),
    };

    let facility = state
        .db
        .get_facility_scoped(id, org_scope, self_scope)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Facility not found")))?;

    Ok(Json(json!({ "facility": facility })))
}

/// PUT /facilities/:id
#[instrument(skip(state, user, payload), fields(facility_id = %id))]
pub async fn update_facility(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateFacilityRequest>,
) -> Result<impl IntoResponse, AppError> {
    user.require_role(Role::Organization, "Only organizations can update facilities")?;

    let billing_period = match payload.billing_period.as_deref() {
        None => None,
        Some(raw) => Some(
            BillingPeriod::parse(raw)
                .ok_or_else(|| AppError::ValidationError("Invalid billing period".to_string()))?,
        ),
    };

    let facility = state
        .db
        .update_facility(
            id,
            user.sub,
            &UpdateFacility {
                name: payload.name,
                contact_person: payload.contact_person,
                phone: payload.phone,
                address: payload.address,
                billing_period: billing_period.map(|p| p.as_str().to_string()),
            },
        )
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Facility not found")))?;

    state
        .audit
        .record(
            AuditEntry::new(user.sub, user.role, actions::UPDATE_FACILITY, entities::FACILITY)
                .entity(facility.id),
        )
        .await;

    Ok(Json(json!({
        "message": "Facility updated successfully",
        "facility": facility,
    })))
}

/// DELETE /facilities/:id
///
/// Refused while invoices still reference the facility.
#[instrument(skip(state, user), fields(facility_id = %id))]
pub async fn delete_facility(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    user.require_role(Role::Organization, "Only organizations can delete facilities")?;

    let deleted = state.db.delete_facility(id, user.sub).await?;
    if !deleted {
        return Err(AppError::NotFound(anyhow::anyhow!("Facility not found")));
    }

    state
        .audit
        .record(
            AuditEntry::new(user.sub, user.role, actions::DELETE_FACILITY, entities::FACILITY)
                .entity(id),
        )
        .await;

    Ok(Json(json!({ "message": "Facility deleted successfully" })))
}
