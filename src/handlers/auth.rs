use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, State},
    response::IntoResponse,
    Json,
};
use tracing::instrument;

use crate::dtos::{LoginRequest, LoginResponse};
use crate::error::AppError;
use crate::middleware::AuthUser;
use crate::models::{actions, AuditEntry, Principal, Role};
use crate::utils::{password::Password, verify_password};
use crate::AppState;

/// POST /auth/login
///
/// Resolves the email against organizations first, then facilities.
/// The same generic error covers unknown email and wrong password so
/// the response never reveals which one failed.
#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (email, password) = match (payload.email, payload.password) {
        (Some(email), Some(password)) if !email.is_empty() && !password.is_empty() => {
            (email, password)
        }
        _ => {
            return Err(AppError::ValidationError(
                "Email and password are required".to_string(),
            ))
        }
    };

    let (principal, password_hash) = if let Some(org) =
        state.db.find_organization_by_email(&email).await?
    {
        (Principal::from_organization(&org), org.password_hash)
    } else if let Some(facility) = state.db.find_facility_by_email(&email).await? {
        (Principal::from_facility(&facility), facility.password_hash)
    } else {
        return Err(AppError::AuthError(anyhow::anyhow!("Invalid credentials")));
    };

    if verify_password(&Password::new(password), &password_hash).is_err() {
        return Err(AppError::AuthError(anyhow::anyhow!("Invalid credentials")));
    }

    let token = state
        .jwt
        .generate_token(principal.id, principal.role, &principal.email)?;

    state
        .audit
        .record(
            AuditEntry::new(
                principal.id,
                principal.role,
                actions::LOGIN,
                principal.role.as_str(),
            )
            .entity(principal.id)
            .origin(addr.ip().to_string()),
        )
        .await;

    tracing::info!(user_id = %principal.id, role = %principal.role, "Login succeeded");

    Ok(Json(LoginResponse {
        token,
        user: principal,
    }))
}

/// GET /auth/profile
///
/// Re-reads the account row so a stale token never serves deleted or
/// renamed identity data.
#[instrument(skip(state, user))]
pub async fn profile(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let principal = match user.role {
        Role::Organization => state
            .db
            .get_organization(user.sub)
            .await?
            .map(|org| Principal::from_organization(&org)),
        Role::Facility => state
            .db
            .get_facility(user.sub)
            .await?
            .map(|facility| Principal::from_facility(&facility)),
    }
    .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("User not found")))?;

    Ok(Json(serde_json::json!({ "user": principal })))
}
