pub mod config;
pub mod dtos;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::config::PortalConfig;
use crate::error::AppError;
use crate::services::{AuditTrail, Database, FileStore, JwtService};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: PortalConfig,
    pub db: Database,
    pub jwt: JwtService,
    pub audit: AuditTrail,
    pub files: FileStore,
}

/// Build the application router: the whole API surface sits behind the
/// bearer-token middleware except login, health, metrics and the
/// static uploads directory.
pub fn build_router(state: AppState) -> Result<Router, AppError> {
    let protected = Router::new()
        .route("/auth/profile", get(handlers::auth::profile))
        .route("/facilities", post(handlers::facility::create_facility))
        .route("/facilities", get(handlers::facility::list_facilities))
        .route("/facilities/:id", get(handlers::facility::get_facility))
        .route("/facilities/:id", put(handlers::facility::update_facility))
        .route(
            "/facilities/:id",
            delete(handlers::facility::delete_facility),
        )
        .route("/invoices", post(handlers::invoice::create_invoice))
        .route("/invoices", get(handlers::invoice::list_invoices))
        .route("/invoices/stats", get(handlers::invoice::invoice_stats))
        .route("/invoices/:id", get(handlers::invoice::get_invoice))
        .route("/invoices/:id", delete(handlers::invoice::delete_invoice))
        .route(
            "/invoices/:id/status",
            put(handlers::invoice::update_invoice_status),
        )
        .route("/payments", post(handlers::payment::upload_payment_proof))
        .route(
            "/payments/invoice/:invoice_id",
            get(handlers::payment::list_invoice_proofs),
        )
        .route("/payments/all", get(handlers::payment::list_all_proofs))
        .route(
            "/payments/:id",
            delete(handlers::payment::delete_payment_proof),
        )
        .layer(from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    let allowed_origins = state
        .config
        .security
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!(origin = %origin, error = %e, "Invalid CORS origin, skipping");
                None
            }
        })
        .collect::<Vec<_>>();

    let app = Router::new()
        .route("/auth/login", post(handlers::auth::login))
        .route("/health", get(handlers::system::health))
        .route("/metrics", get(handlers::system::metrics))
        .nest_service("/uploads", ServeDir::new(state.files.root()))
        .merge(protected)
        .with_state(state.clone())
        // Multipart bodies carry the file plus form fields; allow the
        // configured ceiling with headroom for the rest of the form.
        .layer(DefaultBodyLimit::max(
            state.config.uploads.max_file_size + 1024 * 1024,
        ))
        .layer(from_fn(middleware::metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(allowed_origins)
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PUT,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]),
        );

    Ok(app)
}
