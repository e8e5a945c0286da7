//! Application setup and server configuration.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::kernel::ServerDeps;
use crate::server::middleware::jwt_auth_middleware;
use crate::server::routes::*;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub deps: Arc<ServerDeps>,
}

/// Build the Axum application router
pub fn build_app(deps: Arc<ServerDeps>, allowed_origins: Vec<String>) -> Router {
    let jwt_service = deps.jwt_service.clone();
    let app_state = AppState { deps };

    Router::new()
        .route("/health", get(health_handler))
        // Authors
        .route("/api/tenders", post(create_tender_handler))
        .route(
            "/api/tenders/:slug",
            get(view_tender_handler).patch(update_tender_handler),
        )
        .route("/api/tenders/:slug/submit", post(submit_tender_handler))
        .route("/api/tenders/:slug/stats", get(tender_stats_handler))
        // Suppliers
        .route(
            "/api/tenders/:slug/interested",
            get(interested_suppliers_handler).post(interested_handler),
        )
        .route(
            "/api/tenders/:slug/not-interested",
            get(not_interested_link_handler).post(not_interested_handler),
        )
        .route("/api/tenders/:slug/siae-hide", post(siae_hide_handler))
        // Survey links
        .route("/api/tenders/:slug/author-survey", get(author_survey_handler))
        .route(
            "/api/tenders/:slug/siae/:siae_slug/survey",
            get(supplier_survey_handler),
        )
        // Moderation
        .route("/api/admin/tenders/:slug/validate", post(validate_tender_handler))
        .route(
            "/api/admin/tenders/:slug/request-modification",
            post(request_modification_handler),
        )
        .route("/api/admin/tenders/:slug/reject", post(reject_tender_handler))
        .route("/api/tenders/:slug/notes", get(tender_notes_handler))
        .route("/api/notes", post(create_note_handler))
        // Middleware layers (applied in reverse order - last added runs first)
        .layer(middleware::from_fn(move |req, next| {
            jwt_auth_middleware(jwt_service.clone(), req, next)
        }))
        .layer(Extension(app_state))
        .layer(cors_layer(&allowed_origins))
        .layer(TraceLayer::new_for_http())
}

/// Any origin when none is configured (development).
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let allow_origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PATCH])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
}
