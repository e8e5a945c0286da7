//! Moderator actions on submitted tenders (admin session required).

use axum::{
    extract::{Extension, Path},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::actor_of;
use crate::common::require_actor;
use crate::domains::dispatch::DispatchStatus;
use crate::domains::tenders::activities;
use crate::domains::tenders::models::Tender;
use crate::server::app::AppState;
use crate::server::error::ApiResult;
use crate::server::middleware::AuthUser;

#[derive(Debug, Default, Deserialize)]
pub struct ValidateRequest {
    #[serde(default)]
    pub send_to_commercial_partners_only: bool,
}

#[derive(Debug, Deserialize)]
pub struct ModificationRequest {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ValidateResponse {
    pub tender: Tender,
    pub dispatched: bool,
    pub suppliers_emailed: usize,
    pub partners_notified: usize,
}

pub async fn validate_tender_handler(
    Extension(state): Extension<AppState>,
    auth: Option<Extension<AuthUser>>,
    Path(slug): Path<String>,
    body: Option<Json<ValidateRequest>>,
) -> ApiResult<Json<ValidateResponse>> {
    let actor = require_actor(actor_of(auth))?;
    let partners_only = body.is_some_and(|Json(b)| b.send_to_commercial_partners_only);

    let (tender, outcome) =
        activities::validate_tender(actor, &slug, partners_only, Utc::now(), &state.deps).await?;
    Ok(Json(ValidateResponse {
        tender,
        dispatched: matches!(outcome.status, DispatchStatus::Dispatched(_)),
        suppliers_emailed: outcome.stamped_edges,
        partners_notified: outcome.partners,
    }))
}

pub async fn request_modification_handler(
    Extension(state): Extension<AppState>,
    auth: Option<Extension<AuthUser>>,
    Path(slug): Path<String>,
    Json(body): Json<ModificationRequest>,
) -> ApiResult<Json<Tender>> {
    let actor = require_actor(actor_of(auth))?;
    let tender = activities::request_modification(actor, &slug, &body.message, Utc::now(), &state.deps).await?;
    Ok(Json(tender))
}

pub async fn reject_tender_handler(
    Extension(state): Extension<AppState>,
    auth: Option<Extension<AuthUser>>,
    Path(slug): Path<String>,
) -> ApiResult<Json<Tender>> {
    let actor = require_actor(actor_of(auth))?;
    let tender = activities::reject_tender(actor, &slug, Utc::now(), &state.deps).await?;
    Ok(Json(tender))
}
