//! Author-facing tender endpoints and the public tender page.

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Deserialize;

use super::actor_of;
use crate::common::{require_actor, TenderSiaeId, UserId};
use crate::domains::tenders::activities::{self, InterestedSupplier, TenderView};
use crate::domains::tenders::models::{Tender, TenderInput, TenderSource, TenderStats};
use crate::server::app::AppState;
use crate::server::error::ApiResult;
use crate::server::middleware::AuthUser;

#[derive(Debug, Deserialize)]
pub struct CreateTenderRequest {
    #[serde(flatten)]
    pub input: TenderInput,
    #[serde(default)]
    pub source: TenderSource,
}

#[derive(Debug, Default, Deserialize)]
pub struct SubmitQuery {
    #[serde(default)]
    pub submit: bool,
}

/// Deep-link parameters of the public tender page.
#[derive(Debug, Default, Deserialize)]
pub struct ViewQuery {
    pub tender_siae_uuid: Option<TenderSiaeId>,
    pub user_id: Option<UserId>,
}

pub async fn create_tender_handler(
    Extension(state): Extension<AppState>,
    auth: Option<Extension<AuthUser>>,
    Query(query): Query<SubmitQuery>,
    Json(body): Json<CreateTenderRequest>,
) -> ApiResult<(StatusCode, Json<Tender>)> {
    let actor = require_actor(actor_of(auth))?;
    let tender =
        activities::create_tender(actor, body.input, body.source, query.submit, Utc::now(), &state.deps).await?;
    Ok((StatusCode::CREATED, Json(tender)))
}

pub async fn update_tender_handler(
    Extension(state): Extension<AppState>,
    auth: Option<Extension<AuthUser>>,
    Path(slug): Path<String>,
    Json(input): Json<TenderInput>,
) -> ApiResult<Json<Tender>> {
    let actor = require_actor(actor_of(auth))?;
    let tender = activities::update_tender(actor, &slug, input, Utc::now(), &state.deps).await?;
    Ok(Json(tender))
}

pub async fn submit_tender_handler(
    Extension(state): Extension<AppState>,
    auth: Option<Extension<AuthUser>>,
    Path(slug): Path<String>,
) -> ApiResult<Json<Tender>> {
    let actor = require_actor(actor_of(auth))?;
    let tender = activities::submit_tender(actor, &slug, Utc::now(), &state.deps).await?;
    Ok(Json(tender))
}

pub async fn view_tender_handler(
    Extension(state): Extension<AppState>,
    auth: Option<Extension<AuthUser>>,
    Path(slug): Path<String>,
    Query(query): Query<ViewQuery>,
) -> ApiResult<Json<TenderView>> {
    let view = activities::view_tender(
        &slug,
        query.tender_siae_uuid,
        query.user_id,
        actor_of(auth),
        Utc::now(),
        &state.deps,
    )
    .await?;
    Ok(Json(view))
}

pub async fn tender_stats_handler(
    Extension(state): Extension<AppState>,
    auth: Option<Extension<AuthUser>>,
    Path(slug): Path<String>,
) -> ApiResult<Json<TenderStats>> {
    let actor = require_actor(actor_of(auth))?;
    Ok(Json(activities::tender_stats(actor, &slug, &state.deps).await?))
}

pub async fn interested_suppliers_handler(
    Extension(state): Extension<AppState>,
    auth: Option<Extension<AuthUser>>,
    Path(slug): Path<String>,
) -> ApiResult<Json<Vec<InterestedSupplier>>> {
    let actor = require_actor(actor_of(auth))?;
    let suppliers = activities::interested_suppliers(actor, &slug, Utc::now(), &state.deps).await?;
    Ok(Json(suppliers))
}
