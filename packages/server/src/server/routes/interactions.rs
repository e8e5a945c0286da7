//! Supplier decisions, reachable from email deep links or with a session.

use axum::{
    extract::{Extension, Path, Query},
    Json,
};
use chrono::Utc;
use serde::Deserialize;

use super::actor_of;
use crate::common::{require_actor, SiaeId, TenderSiaeId};
use crate::domains::tenders::activities::{self, DecisionOutcome, DecisionRequest};
use crate::server::app::AppState;
use crate::server::error::ApiResult;
use crate::server::middleware::AuthUser;

#[derive(Debug, Default, Deserialize)]
pub struct EdgeQuery {
    pub tender_siae_uuid: Option<TenderSiaeId>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HideRequest {
    #[serde(default)]
    pub siae_id: Option<SiaeId>,
}

#[derive(Debug, serde::Serialize)]
pub struct HideResponse {
    pub hidden: u64,
}

fn with_edge(mut request: DecisionRequest, query: EdgeQuery) -> DecisionRequest {
    if query.tender_siae_uuid.is_some() {
        request.tender_siae_uuid = query.tender_siae_uuid;
    }
    request
}

pub async fn interested_handler(
    Extension(state): Extension<AppState>,
    auth: Option<Extension<AuthUser>>,
    Path(slug): Path<String>,
    Query(query): Query<EdgeQuery>,
    body: Option<Json<DecisionRequest>>,
) -> ApiResult<Json<DecisionOutcome>> {
    let request = with_edge(body.map(|Json(b)| b).unwrap_or_default(), query);
    let outcome = activities::declare_interest(&slug, request, actor_of(auth), Utc::now(), &state.deps).await?;
    Ok(Json(outcome))
}

pub async fn not_interested_handler(
    Extension(state): Extension<AppState>,
    auth: Option<Extension<AuthUser>>,
    Path(slug): Path<String>,
    Query(query): Query<EdgeQuery>,
    body: Option<Json<DecisionRequest>>,
) -> ApiResult<Json<DecisionOutcome>> {
    let request = with_edge(body.map(|Json(b)| b).unwrap_or_default(), query);
    let outcome =
        activities::declare_not_interested(&slug, request, actor_of(auth), Utc::now(), &state.deps).await?;
    Ok(Json(outcome))
}

/// The "not interested" link carried by supplier emails.
pub async fn not_interested_link_handler(
    Extension(state): Extension<AppState>,
    auth: Option<Extension<AuthUser>>,
    Path(slug): Path<String>,
    Query(query): Query<EdgeQuery>,
) -> ApiResult<Json<DecisionOutcome>> {
    let request = with_edge(DecisionRequest::default(), query);
    let outcome =
        activities::declare_not_interested(&slug, request, actor_of(auth), Utc::now(), &state.deps).await?;
    Ok(Json(outcome))
}

pub async fn siae_hide_handler(
    Extension(state): Extension<AppState>,
    auth: Option<Extension<AuthUser>>,
    Path(slug): Path<String>,
    body: Option<Json<HideRequest>>,
) -> ApiResult<Json<HideResponse>> {
    let actor = require_actor(actor_of(auth))?;
    let siae_id = body.and_then(|Json(b)| b.siae_id);
    let hidden = activities::hide_for_siae(&slug, siae_id, actor, &state.deps).await?;
    Ok(Json(HideResponse { hidden }))
}
