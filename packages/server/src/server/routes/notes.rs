use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use super::actor_of;
use crate::common::{require_actor, EngineError};
use crate::domains::notes::{self, Note, NoteParent};
use crate::domains::tenders::models::Tender;
use crate::server::app::AppState;
use crate::server::error::ApiResult;
use crate::server::middleware::AuthUser;

#[derive(Debug, Deserialize)]
pub struct CreateNoteRequest {
    pub parent: NoteParent,
    pub content: String,
}

pub async fn tender_notes_handler(
    Extension(state): Extension<AppState>,
    auth: Option<Extension<AuthUser>>,
    Path(slug): Path<String>,
) -> ApiResult<Json<Vec<Note>>> {
    let actor = require_actor(actor_of(auth))?;
    actor.require_admin()?;
    let tender = Tender::find_by_slug(&slug, &state.deps.db_pool)
        .await
        .map_err(EngineError::from)?
        .ok_or_else(|| EngineError::not_found("Tender", &slug))?;

    let notes = notes::list_notes(actor, NoteParent::Tender(tender.id), &state.deps).await?;
    Ok(Json(notes))
}

pub async fn create_note_handler(
    Extension(state): Extension<AppState>,
    auth: Option<Extension<AuthUser>>,
    Json(body): Json<CreateNoteRequest>,
) -> ApiResult<(StatusCode, Json<Note>)> {
    let actor = require_actor(actor_of(auth))?;
    let note = notes::add_note(actor, body.parent, &body.content, &state.deps).await?;
    Ok((StatusCode::CREATED, Json(note)))
}
