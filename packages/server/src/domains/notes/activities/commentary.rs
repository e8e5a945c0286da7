//! Moderator commentary on tenders, suppliers and users.

use tracing::{info, instrument};

use crate::common::{Actor, EngineError, EngineResult};
use crate::domains::notes::models::{Note, NoteParent};
use crate::domains::reference::{Siae, User};
use crate::domains::tenders::models::Tender;
use crate::kernel::ServerDeps;

#[instrument(skip(content, deps), fields(author = %actor.user_id))]
pub async fn add_note(actor: Actor, parent: NoteParent, content: &str, deps: &ServerDeps) -> EngineResult<Note> {
    actor.require_admin()?;
    let content = content.trim();
    if content.is_empty() {
        return Err(EngineError::validation("note content is empty"));
    }
    ensure_parent_exists(parent, deps).await?;

    let note = Note::create(parent, content, Some(actor.user_id), &deps.db_pool).await?;
    info!(note_id = %note.id, parent = ?parent, "Note added");
    Ok(note)
}

pub async fn list_notes(actor: Actor, parent: NoteParent, deps: &ServerDeps) -> EngineResult<Vec<Note>> {
    actor.require_admin()?;
    Ok(Note::find_for_parent(parent, &deps.db_pool).await?)
}

async fn ensure_parent_exists(parent: NoteParent, deps: &ServerDeps) -> EngineResult<()> {
    let pool = &deps.db_pool;
    let found = match parent {
        NoteParent::Tender(id) => Tender::find_by_id(id, pool).await?.is_some(),
        NoteParent::Siae(id) => Siae::find_by_id(id, pool).await?.is_some(),
        NoteParent::User(id) => User::find_by_id(id, pool).await?.is_some(),
    };
    if found {
        Ok(())
    } else {
        Err(EngineError::not_found("NoteParent", format!("{:?}", parent)))
    }
}
