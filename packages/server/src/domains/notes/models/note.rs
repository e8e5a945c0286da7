use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::common::{NoteId, SiaeId, TenderId, UserId};

/// What a note is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum NoteParent {
    Tender(TenderId),
    Siae(SiaeId),
    User(UserId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "note_parent_kind", rename_all = "lowercase")]
enum NoteParentKind {
    Tender,
    Siae,
    User,
}

impl NoteParent {
    fn columns(&self) -> (NoteParentKind, Uuid) {
        match *self {
            NoteParent::Tender(id) => (NoteParentKind::Tender, id.into_uuid()),
            NoteParent::Siae(id) => (NoteParentKind::Siae, id.into_uuid()),
            NoteParent::User(id) => (NoteParentKind::User, id.into_uuid()),
        }
    }

    fn from_columns(kind: NoteParentKind, id: Uuid) -> Self {
        match kind {
            NoteParentKind::Tender => NoteParent::Tender(TenderId::from_uuid(id)),
            NoteParentKind::Siae => NoteParent::Siae(SiaeId::from_uuid(id)),
            NoteParentKind::User => NoteParent::User(UserId::from_uuid(id)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    pub parent: NoteParent,
    pub content: String,
    pub author_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct NoteRow {
    id: NoteId,
    parent_kind: NoteParentKind,
    parent_id: Uuid,
    content: String,
    author_id: Option<UserId>,
    created_at: DateTime<Utc>,
}

impl From<NoteRow> for Note {
    fn from(row: NoteRow) -> Self {
        Self {
            id: row.id,
            parent: NoteParent::from_columns(row.parent_kind, row.parent_id),
            content: row.content,
            author_id: row.author_id,
            created_at: row.created_at,
        }
    }
}

// =============================================================================
// Note Queries
// =============================================================================

impl Note {
    pub async fn create<'e, E: PgExecutor<'e>>(
        parent: NoteParent,
        content: &str,
        author_id: Option<UserId>,
        executor: E,
    ) -> Result<Self> {
        let (kind, parent_id) = parent.columns();
        sqlx::query_as::<_, NoteRow>(
            r#"
            INSERT INTO notes (id, parent_kind, parent_id, content, author_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(NoteId::new())
        .bind(kind)
        .bind(parent_id)
        .bind(content)
        .bind(author_id)
        .fetch_one(executor)
        .await
        .map(Note::from)
        .map_err(Into::into)
    }

    /// Notes of one parent, oldest first.
    pub async fn find_for_parent<'e, E: PgExecutor<'e>>(parent: NoteParent, executor: E) -> Result<Vec<Self>> {
        let (kind, parent_id) = parent.columns();
        let rows = sqlx::query_as::<_, NoteRow>(
            "SELECT * FROM notes WHERE parent_kind = $1 AND parent_id = $2 ORDER BY created_at, id",
        )
        .bind(kind)
        .bind(parent_id)
        .fetch_all(executor)
        .await?;
        Ok(rows.into_iter().map(Note::from).collect())
    }
}
