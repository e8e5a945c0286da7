//! Tender creation and author edits.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{info, instrument, warn};

use crate::common::logs::{actions, LogEntry};
use crate::common::utils::{slugify, slugify_with_suffix};
use crate::common::{is_unique_violation, Actor, EngineError, EngineResult, TenderId};
use crate::domains::reference::gateway::{is_author_of, resolve_perimeter};
use crate::domains::reference::{Perimeter, PerimeterKind, User};
use crate::domains::tenders::machines::TenderTransition;
use crate::domains::tenders::models::{
    ContactSnapshot, NewTender, Tender, TenderInput, TenderQuestion, TenderSource, TenderStatus,
};
use crate::domains::tenders::utils::{validate_tender_input, SubmissionContext};
use crate::kernel::ServerDeps;

const SLUG_CONSTRAINT: &str = "tenders_slug_key";

/// Persist a new tender for `author`. With `submit`, it is published
/// directly (SUBMITTED) instead of saved as a draft.
#[instrument(skip(input, deps), fields(user_id = %author.user_id))]
pub async fn create_tender(
    author: Actor,
    mut input: TenderInput,
    source: TenderSource,
    submit: bool,
    now: DateTime<Utc>,
    deps: &ServerDeps,
) -> EngineResult<Tender> {
    let pool = &deps.db_pool;

    let user = User::find_by_id(author.user_id, pool)
        .await?
        .ok_or_else(|| EngineError::not_found("User", author.user_id))?;

    let contact = ContactSnapshot {
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone(),
        email: user.email.clone(),
        phone: input.contact_phone.clone().or(user.phone.clone()),
        company_name: user.company_name.clone(),
    };

    let location_kind = resolve_location(&mut input, pool).await?;
    validate_tender_input(
        &input,
        &SubmissionContext {
            source,
            today: now.date_naive(),
            contact_email: &contact.email,
            contact_phone: contact.phone.as_deref(),
            location_kind,
        },
    )?;

    let (status, published_at, logs) = if submit {
        (
            TenderStatus::Submitted,
            Some(now),
            vec![LogEntry::new(actions::SUBMITTED, now)],
        )
    } else {
        (TenderStatus::Draft, None, Vec::new())
    };

    let mut slug = slugify(&input.title);
    if slug.is_empty() {
        slug = "besoin".to_string();
    }

    let mut attempt = 0;
    let tender = loop {
        attempt += 1;
        let new = NewTender {
            id: TenderId::new(),
            slug: &slug,
            author_id: author.user_id,
            contact: &contact,
            input: &input,
            source,
            status,
            published_at,
            logs: logs.clone(),
        };

        match insert_with_questions(new, &input.questions, deps).await {
            Ok(tender) => break tender,
            Err(e) if is_slug_collision(&e) && attempt == 1 => {
                warn!(slug = %slug, "Tender slug taken, retrying with suffix");
                slug = slugify_with_suffix(&input.title);
            }
            Err(e) if is_slug_collision(&e) => {
                return Err(EngineError::Integrity(format!("slug collision on {}", slug)));
            }
            Err(e) => return Err(e.into()),
        }
    };

    info!(tender_id = %tender.id, slug = %tender.slug, status = ?tender.status, "Tender created");
    Ok(tender)
}

async fn insert_with_questions(
    new: NewTender<'_>,
    questions: &[String],
    deps: &ServerDeps,
) -> anyhow::Result<Tender> {
    let mut tx = deps.db_pool.begin().await?;
    let tender = Tender::insert(new, &mut *tx).await?;
    if !questions.is_empty() {
        TenderQuestion::replace_for_tender(tender.id, questions, &mut tx).await?;
    }
    tx.commit().await?;
    Ok(tender)
}

fn is_slug_collision(err: &anyhow::Error) -> bool {
    err.downcast_ref::<sqlx::Error>()
        .is_some_and(|e| is_unique_violation(e, SLUG_CONSTRAINT))
}

/// Author edit of a draft. Clears a pending modification request.
#[instrument(skip(input, deps), fields(user_id = %actor.user_id))]
pub async fn update_tender(
    actor: Actor,
    slug: &str,
    mut input: TenderInput,
    now: DateTime<Utc>,
    deps: &ServerDeps,
) -> EngineResult<Tender> {
    let pool = &deps.db_pool;
    let tender = find_tender(slug, deps).await?;
    ensure_author_or_admin(&actor, &tender, pool).await?;

    if tender.status != TenderStatus::Draft || tender.is_frozen() {
        return Err(EngineError::validation("only draft tenders can be edited"));
    }

    let location_kind = resolve_location(&mut input, pool).await?;
    let phone = input.contact_phone.clone().or(tender.contact_phone.clone());
    validate_tender_input(
        &input,
        &SubmissionContext {
            source: tender.source,
            today: now.date_naive(),
            contact_email: &tender.contact_email,
            contact_phone: phone.as_deref(),
            location_kind,
        },
    )?;

    let mut tx = pool.begin().await?;
    let updated = Tender::update_draft(tender.id, &input, &mut *tx)
        .await?
        .ok_or_else(|| EngineError::conflict("tender changed status during the edit"))?;
    TenderQuestion::replace_for_tender(tender.id, &input.questions, &mut tx).await?;
    tx.commit().await?;

    info!(tender_id = %updated.id, "Draft updated");
    Ok(updated)
}

/// Author publishes a draft.
#[instrument(skip(deps), fields(user_id = %actor.user_id))]
pub async fn submit_tender(
    actor: Actor,
    slug: &str,
    now: DateTime<Utc>,
    deps: &ServerDeps,
) -> EngineResult<Tender> {
    let tender = find_tender(slug, deps).await?;
    ensure_author_or_admin(&actor, &tender, &deps.db_pool).await?;

    if !TenderTransition::Submit.allowed_from(tender.status) {
        return Err(EngineError::validation("only draft tenders can be submitted"));
    }

    let submitted = Tender::mark_submitted(tender.id, now, &deps.db_pool)
        .await?
        .ok_or_else(|| EngineError::conflict("tender already submitted"))?;

    info!(tender_id = %submitted.id, "Tender submitted");
    Ok(submitted)
}

pub(crate) async fn find_tender(slug: &str, deps: &ServerDeps) -> EngineResult<Tender> {
    Tender::find_by_slug(slug, &deps.db_pool)
        .await?
        .ok_or_else(|| EngineError::not_found("Tender", slug))
}

pub(crate) async fn ensure_author_or_admin(actor: &Actor, tender: &Tender, pool: &PgPool) -> EngineResult<()> {
    if actor.is_admin || is_author_of(actor.user_id, tender.id, pool).await? {
        Ok(())
    } else {
        Err(EngineError::forbidden("not the author of this tender"))
    }
}

/// Kind of the radius center. A location named by slug is resolved to its id
/// first; an unknown slug is a validation error.
async fn resolve_location(input: &mut TenderInput, pool: &PgPool) -> EngineResult<Option<PerimeterKind>> {
    if input.location_id.is_none() {
        if let Some(slug) = input.location_slug.as_deref() {
            let perimeter = resolve_perimeter(slug, pool)
                .await?
                .ok_or_else(|| EngineError::validation(format!("unknown location {}", slug)))?;
            input.location_id = Some(perimeter.id);
            return Ok(Some(perimeter.kind));
        }
    }
    match input.location_id {
        Some(id) => Ok(Perimeter::find_by_id(id, pool).await?.map(|p| p.kind)),
        None => Ok(None),
    }
}
