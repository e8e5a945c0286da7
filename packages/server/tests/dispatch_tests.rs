//! Matching and dispatch against a real database.

mod common;

use chrono::Duration;
use test_context::test_context;

use crate::common::*;
use tender_core::domains::dispatch::{dispatch_tender, run_dispatch_pass, DispatchMode, DispatchStatus};
use tender_core::domains::reference::{PartnerShareTender, PassSnapshot};
use tender_core::common::EngineError;
use tender_core::domains::tenders::activities::validate_tender;
use tender_core::domains::tenders::models::{Tender, TenderSiae, TenderSiaeSource, TenderStatus};
use tender_core::kernel::EmailKind;

#[test_context(TestHarness)]
#[tokio::test]
async fn national_tender_reaches_country_scoped_suppliers_only(ctx: &TestHarness) {
    let pool = &ctx.db_pool;
    let geo = seed_geo(pool).await.unwrap();
    let sector = create_sector(pool, "nettoyage").await.unwrap();
    let national = create_supplier(pool, "Nationale", None, ActivitySpec::country(&[sector.id]))
        .await
        .unwrap();
    let parisian = create_supplier(pool, "Parisienne", Some(PARIS), ActivitySpec::zones(&[sector.id], &[&geo.paris]))
        .await
        .unwrap();

    let author = create_buyer(pool, "acheteur@ville.test").await.unwrap();
    let admin = create_admin(pool).await.unwrap();
    let mut input = tender_input("Nettoyage national", &[sector.id]);
    input.is_country_area = true;

    let now = at(2024, 3, 4, 10);
    let tender = publish(ctx.deps(), author, admin, input, now).await.unwrap();

    assert_eq!(tender.status, TenderStatus::Sent);
    assert_eq!(tender.first_sent_at, Some(now));

    let edges = TenderSiae::find_for_tender(tender.id, pool).await.unwrap();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].siae_id, national.id);
    assert_eq!(edges[0].source, TenderSiaeSource::Matching);
    assert_eq!(edges[0].email_send_date, Some(now));

    assert!(ctx.email.was_sent_to(EmailKind::SupplierPresentation, &supplier_email("Nationale")));
    assert!(!ctx.email.was_sent_to(EmailKind::SupplierPresentation, &supplier_email("Parisienne")));
    assert!(TenderSiae::find(tender.id, parisian.id, pool).await.unwrap().is_none());
    assert!(ctx.email.was_sent_to(EmailKind::AuthorConfirmation, "acheteur@ville.test"));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn radius_targeting_takes_precedence_over_perimeters(ctx: &TestHarness) {
    let pool = &ctx.db_pool;
    let geo = seed_geo(pool).await.unwrap();
    let sector = create_sector(pool, "espaces-verts").await.unwrap();
    let nearby = create_supplier(pool, "Voironnaise", Some(VOIRON), ActivitySpec::custom(&[sector.id], 50))
        .await
        .unwrap();
    create_supplier(pool, "Francilienne", Some(PARIS), ActivitySpec::zones(&[sector.id], &[&geo.idf]))
        .await
        .unwrap();

    let author = create_buyer(pool, "acheteur@grenoble.test").await.unwrap();
    let admin = create_admin(pool).await.unwrap();
    let mut input = tender_input("Entretien des parcs", &[sector.id]);
    input.perimeter_ids = vec![geo.paris.id];
    input.location_id = Some(geo.grenoble.id);
    input.distance_location = Some(30);

    let tender = publish(ctx.deps(), author, admin, input, at(2024, 3, 4, 10)).await.unwrap();

    let edges = TenderSiae::find_for_tender(tender.id, pool).await.unwrap();
    let matched: Vec<_> = edges.iter().map(|e| e.siae_id).collect();
    assert_eq!(matched, vec![nearby.id]);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn radius_center_can_be_named_by_slug(ctx: &TestHarness) {
    let pool = &ctx.db_pool;
    let geo = seed_geo(pool).await.unwrap();
    let sector = create_sector(pool, "elagage").await.unwrap();
    let nearby = create_supplier(pool, "Elagueurs du Voironnais", Some(VOIRON), ActivitySpec::custom(&[sector.id], 50))
        .await
        .unwrap();

    let author = create_buyer(pool, "arbres@grenoble.test").await.unwrap();
    let admin = create_admin(pool).await.unwrap();
    let mut input = tender_input("Elagage des platanes", &[sector.id]);
    input.location_slug = Some(geo.grenoble.slug.clone());
    input.distance_location = Some(30);

    let tender = publish(ctx.deps(), author, admin, input.clone(), at(2024, 3, 4, 10)).await.unwrap();
    assert_eq!(tender.location_id, Some(geo.grenoble.id));
    let edges = TenderSiae::find_for_tender(tender.id, pool).await.unwrap();
    assert_eq!(edges.iter().map(|e| e.siae_id).collect::<Vec<_>>(), vec![nearby.id]);

    input.location_slug = Some("atlantide-99".to_string());
    let err = submit(ctx.deps(), author, input, at(2024, 3, 4, 11)).await.unwrap_err();
    assert!(matches!(err.downcast_ref::<EngineError>(), Some(EngineError::Validation(_))));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn top_ups_follow_batch_size_and_interval(ctx: &TestHarness) {
    let pool = &ctx.db_pool;
    let sector = create_sector(pool, "traiteur").await.unwrap();
    for name in ["Alpha", "Bravo", "Charlie"] {
        create_supplier(pool, name, None, ActivitySpec::country(&[sector.id]))
            .await
            .unwrap();
    }

    let author = create_buyer(pool, "acheteur@traiteur.test").await.unwrap();
    let admin = create_admin(pool).await.unwrap();
    let mut input = tender_input("Plateaux repas", &[sector.id]);
    input.is_country_area = true;
    input.limit_send_to_siae_batch = Some(2);

    let now = at(2024, 3, 4, 10);
    let tender = publish(ctx.deps(), author, admin, input, now).await.unwrap();

    let stats = TenderSiae::stats(tender.id, pool).await.unwrap();
    assert_eq!(stats.targeted, 3);
    assert_eq!(stats.emailed, 2);
    assert_eq!(ctx.email.count_of_kind(EmailKind::SupplierPresentation), 2);

    // Same tick and inside the interval: nothing more goes out.
    run_dispatch_pass(now, ctx.deps()).await.unwrap();
    run_dispatch_pass(now + Duration::hours(3), ctx.deps()).await.unwrap();
    assert_eq!(TenderSiae::stats(tender.id, pool).await.unwrap().emailed, 2);
    assert_eq!(ctx.email.count_of_kind(EmailKind::SupplierPresentation), 2);

    let top_up = now + Duration::hours(25);
    let summary = run_dispatch_pass(top_up, ctx.deps()).await.unwrap();
    assert_eq!(summary.processed, 1);
    assert_eq!(TenderSiae::stats(tender.id, pool).await.unwrap().emailed, 3);
    assert_eq!(ctx.email.count_of_kind(EmailKind::SupplierPresentation), 3);

    // Author confirmation is only sent by the initial pass.
    assert_eq!(ctx.email.count_of_kind(EmailKind::AuthorConfirmation), 1);

    let reloaded = Tender::find_by_id(tender.id, pool)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reloaded.first_sent_at, Some(now));
    assert_eq!(reloaded.last_sent_at, Some(top_up));

    // Every supplier has been emailed once; later passes send nothing new.
    run_dispatch_pass(top_up + Duration::hours(25), ctx.deps()).await.unwrap();
    assert_eq!(ctx.email.count_of_kind(EmailKind::SupplierPresentation), 3);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn interest_cap_stops_top_ups(ctx: &TestHarness) {
    let pool = &ctx.db_pool;
    let sector = create_sector(pool, "informatique").await.unwrap();
    for name in ["Un", "Deux", "Trois"] {
        create_supplier(pool, name, None, ActivitySpec::country(&[sector.id]))
            .await
            .unwrap();
    }

    let author = create_buyer(pool, "dsi@ville.test").await.unwrap();
    let admin = create_admin(pool).await.unwrap();
    let mut input = tender_input("Maintenance du parc", &[sector.id]);
    input.is_country_area = true;
    input.limit_send_to_siae_batch = Some(1);
    input.limit_nb_siae_interested = Some(1);

    let now = at(2024, 3, 4, 10);
    let tender = publish(ctx.deps(), author, admin, input, now).await.unwrap();

    let emailed = TenderSiae::find_for_tender(tender.id, pool)
        .await
        .unwrap()
        .into_iter()
        .find(|e| e.email_send_date.is_some())
        .unwrap();
    tender_core::domains::tenders::activities::declare_interest(
        &tender.slug,
        tender_core::domains::tenders::activities::DecisionRequest {
            tender_siae_uuid: Some(emailed.id),
            ..Default::default()
        },
        None,
        now + Duration::hours(1),
        ctx.deps(),
    )
    .await
    .unwrap();

    run_dispatch_pass(now + Duration::hours(25), ctx.deps()).await.unwrap();
    assert_eq!(TenderSiae::stats(tender.id, pool).await.unwrap().emailed, 1);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn partners_only_dispatch_skips_suppliers(ctx: &TestHarness) {
    let pool = &ctx.db_pool;
    let sector = create_sector(pool, "batiment").await.unwrap();
    create_supplier(pool, "Maçons", None, ActivitySpec::country(&[sector.id]))
        .await
        .unwrap();
    PartnerShareTender::create(
        "Réseau achats",
        &[],
        None,
        &["veille@reseau.test".to_string(), "achats@reseau.test".to_string()],
        pool,
    )
    .await
    .unwrap();

    let author = create_buyer(pool, "travaux@ville.test").await.unwrap();
    let admin = create_admin(pool).await.unwrap();
    let mut input = tender_input("Rénovation école", &[sector.id]);
    input.is_country_area = true;
    let tender = submit(ctx.deps(), author, input, at(2024, 3, 4, 10)).await.unwrap();

    let (tender, outcome) = validate_tender(admin, &tender.slug, true, at(2024, 3, 4, 11), ctx.deps())
        .await
        .unwrap();

    assert_eq!(outcome.status, DispatchStatus::Dispatched(DispatchMode::Initial));
    assert_eq!(outcome.stamped_edges, 0);
    assert_eq!(outcome.partners, 1);
    assert_eq!(tender.status, TenderStatus::Sent);
    assert!(TenderSiae::find_for_tender(tender.id, pool).await.unwrap().is_empty());

    let partner_emails = ctx.email.sent_of_kind(EmailKind::PartnerPresentation);
    assert_eq!(partner_emails.len(), 1);
    assert_eq!(partner_emails[0].recipients.len(), 2);
    assert_eq!(ctx.email.count_of_kind(EmailKind::SupplierPresentation), 0);

    // Partner-only tenders never get a top-up.
    run_dispatch_pass(at(2024, 3, 6, 11), ctx.deps()).await.unwrap();
    assert_eq!(ctx.email.count_of_kind(EmailKind::PartnerPresentation), 1);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn failed_supplier_email_keeps_the_stamp(ctx: &TestHarness) {
    let pool = &ctx.db_pool;
    let sector = create_sector(pool, "securite").await.unwrap();
    let refused = create_supplier(pool, "Refus", None, ActivitySpec::country(&[sector.id]))
        .await
        .unwrap();
    create_supplier(pool, "Accepte", None, ActivitySpec::country(&[sector.id]))
        .await
        .unwrap();
    ctx.email.fail_for(&supplier_email("Refus"));

    let author = create_buyer(pool, "securite@ville.test").await.unwrap();
    let admin = create_admin(pool).await.unwrap();
    let mut input = tender_input("Gardiennage", &[sector.id]);
    input.is_country_area = true;
    let now = at(2024, 3, 4, 10);
    let tender = publish(ctx.deps(), author, admin, input, now).await.unwrap();

    // At-most-once: the edge stays stamped and is never retried.
    let edge = edge_of(pool, &tender, &refused).await.unwrap();
    assert_eq!(edge.email_send_date, Some(now));
    assert_eq!(ctx.email.count_of_kind(EmailKind::SupplierPresentation), 1);

    run_dispatch_pass(now + Duration::hours(25), ctx.deps()).await.unwrap();
    assert!(!ctx.email.was_sent_to(EmailKind::SupplierPresentation, &supplier_email("Refus")));
}

/// Validated by a moderator at `now` but not dispatched yet.
async fn validated_tender(ctx: &TestHarness, names: &[&str]) -> Tender {
    let pool = &ctx.db_pool;
    let sector = create_sector(pool, "blanchisserie").await.unwrap();
    for name in names {
        create_supplier(pool, name, None, ActivitySpec::country(&[sector.id]))
            .await
            .unwrap();
    }
    let author = create_buyer(pool, "linge@hopital.test").await.unwrap();
    let admin = create_admin(pool).await.unwrap();
    let mut input = tender_input("Blanchisserie du linge hospitalier", &[sector.id]);
    input.is_country_area = true;

    let now = at(2024, 3, 4, 10);
    let tender = submit(ctx.deps(), author, input, now).await.unwrap();
    Tender::mark_validated(tender.id, now, false, admin.user_id, pool)
        .await
        .unwrap()
        .unwrap()
}

#[test_context(TestHarness)]
#[tokio::test]
async fn locked_tender_is_left_to_the_pass_holding_it(ctx: &TestHarness) {
    let pool = &ctx.db_pool;
    let tender = validated_tender(ctx, &["Lavandiers", "Repasseurs"]).await;
    let now = at(2024, 3, 4, 10);

    let mut holder = pool.begin().await.unwrap();
    assert!(Tender::lock_for_pass(tender.id, &mut holder).await.unwrap().is_some());

    let outcome = dispatch_tender(tender.id, now, &PassSnapshot::new(), ctx.deps())
        .await
        .unwrap();
    assert_eq!(outcome.status, DispatchStatus::Busy);
    assert_eq!(outcome.stamped_edges, 0);
    holder.rollback().await.unwrap();

    assert!(ctx.email.sent().is_empty());
    assert_eq!(TenderSiae::stats(tender.id, pool).await.unwrap().emailed, 0);
    let untouched = Tender::find_by_id(tender.id, pool).await.unwrap().unwrap();
    assert_eq!(untouched.status, TenderStatus::Validated);

    let outcome = dispatch_tender(tender.id, now, &PassSnapshot::new(), ctx.deps())
        .await
        .unwrap();
    assert_eq!(outcome.status, DispatchStatus::Dispatched(DispatchMode::Initial));
    assert_eq!(outcome.stamped_edges, 2);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn concurrent_passes_dispatch_once(ctx: &TestHarness) {
    let pool = &ctx.db_pool;
    let tender = validated_tender(ctx, &["Amande", "Basilic", "Cannelle"]).await;
    let now = at(2024, 3, 4, 10);

    let (snapshot_a, snapshot_b) = (PassSnapshot::new(), PassSnapshot::new());
    let (a, b) = tokio::join!(
        dispatch_tender(tender.id, now, &snapshot_a, ctx.deps()),
        dispatch_tender(tender.id, now, &snapshot_b, ctx.deps()),
    );
    let statuses = [a.unwrap().status, b.unwrap().status];

    let dispatched = statuses
        .iter()
        .filter(|s| **s == DispatchStatus::Dispatched(DispatchMode::Initial))
        .count();
    assert_eq!(dispatched, 1, "statuses: {:?}", statuses);

    assert_eq!(ctx.email.count_of_kind(EmailKind::SupplierPresentation), 3);
    assert_eq!(ctx.email.count_of_kind(EmailKind::AuthorConfirmation), 1);
    assert_eq!(TenderSiae::stats(tender.id, pool).await.unwrap().emailed, 3);
}
