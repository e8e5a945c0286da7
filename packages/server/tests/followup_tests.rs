//! Daily follow-up jobs: reminders, top suppliers and auto-reject.

mod common;

use test_context::test_context;

use crate::common::*;
use tender_core::common::logs::{actions, LogEntry};
use tender_core::domains::followups::FollowupJob;
use tender_core::domains::reference::Siae;
use tender_core::domains::tenders::activities::{
    declare_interest, request_modification, update_tender, view_tender, DecisionRequest,
};
use tender_core::domains::tenders::models::{Tender, TenderStatus};
use tender_core::kernel::EmailKind;

/// Published on Friday 2024-03-08 at 10:00 to the named country-wide suppliers.
async fn published_friday(ctx: &TestHarness, title: &str, names: &[&str]) -> (Tender, Vec<Siae>) {
    let pool = &ctx.db_pool;
    let sector = create_sector(pool, "restauration").await.unwrap();
    let mut suppliers = Vec::new();
    for name in names {
        let siae = create_supplier(pool, name, None, ActivitySpec::country(&[sector.id]))
            .await
            .unwrap();
        suppliers.push(siae);
    }
    let author = create_buyer(pool, "cantine@ville.test").await.unwrap();
    let admin = create_admin(pool).await.unwrap();
    let mut input = tender_input(title, &[sector.id]);
    input.is_country_area = true;

    let tender = publish(ctx.deps(), author, admin, input, at(2024, 3, 8, 10)).await.unwrap();
    (tender, suppliers)
}

#[test_context(TestHarness)]
#[tokio::test]
async fn monday_reminders_pick_up_friday_sends(ctx: &TestHarness) {
    let pool = &ctx.db_pool;
    let (tender, suppliers) = published_friday(ctx, "Repas du centre de loisirs", &["Alpha", "Bravo"]).await;
    let alpha = edge_of(pool, &tender, &suppliers[0]).await.unwrap();

    // Alpha opens the link and declares interest the same afternoon.
    view_tender(&tender.slug, Some(alpha.id), None, None, at(2024, 3, 8, 14), ctx.deps())
        .await
        .unwrap();
    declare_interest(
        &tender.slug,
        DecisionRequest {
            tender_siae_uuid: Some(alpha.id),
            ..Default::default()
        },
        None,
        at(2024, 3, 8, 15),
        ctx.deps(),
    )
    .await
    .unwrap();

    let monday = at(2024, 3, 11, 9);
    let summary = FollowupJob::ClickReminder2d.run(monday, ctx.deps()).await.unwrap();
    assert_eq!(summary.emails, 1);
    let reminders = ctx.email.sent_of_kind(EmailKind::SupplierReminder2d);
    assert_eq!(reminders.len(), 1);
    assert_eq!(reminders[0].recipients, vec![supplier_email("Bravo")]);

    // Already logged on the edge.
    FollowupJob::ClickReminder2d.run(monday, ctx.deps()).await.unwrap();
    assert_eq!(ctx.email.count_of_kind(EmailKind::SupplierReminder2d), 1);

    let summary = FollowupJob::InterestReminder2d.run(monday, ctx.deps()).await.unwrap();
    assert_eq!(summary.emails, 1);
    assert!(ctx
        .email
        .was_sent_to(EmailKind::InterestedSupplierReminder2d, &supplier_email("Alpha")));

    // Tuesday: Friday is out of the two-day window, inside the three-day one.
    let tuesday = at(2024, 3, 12, 9);
    FollowupJob::ClickReminder2d.run(tuesday, ctx.deps()).await.unwrap();
    assert_eq!(ctx.email.count_of_kind(EmailKind::SupplierReminder2d), 1);

    FollowupJob::ClickReminder3d.run(tuesday, ctx.deps()).await.unwrap();
    assert_eq!(ctx.email.count_of_kind(EmailKind::SupplierReminder3d), 1);
    assert!(ctx.email.was_sent_to(EmailKind::SupplierReminder3d, &supplier_email("Bravo")));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn top_suppliers_go_out_on_weekdays_once(ctx: &TestHarness) {
    let (tender, _) = published_friday(ctx, "Goûters des écoles", &["Delta", "Echo"]).await;

    let saturday = at(2024, 3, 9, 9);
    let summary = FollowupJob::TopSuppliers.run(saturday, ctx.deps()).await.unwrap();
    assert_eq!(summary.processed, 0);

    let monday = at(2024, 3, 11, 9);
    let summary = FollowupJob::TopSuppliers.run(monday, ctx.deps()).await.unwrap();
    assert_eq!(summary.emails, 1);
    assert!(ctx.email.was_sent_to(EmailKind::AuthorTopSuppliers, "cantine@ville.test"));

    FollowupJob::TopSuppliers.run(monday, ctx.deps()).await.unwrap();
    assert_eq!(ctx.email.count_of_kind(EmailKind::AuthorTopSuppliers), 1);

    let reloaded = Tender::find_by_id(tender.id, &ctx.db_pool).await.unwrap().unwrap();
    assert!(reloaded.entries().iter().any(|e| e.action == "email_top_suppliers_to_author"));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn drafts_left_untouched_are_rejected_after_ten_days(ctx: &TestHarness) {
    let pool = &ctx.db_pool;
    let sector = create_sector(pool, "nettoyage").await.unwrap();
    let author = create_buyer(pool, "locaux@ville.test").await.unwrap();
    let admin = create_admin(pool).await.unwrap();
    let tender = submit(ctx.deps(), author, tender_input("Nettoyage des locaux", &[sector.id]), at(2024, 3, 1, 10))
        .await
        .unwrap();

    let requested_at = at(2024, 3, 1, 12);
    request_modification(admin, &tender.slug, "Merci de préciser le budget", requested_at, ctx.deps())
        .await
        .unwrap();
    assert_eq!(ctx.email.count_of_kind(EmailKind::AuthorModificationRequest), 1);

    let summary = FollowupJob::AutoReject.run(at(2024, 3, 10, 12), ctx.deps()).await.unwrap();
    assert_eq!(summary.processed, 0);
    let draft = Tender::find_by_id(tender.id, pool).await.unwrap().unwrap();
    assert_eq!(draft.status, TenderStatus::Draft);

    let summary = FollowupJob::AutoReject.run(at(2024, 3, 11, 13), ctx.deps()).await.unwrap();
    assert_eq!(summary.processed, 1);
    let rejected = Tender::find_by_id(tender.id, pool).await.unwrap().unwrap();
    assert_eq!(rejected.status, TenderStatus::Rejected);
    assert!(ctx.email.was_sent_to(EmailKind::AuthorRejected, "locaux@ville.test"));

    FollowupJob::AutoReject.run(at(2024, 3, 12, 13), ctx.deps()).await.unwrap();
    assert_eq!(ctx.email.count_of_kind(EmailKind::AuthorRejected), 1);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn edited_draft_is_not_auto_rejected(ctx: &TestHarness) {
    let pool = &ctx.db_pool;
    let sector = create_sector(pool, "voirie").await.unwrap();
    let author = create_buyer(pool, "voirie@ville.test").await.unwrap();
    let admin = create_admin(pool).await.unwrap();
    let input = tender_input("Marquage au sol", &[sector.id]);
    let tender = submit(ctx.deps(), author, input.clone(), at(2024, 3, 1, 10)).await.unwrap();

    request_modification(admin, &tender.slug, "Précisez les quantités", at(2024, 3, 1, 12), ctx.deps())
        .await
        .unwrap();
    update_tender(author, &tender.slug, input, at(2024, 3, 2, 9), ctx.deps())
        .await
        .unwrap();

    let summary = FollowupJob::AutoReject.run(at(2024, 3, 20, 9), ctx.deps()).await.unwrap();
    assert_eq!(summary.processed, 0);
    let draft = Tender::find_by_id(tender.id, pool).await.unwrap().unwrap();
    assert_eq!(draft.status, TenderStatus::Draft);
    assert!(!draft.email_sent_for_modification);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn save_between_selection_and_rejection_keeps_the_draft(ctx: &TestHarness) {
    let pool = &ctx.db_pool;
    let sector = create_sector(pool, "signaletique").await.unwrap();
    let author = create_buyer(pool, "signaletique@ville.test").await.unwrap();
    let admin = create_admin(pool).await.unwrap();
    let input = tender_input("Panneaux des gymnases", &[sector.id]);
    let tender = submit(ctx.deps(), author, input.clone(), at(2024, 3, 1, 10)).await.unwrap();
    request_modification(admin, &tender.slug, "Ajoutez les dimensions", at(2024, 3, 1, 12), ctx.deps())
        .await
        .unwrap();

    let selected = Tender::find_awaiting_modification(pool).await.unwrap();
    assert_eq!(selected.len(), 1);

    // The author saves while the job is between its read and its write.
    update_tender(author, &tender.slug, input, at(2024, 3, 20, 8), ctx.deps())
        .await
        .unwrap();

    let entry = LogEntry::new(actions::AUTO_REJECTED, at(2024, 3, 20, 9));
    let rejected = Tender::mark_auto_rejected(selected[0].id, &[TenderStatus::Draft], &entry, pool)
        .await
        .unwrap();
    assert!(rejected.is_none());

    let draft = Tender::find_by_id(tender.id, pool).await.unwrap().unwrap();
    assert_eq!(draft.status, TenderStatus::Draft);
    assert_eq!(ctx.email.count_of_kind(EmailKind::AuthorRejected), 0);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn delisted_suppliers_get_no_reminders(ctx: &TestHarness) {
    let pool = &ctx.db_pool;
    let (_, suppliers) = published_friday(ctx, "Transport scolaire", &["Golf", "Hotel"]).await;

    sqlx::query("UPDATE siaes SET is_delisted = true WHERE id = $1")
        .bind(suppliers[1].id)
        .execute(pool)
        .await
        .unwrap();

    let summary = FollowupJob::ClickReminder2d.run(at(2024, 3, 11, 9), ctx.deps()).await.unwrap();
    assert_eq!(summary.emails, 1);
    assert!(ctx.email.was_sent_to(EmailKind::SupplierReminder2d, &supplier_email("Golf")));
    assert!(!ctx.email.was_sent_to(EmailKind::SupplierReminder2d, &supplier_email("Hotel")));
}
