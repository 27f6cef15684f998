// SPDX-License-Identifier: Apache-2.0

use crate::{LedgerError, LedgerErrorCode, LedgerStore, SqliteLedger};
use billbook_model::{
    AlertConfig, AlertDraft, BillDraft, BillFilter, BillOrigin, InboxFilter, NotificationDraft,
    NotificationKind, PaymentStatus, Period, RecurringBillDraft, RecurringBillPatch, UserId,
    UtilityTypeDraft, UtilityTypeId, UtilityTypePatch,
};
use chrono::{DateTime, NaiveDate, Utc};

fn user(raw: &str) -> UserId {
    UserId::parse(raw).expect("user id")
}

fn ts(raw: &str) -> DateTime<Utc> {
    raw.parse().expect("timestamp")
}

fn date(raw: &str) -> NaiveDate {
    raw.parse().expect("date")
}

fn type_draft(name: &str) -> UtilityTypeDraft {
    UtilityTypeDraft {
        name: name.to_string(),
        description: None,
        unit_of_measurement: Some("kWh".to_string()),
    }
}

fn bill_draft(utility_type_id: UtilityTypeId, amount: f64, bill_date: &str) -> BillDraft {
    BillDraft {
        utility_type_id,
        amount,
        bill_date: date(bill_date),
        due_date: None,
        usage_amount: None,
        notes: None,
        payment_status: PaymentStatus::NeedPayment,
        origin: BillOrigin::Manual,
    }
}

fn template_draft(utility_type_id: UtilityTypeId, day_of_month: u32) -> RecurringBillDraft {
    RecurringBillDraft {
        utility_type_id,
        amount: 89.99,
        day_of_month,
        notes: Some("fixed rate plan".to_string()),
        is_active: true,
    }
}

async fn seeded_store() -> (SqliteLedger, UtilityTypeId) {
    let store = SqliteLedger::open_in_memory().expect("open store");
    store
        .seed_system_type("Electricity", Some("kWh"), ts("2026-01-01T00:00:00Z"))
        .await
        .expect("seed");
    let types = store
        .list_utility_types(&user("u1"))
        .await
        .expect("list types");
    (store, types[0].id)
}

#[tokio::test]
async fn system_types_are_visible_to_every_user_and_immutable() {
    let (store, electricity) = seeded_store().await;
    let alice = user("alice");
    let bob = user("bob");

    assert_eq!(store.list_utility_types(&bob).await.expect("list").len(), 1);
    store
        .get_utility_type(&alice, electricity)
        .await
        .expect("system type visible");

    let patch = UtilityTypePatch {
        name: Some("Power".to_string()),
        ..UtilityTypePatch::default()
    };
    let err = store
        .update_utility_type(&alice, electricity, &patch)
        .await
        .expect_err("system types are read-only");
    assert_eq!(err.code, LedgerErrorCode::Forbidden);

    let err = store
        .delete_utility_type(&alice, electricity)
        .await
        .expect_err("system types cannot be deleted");
    assert_eq!(err.code, LedgerErrorCode::Forbidden);
}

#[tokio::test]
async fn custom_types_are_scoped_to_their_owner() {
    let (store, _) = seeded_store().await;
    let alice = user("alice");
    let bob = user("bob");

    let solar = store
        .create_utility_type(&alice, &type_draft("Solar"), ts("2026-08-01T10:00:00Z"))
        .await
        .expect("create");
    assert!(!solar.is_system_type);

    let err = store
        .get_utility_type(&bob, solar.id)
        .await
        .expect_err("not visible cross-user");
    assert_eq!(err.code, LedgerErrorCode::NotFound);

    // Same name is fine for a different user, conflict for the owner.
    store
        .create_utility_type(&bob, &type_draft("Solar"), ts("2026-08-01T10:01:00Z"))
        .await
        .expect("other user may reuse the name");
    let err = store
        .create_utility_type(&alice, &type_draft("SOLAR"), ts("2026-08-01T10:02:00Z"))
        .await
        .expect_err("duplicate name is case-insensitive");
    assert_eq!(err.code, LedgerErrorCode::Conflict);
}

#[tokio::test]
async fn deleting_a_type_with_bills_is_a_conflict() {
    let (store, _) = seeded_store().await;
    let alice = user("alice");
    let gas = store
        .create_utility_type(&alice, &type_draft("Gas"), ts("2026-08-01T10:00:00Z"))
        .await
        .expect("create type");
    store
        .insert_bill(
            &alice,
            &bill_draft(gas.id, 55.20, "2026-08-05"),
            ts("2026-08-05T09:00:00Z"),
        )
        .await
        .expect("insert bill");

    let err = store
        .delete_utility_type(&alice, gas.id)
        .await
        .expect_err("bills block deletion");
    assert_eq!(err.code, LedgerErrorCode::Conflict);

    let bills = store
        .list_bills(
            &alice,
            &BillFilter {
                limit: 20,
                ..BillFilter::default()
            },
        )
        .await
        .expect("list bills");
    store
        .delete_bill(&alice, bills.bills[0].id)
        .await
        .expect("delete bill");
    store
        .delete_utility_type(&alice, gas.id)
        .await
        .expect("delete succeeds once bills are gone");
}

#[tokio::test]
async fn bill_listing_filters_by_type_and_date_window() {
    let (store, electricity) = seeded_store().await;
    let alice = user("alice");
    let water = store
        .create_utility_type(&alice, &type_draft("Water"), ts("2026-08-01T10:00:00Z"))
        .await
        .expect("create type");

    for (ut, amount, day) in [
        (electricity, 120.0, "2026-06-15"),
        (electricity, 130.0, "2026-07-15"),
        (water.id, 40.0, "2026-07-20"),
    ] {
        store
            .insert_bill(&alice, &bill_draft(ut, amount, day), ts("2026-08-01T11:00:00Z"))
            .await
            .expect("insert");
    }

    let page = store
        .list_bills(
            &alice,
            &BillFilter {
                utility_type_id: Some(electricity),
                start_date: Some(date("2026-07-01")),
                end_date: Some(date("2026-07-31")),
                limit: 20,
                offset: 0,
            },
        )
        .await
        .expect("filtered list");
    assert_eq!(page.total, 1);
    assert_eq!(page.bills[0].amount, 130.0);

    let page = store
        .list_bills(
            &alice,
            &BillFilter {
                limit: 2,
                ..BillFilter::default()
            },
        )
        .await
        .expect("paged list");
    assert_eq!(page.total, 3);
    assert_eq!(page.bills.len(), 2);
    // Most recent bill_date first.
    assert_eq!(page.bills[0].bill_date, date("2026-07-20"));
}

#[tokio::test]
async fn inserting_a_bill_against_a_missing_type_fails() {
    let (store, _) = seeded_store().await;
    let err = store
        .insert_bill(
            &user("alice"),
            &bill_draft(UtilityTypeId::new(999), 10.0, "2026-08-01"),
            ts("2026-08-01T00:00:00Z"),
        )
        .await
        .expect_err("unknown type");
    assert_eq!(err.code, LedgerErrorCode::NotFound);
}

#[tokio::test]
async fn materialize_advances_the_marker_and_inserts_once() {
    let (store, electricity) = seeded_store().await;
    let alice = user("alice");
    let template = store
        .create_recurring(
            &alice,
            &template_draft(electricity, 15),
            ts("2026-07-01T00:00:00Z"),
        )
        .await
        .expect("create template");
    let period = Period::new(2026, 8).expect("period");

    let bill = store
        .materialize_template(&alice, template.id, period, ts("2026-08-20T06:00:00Z"))
        .await
        .expect("materialize")
        .expect("bill created");
    assert_eq!(bill.origin, BillOrigin::Recurring);
    assert_eq!(bill.bill_date, date("2026-08-15"));
    assert_eq!(bill.amount, 89.99);
    assert_eq!(bill.payment_status, PaymentStatus::NeedPayment);

    // Second call for the same period loses the compare-and-set.
    let again = store
        .materialize_template(&alice, template.id, period, ts("2026-08-20T06:05:00Z"))
        .await
        .expect("materialize again");
    assert!(again.is_none());

    let templates = store.list_recurring(&alice).await.expect("list");
    assert_eq!(templates[0].last_generated, Some(period));
    let page = store
        .list_bills(
            &alice,
            &BillFilter {
                limit: 20,
                ..BillFilter::default()
            },
        )
        .await
        .expect("bills");
    assert_eq!(page.total, 1);
}

#[tokio::test]
async fn materialize_against_a_deleted_type_rolls_back() {
    let (store, _) = seeded_store().await;
    let alice = user("alice");
    let internet = store
        .create_utility_type(&alice, &type_draft("Internet"), ts("2026-07-01T00:00:00Z"))
        .await
        .expect("create type");
    let template = store
        .create_recurring(
            &alice,
            &template_draft(internet.id, 5),
            ts("2026-07-01T00:00:00Z"),
        )
        .await
        .expect("create template");
    store
        .delete_utility_type(&alice, internet.id)
        .await
        .expect("delete type");

    let period = Period::new(2026, 8).expect("period");
    let err = store
        .materialize_template(&alice, template.id, period, ts("2026-08-10T00:00:00Z"))
        .await
        .expect_err("dependency gone");
    assert_eq!(err.code, LedgerErrorCode::Dependency);

    // Rolled back: marker untouched, no bill row.
    let templates = store.list_recurring(&alice).await.expect("list");
    assert_eq!(templates[0].last_generated, None);
    let page = store
        .list_bills(
            &alice,
            &BillFilter {
                limit: 20,
                ..BillFilter::default()
            },
        )
        .await
        .expect("bills");
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn due_templates_respects_day_marker_and_active_flag() {
    let (store, electricity) = seeded_store().await;
    let alice = user("alice");
    let early = store
        .create_recurring(
            &alice,
            &template_draft(electricity, 5),
            ts("2026-07-01T00:00:00Z"),
        )
        .await
        .expect("early template");
    let late = store
        .create_recurring(
            &alice,
            &template_draft(electricity, 25),
            ts("2026-07-01T00:00:00Z"),
        )
        .await
        .expect("late template");
    let paused = store
        .create_recurring(
            &alice,
            &template_draft(electricity, 3),
            ts("2026-07-01T00:00:00Z"),
        )
        .await
        .expect("paused template");
    store
        .update_recurring(
            &alice,
            paused.id,
            &RecurringBillPatch {
                is_active: Some(false),
                ..RecurringBillPatch::default()
            },
        )
        .await
        .expect("pause");

    let period = Period::new(2026, 8).expect("period");
    let due = store
        .due_templates(&alice, period, 10)
        .await
        .expect("due on the 10th");
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].recurring.id, early.id);
    assert_eq!(due[0].utility_type_name, "Electricity");

    store
        .materialize_template(&alice, early.id, period, ts("2026-08-10T00:00:00Z"))
        .await
        .expect("materialize early");
    let due = store
        .due_templates(&alice, period, 28)
        .await
        .expect("due at month end");
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].recurring.id, late.id);
}

#[tokio::test]
async fn record_trigger_writes_notification_and_stamps_alert() {
    let (store, electricity) = seeded_store().await;
    let alice = user("alice");
    let alert = store
        .create_alert(
            &alice,
            &AlertDraft {
                utility_type_id: Some(electricity),
                config: AlertConfig::from_wire(
                    "cost_threshold",
                    serde_json::json!({"threshold": 100.0}),
                )
                .expect("config"),
            },
            ts("2026-08-01T00:00:00Z"),
        )
        .await
        .expect("create alert");
    assert!(alert.is_active);
    assert!(alert.last_triggered.is_none());

    let now = ts("2026-08-20T08:00:00Z");
    let notification = store
        .record_trigger(
            &alice,
            alert.id,
            &NotificationDraft {
                title: "Cost Threshold Alert".to_string(),
                message: "Your bill has exceeded the threshold.".to_string(),
                kind: NotificationKind::Alert,
            },
            now,
            false,
        )
        .await
        .expect("record trigger");
    assert_eq!(notification.alert_id, Some(alert.id));
    assert!(!notification.is_read);
    assert_eq!(notification.notification_type, NotificationKind::Alert);

    let alerts = store.list_alerts(&alice, None).await.expect("list");
    assert_eq!(alerts[0].last_triggered, Some(now));
    assert!(alerts[0].is_active);

    // With deactivate=true the alert is retired in the same transaction.
    store
        .record_trigger(
            &alice,
            alert.id,
            &NotificationDraft {
                title: "Cost Threshold Alert".to_string(),
                message: "final".to_string(),
                kind: NotificationKind::Alert,
            },
            ts("2026-08-21T08:00:00Z"),
            true,
        )
        .await
        .expect("record with deactivate");
    let alerts = store
        .list_alerts(&alice, Some(false))
        .await
        .expect("inactive alerts");
    assert_eq!(alerts.len(), 1);
}

#[tokio::test]
async fn inbox_counts_and_mark_read_ownership() {
    let (store, electricity) = seeded_store().await;
    let alice = user("alice");
    let bob = user("bob");
    let alert = store
        .create_alert(
            &alice,
            &AlertDraft {
                utility_type_id: Some(electricity),
                config: AlertConfig::from_wire(
                    "usage_threshold",
                    serde_json::json!({"threshold": 500.0, "unit": "kWh"}),
                )
                .expect("config"),
            },
            ts("2026-08-01T00:00:00Z"),
        )
        .await
        .expect("create alert");

    for i in 0..3 {
        store
            .record_trigger(
                &alice,
                alert.id,
                &NotificationDraft {
                    title: "Usage Threshold Alert".to_string(),
                    message: format!("message {i}"),
                    kind: NotificationKind::Alert,
                },
                ts("2026-08-20T08:00:00Z"),
                false,
            )
            .await
            .expect("trigger");
    }

    let inbox = store
        .list_notifications(
            &alice,
            &InboxFilter {
                limit: 20,
                ..InboxFilter::default()
            },
        )
        .await
        .expect("inbox");
    assert_eq!(inbox.total, 3);
    assert_eq!(inbox.unread_count, 3);

    let first = inbox.notifications[0].id;
    let err = store
        .mark_notification_read(&bob, first)
        .await
        .expect_err("cross-user mark read");
    assert_eq!(err.code, LedgerErrorCode::Forbidden);

    let read = store
        .mark_notification_read(&alice, first)
        .await
        .expect("mark read");
    assert!(read.is_read);

    let unread_only = store
        .list_notifications(
            &alice,
            &InboxFilter {
                is_read: Some(false),
                limit: 20,
                offset: 0,
            },
        )
        .await
        .expect("unread view");
    assert_eq!(unread_only.total, 2);
    assert_eq!(unread_only.unread_count, 2);
    assert_eq!(unread_only.notifications.len(), 2);
}

#[tokio::test]
async fn empty_patch_is_rejected() {
    let (store, _) = seeded_store().await;
    let alice = user("alice");
    let solar = store
        .create_utility_type(&alice, &type_draft("Solar"), ts("2026-08-01T00:00:00Z"))
        .await
        .expect("create");
    let err = store
        .update_utility_type(&alice, solar.id, &UtilityTypePatch::default())
        .await
        .expect_err("nothing to update");
    assert_eq!(err.code, LedgerErrorCode::Validation);
}

#[tokio::test]
async fn file_backed_store_persists_across_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("ledger.db");
    {
        let store = SqliteLedger::open(&path).expect("open");
        store
            .create_utility_type(&user("alice"), &type_draft("Solar"), ts("2026-08-01T00:00:00Z"))
            .await
            .expect("create");
    }
    let store = SqliteLedger::open(&path).expect("reopen");
    let types = store
        .list_utility_types(&user("alice"))
        .await
        .expect("list");
    assert_eq!(types.len(), 1);
    assert_eq!(types[0].name, "Solar");
}

#[tokio::test]
async fn busy_database_maps_to_transient() {
    // Exercised indirectly: the From impl routes busy/locked codes.
    let err = LedgerError::from(rusqlite::Error::SqliteFailure(
        rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
        None,
    ));
    assert_eq!(err.code, LedgerErrorCode::Transient);
}
