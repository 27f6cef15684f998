// SPDX-License-Identifier: Apache-2.0

use billbook_model::{
    AlertConfig, AlertId, AlertKind, Bill, BillId, NotificationDraft, NotificationKind, UserId,
};
use billbook_store::{LedgerError, LedgerStore};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TriggeredAlert {
    pub alert_id: AlertId,
    pub alert_type: AlertKind,
    pub notification_title: String,
}

/// Evaluate the user's active usage/cost threshold alerts against one bill.
///
/// Called synchronously after a bill is created and exposed as its own
/// operation for explicit re-checks. Every matching alert fires every time
/// the bill is evaluated; threshold alerts carry no suppression window.
/// A failure to record one alert's notification is logged and skipped so
/// one bad row cannot mask the remaining alerts.
pub async fn evaluate_thresholds(
    store: &dyn LedgerStore,
    user: &UserId,
    bill_id: BillId,
    now: DateTime<Utc>,
) -> Result<Vec<TriggeredAlert>, LedgerError> {
    let bill = store.get_bill(user, bill_id).await?;
    let utility_type_name = store.get_utility_type(user, bill.utility_type_id).await?.name;
    let alerts = store
        .active_threshold_alerts(user, bill.utility_type_id)
        .await?;
    debug!(user = %user, bill_id = %bill_id, candidates = alerts.len(), "evaluating thresholds");

    let mut triggered = Vec::new();
    for alert in alerts {
        let Some((title, message)) = evaluate_one(&alert.config, &bill, &utility_type_name) else {
            continue;
        };
        let draft = NotificationDraft {
            title: title.to_string(),
            message,
            kind: NotificationKind::Alert,
        };
        match store.record_trigger(user, alert.id, &draft, now, false).await {
            Ok(_) => triggered.push(TriggeredAlert {
                alert_id: alert.id,
                alert_type: alert.config.kind(),
                notification_title: title.to_string(),
            }),
            Err(e) => {
                warn!(user = %user, alert_id = %alert.id, error = %e, "failed to record trigger");
            }
        }
    }
    Ok(triggered)
}

fn evaluate_one(
    config: &AlertConfig,
    bill: &Bill,
    utility_type_name: &str,
) -> Option<(&'static str, String)> {
    match config {
        AlertConfig::UsageThreshold {
            threshold,
            comparison,
            unit,
        } => {
            let usage = bill.usage_amount?;
            if !comparison.matches(usage, *threshold) {
                return None;
            }
            let unit = unit.as_deref().unwrap_or("");
            Some((
                "Usage Threshold Alert",
                format!(
                    "Your {utility_type_name} usage ({usage} {unit}) has {} the threshold of {threshold} {unit}.",
                    comparison.describe()
                ),
            ))
        }
        AlertConfig::CostThreshold {
            threshold,
            comparison,
        } => {
            if !comparison.matches(bill.amount, *threshold) {
                return None;
            }
            Some((
                "Cost Threshold Alert",
                format!(
                    "Your {utility_type_name} bill (${:.2}) has {} the threshold of ${threshold:.2}.",
                    bill.amount,
                    comparison.describe()
                ),
            ))
        }
        // Reminders and promotions are not bill-driven.
        AlertConfig::BillReminder { .. } | AlertConfig::PromotionEnd { .. } => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use billbook_model::{
        AlertDraft, BillDraft, BillOrigin, InboxFilter, PaymentStatus, UtilityTypeId,
    };
    use billbook_store::SqliteLedger;
    use chrono::NaiveDate;

    fn user(raw: &str) -> UserId {
        UserId::parse(raw).expect("user id")
    }

    fn ts(raw: &str) -> DateTime<Utc> {
        raw.parse().expect("timestamp")
    }

    async fn store_with_type() -> (SqliteLedger, UserId, UtilityTypeId) {
        let store = SqliteLedger::open_in_memory().expect("open");
        store
            .seed_system_type("Electricity", Some("kWh"), ts("2026-01-01T00:00:00Z"))
            .await
            .expect("seed");
        let alice = user("alice");
        let id = store.list_utility_types(&alice).await.expect("types")[0].id;
        (store, alice, id)
    }

    async fn insert_bill(
        store: &SqliteLedger,
        who: &UserId,
        utility_type_id: UtilityTypeId,
        amount: f64,
        usage_amount: Option<f64>,
    ) -> BillId {
        store
            .insert_bill(
                who,
                &BillDraft {
                    utility_type_id,
                    amount,
                    bill_date: NaiveDate::from_ymd_opt(2026, 8, 20).expect("date"),
                    due_date: None,
                    usage_amount,
                    notes: None,
                    payment_status: PaymentStatus::NeedPayment,
                    origin: BillOrigin::Manual,
                },
                ts("2026-08-20T10:00:00Z"),
            )
            .await
            .expect("insert bill")
            .id
    }

    async fn create_alert(
        store: &SqliteLedger,
        who: &UserId,
        utility_type_id: Option<UtilityTypeId>,
        alert_type: &str,
        configuration: serde_json::Value,
    ) -> AlertId {
        store
            .create_alert(
                who,
                &AlertDraft {
                    utility_type_id,
                    config: AlertConfig::from_wire(alert_type, configuration).expect("config"),
                },
                ts("2026-08-01T00:00:00Z"),
            )
            .await
            .expect("create alert")
            .id
    }

    #[tokio::test]
    async fn cost_over_threshold_fires_with_money_formatting() {
        let (store, alice, power) = store_with_type().await;
        let alert = create_alert(
            &store,
            &alice,
            Some(power),
            "cost_threshold",
            serde_json::json!({"threshold": 100.0}),
        )
        .await;
        let bill = insert_bill(&store, &alice, power, 150.0, None).await;

        let triggered = evaluate_thresholds(&store, &alice, bill, ts("2026-08-20T10:00:01Z"))
            .await
            .expect("evaluate");
        assert_eq!(triggered.len(), 1);
        assert_eq!(triggered[0].alert_id, alert);
        assert_eq!(triggered[0].alert_type, AlertKind::CostThreshold);
        assert_eq!(triggered[0].notification_title, "Cost Threshold Alert");

        let inbox = store
            .list_notifications(
                &alice,
                &InboxFilter {
                    limit: 10,
                    ..InboxFilter::default()
                },
            )
            .await
            .expect("inbox");
        assert_eq!(
            inbox.notifications[0].message,
            "Your Electricity bill ($150.00) has exceeded the threshold of $100.00."
        );
        assert_eq!(inbox.notifications[0].notification_type, NotificationKind::Alert);
    }

    #[tokio::test]
    async fn cost_under_threshold_stays_quiet() {
        let (store, alice, power) = store_with_type().await;
        create_alert(
            &store,
            &alice,
            Some(power),
            "cost_threshold",
            serde_json::json!({"threshold": 100.0}),
        )
        .await;
        let bill = insert_bill(&store, &alice, power, 99.99, None).await;

        let triggered = evaluate_thresholds(&store, &alice, bill, ts("2026-08-20T10:00:01Z"))
            .await
            .expect("evaluate");
        assert!(triggered.is_empty());
        let inbox = store
            .list_notifications(&alice, &InboxFilter { limit: 10, ..InboxFilter::default() })
            .await
            .expect("inbox");
        assert_eq!(inbox.total, 0);
    }

    #[tokio::test]
    async fn usage_alert_requires_a_usage_reading() {
        let (store, alice, power) = store_with_type().await;
        create_alert(
            &store,
            &alice,
            Some(power),
            "usage_threshold",
            serde_json::json!({"threshold": 500.0, "unit": "kWh"}),
        )
        .await;

        let without_usage = insert_bill(&store, &alice, power, 80.0, None).await;
        let triggered =
            evaluate_thresholds(&store, &alice, without_usage, ts("2026-08-20T10:00:01Z"))
                .await
                .expect("evaluate");
        assert!(triggered.is_empty());

        let with_usage = insert_bill(&store, &alice, power, 80.0, Some(650.0)).await;
        let triggered =
            evaluate_thresholds(&store, &alice, with_usage, ts("2026-08-20T10:00:02Z"))
                .await
                .expect("evaluate");
        assert_eq!(triggered.len(), 1);
        assert_eq!(triggered[0].alert_type, AlertKind::UsageThreshold);

        let inbox = store
            .list_notifications(&alice, &InboxFilter { limit: 10, ..InboxFilter::default() })
            .await
            .expect("inbox");
        assert_eq!(
            inbox.notifications[0].message,
            "Your Electricity usage (650 kWh) has exceeded the threshold of 500 kWh."
        );
    }

    #[tokio::test]
    async fn less_than_comparison_fires_below_the_threshold() {
        let (store, alice, power) = store_with_type().await;
        create_alert(
            &store,
            &alice,
            None,
            "cost_threshold",
            serde_json::json!({"threshold": 50.0, "comparison": "less_than"}),
        )
        .await;
        let bill = insert_bill(&store, &alice, power, 30.0, None).await;

        let triggered = evaluate_thresholds(&store, &alice, bill, ts("2026-08-20T10:00:01Z"))
            .await
            .expect("evaluate");
        assert_eq!(triggered.len(), 1);
        let inbox = store
            .list_notifications(&alice, &InboxFilter { limit: 10, ..InboxFilter::default() })
            .await
            .expect("inbox");
        assert_eq!(
            inbox.notifications[0].message,
            "Your Electricity bill ($30.00) has fallen below the threshold of $50.00."
        );
    }

    #[tokio::test]
    async fn inactive_and_other_type_alerts_are_ignored() {
        let (store, alice, power) = store_with_type().await;
        let water = store
            .create_utility_type(
                &alice,
                &billbook_model::UtilityTypeDraft {
                    name: "Water".to_string(),
                    description: None,
                    unit_of_measurement: Some("gal".to_string()),
                },
                ts("2026-01-01T00:00:00Z"),
            )
            .await
            .expect("create type");
        // Scoped to water, so an electricity bill must not trip it.
        create_alert(
            &store,
            &alice,
            Some(water.id),
            "cost_threshold",
            serde_json::json!({"threshold": 10.0}),
        )
        .await;
        let deactivated = create_alert(
            &store,
            &alice,
            Some(power),
            "cost_threshold",
            serde_json::json!({"threshold": 10.0}),
        )
        .await;
        store
            .update_alert(
                &alice,
                deactivated,
                &billbook_model::AlertPatch {
                    configuration: None,
                    is_active: Some(false),
                },
            )
            .await
            .expect("deactivate");

        let bill = insert_bill(&store, &alice, power, 999.0, None).await;
        let triggered = evaluate_thresholds(&store, &alice, bill, ts("2026-08-20T10:00:01Z"))
            .await
            .expect("evaluate");
        assert!(triggered.is_empty());
    }
}
