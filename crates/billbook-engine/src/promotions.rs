// SPDX-License-Identifier: Apache-2.0

use billbook_model::{AlertConfig, AlertId, NotificationDraft, NotificationKind, UserId};
use billbook_store::{LedgerError, LedgerStore};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TriggeredPromotion {
    pub alert_id: AlertId,
    pub promotion_name: String,
    pub days_until_end: i64,
}

/// Check the user's active promotion-end alerts against `today`.
///
/// An alert fires when its end date is within the lead window
/// (`0 <= days_until_end <= days_before`) and it has not already fired on
/// this calendar day; the daily suppression is what lets a scheduler call
/// this every few minutes without flooding the inbox. An alert whose end
/// date has arrived is deactivated in the same transaction that records
/// its final notification. Per-alert failures are logged and skipped.
pub async fn check_promotions(
    store: &dyn LedgerStore,
    user: &UserId,
    today: NaiveDate,
    now: DateTime<Utc>,
) -> Result<Vec<TriggeredPromotion>, LedgerError> {
    let alerts = store.active_promotion_alerts(user).await?;
    debug!(user = %user, candidates = alerts.len(), "checking promotion countdowns");

    let mut triggered = Vec::new();
    for alert in alerts {
        let AlertConfig::PromotionEnd {
            end_date,
            promotion_name,
            utility_name,
            days_before,
        } = &alert.config
        else {
            continue;
        };

        // Date-only difference: the countdown ignores time of day.
        let days_until_end = (*end_date - today).num_days();
        if days_until_end < 0 || days_until_end > i64::from(*days_before) {
            continue;
        }
        let already_notified_today = alert
            .last_triggered
            .is_some_and(|t| t.date_naive() == today);
        if already_notified_today {
            continue;
        }

        let promotion_name = promotion_name
            .clone()
            .unwrap_or_else(|| "Your promotion".to_string());
        let utility_name = utility_name.as_deref().unwrap_or("utility");
        let message = match days_until_end {
            0 => format!("{promotion_name} for {utility_name} ends TODAY! Make sure to review your options."),
            1 => format!("{promotion_name} for {utility_name} ends TOMORROW! Time to review your options."),
            n => format!(
                "{promotion_name} for {utility_name} ends in {n} days ({end_date}). Consider reviewing your options."
            ),
        };
        let draft = NotificationDraft {
            title: "Promotion Ending Soon".to_string(),
            message,
            kind: NotificationKind::Warning,
        };
        let deactivate = days_until_end == 0;
        match store
            .record_trigger(user, alert.id, &draft, now, deactivate)
            .await
        {
            Ok(_) => triggered.push(TriggeredPromotion {
                alert_id: alert.id,
                promotion_name,
                days_until_end,
            }),
            Err(e) => {
                warn!(user = %user, alert_id = %alert.id, error = %e, "failed to record trigger");
            }
        }
    }
    Ok(triggered)
}
