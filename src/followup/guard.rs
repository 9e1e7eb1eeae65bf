//! Dedup guard: keeps repeated passes from re-notifying the same lead.
//!
//! A pending (unread) notification of the same type for the same lead always
//! suppresses. Rules with `repeat_interval_hours` are additionally throttled
//! by their delivery history.

use chrono::{DateTime, Duration, Utc};
use tracing::warn;

use crate::followup::rule::FollowUpRule;
use crate::leads::Lead;
use crate::store::traits::NotificationSink;

/// Why a match did not turn into a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressReason {
    UnreadExists,
    RepeatIntervalNotElapsed,
    MaxRepeatsReached,
    /// The sink could not answer; suppressing is the safe side.
    LookupFailed,
}

/// Outcome of the guard for one (lead, rule) match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Deliver,
    Suppress(SuppressReason),
}

/// Decide whether `rule` may notify about `lead` at `now`.
pub async fn check(
    sink: &dyn NotificationSink,
    lead: &Lead,
    rule: &FollowUpRule,
    now: DateTime<Utc>,
) -> GuardDecision {
    let notification_type = rule.notification_config.notification_type;

    match sink
        .find_unread_notification(lead.tenant_id, lead.id, notification_type)
        .await
    {
        Ok(Some(_)) => return GuardDecision::Suppress(SuppressReason::UnreadExists),
        Ok(None) => {}
        Err(e) => {
            warn!(
                rule_id = %rule.id,
                lead_id = %lead.id,
                error = %e,
                "Unread notification lookup failed, skipping"
            );
            return GuardDecision::Suppress(SuppressReason::LookupFailed);
        }
    }

    let Some(interval_hours) = rule.schedule_config.repeat_interval_hours else {
        return GuardDecision::Deliver;
    };

    let history = match sink
        .delivery_history(lead.tenant_id, lead.id, notification_type)
        .await
    {
        Ok(h) => h,
        Err(e) => {
            warn!(
                rule_id = %rule.id,
                lead_id = %lead.id,
                error = %e,
                "Delivery history lookup failed, skipping"
            );
            return GuardDecision::Suppress(SuppressReason::LookupFailed);
        }
    };

    if let Some(max_repeats) = rule.schedule_config.max_repeats
        && history.delivered > max_repeats
    {
        return GuardDecision::Suppress(SuppressReason::MaxRepeatsReached);
    }

    if let Some(last) = history.last_delivered_at
        && now - last < Duration::hours(i64::from(interval_hours))
    {
        return GuardDecision::Suppress(SuppressReason::RepeatIntervalNotElapsed);
    }

    GuardDecision::Deliver
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::followup::rule::{NewRule, NotificationConfig, ScheduleConfig, TriggerConditions};
    use crate::leads::LeadSource;
    use crate::notifications::{Notification, NotificationPriority, NotificationType};
    use crate::store::memory::InMemoryStore;

    fn make_rule(tenant_id: Uuid, schedule: ScheduleConfig) -> FollowUpRule {
        FollowUpRule::from_new(
            tenant_id,
            NewRule {
                name: "repeat".into(),
                description: String::new(),
                is_active: true,
                trigger_conditions: TriggerConditions::default(),
                notification_config: NotificationConfig::new(
                    NotificationType::FollowUpReminder,
                    "t",
                    "m",
                ),
                schedule_config: schedule,
            },
        )
    }

    fn delivered(lead: &Lead, hours_ago: i64) -> Notification {
        let mut n = Notification::new(
            lead.tenant_id,
            NotificationType::FollowUpReminder,
            NotificationPriority::Medium,
            "t",
            "m",
        )
        .with_lead(lead.id);
        n.created_at = Utc::now() - Duration::hours(hours_ago);
        n
    }

    #[tokio::test]
    async fn delivers_when_nothing_pending() {
        let store = InMemoryStore::new();
        let tenant = Uuid::new_v4();
        let lead = Lead::new(tenant, "Ana", LeadSource::Event);
        let rule = make_rule(tenant, ScheduleConfig::default());
        assert_eq!(check(&store, &lead, &rule, Utc::now()).await, GuardDecision::Deliver);
    }

    #[tokio::test]
    async fn unread_of_same_type_suppresses() {
        let store = InMemoryStore::new();
        let tenant = Uuid::new_v4();
        let lead = Lead::new(tenant, "Ana", LeadSource::Event);
        let rule = make_rule(tenant, ScheduleConfig::default());
        store.insert_notification(&delivered(&lead, 1)).await.unwrap();

        assert_eq!(
            check(&store, &lead, &rule, Utc::now()).await,
            GuardDecision::Suppress(SuppressReason::UnreadExists)
        );
    }

    #[tokio::test]
    async fn read_notification_allows_another_without_repeat_policy() {
        let store = InMemoryStore::new();
        let tenant = Uuid::new_v4();
        let lead = Lead::new(tenant, "Ana", LeadSource::Event);
        let rule = make_rule(tenant, ScheduleConfig::default());
        let n = delivered(&lead, 1);
        store.insert_notification(&n).await.unwrap();
        store.mark_read(n.id).await;

        assert_eq!(check(&store, &lead, &rule, Utc::now()).await, GuardDecision::Deliver);
    }

    #[tokio::test]
    async fn other_type_does_not_suppress() {
        let store = InMemoryStore::new();
        let tenant = Uuid::new_v4();
        let lead = Lead::new(tenant, "Ana", LeadSource::Event);
        let rule = make_rule(tenant, ScheduleConfig::default());
        let mut n = delivered(&lead, 1);
        n.notification_type = NotificationType::System;
        store.insert_notification(&n).await.unwrap();

        assert_eq!(check(&store, &lead, &rule, Utc::now()).await, GuardDecision::Deliver);
    }

    #[tokio::test]
    async fn repeat_interval_throttles() {
        let store = InMemoryStore::new();
        let tenant = Uuid::new_v4();
        let lead = Lead::new(tenant, "Ana", LeadSource::Event);
        let rule = make_rule(
            tenant,
            ScheduleConfig {
                repeat_interval_hours: Some(24),
                ..Default::default()
            },
        );
        let recent = delivered(&lead, 5);
        store.insert_notification(&recent).await.unwrap();
        store.mark_read(recent.id).await;

        assert_eq!(
            check(&store, &lead, &rule, Utc::now()).await,
            GuardDecision::Suppress(SuppressReason::RepeatIntervalNotElapsed)
        );
        assert_eq!(
            check(&store, &lead, &rule, Utc::now() + Duration::hours(20)).await,
            GuardDecision::Deliver
        );
    }

    #[tokio::test]
    async fn max_repeats_caps_total_deliveries() {
        let store = InMemoryStore::new();
        let tenant = Uuid::new_v4();
        let lead = Lead::new(tenant, "Ana", LeadSource::Event);
        let rule = make_rule(
            tenant,
            ScheduleConfig {
                repeat_interval_hours: Some(1),
                max_repeats: Some(1),
                ..Default::default()
            },
        );

        for hours_ago in [48, 24] {
            let n = delivered(&lead, hours_ago);
            store.insert_notification(&n).await.unwrap();
            store.mark_read(n.id).await;
        }

        assert_eq!(
            check(&store, &lead, &rule, Utc::now()).await,
            GuardDecision::Suppress(SuppressReason::MaxRepeatsReached)
        );
    }
}
