//! Capabilities the follow-up engine consumes from the data layer.
//!
//! Split into three traits so a host can back leads, rules and notifications
//! with different stores. Both bundled backends implement all three.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::followup::rule::FollowUpRule;
use crate::leads::{Lead, LeadStatus};
use crate::notifications::{Notification, NotificationType};

/// Past deliveries for one (tenant, lead, type) pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryHistory {
    /// Notifications ever written for the pair, whatever their status.
    pub delivered: u32,
    pub last_delivered_at: Option<DateTime<Utc>>,
}

/// Read access to leads.
#[async_trait]
pub trait LeadRepository: Send + Sync {
    /// Up to `limit` leads of `tenant_id` whose status is in `statuses`,
    /// oldest first.
    async fn fetch_candidate_leads(
        &self,
        tenant_id: Uuid,
        statuses: &[LeadStatus],
        limit: usize,
    ) -> Result<Vec<Lead>, DatabaseError>;
}

/// Persistence for follow-up rules.
#[async_trait]
pub trait RuleRepository: Send + Sync {
    /// All rules of `tenant_id` with `is_active = true`.
    async fn fetch_active_rules(&self, tenant_id: Uuid) -> Result<Vec<FollowUpRule>, DatabaseError>;

    /// All rules of `tenant_id`, newest first.
    async fn list_rules(&self, tenant_id: Uuid) -> Result<Vec<FollowUpRule>, DatabaseError>;

    async fn get_rule(&self, id: Uuid) -> Result<Option<FollowUpRule>, DatabaseError>;

    async fn insert_rule(&self, rule: &FollowUpRule) -> Result<(), DatabaseError>;

    /// Overwrite a stored rule. Fails with `NotFound` if it does not exist.
    async fn update_rule(&self, rule: &FollowUpRule) -> Result<(), DatabaseError>;

    /// Returns whether a rule was removed.
    async fn delete_rule(&self, id: Uuid) -> Result<bool, DatabaseError>;
}

/// Where notifications go, plus the lookups the dedup guard needs.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn find_unread_notification(
        &self,
        tenant_id: Uuid,
        lead_id: Uuid,
        notification_type: NotificationType,
    ) -> Result<Option<Notification>, DatabaseError>;

    async fn insert_notification(&self, notification: &Notification) -> Result<(), DatabaseError>;

    async fn delivery_history(
        &self,
        tenant_id: Uuid,
        lead_id: Uuid,
        notification_type: NotificationType,
    ) -> Result<DeliveryHistory, DatabaseError>;
}
