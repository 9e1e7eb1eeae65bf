//! In-memory store: leads, rules and notifications behind `RwLock`s.
//!
//! Useful for tests and demos. Implements all three engine capabilities, and
//! exposes a few extra helpers (seeding leads, acknowledging notifications)
//! that in production belong to the surrounding application.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::followup::rule::FollowUpRule;
use crate::leads::{Lead, LeadStatus};
use crate::notifications::{Notification, NotificationStatus, NotificationType};
use crate::store::traits::{DeliveryHistory, LeadRepository, NotificationSink, RuleRepository};

/// In-memory backend.
#[derive(Default)]
pub struct InMemoryStore {
    leads: RwLock<HashMap<Uuid, Lead>>,
    rules: RwLock<HashMap<Uuid, FollowUpRule>>,
    notifications: RwLock<Vec<Notification>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a lead.
    pub async fn upsert_lead(&self, lead: Lead) {
        self.leads.write().await.insert(lead.id, lead);
    }

    /// All notifications written so far, in insertion order.
    pub async fn notifications(&self) -> Vec<Notification> {
        self.notifications.read().await.clone()
    }

    /// Mark a notification read. Returns whether it was found.
    pub async fn mark_read(&self, id: Uuid) -> bool {
        self.set_status(id, NotificationStatus::Read).await
    }

    /// Archive a notification. Returns whether it was found.
    pub async fn archive(&self, id: Uuid) -> bool {
        self.set_status(id, NotificationStatus::Archived).await
    }

    async fn set_status(&self, id: Uuid, status: NotificationStatus) -> bool {
        let mut notifications = self.notifications.write().await;
        match notifications.iter_mut().find(|n| n.id == id) {
            Some(n) => {
                n.status = status;
                n.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl LeadRepository for InMemoryStore {
    async fn fetch_candidate_leads(
        &self,
        tenant_id: Uuid,
        statuses: &[LeadStatus],
        limit: usize,
    ) -> Result<Vec<Lead>, DatabaseError> {
        let leads = self.leads.read().await;
        let mut candidates: Vec<Lead> = leads
            .values()
            .filter(|l| l.tenant_id == tenant_id && statuses.contains(&l.status))
            .cloned()
            .collect();
        candidates.sort_by_key(|l| l.created_at);
        candidates.truncate(limit);
        Ok(candidates)
    }
}

#[async_trait]
impl RuleRepository for InMemoryStore {
    async fn fetch_active_rules(&self, tenant_id: Uuid) -> Result<Vec<FollowUpRule>, DatabaseError> {
        let mut rules = self.list_rules(tenant_id).await?;
        rules.retain(|r| r.is_active);
        Ok(rules)
    }

    async fn list_rules(&self, tenant_id: Uuid) -> Result<Vec<FollowUpRule>, DatabaseError> {
        let rules = self.rules.read().await;
        let mut list: Vec<FollowUpRule> = rules
            .values()
            .filter(|r| r.tenant_id == tenant_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(list)
    }

    async fn get_rule(&self, id: Uuid) -> Result<Option<FollowUpRule>, DatabaseError> {
        Ok(self.rules.read().await.get(&id).cloned())
    }

    async fn insert_rule(&self, rule: &FollowUpRule) -> Result<(), DatabaseError> {
        let mut rules = self.rules.write().await;
        if rules.contains_key(&rule.id) {
            return Err(DatabaseError::Query(format!(
                "insert_rule: rule {} already exists",
                rule.id
            )));
        }
        rules.insert(rule.id, rule.clone());
        debug!(rule_id = %rule.id, "Rule inserted");
        Ok(())
    }

    async fn update_rule(&self, rule: &FollowUpRule) -> Result<(), DatabaseError> {
        let mut rules = self.rules.write().await;
        match rules.get_mut(&rule.id) {
            Some(stored) => {
                *stored = rule.clone();
                Ok(())
            }
            None => Err(DatabaseError::NotFound {
                entity: "follow_up_rule".into(),
                id: rule.id.to_string(),
            }),
        }
    }

    async fn delete_rule(&self, id: Uuid) -> Result<bool, DatabaseError> {
        Ok(self.rules.write().await.remove(&id).is_some())
    }
}

#[async_trait]
impl NotificationSink for InMemoryStore {
    async fn find_unread_notification(
        &self,
        tenant_id: Uuid,
        lead_id: Uuid,
        notification_type: NotificationType,
    ) -> Result<Option<Notification>, DatabaseError> {
        let notifications = self.notifications.read().await;
        Ok(notifications
            .iter()
            .find(|n| {
                n.tenant_id == tenant_id
                    && n.lead_id == Some(lead_id)
                    && n.notification_type == notification_type
                    && n.is_unread()
            })
            .cloned())
    }

    async fn insert_notification(&self, notification: &Notification) -> Result<(), DatabaseError> {
        self.notifications.write().await.push(notification.clone());
        Ok(())
    }

    async fn delivery_history(
        &self,
        tenant_id: Uuid,
        lead_id: Uuid,
        notification_type: NotificationType,
    ) -> Result<DeliveryHistory, DatabaseError> {
        let notifications = self.notifications.read().await;
        let matching = notifications.iter().filter(|n| {
            n.tenant_id == tenant_id
                && n.lead_id == Some(lead_id)
                && n.notification_type == notification_type
        });
        let mut history = DeliveryHistory::default();
        for n in matching {
            history.delivered += 1;
            history.last_delivered_at = history.last_delivered_at.max(Some(n.created_at));
        }
        Ok(history)
    }
}
