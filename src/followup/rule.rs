//! Core types for follow-up rules.
//!
//! A rule pairs trigger conditions over a lead with the notification to emit
//! when they hold, plus a delivery schedule.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::leads::{LeadSource, LeadStatus};
use crate::notifications::{NotificationPriority, NotificationType};

/// A configured follow-up rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowUpRule {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub is_active: bool,
    #[serde(default)]
    pub trigger_conditions: TriggerConditions,
    pub notification_config: NotificationConfig,
    #[serde(default)]
    pub schedule_config: ScheduleConfig,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Conditions a lead must satisfy. An absent field places no constraint on
/// that dimension, so the default value matches every lead.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriggerConditions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lead_status: Option<Vec<LeadStatus>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lead_source: Option<Vec<LeadSource>>,
    /// At least one of these tags must be on the lead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    /// Minimum lead age in whole days.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_since_created: Option<u32>,
    /// Minimum whole days since the lead was last contacted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_since_last_contact: Option<u32>,
}

/// What the emitted notification looks like.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    #[serde(default)]
    pub priority: NotificationPriority,
    pub title_template: String,
    pub message_template: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_url_template: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assign_to_user: Option<Uuid>,
}

/// When and how often the notification is delivered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_hours: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat_interval_hours: Option<u32>,
    /// Deliveries allowed after the first one. Only meaningful together with
    /// `repeat_interval_hours`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_repeats: Option<u32>,
    #[serde(default)]
    pub business_hours_only: bool,
}

/// Payload for creating a rule.
#[derive(Debug, Clone, Deserialize)]
pub struct NewRule {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub trigger_conditions: TriggerConditions,
    pub notification_config: NotificationConfig,
    #[serde(default)]
    pub schedule_config: ScheduleConfig,
}

fn default_active() -> bool {
    true
}

/// Partial update for a rule. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RulePatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub trigger_conditions: Option<TriggerConditions>,
    #[serde(default)]
    pub notification_config: Option<NotificationConfig>,
    #[serde(default)]
    pub schedule_config: Option<ScheduleConfig>,
}

impl FollowUpRule {
    /// Build a fresh rule for `tenant_id` from a creation payload.
    pub fn from_new(tenant_id: Uuid, new: NewRule) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            name: new.name,
            description: new.description,
            is_active: new.is_active,
            trigger_conditions: new.trigger_conditions,
            notification_config: new.notification_config,
            schedule_config: new.schedule_config,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a patch in place and bump `updated_at`.
    pub fn apply(&mut self, patch: RulePatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(is_active) = patch.is_active {
            self.is_active = is_active;
        }
        if let Some(conditions) = patch.trigger_conditions {
            self.trigger_conditions = conditions;
        }
        if let Some(config) = patch.notification_config {
            self.notification_config = config;
        }
        if let Some(schedule) = patch.schedule_config {
            self.schedule_config = schedule;
        }
        self.updated_at = Utc::now();
    }
}

impl NotificationConfig {
    /// Config with default priority and no action URL or assignee.
    pub fn new(
        notification_type: NotificationType,
        title_template: impl Into<String>,
        message_template: impl Into<String>,
    ) -> Self {
        Self {
            notification_type,
            priority: NotificationPriority::default(),
            title_template: title_template.into(),
            message_template: message_template.into(),
            action_url_template: None,
            assign_to_user: None,
        }
    }
}
