//! Rule store: tenant-scoped CRUD over a [`RuleRepository`] with validation.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::error::RuleError;
use crate::followup::rule::{FollowUpRule, NewRule, NotificationConfig, RulePatch};
use crate::followup::template::unknown_placeholders;
use crate::store::traits::RuleRepository;

/// Longest delay or repeat interval a rule may carry: ten years.
const MAX_SCHEDULE_HOURS: u32 = 24 * 365 * 10;

/// Rule CRUD for one tenant.
pub struct RuleStore {
    tenant_id: Uuid,
    repo: Arc<dyn RuleRepository>,
}

impl RuleStore {
    pub fn new(tenant_id: Uuid, repo: Arc<dyn RuleRepository>) -> Self {
        Self { tenant_id, repo }
    }

    pub async fn create_rule(&self, new: NewRule) -> Result<FollowUpRule, RuleError> {
        let rule = FollowUpRule::from_new(self.tenant_id, new);
        validate(&rule)?;
        self.repo.insert_rule(&rule).await?;
        info!(rule_id = %rule.id, name = %rule.name, "Follow-up rule created");
        Ok(rule)
    }

    pub async fn update_rule(&self, id: Uuid, patch: RulePatch) -> Result<FollowUpRule, RuleError> {
        let mut rule = self.get_rule(id).await?;
        rule.apply(patch);
        validate(&rule)?;
        self.repo.update_rule(&rule).await?;
        info!(rule_id = %id, "Follow-up rule updated");
        Ok(rule)
    }

    pub async fn delete_rule(&self, id: Uuid) -> Result<(), RuleError> {
        // Scope check before deleting.
        self.get_rule(id).await?;
        if !self.repo.delete_rule(id).await? {
            return Err(RuleError::NotFound { id });
        }
        info!(rule_id = %id, "Follow-up rule deleted");
        Ok(())
    }

    /// Flip `is_active` and return the updated rule.
    pub async fn toggle_rule(&self, id: Uuid) -> Result<FollowUpRule, RuleError> {
        let mut rule = self.get_rule(id).await?;
        rule.apply(RulePatch {
            is_active: Some(!rule.is_active),
            ..Default::default()
        });
        self.repo.update_rule(&rule).await?;
        info!(rule_id = %id, is_active = rule.is_active, "Follow-up rule toggled");
        Ok(rule)
    }

    pub async fn list_rules(&self) -> Result<Vec<FollowUpRule>, RuleError> {
        Ok(self.repo.list_rules(self.tenant_id).await?)
    }

    /// Fetch a rule owned by this tenant. Rules of other tenants are
    /// reported as not found.
    pub async fn get_rule(&self, id: Uuid) -> Result<FollowUpRule, RuleError> {
        match self.repo.get_rule(id).await? {
            Some(rule) if rule.tenant_id == self.tenant_id => Ok(rule),
            _ => Err(RuleError::NotFound { id }),
        }
    }
}

fn validate(rule: &FollowUpRule) -> Result<(), RuleError> {
    if rule.name.trim().is_empty() {
        return Err(RuleError::Validation {
            reason: "name must not be empty".into(),
        });
    }
    let schedule = &rule.schedule_config;
    if let Some(0) = schedule.repeat_interval_hours {
        return Err(RuleError::Validation {
            reason: "repeat_interval_hours must be at least 1".into(),
        });
    }
    for (field, hours) in [
        ("delay_hours", schedule.delay_hours),
        ("repeat_interval_hours", schedule.repeat_interval_hours),
    ] {
        if let Some(hours) = hours
            && hours > MAX_SCHEDULE_HOURS
        {
            return Err(RuleError::Validation {
                reason: format!("{field} must be at most {MAX_SCHEDULE_HOURS}"),
            });
        }
    }
    check_templates(&rule.notification_config)
}

fn check_templates(config: &NotificationConfig) -> Result<(), RuleError> {
    let fields = [
        ("title_template", Some(config.title_template.as_str())),
        ("message_template", Some(config.message_template.as_str())),
        ("action_url_template", config.action_url_template.as_deref()),
    ];
    for (field, template) in fields {
        let Some(template) = template else { continue };
        if let Some(placeholder) = unknown_placeholders(template).into_iter().next() {
            return Err(RuleError::UnknownPlaceholder {
                field: field.to_string(),
                placeholder,
            });
        }
    }
    Ok(())
}
