//! Follow-up processing pass.
//!
//! One pass pulls a bounded batch of candidate leads and the tenant's active
//! rules, then walks the cross product:
//! - **match** the lead against the rule's trigger conditions
//! - **guard** against duplicates and the rule's repeat policy
//! - **render** title, message and action URL
//! - **schedule** the delivery time and write to the sink
//!
//! Sink writes are sequential so the guard sees earlier writes of the same
//! pass. Timer and stats bookkeeping live in [`crate::followup::service`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::error::{DatabaseError, EngineError};
use crate::followup::guard::{self, GuardDecision};
use crate::followup::matcher;
use crate::followup::rule::FollowUpRule;
use crate::followup::schedule::delivery_time;
use crate::followup::stats::PassSummary;
use crate::followup::template::render;
use crate::leads::Lead;
use crate::notifications::Notification;
use crate::store::traits::{LeadRepository, NotificationSink, RuleRepository};

/// Runs processing passes against injected repositories.
pub struct FollowUpEngine {
    leads: Arc<dyn LeadRepository>,
    rules: Arc<dyn RuleRepository>,
    sink: Arc<dyn NotificationSink>,
}

impl FollowUpEngine {
    pub fn new(
        leads: Arc<dyn LeadRepository>,
        rules: Arc<dyn RuleRepository>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self { leads, rules, sink }
    }

    /// Run one pass at `now`.
    ///
    /// Fetch failures abort the pass before anything is written. Per-notification
    /// failures are logged and counted in the summary.
    pub async fn run_pass(
        &self,
        config: &EngineConfig,
        now: DateTime<Utc>,
    ) -> Result<PassSummary, EngineError> {
        let leads = self
            .leads
            .fetch_candidate_leads(config.tenant_id, &config.eligible_statuses, config.batch_size)
            .await
            .map_err(EngineError::LeadFetch)?;

        let rules = self
            .rules
            .fetch_active_rules(config.tenant_id)
            .await
            .map_err(EngineError::RuleFetch)?;

        let mut summary = PassSummary {
            leads_scanned: leads.len(),
            rules_evaluated: rules.len(),
            ..Default::default()
        };

        if leads.is_empty() || rules.is_empty() {
            debug!(
                tenant_id = %config.tenant_id,
                leads = leads.len(),
                rules = rules.len(),
                "Nothing to process"
            );
            return Ok(summary);
        }

        for lead in &leads {
            let mut matched = false;

            for rule in &rules {
                // The repository should only return active rules.
                if !rule.is_active {
                    continue;
                }
                if !matcher::matches(lead, rule, now) {
                    continue;
                }
                matched = true;

                match guard::check(self.sink.as_ref(), lead, rule, now).await {
                    GuardDecision::Deliver => {}
                    GuardDecision::Suppress(reason) => {
                        debug!(
                            rule_id = %rule.id,
                            lead_id = %lead.id,
                            ?reason,
                            "Follow-up suppressed"
                        );
                        summary.suppressed += 1;
                        continue;
                    }
                }

                let Some(notification) = build_notification(lead, rule, config, now) else {
                    warn!(
                        rule_id = %rule.id,
                        lead_id = %lead.id,
                        delay_hours = ?rule.schedule_config.delay_hours,
                        "Delivery time out of range, skipping"
                    );
                    summary.failed += 1;
                    continue;
                };
                match self.deliver(&notification, config.max_retries).await {
                    Ok(()) => {
                        debug!(
                            rule_id = %rule.id,
                            lead_id = %lead.id,
                            notification_id = %notification.id,
                            "Follow-up notification created"
                        );
                        summary.notifications_sent += 1;
                    }
                    Err(e) => {
                        error!(
                            rule_id = %rule.id,
                            lead_id = %lead.id,
                            error = %e,
                            "Failed to create follow-up notification"
                        );
                        summary.failed += 1;
                    }
                }
            }

            if matched {
                summary.leads_matched += 1;
            }
        }

        info!(
            tenant_id = %config.tenant_id,
            leads = summary.leads_scanned,
            rules = summary.rules_evaluated,
            matched = summary.leads_matched,
            sent = summary.notifications_sent,
            suppressed = summary.suppressed,
            failed = summary.failed,
            "Follow-up pass complete"
        );

        Ok(summary)
    }

    /// Insert with up to `max_retries` immediate retries.
    async fn deliver(
        &self,
        notification: &Notification,
        max_retries: u32,
    ) -> Result<(), DatabaseError> {
        let mut attempt = 0;
        loop {
            match self.sink.insert_notification(notification).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < max_retries => {
                    attempt += 1;
                    warn!(
                        notification_id = %notification.id,
                        attempt,
                        error = %e,
                        "Notification insert failed, retrying"
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn build_notification(
    lead: &Lead,
    rule: &FollowUpRule,
    config: &EngineConfig,
    now: DateTime<Utc>,
) -> Option<Notification> {
    let send_at = delivery_time(&rule.schedule_config, now, &config.business_hours)?;
    let nc = &rule.notification_config;
    let action_url = nc
        .action_url_template
        .as_deref()
        .map(|template| render(template, lead, now));

    let notification = Notification::new(
        lead.tenant_id,
        nc.notification_type,
        nc.priority,
        render(&nc.title_template, lead, now),
        render(&nc.message_template, lead, now),
    )
    .for_user(nc.assign_to_user)
    .with_lead(lead.id)
    .with_action_url(action_url)
    .from_rule(rule.id)
    .created_at(now)
    .scheduled_for(send_at);
    Some(notification)
}
