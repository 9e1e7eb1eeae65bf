//! Condition matcher: decides whether a rule applies to a lead.
//!
//! Every populated dimension of [`TriggerConditions`] must hold (AND); an
//! absent dimension is trivially satisfied. Pure and deterministic in `now`.

use chrono::{DateTime, Utc};
use tracing::trace;

use crate::followup::rule::{FollowUpRule, TriggerConditions};
use crate::leads::Lead;

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// A single condition dimension, used to report why a lead did not match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionDimension {
    Status,
    Source,
    Tags,
    DaysSinceCreated,
    DaysSinceLastContact,
}

/// Whole days from `from` to `now`, floored. Future timestamps give
/// negative counts.
pub fn whole_days_between(from: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - from).num_milliseconds().div_euclid(MILLIS_PER_DAY)
}

pub fn days_since_created(lead: &Lead, now: DateTime<Utc>) -> i64 {
    whole_days_between(lead.created_at, now)
}

pub fn days_since_last_contact(lead: &Lead, now: DateTime<Utc>) -> i64 {
    whole_days_between(lead.contact_anchor(), now)
}

/// Does `rule` currently apply to `lead`? Inactive rules never apply.
pub fn matches(lead: &Lead, rule: &FollowUpRule, now: DateTime<Utc>) -> bool {
    if !rule.is_active {
        return false;
    }
    match first_unmet(lead, &rule.trigger_conditions, now) {
        None => true,
        Some(dimension) => {
            trace!(
                rule_id = %rule.id,
                lead_id = %lead.id,
                ?dimension,
                "Rule condition not met"
            );
            false
        }
    }
}

/// Evaluate conditions alone, ignoring the rule's active flag.
pub fn conditions_met(lead: &Lead, conditions: &TriggerConditions, now: DateTime<Utc>) -> bool {
    first_unmet(lead, conditions, now).is_none()
}

/// Return the first dimension the lead fails, or `None` if all hold.
pub fn first_unmet(
    lead: &Lead,
    conditions: &TriggerConditions,
    now: DateTime<Utc>,
) -> Option<ConditionDimension> {
    if let Some(statuses) = &conditions.lead_status
        && !statuses.contains(&lead.status)
    {
        return Some(ConditionDimension::Status);
    }

    if let Some(sources) = &conditions.lead_source
        && !sources.contains(&lead.source)
    {
        return Some(ConditionDimension::Source);
    }

    // An empty tag list places no constraint.
    if let Some(tags) = &conditions.tags
        && !tags.is_empty()
        && !tags.iter().any(|t| lead.tags.contains(t))
    {
        return Some(ConditionDimension::Tags);
    }

    if let Some(min_days) = conditions.days_since_created
        && days_since_created(lead, now) < i64::from(min_days)
    {
        return Some(ConditionDimension::DaysSinceCreated);
    }

    if let Some(min_days) = conditions.days_since_last_contact
        && days_since_last_contact(lead, now) < i64::from(min_days)
    {
        return Some(ConditionDimension::DaysSinceLastContact);
    }

    None
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use uuid::Uuid;

    use super::*;
    use crate::followup::rule::{NewRule, NotificationConfig, ScheduleConfig};
    use crate::leads::{LeadSource, LeadStatus};
    use crate::notifications::NotificationType;

    fn make_lead(now: DateTime<Utc>) -> Lead {
        Lead::new(Uuid::new_v4(), "Ana Costa", LeadSource::Event)
            .with_tags(["VIP"])
            .created_at(now - Duration::days(5))
    }

    fn make_rule(conditions: TriggerConditions) -> FollowUpRule {
        FollowUpRule::from_new(
            Uuid::new_v4(),
            NewRule {
                name: "test".into(),
                description: String::new(),
                is_active: true,
                trigger_conditions: conditions,
                notification_config: NotificationConfig::new(
                    NotificationType::FollowUpReminder,
                    "t",
                    "m",
                ),
                schedule_config: ScheduleConfig::default(),
            },
        )
    }

    fn full_conditions() -> TriggerConditions {
        TriggerConditions {
            lead_status: Some(vec![LeadStatus::New]),
            lead_source: Some(vec![LeadSource::Event]),
            tags: Some(vec!["VIP".into()]),
            days_since_created: Some(3),
            days_since_last_contact: Some(3),
        }
    }

    #[test]
    fn all_dimensions_satisfied() {
        let now = Utc::now();
        let lead = make_lead(now);
        assert!(matches(&lead, &make_rule(full_conditions()), now));
    }

    #[test]
    fn failing_any_single_dimension_blocks_match() {
        let now = Utc::now();
        let rule = make_rule(full_conditions());

        let wrong_status = make_lead(now).with_status(LeadStatus::Contacted);
        assert_eq!(
            first_unmet(&wrong_status, &rule.trigger_conditions, now),
            Some(ConditionDimension::Status)
        );

        let mut wrong_source = make_lead(now);
        wrong_source.source = LeadSource::Website;
        assert_eq!(
            first_unmet(&wrong_source, &rule.trigger_conditions, now),
            Some(ConditionDimension::Source)
        );

        let wrong_tags = make_lead(now).with_tags(["Cold"]);
        assert_eq!(
            first_unmet(&wrong_tags, &rule.trigger_conditions, now),
            Some(ConditionDimension::Tags)
        );

        let too_young = make_lead(now).created_at(now - Duration::days(1));
        assert_eq!(
            first_unmet(&too_young, &rule.trigger_conditions, now),
            Some(ConditionDimension::DaysSinceCreated)
        );

        let recently_contacted = make_lead(now).last_contacted(now - Duration::hours(2));
        assert_eq!(
            first_unmet(&recently_contacted, &rule.trigger_conditions, now),
            Some(ConditionDimension::DaysSinceLastContact)
        );

        for lead in [wrong_status, wrong_source, wrong_tags, too_young, recently_contacted] {
            assert!(!matches(&lead, &rule, now));
        }
    }

    #[test]
    fn open_rule_matches_brand_new_lead() {
        let now = Utc::now();
        let lead = Lead::new(Uuid::new_v4(), "Fresh", LeadSource::Website).created_at(now);
        assert!(matches(&lead, &make_rule(TriggerConditions::default()), now));
    }

    #[test]
    fn day_threshold_boundary() {
        let now = Utc::now();
        let conditions = TriggerConditions {
            days_since_created: Some(2),
            ..Default::default()
        };

        let just_short = make_lead(now)
            .created_at(now - Duration::days(2) + Duration::milliseconds(1));
        assert!(!conditions_met(&just_short, &conditions, now));

        let exactly = make_lead(now).created_at(now - Duration::days(2));
        assert!(conditions_met(&exactly, &conditions, now));
    }

    #[test]
    fn twenty_three_hours_is_zero_days() {
        let now = Utc::now();
        let lead = make_lead(now).created_at(now - Duration::hours(23));
        assert_eq!(days_since_created(&lead, now), 0);
        let conditions = TriggerConditions {
            days_since_created: Some(1),
            ..Default::default()
        };
        assert!(!conditions_met(&lead, &conditions, now));
    }

    #[test]
    fn future_timestamps_fail_thresholds() {
        let now = Utc::now();
        let lead = make_lead(now).created_at(now + Duration::hours(3));
        assert!(days_since_created(&lead, now) < 0);
        let conditions = TriggerConditions {
            days_since_created: Some(1),
            ..Default::default()
        };
        assert!(!conditions_met(&lead, &conditions, now));
    }

    #[test]
    fn tag_overlap_is_any_not_all() {
        let now = Utc::now();
        let conditions = TriggerConditions {
            tags: Some(vec!["VIP".into(), "Premium".into()]),
            ..Default::default()
        };
        let lead = make_lead(now).with_tags(["VIP"]);
        assert!(conditions_met(&lead, &conditions, now));
    }

    #[test]
    fn empty_tag_list_is_unconstrained() {
        let now = Utc::now();
        let conditions = TriggerConditions {
            tags: Some(vec![]),
            ..Default::default()
        };
        let lead = make_lead(now).with_tags(Vec::<String>::new());
        assert!(conditions_met(&lead, &conditions, now));
    }

    #[test]
    fn last_contact_falls_back_to_updated_at() {
        let now = Utc::now();
        let conditions = TriggerConditions {
            days_since_last_contact: Some(4),
            ..Default::default()
        };
        let lead = make_lead(now).updated_at(now - Duration::days(4));
        assert!(conditions_met(&lead, &conditions, now));

        let touched = make_lead(now).updated_at(now - Duration::days(1));
        assert!(!conditions_met(&touched, &conditions, now));
    }

    #[test]
    fn inactive_rule_never_matches() {
        let now = Utc::now();
        let mut rule = make_rule(TriggerConditions::default());
        rule.is_active = false;
        assert!(!matches(&make_lead(now), &rule, now));
    }
}
