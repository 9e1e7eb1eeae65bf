//! Template interpolation for notification titles, messages and action URLs.
//!
//! Templates use `{{name}}` placeholders from a closed vocabulary
//! ([`Placeholder`]). Unknown names are left in the output verbatim; the rule
//! store rejects them up front via [`unknown_placeholders`].

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::{Captures, Regex};

use crate::followup::matcher::{days_since_created, days_since_last_contact};
use crate::leads::Lead;

static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z0-9_]+)\s*\}\}").expect("placeholder regex is valid")
});

/// Placeholders a template may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    LeadName,
    LeadId,
    LeadEmail,
    LeadPhone,
    LeadStatus,
    LeadSource,
    DaysSinceCreated,
    DaysSinceLastContact,
    /// The larger of the two day counts.
    Days,
}

impl Placeholder {
    pub const ALL: [Placeholder; 9] = [
        Placeholder::LeadName,
        Placeholder::LeadId,
        Placeholder::LeadEmail,
        Placeholder::LeadPhone,
        Placeholder::LeadStatus,
        Placeholder::LeadSource,
        Placeholder::DaysSinceCreated,
        Placeholder::DaysSinceLastContact,
        Placeholder::Days,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Placeholder::LeadName => "lead_name",
            Placeholder::LeadId => "lead_id",
            Placeholder::LeadEmail => "lead_email",
            Placeholder::LeadPhone => "lead_phone",
            Placeholder::LeadStatus => "lead_status",
            Placeholder::LeadSource => "lead_source",
            Placeholder::DaysSinceCreated => "days_since_created",
            Placeholder::DaysSinceLastContact => "days_since_last_contact",
            Placeholder::Days => "days",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }

    /// Value of this placeholder for `lead` at `now`.
    pub fn resolve(&self, lead: &Lead, now: DateTime<Utc>) -> String {
        match self {
            Placeholder::LeadName => lead.name.clone(),
            Placeholder::LeadId => lead.id.to_string(),
            Placeholder::LeadEmail => lead.email.clone().unwrap_or_default(),
            Placeholder::LeadPhone => lead.phone.clone().unwrap_or_default(),
            Placeholder::LeadStatus => lead.status.to_string(),
            Placeholder::LeadSource => lead.source.to_string(),
            Placeholder::DaysSinceCreated => days_since_created(lead, now).to_string(),
            Placeholder::DaysSinceLastContact => days_since_last_contact(lead, now).to_string(),
            Placeholder::Days => days_since_created(lead, now)
                .max(days_since_last_contact(lead, now))
                .to_string(),
        }
    }
}

/// Render `template` against `lead`. Unknown placeholders pass through.
pub fn render(template: &str, lead: &Lead, now: DateTime<Utc>) -> String {
    PLACEHOLDER_RE
        .replace_all(template, |caps: &Captures<'_>| match Placeholder::from_name(&caps[1]) {
            Some(placeholder) => placeholder.resolve(lead, now),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Placeholder names in `template` that are outside the vocabulary.
pub fn unknown_placeholders(template: &str) -> Vec<String> {
    PLACEHOLDER_RE
        .captures_iter(template)
        .map(|caps| caps[1].to_string())
        .filter(|name| Placeholder::from_name(name).is_none())
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use uuid::Uuid;

    use super::*;
    use crate::leads::{LeadSource, LeadStatus};

    fn ana(now: DateTime<Utc>) -> Lead {
        Lead::new(Uuid::new_v4(), "Ana Costa", LeadSource::Event)
            .with_email("ana@example.com")
            .created_at(now - Duration::days(5))
    }

    #[test]
    fn renders_name_and_days() {
        let now = Utc::now();
        let out = render("Follow-up: {{lead_name}} ({{days}} days)", &ana(now), now);
        assert_eq!(out, "Follow-up: Ana Costa (5 days)");
    }

    #[test]
    fn days_is_max_of_both_counts() {
        let now = Utc::now();
        let lead = ana(now).last_contacted(now - Duration::days(9));
        assert_eq!(render("{{days}}", &lead, now), "9");

        let lead = ana(now).last_contacted(now - Duration::days(1));
        assert_eq!(render("{{days}}", &lead, now), "5");
        assert_eq!(render("{{days_since_last_contact}}", &lead, now), "1");
    }

    #[test]
    fn renders_every_placeholder() {
        let now = Utc::now();
        let lead = ana(now)
            .with_phone("+55 11 99999-0000")
            .with_status(LeadStatus::Contacted);
        let out = render(
            "{{lead_id}}|{{lead_email}}|{{lead_phone}}|{{lead_status}}|{{lead_source}}|{{days_since_created}}",
            &lead,
            now,
        );
        assert_eq!(
            out,
            format!("{}|ana@example.com|+55 11 99999-0000|contacted|event|5", lead.id)
        );
    }

    #[test]
    fn missing_optional_fields_render_empty() {
        let now = Utc::now();
        let lead = Lead::new(Uuid::new_v4(), "No Phone", LeadSource::Website);
        assert_eq!(render("[{{lead_phone}}]", &lead, now), "[]");
    }

    #[test]
    fn unknown_placeholder_left_verbatim() {
        let now = Utc::now();
        let out = render("Hi {{lead_nmae}}, {{ lead_name }}", &ana(now), now);
        assert_eq!(out, "Hi {{lead_nmae}}, Ana Costa");
    }

    #[test]
    fn action_url_template() {
        let now = Utc::now();
        let lead = ana(now);
        let out = render("/leads/{{lead_id}}", &lead, now);
        assert_eq!(out, format!("/leads/{}", lead.id));
    }

    #[test]
    fn detects_unknown_placeholders() {
        assert!(unknown_placeholders("{{lead_name}} {{days}}").is_empty());
        assert_eq!(
            unknown_placeholders("{{lead_nmae}} and {{company}}"),
            vec!["lead_nmae".to_string(), "company".to_string()]
        );
    }

    #[test]
    fn names_roundtrip() {
        for p in Placeholder::ALL {
            assert_eq!(Placeholder::from_name(p.name()), Some(p));
        }
    }
}
