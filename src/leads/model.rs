//! Lead data model as seen by the follow-up engine.
//!
//! Leads are owned by the lead-management side of the product. The engine
//! only reads them, so there are no mutation helpers beyond test builders.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a lead.
///
/// Tenants may define their own statuses; those land in `Custom`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LeadStatus {
    New,
    Contacted,
    Qualified,
    Converted,
    Lost,
    Custom(String),
}

impl LeadStatus {
    /// Statuses the engine follows up on by default. Converted and lost
    /// leads are excluded from automatic follow-up.
    pub fn follow_up_eligible() -> Vec<LeadStatus> {
        vec![LeadStatus::New, LeadStatus::Contacted, LeadStatus::Qualified]
    }

    pub fn as_str(&self) -> &str {
        match self {
            LeadStatus::New => "new",
            LeadStatus::Contacted => "contacted",
            LeadStatus::Qualified => "qualified",
            LeadStatus::Converted => "converted",
            LeadStatus::Lost => "lost",
            LeadStatus::Custom(s) => s,
        }
    }
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeadStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "new" => LeadStatus::New,
            "contacted" => LeadStatus::Contacted,
            "qualified" => LeadStatus::Qualified,
            "converted" => LeadStatus::Converted,
            "lost" => LeadStatus::Lost,
            other => LeadStatus::Custom(other.to_string()),
        })
    }
}

impl From<String> for LeadStatus {
    fn from(s: String) -> Self {
        match s.parse() {
            Ok(status) => status,
            Err(never) => match never {},
        }
    }
}

impl From<LeadStatus> for String {
    fn from(status: LeadStatus) -> Self {
        status.as_str().to_string()
    }
}

/// Where a lead came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LeadSource {
    Website,
    Event,
    Referral,
    SocialMedia,
    Email,
    Phone,
    Manual,
    Custom(String),
}

impl LeadSource {
    pub fn as_str(&self) -> &str {
        match self {
            LeadSource::Website => "website",
            LeadSource::Event => "event",
            LeadSource::Referral => "referral",
            LeadSource::SocialMedia => "social_media",
            LeadSource::Email => "email",
            LeadSource::Phone => "phone",
            LeadSource::Manual => "manual",
            LeadSource::Custom(s) => s,
        }
    }
}

impl fmt::Display for LeadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeadSource {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "website" => LeadSource::Website,
            "event" => LeadSource::Event,
            "referral" => LeadSource::Referral,
            "social_media" => LeadSource::SocialMedia,
            "email" => LeadSource::Email,
            "phone" => LeadSource::Phone,
            "manual" => LeadSource::Manual,
            other => LeadSource::Custom(other.to_string()),
        })
    }
}

impl From<String> for LeadSource {
    fn from(s: String) -> Self {
        match s.parse() {
            Ok(source) => source,
            Err(never) => match never {},
        }
    }
}

impl From<LeadSource> for String {
    fn from(source: LeadSource) -> Self {
        source.as_str().to_string()
    }
}

/// A lead snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    pub status: LeadStatus,
    pub source: LeadSource,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    /// Last update; doubles as the last-contact proxy when
    /// `last_contact_date` is absent.
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_contact_date: Option<DateTime<Utc>>,
}

impl Lead {
    /// Create a lead created (and last touched) now.
    pub fn new(tenant_id: Uuid, name: impl Into<String>, source: LeadSource) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            name: name.into(),
            email: None,
            phone: None,
            company: None,
            status: LeadStatus::New,
            source,
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
            last_contact_date: None,
        }
    }

    /// Builder: set status.
    pub fn with_status(mut self, status: LeadStatus) -> Self {
        self.status = status;
        self
    }

    /// Builder: set email.
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Builder: set phone.
    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    /// Builder: set tags.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Builder: set creation time. Also resets `updated_at`, matching a lead
    /// that has not been touched since it was created.
    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = at;
        self.updated_at = at;
        self
    }

    /// Builder: set last update time.
    pub fn updated_at(mut self, at: DateTime<Utc>) -> Self {
        self.updated_at = at;
        self
    }

    /// Builder: set explicit last contact.
    pub fn last_contacted(mut self, at: DateTime<Utc>) -> Self {
        self.last_contact_date = Some(at);
        self
    }

    /// Timestamp used to measure contact staleness.
    pub fn contact_anchor(&self) -> DateTime<Utc> {
        self.last_contact_date.unwrap_or(self.updated_at)
    }
}
