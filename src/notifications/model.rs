//! Notification data model.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    FollowUpReminder,
    NewLead,
    LeadStatusChange,
    SurveyResponse,
    Reminder,
    System,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::FollowUpReminder => "follow_up_reminder",
            NotificationType::NewLead => "new_lead",
            NotificationType::LeadStatusChange => "lead_status_change",
            NotificationType::SurveyResponse => "survey_response",
            NotificationType::Reminder => "reminder",
            NotificationType::System => "system",
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "follow_up_reminder" => Ok(NotificationType::FollowUpReminder),
            "new_lead" => Ok(NotificationType::NewLead),
            "lead_status_change" => Ok(NotificationType::LeadStatusChange),
            "survey_response" => Ok(NotificationType::SurveyResponse),
            "reminder" => Ok(NotificationType::Reminder),
            "system" => Ok(NotificationType::System),
            other => Err(format!("unknown notification type: {other}")),
        }
    }
}

/// Delivery priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl fmt::Display for NotificationPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationPriority::Low => write!(f, "low"),
            NotificationPriority::Medium => write!(f, "medium"),
            NotificationPriority::High => write!(f, "high"),
            NotificationPriority::Urgent => write!(f, "urgent"),
        }
    }
}

impl FromStr for NotificationPriority {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(NotificationPriority::Low),
            "medium" => Ok(NotificationPriority::Medium),
            "high" => Ok(NotificationPriority::High),
            "urgent" => Ok(NotificationPriority::Urgent),
            other => Err(format!("unknown notification priority: {other}")),
        }
    }
}

/// Read state. Transitions out of `Unread` belong to the notification UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    #[default]
    Unread,
    Read,
    Archived,
}

impl fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationStatus::Unread => write!(f, "unread"),
            NotificationStatus::Read => write!(f, "read"),
            NotificationStatus::Archived => write!(f, "archived"),
        }
    }
}

impl FromStr for NotificationStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unread" => Ok(NotificationStatus::Unread),
            "read" => Ok(NotificationStatus::Read),
            "archived" => Ok(NotificationStatus::Archived),
            other => Err(format!("unknown notification status: {other}")),
        }
    }
}

/// A notification record handed to the sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub tenant_id: Uuid,
    /// Recipient. `None` broadcasts to the whole tenant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub priority: NotificationPriority,
    pub status: NotificationStatus,
    pub title: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lead_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_for: Option<DateTime<Utc>>,
    /// Rule that produced this notification, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Notification {
    /// Create an unread notification.
    pub fn new(
        tenant_id: Uuid,
        notification_type: NotificationType,
        priority: NotificationPriority,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            user_id: None,
            notification_type,
            priority,
            status: NotificationStatus::Unread,
            title: title.into(),
            message: message.into(),
            lead_id: None,
            action_url: None,
            scheduled_for: None,
            rule_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Builder: address a single user.
    pub fn for_user(mut self, user_id: Option<Uuid>) -> Self {
        self.user_id = user_id;
        self
    }

    /// Builder: link the lead this notification is about.
    pub fn with_lead(mut self, lead_id: Uuid) -> Self {
        self.lead_id = Some(lead_id);
        self
    }

    /// Builder: set the action URL.
    pub fn with_action_url(mut self, url: Option<String>) -> Self {
        self.action_url = url;
        self
    }

    /// Builder: set the intended delivery time.
    pub fn scheduled_for(mut self, at: DateTime<Utc>) -> Self {
        self.scheduled_for = Some(at);
        self
    }

    /// Builder: stamp both timestamps with `at`.
    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = at;
        self.updated_at = at;
        self
    }

    /// Builder: record the producing rule.
    pub fn from_rule(mut self, rule_id: Uuid) -> Self {
        self.rule_id = Some(rule_id);
        self
    }

    pub fn is_unread(&self) -> bool {
        self.status == NotificationStatus::Unread
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_display_parse() {
        for t in [
            NotificationType::FollowUpReminder,
            NotificationType::NewLead,
            NotificationType::LeadStatusChange,
            NotificationType::SurveyResponse,
            NotificationType::Reminder,
            NotificationType::System,
        ] {
            let parsed: NotificationType = t.to_string().parse().unwrap();
            assert_eq!(parsed, t);
        }
        assert!("bogus".parse::<NotificationType>().is_err());
    }

    #[test]
    fn priority_and_status_parse() {
        assert_eq!("urgent".parse::<NotificationPriority>().unwrap(), NotificationPriority::Urgent);
        assert_eq!("archived".parse::<NotificationStatus>().unwrap(), NotificationStatus::Archived);
        assert!("asap".parse::<NotificationPriority>().is_err());
    }

    #[test]
    fn type_field_serializes_as_type() {
        let n = Notification::new(
            Uuid::new_v4(),
            NotificationType::FollowUpReminder,
            NotificationPriority::High,
            "t",
            "m",
        );
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["type"], "follow_up_reminder");
        assert_eq!(json["status"], "unread");
        assert!(json.get("lead_id").is_none());
    }

    #[test]
    fn new_notification_is_unread_broadcast() {
        let n = Notification::new(
            Uuid::new_v4(),
            NotificationType::Reminder,
            NotificationPriority::Low,
            "t",
            "m",
        );
        assert!(n.is_unread());
        assert!(n.user_id.is_none());
    }
}
