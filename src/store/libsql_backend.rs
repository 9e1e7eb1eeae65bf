//! libSQL backend: leads, follow-up rules and notifications.
//!
//! Supports local file and in-memory databases. Rule conditions, notification
//! config and schedule are stored as JSON columns. Rows that fail to parse are
//! skipped with a warning so one bad row does not hide the rest.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use libsql::params::Params;
use libsql::{Connection, Database as LibSqlDatabase, Value, params};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::followup::rule::FollowUpRule;
use crate::leads::{Lead, LeadStatus};
use crate::notifications::{Notification, NotificationStatus, NotificationType};
use crate::store::migrations;
use crate::store::traits::{DeliveryHistory, LeadRepository, NotificationSink, RuleRepository};

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let backend = Self::from_database(db).await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;
        Self::from_database(db).await
    }

    async fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;
        migrations::run_migrations(&conn).await?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Insert or replace a lead. Leads are owned by the host application;
    /// this exists for seeding and tests.
    pub async fn upsert_lead(&self, lead: &Lead) -> Result<(), DatabaseError> {
        let tags = serde_json::to_string(&lead.tags)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;

        self.conn()
            .execute(
                &format!("INSERT OR REPLACE INTO leads ({LEAD_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"),
                params![
                    lead.id.to_string(),
                    lead.tenant_id.to_string(),
                    lead.name.clone(),
                    opt_text(lead.email.as_deref()),
                    opt_text(lead.phone.as_deref()),
                    opt_text(lead.company.as_deref()),
                    lead.status.as_str(),
                    lead.source.as_str(),
                    tags,
                    opt_datetime(lead.last_contact_date),
                    fmt_datetime(lead.created_at),
                    fmt_datetime(lead.updated_at),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("upsert_lead: {e}")))?;
        Ok(())
    }

    /// Notifications of a tenant, newest first.
    pub async fn list_notifications(
        &self,
        tenant_id: Uuid,
    ) -> Result<Vec<Notification>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE tenant_id = ?1 ORDER BY created_at DESC"),
                params![tenant_id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_notifications: {e}")))?;

        let mut notifications = Vec::new();
        while let Some(row) = next_row(&mut rows, "list_notifications").await? {
            match row_to_notification(&row) {
                Ok(n) => notifications.push(n),
                Err(e) => warn!("Skipping notification row: {e}"),
            }
        }
        Ok(notifications)
    }

    /// Change a notification's status (read, archived). Returns whether it
    /// was found.
    pub async fn set_notification_status(
        &self,
        id: Uuid,
        status: NotificationStatus,
    ) -> Result<bool, DatabaseError> {
        let count = self
            .conn()
            .execute(
                "UPDATE notifications SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![status.to_string(), fmt_datetime(Utc::now()), id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("set_notification_status: {e}")))?;
        Ok(count > 0)
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Canonical write format. Fixed precision keeps text ordering chronological.
fn fmt_datetime(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn opt_datetime(dt: Option<DateTime<Utc>>) -> Value {
    match dt {
        Some(dt) => Value::Text(fmt_datetime(dt)),
        None => Value::Null,
    }
}

/// Parse an RFC 3339 or SQLite datetime string.
fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(ndt.and_utc());
    }
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|ndt| ndt.and_utc())
}

fn required_datetime(row: &libsql::Row, idx: i32, column: &str) -> Result<DateTime<Utc>, DatabaseError> {
    let raw: String = row.get(idx).map_err(row_error)?;
    parse_datetime(&raw)
        .ok_or_else(|| DatabaseError::Serialization(format!("bad {column} timestamp {raw:?}")))
}

fn optional_datetime(row: &libsql::Row, idx: i32, column: &str) -> Result<Option<DateTime<Utc>>, DatabaseError> {
    match row.get::<String>(idx).ok() {
        Some(raw) => parse_datetime(&raw)
            .map(Some)
            .ok_or_else(|| DatabaseError::Serialization(format!("bad {column} timestamp {raw:?}"))),
        None => Ok(None),
    }
}

fn parse_uuid(raw: &str, column: &str) -> Result<Uuid, DatabaseError> {
    raw.parse()
        .map_err(|e| DatabaseError::Serialization(format!("bad {column} {raw:?}: {e}")))
}

fn optional_uuid(row: &libsql::Row, idx: i32, column: &str) -> Result<Option<Uuid>, DatabaseError> {
    row.get::<String>(idx)
        .ok()
        .map(|raw| parse_uuid(&raw, column))
        .transpose()
}

fn json_column<T: serde::de::DeserializeOwned>(
    row: &libsql::Row,
    idx: i32,
    column: &str,
) -> Result<T, DatabaseError> {
    let raw: String = row.get(idx).map_err(row_error)?;
    serde_json::from_str(&raw)
        .map_err(|e| DatabaseError::Serialization(format!("bad {column} JSON: {e}")))
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, DatabaseError> {
    serde_json::to_string(value).map_err(|e| DatabaseError::Serialization(e.to_string()))
}

/// Convert `Option<&str>` to libsql Value.
fn opt_text(s: Option<&str>) -> Value {
    match s {
        Some(s) => Value::Text(s.to_string()),
        None => Value::Null,
    }
}

fn opt_uuid(id: Option<Uuid>) -> Value {
    match id {
        Some(id) => Value::Text(id.to_string()),
        None => Value::Null,
    }
}

fn row_error(e: libsql::Error) -> DatabaseError {
    DatabaseError::Serialization(format!("bad row: {e}"))
}

async fn next_row(rows: &mut libsql::Rows, op: &str) -> Result<Option<libsql::Row>, DatabaseError> {
    rows.next()
        .await
        .map_err(|e| DatabaseError::Query(format!("{op}: {e}")))
}

const LEAD_COLUMNS: &str = "id, tenant_id, name, email, phone, company, status, source, tags, last_contact_date, created_at, updated_at";

const RULE_COLUMNS: &str = "id, tenant_id, name, description, is_active, trigger_conditions, notification_config, schedule_config, created_at, updated_at";

const NOTIFICATION_COLUMNS: &str = "id, tenant_id, user_id, type, priority, status, title, message, lead_id, action_url, scheduled_for, rule_id, created_at, updated_at";

/// Column order matches LEAD_COLUMNS.
fn row_to_lead(row: &libsql::Row) -> Result<Lead, DatabaseError> {
    let id: String = row.get(0).map_err(row_error)?;
    let tenant_id: String = row.get(1).map_err(row_error)?;
    let status: String = row.get(6).map_err(row_error)?;
    let source: String = row.get(7).map_err(row_error)?;

    Ok(Lead {
        id: parse_uuid(&id, "lead id")?,
        tenant_id: parse_uuid(&tenant_id, "tenant_id")?,
        name: row.get(2).map_err(row_error)?,
        email: row.get::<String>(3).ok(),
        phone: row.get::<String>(4).ok(),
        company: row.get::<String>(5).ok(),
        status: status.into(),
        source: source.into(),
        tags: json_column(row, 8, "tags")?,
        last_contact_date: optional_datetime(row, 9, "last_contact_date")?,
        created_at: required_datetime(row, 10, "created_at")?,
        updated_at: required_datetime(row, 11, "updated_at")?,
    })
}

/// Column order matches RULE_COLUMNS.
fn row_to_rule(row: &libsql::Row) -> Result<FollowUpRule, DatabaseError> {
    let id: String = row.get(0).map_err(row_error)?;
    let tenant_id: String = row.get(1).map_err(row_error)?;

    Ok(FollowUpRule {
        id: parse_uuid(&id, "rule id")?,
        tenant_id: parse_uuid(&tenant_id, "tenant_id")?,
        name: row.get(2).map_err(row_error)?,
        description: row.get(3).unwrap_or_default(),
        is_active: row.get::<i64>(4).unwrap_or(0) != 0,
        trigger_conditions: json_column(row, 5, "trigger_conditions")?,
        notification_config: json_column(row, 6, "notification_config")?,
        schedule_config: json_column(row, 7, "schedule_config")?,
        created_at: required_datetime(row, 8, "created_at")?,
        updated_at: required_datetime(row, 9, "updated_at")?,
    })
}

/// Column order matches NOTIFICATION_COLUMNS.
fn row_to_notification(row: &libsql::Row) -> Result<Notification, DatabaseError> {
    let id: String = row.get(0).map_err(row_error)?;
    let tenant_id: String = row.get(1).map_err(row_error)?;
    let kind: String = row.get(3).map_err(row_error)?;
    let priority: String = row.get(4).map_err(row_error)?;
    let status: String = row.get(5).map_err(row_error)?;

    Ok(Notification {
        id: parse_uuid(&id, "notification id")?,
        tenant_id: parse_uuid(&tenant_id, "tenant_id")?,
        user_id: optional_uuid(row, 2, "user_id")?,
        notification_type: kind.parse().map_err(DatabaseError::Serialization)?,
        priority: priority.parse().map_err(DatabaseError::Serialization)?,
        status: status.parse().map_err(DatabaseError::Serialization)?,
        title: row.get(6).map_err(row_error)?,
        message: row.get(7).map_err(row_error)?,
        lead_id: optional_uuid(row, 8, "lead_id")?,
        action_url: row.get::<String>(9).ok(),
        scheduled_for: optional_datetime(row, 10, "scheduled_for")?,
        rule_id: optional_uuid(row, 11, "rule_id")?,
        created_at: required_datetime(row, 12, "created_at")?,
        updated_at: required_datetime(row, 13, "updated_at")?,
    })
}

// ── Trait implementations ───────────────────────────────────────────

#[async_trait]
impl LeadRepository for LibSqlBackend {
    async fn fetch_candidate_leads(
        &self,
        tenant_id: Uuid,
        statuses: &[LeadStatus],
        limit: usize,
    ) -> Result<Vec<Lead>, DatabaseError> {
        if statuses.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        // ?1 tenant, ?2 limit, ?3.. statuses
        let placeholders: Vec<String> = (0..statuses.len()).map(|i| format!("?{}", i + 3)).collect();
        let sql = format!(
            "SELECT {LEAD_COLUMNS} FROM leads WHERE tenant_id = ?1 AND status IN ({}) ORDER BY created_at ASC LIMIT ?2",
            placeholders.join(", ")
        );
        let mut values = vec![
            Value::Text(tenant_id.to_string()),
            Value::Integer(limit as i64),
        ];
        values.extend(statuses.iter().map(|s| Value::Text(s.as_str().to_string())));

        let mut rows = self
            .conn()
            .query(&sql, Params::Positional(values))
            .await
            .map_err(|e| DatabaseError::Query(format!("fetch_candidate_leads: {e}")))?;

        let mut leads = Vec::new();
        while let Some(row) = next_row(&mut rows, "fetch_candidate_leads").await? {
            match row_to_lead(&row) {
                Ok(lead) => leads.push(lead),
                Err(e) => warn!(%tenant_id, "Skipping lead row: {e}"),
            }
        }
        debug!(%tenant_id, count = leads.len(), "Fetched candidate leads");
        Ok(leads)
    }
}

impl LibSqlBackend {
    async fn query_rules(
        &self,
        op: &str,
        filter: &str,
        tenant_id: Uuid,
    ) -> Result<Vec<FollowUpRule>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {RULE_COLUMNS} FROM follow_up_rules WHERE tenant_id = ?1 {filter} ORDER BY created_at DESC"),
                params![tenant_id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("{op}: {e}")))?;

        let mut rules = Vec::new();
        while let Some(row) = next_row(&mut rows, op).await? {
            match row_to_rule(&row) {
                Ok(rule) => rules.push(rule),
                Err(e) => warn!(%tenant_id, "Skipping follow-up rule row: {e}"),
            }
        }
        Ok(rules)
    }
}

#[async_trait]
impl RuleRepository for LibSqlBackend {
    async fn fetch_active_rules(&self, tenant_id: Uuid) -> Result<Vec<FollowUpRule>, DatabaseError> {
        self.query_rules("fetch_active_rules", "AND is_active = 1", tenant_id)
            .await
    }

    async fn list_rules(&self, tenant_id: Uuid) -> Result<Vec<FollowUpRule>, DatabaseError> {
        self.query_rules("list_rules", "", tenant_id).await
    }

    async fn get_rule(&self, id: Uuid) -> Result<Option<FollowUpRule>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {RULE_COLUMNS} FROM follow_up_rules WHERE id = ?1"),
                params![id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_rule: {e}")))?;

        match next_row(&mut rows, "get_rule").await? {
            Some(row) => Ok(Some(row_to_rule(&row)?)),
            None => Ok(None),
        }
    }

    async fn insert_rule(&self, rule: &FollowUpRule) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                &format!("INSERT INTO follow_up_rules ({RULE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"),
                params![
                    rule.id.to_string(),
                    rule.tenant_id.to_string(),
                    rule.name.clone(),
                    rule.description.clone(),
                    rule.is_active as i64,
                    to_json(&rule.trigger_conditions)?,
                    to_json(&rule.notification_config)?,
                    to_json(&rule.schedule_config)?,
                    fmt_datetime(rule.created_at),
                    fmt_datetime(rule.updated_at),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("insert_rule: {e}")))?;
        Ok(())
    }

    async fn update_rule(&self, rule: &FollowUpRule) -> Result<(), DatabaseError> {
        let count = self
            .conn()
            .execute(
                "UPDATE follow_up_rules SET name = ?1, description = ?2, is_active = ?3, trigger_conditions = ?4, notification_config = ?5, schedule_config = ?6, updated_at = ?7 WHERE id = ?8",
                params![
                    rule.name.clone(),
                    rule.description.clone(),
                    rule.is_active as i64,
                    to_json(&rule.trigger_conditions)?,
                    to_json(&rule.notification_config)?,
                    to_json(&rule.schedule_config)?,
                    fmt_datetime(rule.updated_at),
                    rule.id.to_string(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("update_rule: {e}")))?;

        if count == 0 {
            return Err(DatabaseError::NotFound {
                entity: "follow_up_rule".into(),
                id: rule.id.to_string(),
            });
        }
        Ok(())
    }

    async fn delete_rule(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let count = self
            .conn()
            .execute(
                "DELETE FROM follow_up_rules WHERE id = ?1",
                params![id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_rule: {e}")))?;
        Ok(count > 0)
    }
}

#[async_trait]
impl NotificationSink for LibSqlBackend {
    async fn find_unread_notification(
        &self,
        tenant_id: Uuid,
        lead_id: Uuid,
        notification_type: NotificationType,
    ) -> Result<Option<Notification>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE tenant_id = ?1 AND lead_id = ?2 AND type = ?3 AND status = 'unread' ORDER BY created_at DESC LIMIT 1"),
                params![
                    tenant_id.to_string(),
                    lead_id.to_string(),
                    notification_type.as_str(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("find_unread_notification: {e}")))?;

        match next_row(&mut rows, "find_unread_notification").await? {
            Some(row) => Ok(Some(row_to_notification(&row)?)),
            None => Ok(None),
        }
    }

    async fn insert_notification(&self, n: &Notification) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                &format!("INSERT INTO notifications ({NOTIFICATION_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"),
                params![
                    n.id.to_string(),
                    n.tenant_id.to_string(),
                    opt_uuid(n.user_id),
                    n.notification_type.as_str(),
                    n.priority.to_string(),
                    n.status.to_string(),
                    n.title.clone(),
                    n.message.clone(),
                    opt_uuid(n.lead_id),
                    opt_text(n.action_url.as_deref()),
                    opt_datetime(n.scheduled_for),
                    opt_uuid(n.rule_id),
                    fmt_datetime(n.created_at),
                    fmt_datetime(n.updated_at),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("insert_notification: {e}")))?;
        Ok(())
    }

    async fn delivery_history(
        &self,
        tenant_id: Uuid,
        lead_id: Uuid,
        notification_type: NotificationType,
    ) -> Result<DeliveryHistory, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT COUNT(*), MAX(created_at) FROM notifications WHERE tenant_id = ?1 AND lead_id = ?2 AND type = ?3",
                params![
                    tenant_id.to_string(),
                    lead_id.to_string(),
                    notification_type.as_str(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("delivery_history: {e}")))?;

        let Some(row) = next_row(&mut rows, "delivery_history").await? else {
            return Ok(DeliveryHistory::default());
        };
        let delivered: i64 = row
            .get(0)
            .map_err(|e| DatabaseError::Query(format!("delivery_history: {e}")))?;
        Ok(DeliveryHistory {
            delivered: u32::try_from(delivered).unwrap_or(u32::MAX),
            last_delivered_at: optional_datetime(&row, 1, "created_at")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::followup::rule::{NewRule, NotificationConfig, ScheduleConfig, TriggerConditions};
    use crate::leads::LeadSource;
    use crate::notifications::NotificationPriority;

    async fn test_db() -> LibSqlBackend {
        LibSqlBackend::new_memory().await.unwrap()
    }

    fn make_rule(tenant_id: Uuid, active: bool) -> FollowUpRule {
        let mut config = NotificationConfig::new(
            NotificationType::FollowUpReminder,
            "Follow up {{lead_name}}",
            "{{days}} days",
        );
        config.priority = NotificationPriority::High;
        config.action_url_template = Some("/leads/{{lead_id}}".into());
        FollowUpRule::from_new(
            tenant_id,
            NewRule {
                name: "Stale event leads".into(),
                description: "Leads from the fair".into(),
                is_active: active,
                trigger_conditions: TriggerConditions {
                    lead_status: Some(vec![LeadStatus::New, LeadStatus::Custom("warm".into())]),
                    lead_source: Some(vec![LeadSource::Event]),
                    tags: Some(vec!["vip".into()]),
                    days_since_created: Some(3),
                    days_since_last_contact: None,
                },
                notification_config: config,
                schedule_config: ScheduleConfig {
                    delay_hours: Some(2),
                    repeat_interval_hours: Some(48),
                    max_repeats: Some(2),
                    business_hours_only: true,
                },
            },
        )
    }

    fn make_notification(tenant_id: Uuid, lead_id: Uuid) -> Notification {
        Notification::new(
            tenant_id,
            NotificationType::FollowUpReminder,
            NotificationPriority::High,
            "Follow up Ana",
            "5 days",
        )
        .with_lead(lead_id)
        .with_action_url(Some("/leads/x".into()))
        .from_rule(Uuid::new_v4())
        .scheduled_for(Utc::now())
    }

    // ── Leads ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn candidate_leads_filtered_ordered_and_limited() {
        let db = test_db().await;
        let tenant = Uuid::new_v4();
        let now = Utc::now();

        for days in [1, 3, 2] {
            let lead = Lead::new(tenant, format!("lead-{days}"), LeadSource::Event)
                .with_tags(["vip"])
                .created_at(now - Duration::days(days));
            db.upsert_lead(&lead).await.unwrap();
        }
        let lost = Lead::new(tenant, "lost", LeadSource::Event).with_status(LeadStatus::Lost);
        db.upsert_lead(&lost).await.unwrap();
        let other = Lead::new(Uuid::new_v4(), "other", LeadSource::Event);
        db.upsert_lead(&other).await.unwrap();

        let eligible = LeadStatus::follow_up_eligible();
        let leads = db.fetch_candidate_leads(tenant, &eligible, 10).await.unwrap();
        let names: Vec<&str> = leads.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["lead-3", "lead-2", "lead-1"]);
        assert_eq!(leads[0].tags, vec!["vip".to_string()]);

        let limited = db.fetch_candidate_leads(tenant, &eligible, 2).await.unwrap();
        assert_eq!(limited.len(), 2);

        let none = db.fetch_candidate_leads(tenant, &[], 10).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn lead_fields_round_trip() {
        let db = test_db().await;
        let tenant = Uuid::new_v4();
        let contacted = Utc::now() - Duration::days(2);
        let mut lead = Lead::new(tenant, "Ana Costa", LeadSource::Custom("webinar".into()))
            .with_status(LeadStatus::Custom("warm".into()))
            .with_email("ana@example.com")
            .last_contacted(contacted);
        lead.company = Some("Acme".into());
        db.upsert_lead(&lead).await.unwrap();

        let warm = [LeadStatus::Custom("warm".into())];
        let got = db.fetch_candidate_leads(tenant, &warm, 1).await.unwrap();
        let got = &got[0];
        assert_eq!(got.id, lead.id);
        assert_eq!(got.email.as_deref(), Some("ana@example.com"));
        assert_eq!(got.phone, None);
        assert_eq!(got.company.as_deref(), Some("Acme"));
        assert_eq!(got.source, LeadSource::Custom("webinar".into()));
        assert_eq!(
            got.last_contact_date.map(|d| d.timestamp_micros()),
            Some(contacted.timestamp_micros())
        );
    }

    #[tokio::test]
    async fn malformed_lead_row_skipped() {
        let db = test_db().await;
        let tenant = Uuid::new_v4();
        db.upsert_lead(&Lead::new(tenant, "good", LeadSource::Website))
            .await
            .unwrap();
        db.conn()
            .execute(
                "INSERT INTO leads (id, tenant_id, name, status, source, tags, created_at, updated_at) VALUES (?1, ?2, 'bad', 'new', 'website', '[]', 'yesterday', 'yesterday')",
                params![Uuid::new_v4().to_string(), tenant.to_string()],
            )
            .await
            .unwrap();

        let leads = db
            .fetch_candidate_leads(tenant, &LeadStatus::follow_up_eligible(), 10)
            .await
            .unwrap();
        assert_eq!(leads.len(), 1);
        assert_eq!(leads[0].name, "good");
    }

    // ── Rules ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn rule_round_trip() {
        let db = test_db().await;
        let rule = make_rule(Uuid::new_v4(), true);
        db.insert_rule(&rule).await.unwrap();

        let got = db.get_rule(rule.id).await.unwrap().unwrap();
        assert_eq!(got.name, rule.name);
        assert_eq!(got.description, rule.description);
        assert_eq!(got.trigger_conditions, rule.trigger_conditions);
        assert_eq!(got.notification_config, rule.notification_config);
        assert_eq!(got.schedule_config, rule.schedule_config);
        assert!(got.is_active);

        assert!(db.get_rule(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn active_rules_filtered_by_tenant_and_flag() {
        let db = test_db().await;
        let tenant = Uuid::new_v4();
        db.insert_rule(&make_rule(tenant, true)).await.unwrap();
        db.insert_rule(&make_rule(tenant, false)).await.unwrap();
        db.insert_rule(&make_rule(Uuid::new_v4(), true)).await.unwrap();

        assert_eq!(db.list_rules(tenant).await.unwrap().len(), 2);
        let active = db.fetch_active_rules(tenant).await.unwrap();
        assert_eq!(active.len(), 1);
        assert!(active[0].is_active);
    }

    #[tokio::test]
    async fn update_and_delete_rule() {
        let db = test_db().await;
        let mut rule = make_rule(Uuid::new_v4(), true);
        db.insert_rule(&rule).await.unwrap();

        rule.is_active = false;
        rule.schedule_config.business_hours_only = false;
        db.update_rule(&rule).await.unwrap();
        let got = db.get_rule(rule.id).await.unwrap().unwrap();
        assert!(!got.is_active);
        assert!(!got.schedule_config.business_hours_only);

        assert!(db.delete_rule(rule.id).await.unwrap());
        assert!(!db.delete_rule(rule.id).await.unwrap());

        let err = db.update_rule(&rule).await.unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }

    #[tokio::test]
    async fn malformed_rule_row_skipped() {
        let db = test_db().await;
        let tenant = Uuid::new_v4();
        db.insert_rule(&make_rule(tenant, true)).await.unwrap();
        db.conn()
            .execute(
                "INSERT INTO follow_up_rules (id, tenant_id, name, is_active, trigger_conditions, notification_config, created_at, updated_at) VALUES (?1, ?2, 'broken', 1, 'not json', '{}', ?3, ?3)",
                params![
                    Uuid::new_v4().to_string(),
                    tenant.to_string(),
                    fmt_datetime(Utc::now()),
                ],
            )
            .await
            .unwrap();

        let active = db.fetch_active_rules(tenant).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].name, "Stale event leads");
    }

    // ── Notifications ───────────────────────────────────────────────

    #[tokio::test]
    async fn unread_lookup_and_history() {
        let db = test_db().await;
        let tenant = Uuid::new_v4();
        let lead_id = Uuid::new_v4();

        let n = make_notification(tenant, lead_id);
        db.insert_notification(&n).await.unwrap();

        let found = db
            .find_unread_notification(tenant, lead_id, NotificationType::FollowUpReminder)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, n.id);
        assert_eq!(found.rule_id, n.rule_id);
        assert_eq!(found.action_url.as_deref(), Some("/leads/x"));
        assert_eq!(found.priority, NotificationPriority::High);

        // Other type does not count.
        let other = db
            .find_unread_notification(tenant, lead_id, NotificationType::Reminder)
            .await
            .unwrap();
        assert!(other.is_none());

        assert!(db.set_notification_status(n.id, NotificationStatus::Read).await.unwrap());
        let after_read = db
            .find_unread_notification(tenant, lead_id, NotificationType::FollowUpReminder)
            .await
            .unwrap();
        assert!(after_read.is_none());

        let history = db
            .delivery_history(tenant, lead_id, NotificationType::FollowUpReminder)
            .await
            .unwrap();
        assert_eq!(history.delivered, 1);
        assert_eq!(
            history.last_delivered_at.map(|d| d.timestamp_micros()),
            Some(n.created_at.timestamp_micros())
        );

        let empty = db
            .delivery_history(tenant, Uuid::new_v4(), NotificationType::FollowUpReminder)
            .await
            .unwrap();
        assert_eq!(empty, DeliveryHistory::default());

        assert_eq!(db.list_notifications(tenant).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn local_file_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("followup.db");
        let tenant = Uuid::new_v4();

        {
            let db = LibSqlBackend::new_local(&path).await.unwrap();
            db.insert_rule(&make_rule(tenant, true)).await.unwrap();
        }

        let db = LibSqlBackend::new_local(&path).await.unwrap();
        assert_eq!(db.list_rules(tenant).await.unwrap().len(), 1);
    }
}
