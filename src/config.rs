//! Configuration types.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::{FixedOffset, Local, Offset};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ConfigError;
use crate::followup::schedule::BusinessHours;
use crate::leads::LeadStatus;

const DEFAULT_CHECK_INTERVAL_MINUTES: u64 = 5;
const DEFAULT_BATCH_SIZE: usize = 50;
const DEFAULT_MAX_RETRIES: u32 = 3;
/// One week.
const MAX_CHECK_INTERVAL_MINUTES: u64 = 7 * 24 * 60;

/// Follow-up engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Tenant whose leads and rules this engine processes.
    pub tenant_id: Uuid,
    /// Minutes between the end of one pass and the start of the next.
    pub check_interval_minutes: u64,
    /// Maximum leads pulled per pass.
    pub batch_size: usize,
    /// Extra attempts for a failed notification insert within a pass.
    pub max_retries: u32,
    /// Lead statuses eligible for automatic follow-up.
    pub eligible_statuses: Vec<LeadStatus>,
    pub business_hours: BusinessHours,
    /// Arm the timer when the binary starts.
    pub auto_start: bool,
}

impl EngineConfig {
    /// Defaults for `tenant_id`, with business hours in host-local time.
    pub fn new(tenant_id: Uuid) -> Self {
        Self {
            tenant_id,
            check_interval_minutes: DEFAULT_CHECK_INTERVAL_MINUTES,
            batch_size: DEFAULT_BATCH_SIZE,
            max_retries: DEFAULT_MAX_RETRIES,
            eligible_statuses: LeadStatus::follow_up_eligible(),
            business_hours: BusinessHours::with_offset(Local::now().offset().fix()),
            auto_start: false,
        }
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_minutes.saturating_mul(60))
    }

    /// Build config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let tenant_raw = lookup("FOLLOWUP_TENANT_ID")
            .ok_or_else(|| ConfigError::MissingEnvVar("FOLLOWUP_TENANT_ID".into()))?;
        let tenant_id = parse_value::<Uuid>("FOLLOWUP_TENANT_ID", &tenant_raw)?;

        let mut config = Self::new(tenant_id);
        config.check_interval_minutes = parse_or(
            &lookup,
            "FOLLOWUP_CHECK_INTERVAL_MINUTES",
            config.check_interval_minutes,
        )?;
        config.batch_size = parse_or(&lookup, "FOLLOWUP_BATCH_SIZE", config.batch_size)?;
        config.max_retries = parse_or(&lookup, "FOLLOWUP_MAX_RETRIES", config.max_retries)?;
        config.auto_start = parse_or(&lookup, "FOLLOWUP_AUTO_START", config.auto_start)?;

        if let Some(raw) = lookup("FOLLOWUP_ELIGIBLE_STATUSES") {
            let statuses: Vec<LeadStatus> = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| LeadStatus::from(s.to_string()))
                .collect();
            if statuses.is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: "FOLLOWUP_ELIGIBLE_STATUSES".into(),
                    message: "at least one status is required".into(),
                });
            }
            config.eligible_statuses = statuses;
        }

        if let Some(raw) = lookup("FOLLOWUP_BUSINESS_UTC_OFFSET_MINUTES") {
            let minutes = parse_value::<i32>("FOLLOWUP_BUSINESS_UTC_OFFSET_MINUTES", &raw)?;
            let offset = minutes
                .checked_mul(60)
                .and_then(FixedOffset::east_opt)
                .ok_or_else(|| ConfigError::InvalidValue {
                    key: "FOLLOWUP_BUSINESS_UTC_OFFSET_MINUTES".into(),
                    message: format!("{minutes} is not a valid UTC offset"),
                })?;
            config.business_hours = BusinessHours::with_offset(offset);
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.check_interval_minutes == 0 {
            return Err(ConfigError::InvalidValue {
                key: "check_interval_minutes".into(),
                message: "must be at least 1".into(),
            });
        }
        if self.check_interval_minutes > MAX_CHECK_INTERVAL_MINUTES {
            return Err(ConfigError::InvalidValue {
                key: "check_interval_minutes".into(),
                message: format!("must be at most {MAX_CHECK_INTERVAL_MINUTES}"),
            });
        }
        if self.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "batch_size".into(),
                message: "must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// Apply a runtime update, validating the result before committing it.
    pub fn apply(&mut self, update: &ConfigUpdate) -> Result<(), ConfigError> {
        let mut next = self.clone();
        if let Some(minutes) = update.check_interval_minutes {
            next.check_interval_minutes = minutes;
        }
        if let Some(batch_size) = update.batch_size {
            next.batch_size = batch_size;
        }
        if let Some(max_retries) = update.max_retries {
            next.max_retries = max_retries;
        }
        next.validate()?;
        *self = next;
        Ok(())
    }
}

/// Runtime-adjustable subset of [`EngineConfig`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigUpdate {
    #[serde(default)]
    pub check_interval_minutes: Option<u64>,
    #[serde(default)]
    pub batch_size: Option<usize>,
    #[serde(default)]
    pub max_retries: Option<u32>,
}

/// Settings for the standalone binary.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub db_path: PathBuf,
    pub http_port: u16,
}

impl ServerConfig {
    /// Build server config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let db_path = lookup("FOLLOWUP_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./data/followup.db"));
        let http_port = parse_or(&lookup, "FOLLOWUP_HTTP_PORT", 8080u16)?;
        Ok(Self { db_path, http_port })
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("{raw:?}: {e}"),
    })
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}
