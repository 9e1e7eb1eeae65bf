//! Process-local counters and per-pass results.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Snapshot of engine state returned by `get_stats`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    pub is_running: bool,
    pub check_interval_minutes: u64,
    pub last_processed_at: Option<DateTime<Utc>>,
    pub total_notifications_sent: u64,
    /// Leads that matched at least one rule, summed over passes.
    pub total_leads_processed: u64,
}

/// Result of one processing pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PassSummary {
    pub leads_scanned: usize,
    pub rules_evaluated: usize,
    pub leads_matched: usize,
    pub notifications_sent: usize,
    pub suppressed: usize,
    pub failed: usize,
}

impl EngineStats {
    /// Fold a completed pass into the running totals.
    pub fn record_pass(&mut self, summary: &PassSummary, at: DateTime<Utc>) {
        self.last_processed_at = Some(at);
        self.total_leads_processed += summary.leads_matched as u64;
        self.total_notifications_sent += summary.notifications_sent as u64;
    }
}
