//! Follow-up service: timer lifecycle, stats and rule CRUD around the engine.
//!
//! The timer is self-rescheduling: the next pass is armed only after the
//! current one settles. Passes are serialized through `pass_lock`; a timer
//! tick that finds a pass in flight is skipped, while `force_process` waits.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::{ConfigUpdate, EngineConfig};
use crate::error::{ConfigError, EngineError, RuleError};
use crate::followup::engine::FollowUpEngine;
use crate::followup::rule::{FollowUpRule, NewRule, RulePatch};
use crate::followup::rule_store::RuleStore;
use crate::followup::stats::{EngineStats, PassSummary};
use crate::store::traits::{LeadRepository, NotificationSink, RuleRepository};

/// Handle to the running timer task.
struct Timer {
    stop: Arc<Notify>,
    handle: JoinHandle<()>,
}

struct Inner {
    engine: FollowUpEngine,
    rules: RuleStore,
    config: Mutex<EngineConfig>,
    stats: Mutex<EngineStats>,
    timer: Mutex<Option<Timer>>,
    pass_lock: tokio::sync::Mutex<()>,
}

/// Public face of the follow-up engine. Cheap to clone.
#[derive(Clone)]
pub struct FollowUpService {
    inner: Arc<Inner>,
}

impl FollowUpService {
    pub fn new(
        config: EngineConfig,
        leads: Arc<dyn LeadRepository>,
        rules: Arc<dyn RuleRepository>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        let rule_store = RuleStore::new(config.tenant_id, rules.clone());
        let inner = Inner {
            engine: FollowUpEngine::new(leads, rules, sink),
            rules: rule_store,
            config: Mutex::new(config),
            stats: Mutex::new(EngineStats::default()),
            timer: Mutex::new(None),
            pass_lock: tokio::sync::Mutex::new(()),
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Arm the timer. No-op with a warning when already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        let mut timer = lock(&self.inner.timer);
        if timer.is_some() {
            warn!("Follow-up engine already running");
            return;
        }

        let stop = Arc::new(Notify::new());
        let handle = tokio::spawn(run_timer(Arc::clone(&self.inner), Arc::clone(&stop)));
        *timer = Some(Timer { stop, handle });

        let (tenant_id, interval_minutes) = {
            let config = lock(&self.inner.config);
            (config.tenant_id, config.check_interval_minutes)
        };
        info!(%tenant_id, interval_minutes, "Follow-up engine started");
    }

    /// Disarm the timer. An in-flight pass runs to completion.
    pub fn stop(&self) {
        let Some(timer) = lock(&self.inner.timer).take() else {
            debug!("Follow-up engine already stopped");
            return;
        };
        // A stored permit covers the case where the task is mid-pass.
        timer.stop.notify_one();
        drop(timer.handle);
        info!("Follow-up engine stopped");
    }

    pub fn is_running(&self) -> bool {
        lock(&self.inner.timer).is_some()
    }

    /// Run one pass now, waiting for any in-flight pass first.
    pub async fn force_process(&self) -> Result<PassSummary, EngineError> {
        let _pass = self.inner.pass_lock.lock().await;
        self.inner.process_at(Utc::now()).await
    }

    /// Apply a runtime config change. Changing the interval while running
    /// restarts the timer; other values apply from the next pass.
    pub fn update_config(&self, update: ConfigUpdate) -> Result<EngineStats, ConfigError> {
        let interval_changed = {
            let mut config = lock(&self.inner.config);
            let before = config.check_interval_minutes;
            config.apply(&update)?;
            config.check_interval_minutes != before
        };

        if interval_changed && self.is_running() {
            self.stop();
            self.start();
        }

        info!(?update, "Follow-up config updated");
        Ok(self.get_stats())
    }

    /// Snapshot of the current stats.
    pub fn get_stats(&self) -> EngineStats {
        let mut stats = lock(&self.inner.stats).clone();
        stats.is_running = self.is_running();
        stats.check_interval_minutes = lock(&self.inner.config).check_interval_minutes;
        stats
    }

    pub fn config(&self) -> EngineConfig {
        lock(&self.inner.config).clone()
    }

    pub async fn create_rule(&self, new: NewRule) -> Result<FollowUpRule, RuleError> {
        self.inner.rules.create_rule(new).await
    }

    pub async fn update_rule(&self, id: Uuid, patch: RulePatch) -> Result<FollowUpRule, RuleError> {
        self.inner.rules.update_rule(id, patch).await
    }

    pub async fn delete_rule(&self, id: Uuid) -> Result<(), RuleError> {
        self.inner.rules.delete_rule(id).await
    }

    pub async fn toggle_rule(&self, id: Uuid) -> Result<FollowUpRule, RuleError> {
        self.inner.rules.toggle_rule(id).await
    }

    pub async fn list_rules(&self) -> Result<Vec<FollowUpRule>, RuleError> {
        self.inner.rules.list_rules().await
    }

    pub async fn get_rule(&self, id: Uuid) -> Result<FollowUpRule, RuleError> {
        self.inner.rules.get_rule(id).await
    }
}

impl Inner {
    /// Caller must hold `pass_lock`.
    async fn process_at(&self, now: DateTime<Utc>) -> Result<PassSummary, EngineError> {
        let config = lock(&self.config).clone();
        match self.engine.run_pass(&config, now).await {
            Ok(summary) => {
                lock(&self.stats).record_pass(&summary, now);
                Ok(summary)
            }
            Err(e) => {
                error!(tenant_id = %config.tenant_id, error = %e, "Follow-up pass failed");
                Err(e)
            }
        }
    }

    async fn tick(&self) {
        let Ok(_pass) = self.pass_lock.try_lock() else {
            debug!("Follow-up pass already in flight, skipping tick");
            return;
        };
        // Errors are logged in process_at; the next tick is the retry.
        let _ = self.process_at(Utc::now()).await;
    }
}

async fn run_timer(inner: Arc<Inner>, stop: Arc<Notify>) {
    loop {
        let interval = lock(&inner.config).check_interval();
        tokio::select! {
            _ = stop.notified() => break,
            _ = tokio::time::sleep(interval) => {}
        }
        inner.tick().await;
    }
    debug!("Follow-up timer exited");
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
