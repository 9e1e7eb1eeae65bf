//! Follow-up rule engine.
//!
//! Leaf modules are pure ([`matcher`], [`template`], [`schedule`]); [`guard`]
//! and [`engine`] talk to the store traits; [`service`] owns the timer.

pub mod engine;
pub mod guard;
pub mod matcher;
pub mod rule;
pub mod rule_store;
pub mod schedule;
pub mod service;
pub mod stats;
pub mod template;

pub use engine::FollowUpEngine;
pub use rule::{FollowUpRule, NewRule, NotificationConfig, RulePatch, ScheduleConfig, TriggerConditions};
pub use rule_store::RuleStore;
pub use schedule::BusinessHours;
pub use service::FollowUpService;
pub use stats::{EngineStats, PassSummary};
