//! Leads consumed by the follow-up engine.

pub mod model;

pub use model::{Lead, LeadSource, LeadStatus};
