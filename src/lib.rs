//! Rule-driven lead follow-up notifications for a
//! multi-tenant CRM.

pub mod api;
pub mod config;
pub mod error;
pub mod followup;
pub mod leads;
pub mod notifications;
pub mod store;
