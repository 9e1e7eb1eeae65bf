//! Persistence layer: the capabilities the engine consumes, plus two backends.

pub mod libsql_backend;
pub mod memory;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use memory::InMemoryStore;
pub use traits::{DeliveryHistory, LeadRepository, NotificationSink, RuleRepository};
