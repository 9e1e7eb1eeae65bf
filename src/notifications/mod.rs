//! Notifications produced by the follow-up engine.

pub mod model;

pub use model::{Notification, NotificationPriority, NotificationStatus, NotificationType};
