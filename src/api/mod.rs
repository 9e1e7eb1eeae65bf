//! HTTP control surface for the follow-up service.

pub mod routes;

pub use routes::{ApiState, follow_up_routes};
