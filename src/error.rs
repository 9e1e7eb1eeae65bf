//! Error types for the follow-up engine.

use uuid::Uuid;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Rule error: {0}")]
    Rule(#[from] RuleError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Rule store errors.
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    #[error("Rule {id} not found")]
    NotFound { id: Uuid },

    #[error("Invalid rule: {reason}")]
    Validation { reason: String },

    #[error("Unknown placeholder {{{{{placeholder}}}}} in {field}")]
    UnknownPlaceholder { field: String, placeholder: String },

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// Errors that abort a processing pass.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Failed to fetch candidate leads: {0}")]
    LeadFetch(#[source] DatabaseError),

    #[error("Failed to fetch active rules: {0}")]
    RuleFetch(#[source] DatabaseError),
}

/// Result type alias for the engine.
pub type Result<T> = std::result::Result<T, Error>;
