use std::error::Error as StdError;

// Declare modules
pub mod adapters;
pub mod config;
pub mod domain;

/// Common error type for the tenancy core and its collaborators.
#[derive(thiserror::Error, Debug)]
pub enum CoreError {
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),
    #[error("Tenant not found: {0}")]
    NotFound(String),
    #[error("Already exists: {0}")]
    AlreadyExists(String),
    #[error("Tenant is not active: {0}")]
    TenantNotActive(String),
    #[error("Tenant is not ready: {domain} (provisioning state: {state})")]
    TenantNotReady { domain: String, state: String },
    #[error("Schema operation failed: {0}")]
    SchemaOperationFailed(String),
    #[error("Migration failed: {script}: {source}")]
    MigrationFailed {
        script: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
    #[error("No migrations have been applied")]
    NoMigrationsApplied,
    #[error("Connection pool exhausted: {0}")]
    PoolExhausted(String),
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Infrastructure error: {0}")]
    Infrastructure(#[from] Box<dyn StdError + Send + Sync>),
}

// Pool-acquire timeouts are transient and must stay distinguishable from
// other database failures; everything else wraps as Infrastructure.
impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => {
                CoreError::PoolExhausted("timed out acquiring a connection from the pool".into())
            }
            other => CoreError::Infrastructure(Box::new(other)),
        }
    }
}

impl CoreError {
    /// Whether a caller may safely retry the failed operation as-is.
    pub fn is_transient(&self) -> bool {
        matches!(self, CoreError::PoolExhausted(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_timeout_maps_to_pool_exhausted() {
        let err: CoreError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, CoreError::PoolExhausted(_)));
        assert!(err.is_transient());
    }

    #[test]
    fn other_db_errors_map_to_infrastructure() {
        let err: CoreError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, CoreError::Infrastructure(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn migration_failed_reports_script_name() {
        let err = CoreError::MigrationFailed {
            script: "m1717517293824_seed_role_types".into(),
            source: Box::new(sqlx::Error::RowNotFound),
        };
        assert!(err.to_string().contains("m1717517293824_seed_role_types"));
    }
}
