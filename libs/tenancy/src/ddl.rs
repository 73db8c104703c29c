use core_lib::CoreError;
use sqlx::PgPool;
use tracing::{error, info};

use crate::naming::validate_schema_name;

/// Schema DDL against the shared control connection.
///
/// Schema names cannot be bound as statement parameters, so every operation
/// validates the name against the identifier allow-list before it is
/// interpolated. DDL and catalog-probe failures degrade to `false` with an
/// error log instead of propagating, so batch provisioning can continue past
/// a single broken tenant.
#[derive(Debug, Clone)]
pub struct SchemaDdl {
    pool: PgPool,
}

impl SchemaDdl {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Catalog probe. A probe failure is reported as "absent", never as an
    /// error; callers re-create idempotently.
    pub async fn schema_exists(&self, name: &str) -> Result<bool, CoreError> {
        validate_schema_name(name)?;
        let probe = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM information_schema.schemata WHERE schema_name = $1)",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await;

        match probe {
            Ok(exists) => Ok(exists),
            Err(err) => {
                error!(schema = name, error = %err, "schema existence check failed; assuming absent");
                Ok(false)
            }
        }
    }

    /// `CREATE SCHEMA IF NOT EXISTS`; idempotent. Returns `false` on failure.
    pub async fn create_schema(&self, name: &str) -> Result<bool, CoreError> {
        validate_schema_name(name)?;
        let statement = format!("CREATE SCHEMA IF NOT EXISTS \"{name}\"");
        match sqlx::query(&statement).execute(&self.pool).await {
            Ok(_) => {
                info!(schema = name, "schema created");
                Ok(true)
            }
            Err(err) => {
                error!(schema = name, error = %err, "failed to create schema");
                Ok(false)
            }
        }
    }

    /// `DROP SCHEMA IF EXISTS ... CASCADE`; destroys all contained objects.
    /// Only the tenant registry's deletion path and operator tooling may
    /// call this. Returns `false` on failure.
    pub async fn drop_schema(&self, name: &str) -> Result<bool, CoreError> {
        validate_schema_name(name)?;
        let statement = format!("DROP SCHEMA IF EXISTS \"{name}\" CASCADE");
        match sqlx::query(&statement).execute(&self.pool).await {
            Ok(_) => {
                info!(schema = name, "schema dropped");
                Ok(true)
            }
            Err(err) => {
                error!(schema = name, error = %err, "failed to drop schema");
                Ok(false)
            }
        }
    }
}
