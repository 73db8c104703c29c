use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use core_lib::CoreError;
use sqlx::PgPool;
use tracing::{debug, info};

use crate::migrations::migrations_for;
use crate::naming::SchemaClass;

/// Ledger table kept inside each schema.
pub const MIGRATIONS_TABLE: &str = "schema_migrations";

/// One versioned schema-change script with a required inverse.
///
/// Names follow `m<timestamp-millis>_<slug>`; the timestamp prefix is the
/// sort key, so ascending name order is application order.
#[async_trait]
pub trait Migration: Send + Sync {
    fn name(&self) -> &'static str;
    async fn up(&self, pool: &PgPool) -> Result<(), sqlx::Error>;
    async fn down(&self, pool: &PgPool) -> Result<(), sqlx::Error>;
}

/// Applies a fixed, ordered script set against one schema-scoped connection,
/// tracked through the per-schema ledger.
pub struct MigrationRunner {
    scripts: Vec<Arc<dyn Migration>>,
}

impl MigrationRunner {
    pub fn new(mut scripts: Vec<Arc<dyn Migration>>) -> Self {
        scripts.sort_by_key(|script| script.name());
        Self { scripts }
    }

    /// Runner over the static script set for a schema class.
    pub fn for_class(class: SchemaClass) -> Self {
        Self::new(migrations_for(class))
    }

    /// Applies every pending script in ascending order and returns how many
    /// ran. Each script is its own failure boundary: the first failure
    /// aborts the call with the script's name, and the ledger keeps exactly
    /// the scripts that succeeded before it. No automatic rollback.
    pub async fn run(&self, pool: &PgPool) -> Result<usize, CoreError> {
        self.ensure_ledger(pool).await?;
        let applied = self.applied(pool).await?;

        let mut count = 0;
        for script in &self.scripts {
            if applied.contains(script.name()) {
                continue;
            }
            debug!(script = script.name(), "applying migration");
            script
                .up(pool)
                .await
                .map_err(|err| CoreError::MigrationFailed {
                    script: script.name().to_string(),
                    source: Box::new(err),
                })?;
            sqlx::query(&format!(
                "INSERT INTO {MIGRATIONS_TABLE} (name) VALUES ($1)"
            ))
            .bind(script.name())
            .execute(pool)
            .await
            .map_err(|err| CoreError::MigrationFailed {
                script: script.name().to_string(),
                source: Box::new(err),
            })?;
            count += 1;
        }

        if count > 0 {
            info!(count, "applied migrations");
        } else {
            debug!("no pending migrations");
        }
        Ok(count)
    }

    /// Reverts exactly the most-recently-applied script and removes its
    /// ledger entry. Fails with `NoMigrationsApplied` on an empty ledger.
    pub async fn revert_last(&self, pool: &PgPool) -> Result<String, CoreError> {
        self.ensure_ledger(pool).await?;
        let last: Option<String> = sqlx::query_scalar(&format!(
            "SELECT name FROM {MIGRATIONS_TABLE} ORDER BY applied_at DESC, name DESC LIMIT 1"
        ))
        .fetch_optional(pool)
        .await?;
        let name = last.ok_or(CoreError::NoMigrationsApplied)?;

        let script = self
            .scripts
            .iter()
            .find(|script| script.name() == name)
            .ok_or_else(|| CoreError::MigrationFailed {
                script: name.clone(),
                source: "ledger entry has no matching script in the migration set".into(),
            })?;

        script
            .down(pool)
            .await
            .map_err(|err| CoreError::MigrationFailed {
                script: name.clone(),
                source: Box::new(err),
            })?;
        sqlx::query(&format!("DELETE FROM {MIGRATIONS_TABLE} WHERE name = $1"))
            .bind(&name)
            .execute(pool)
            .await?;

        info!(script = %name, "reverted migration");
        Ok(name)
    }

    /// Ledger entries currently recorded for this schema.
    pub async fn applied(&self, pool: &PgPool) -> Result<HashSet<String>, CoreError> {
        let names: Vec<String> =
            sqlx::query_scalar(&format!("SELECT name FROM {MIGRATIONS_TABLE}"))
                .fetch_all(pool)
                .await?;
        Ok(names.into_iter().collect())
    }

    async fn ensure_ledger(&self, pool: &PgPool) -> Result<(), CoreError> {
        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {MIGRATIONS_TABLE} (
                name VARCHAR(255) PRIMARY KEY,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )"
        ))
        .execute(pool)
        .await?;
        Ok(())
    }
}
