use std::sync::Arc;

use chrono::{Duration, Utc};
use core_lib::CoreError;
use core_lib::adapters::record_cache::TenantRecordCache;
use core_lib::config::TenancyConfig;
use core_lib::domain::tenant::{
    NewTenant, ProvisioningState, TenantPatch, TenantRecord, TenantStatus,
};
use serde_json::json;
use sqlx::PgPool;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::connections::SchemaConnections;
use crate::ddl::SchemaDdl;
use crate::migrate::MigrationRunner;
use crate::naming::{SchemaClass, resolve_schema_name, with_random_suffix};
use crate::seed::seed_tenant_defaults;

const TENANT_COLUMNS: &str = "id, name, domain, schema_name, tenant_type, status, \
     provisioning_state, description, settings, contact, trial_start_date, trial_end_date, \
     last_access_at, created_at, updated_at";

/// Bounded retries when two domains collapse to the same cleaned schema name.
const MAX_NAME_ATTEMPTS: usize = 5;

/// CRUD over the control-schema `tenants` table plus the schema lifecycle
/// side effects: provisioning on create, cascade-drop on delete. The single
/// source of truth for the domain -> schema-name -> status mapping.
pub struct TenantRegistry {
    control: PgPool,
    ddl: SchemaDdl,
    connections: Arc<SchemaConnections>,
    cache: TenantRecordCache,
    config: TenancyConfig,
}

impl TenantRegistry {
    pub fn new(
        control: PgPool,
        connections: Arc<SchemaConnections>,
        cache: TenantRecordCache,
        config: TenancyConfig,
    ) -> Self {
        let ddl = SchemaDdl::new(control.clone());
        Self::with_ddl(control, ddl, connections, cache, config)
    }

    /// Like `new`, but with the DDL handle supplied by the caller. Lets
    /// tests drive the registry against a DDL connection that fails
    /// independently of the control connection.
    pub fn with_ddl(
        control: PgPool,
        ddl: SchemaDdl,
        connections: Arc<SchemaConnections>,
        cache: TenantRecordCache,
        config: TenancyConfig,
    ) -> Self {
        Self {
            control,
            ddl,
            connections,
            cache,
            config,
        }
    }

    pub fn connections(&self) -> &Arc<SchemaConnections> {
        &self.connections
    }

    pub fn ddl(&self) -> &SchemaDdl {
        &self.ddl
    }

    /// Registers a tenant. The record starts as TRIAL / NOT_STARTED; when
    /// auto-provisioning is on, the schema is created and migrated
    /// synchronously. A provisioning failure leaves the row in place so the
    /// caller can retry `provision_tenant` later.
    pub async fn create_tenant(&self, spec: NewTenant) -> Result<TenantRecord, CoreError> {
        spec.validate()?;

        if self.fetch_by_domain(&spec.domain).await?.is_some() {
            return Err(CoreError::AlreadyExists(spec.domain));
        }

        let schema_name = self.allocate_schema_name(&spec.domain).await?;
        let trial_start = Utc::now();
        let trial_end = trial_start + Duration::days(self.config.trial_days);
        let contact = spec.contact_email.map(|email| json!({ "email": email }));

        let record: TenantRecord = sqlx::query_as(&format!(
            "INSERT INTO tenants \
                 (id, name, domain, schema_name, tenant_type, status, provisioning_state, \
                  description, contact, trial_start_date, trial_end_date) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING {TENANT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&spec.name)
        .bind(&spec.domain)
        .bind(&schema_name)
        .bind(spec.tenant_type.as_str())
        .bind(TenantStatus::Trial.as_str())
        .bind(ProvisioningState::NotStarted.as_str())
        .bind(&spec.description)
        .bind(&contact)
        .bind(trial_start)
        .bind(trial_end)
        .fetch_one(&self.control)
        .await
        .map_err(|err| map_unique_violation(err, &record_key(&spec.domain)))?;

        info!(domain = %record.domain, schema = %record.schema_name, "tenant created");

        if self.config.auto_provision {
            return self.provision_tenant(&record.domain).await;
        }
        Ok(record)
    }

    /// Brings a tenant's schema to READY, resuming from wherever a previous
    /// attempt stopped. Idempotent: READY tenants return immediately.
    pub async fn provision_tenant(&self, domain: &str) -> Result<TenantRecord, CoreError> {
        let mut record = self
            .fetch_by_domain(domain)
            .await?
            .ok_or_else(|| CoreError::NotFound(domain.to_string()))?;

        if record.provisioning_state == ProvisioningState::Ready {
            debug!(domain, "tenant already provisioned");
            return Ok(record);
        }

        if record.provisioning_state == ProvisioningState::NotStarted {
            let created = self.ddl.create_schema(&record.schema_name).await?;
            if !created {
                return Err(CoreError::SchemaOperationFailed(format!(
                    "could not create schema {} for tenant {domain}",
                    record.schema_name
                )));
            }
            record = self
                .set_provisioning_state(record.id, ProvisioningState::SchemaCreated)
                .await?;
        }

        // State is SCHEMA_CREATED here: migrate, then seed, on the tenant's
        // own pooled connection. A failure leaves the state as-is for retry;
        // the ledger keeps whatever prefix of scripts already ran.
        let pool = self.connections.get(&record.schema_name).await?;
        let applied = MigrationRunner::for_class(SchemaClass::Tenant)
            .run(&pool)
            .await?;
        seed_tenant_defaults(&pool, record.tenant_type).await?;

        let record = self
            .set_provisioning_state(record.id, ProvisioningState::Ready)
            .await?;
        self.cache.invalidate(&record.domain).await;

        info!(
            domain = %record.domain,
            schema = %record.schema_name,
            migrations = applied,
            "tenant provisioned"
        );
        Ok(record)
    }

    /// The per-request lookup: one indexed SELECT, fronted by the record
    /// cache. No schema-level I/O happens here.
    pub async fn get_tenant_by_domain(&self, domain: &str) -> Result<TenantRecord, CoreError> {
        if let Some(hit) = self.cache.get(domain).await {
            return Ok(hit);
        }
        let record = self
            .fetch_by_domain(domain)
            .await?
            .ok_or_else(|| CoreError::NotFound(domain.to_string()))?;
        self.cache.insert(record.clone()).await;
        Ok(record)
    }

    pub async fn get_tenant_by_id(&self, id: Uuid) -> Result<TenantRecord, CoreError> {
        self.fetch_by_id(id)
            .await?
            .ok_or_else(|| CoreError::NotFound(id.to_string()))
    }

    pub async fn list_tenants(
        &self,
        page: u32,
        per_page: u32,
    ) -> Result<(Vec<TenantRecord>, i64), CoreError> {
        let page = page.max(1);
        let offset = i64::from(page - 1) * i64::from(per_page);

        let records: Vec<TenantRecord> = sqlx::query_as(&format!(
            "SELECT {TENANT_COLUMNS} FROM tenants ORDER BY created_at DESC LIMIT $1 OFFSET $2"
        ))
        .bind(i64::from(per_page))
        .bind(offset)
        .fetch_all(&self.control)
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tenants")
            .fetch_one(&self.control)
            .await?;

        Ok((records, total))
    }

    pub async fn subscription_count(&self, id: Uuid) -> Result<i64, CoreError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM subscriptions WHERE tenant_id = $1")
                .bind(id)
                .fetch_one(&self.control)
                .await?;
        Ok(count)
    }

    /// Field-level merge. Never touches `domain`, `schema_name` or the
    /// provisioning state, and never triggers re-provisioning.
    pub async fn update_tenant(
        &self,
        id: Uuid,
        patch: TenantPatch,
    ) -> Result<TenantRecord, CoreError> {
        let record: Option<TenantRecord> = sqlx::query_as(&format!(
            "UPDATE tenants SET \
                 name = COALESCE($2, name), \
                 tenant_type = COALESCE($3, tenant_type), \
                 status = COALESCE($4, status), \
                 description = COALESCE($5, description), \
                 settings = COALESCE($6, settings), \
                 contact = COALESCE($7, contact), \
                 updated_at = now() \
             WHERE id = $1 \
             RETURNING {TENANT_COLUMNS}"
        ))
        .bind(id)
        .bind(&patch.name)
        .bind(patch.tenant_type.map(|t| t.as_str()))
        .bind(patch.status.map(|s| s.as_str()))
        .bind(&patch.description)
        .bind(&patch.settings)
        .bind(&patch.contact)
        .fetch_optional(&self.control)
        .await?;

        let record = record.ok_or_else(|| CoreError::NotFound(id.to_string()))?;
        self.cache.invalidate(&record.domain).await;
        Ok(record)
    }

    /// Drops the tenant's schema, then removes the registry row — in that
    /// order. If the drop fails the row stays, because a registry row
    /// pointing at a live schema is retryable, while a schema with no
    /// registry pointer is undiscoverable.
    pub async fn delete_tenant(&self, id: Uuid) -> Result<(), CoreError> {
        let record = self.get_tenant_by_id(id).await?;

        self.connections.close(&record.schema_name).await;

        let dropped = self.ddl.drop_schema(&record.schema_name).await?;
        if !dropped {
            error!(
                domain = %record.domain,
                schema = %record.schema_name,
                "schema drop failed; keeping registry row so deletion can be retried"
            );
            return Err(CoreError::SchemaOperationFailed(format!(
                "could not drop schema {} for tenant {}",
                record.schema_name, record.domain
            )));
        }

        sqlx::query("DELETE FROM tenants WHERE id = $1")
            .bind(id)
            .execute(&self.control)
            .await?;
        self.cache.invalidate(&record.domain).await;

        info!(domain = %record.domain, schema = %record.schema_name, "tenant deleted");
        Ok(())
    }

    /// Request-scoped resolution: only ACTIVE, fully provisioned tenants get
    /// through, and no connection is attempted for anything else. "Not
    /// ready" stays distinguishable from "not found".
    pub async fn resolve_active(&self, domain: &str) -> Result<TenantRecord, CoreError> {
        let record = self.get_tenant_by_domain(domain).await?;

        if !record.is_active() {
            return Err(CoreError::TenantNotActive(domain.to_string()));
        }
        if !record.is_schema_created() {
            return Err(CoreError::TenantNotReady {
                domain: domain.to_string(),
                state: record.provisioning_state.to_string(),
            });
        }

        self.touch_last_access(record.id).await;
        Ok(record)
    }

    // --- internal helpers ---

    /// Canonical name first; on collision with an existing row, retry with a
    /// random suffix a bounded number of times.
    async fn allocate_schema_name(&self, domain: &str) -> Result<String, CoreError> {
        let base = resolve_schema_name(domain, SchemaClass::Tenant)?;
        if !self.schema_name_taken(&base).await? {
            return Ok(base);
        }
        warn!(domain, schema = %base, "schema name collision; retrying with suffix");
        for _ in 0..MAX_NAME_ATTEMPTS {
            let candidate = with_random_suffix(&base);
            if !self.schema_name_taken(&candidate).await? {
                return Ok(candidate);
            }
        }
        Err(CoreError::AlreadyExists(format!(
            "could not allocate a unique schema name for domain {domain}"
        )))
    }

    async fn schema_name_taken(&self, schema_name: &str) -> Result<bool, CoreError> {
        let taken: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM tenants WHERE schema_name = $1)")
                .bind(schema_name)
                .fetch_one(&self.control)
                .await?;
        Ok(taken)
    }

    async fn fetch_by_domain(&self, domain: &str) -> Result<Option<TenantRecord>, CoreError> {
        let record = sqlx::query_as(&format!(
            "SELECT {TENANT_COLUMNS} FROM tenants WHERE domain = $1"
        ))
        .bind(domain)
        .fetch_optional(&self.control)
        .await?;
        Ok(record)
    }

    async fn fetch_by_id(&self, id: Uuid) -> Result<Option<TenantRecord>, CoreError> {
        let record = sqlx::query_as(&format!(
            "SELECT {TENANT_COLUMNS} FROM tenants WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.control)
        .await?;
        Ok(record)
    }

    async fn set_provisioning_state(
        &self,
        id: Uuid,
        state: ProvisioningState,
    ) -> Result<TenantRecord, CoreError> {
        let record: TenantRecord = sqlx::query_as(&format!(
            "UPDATE tenants SET provisioning_state = $2, updated_at = now() \
             WHERE id = $1 RETURNING {TENANT_COLUMNS}"
        ))
        .bind(id)
        .bind(state.as_str())
        .fetch_one(&self.control)
        .await?;
        Ok(record)
    }

    /// Best effort; a failed touch never fails the request.
    async fn touch_last_access(&self, id: Uuid) {
        let result = sqlx::query("UPDATE tenants SET last_access_at = now() WHERE id = $1")
            .bind(id)
            .execute(&self.control)
            .await;
        if let Err(err) = result {
            debug!(tenant_id = %id, error = %err, "failed to update last_access_at");
        }
    }
}

fn record_key(domain: &str) -> String {
    format!("tenant domain {domain}")
}

/// The pre-insert uniqueness check races with concurrent creates; the unique
/// constraint is the backstop, reported the same way as the check.
fn map_unique_violation(err: sqlx::Error, what: &str) -> CoreError {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.code().as_deref() == Some("23505") {
            return CoreError::AlreadyExists(what.to_string());
        }
    }
    err.into()
}
