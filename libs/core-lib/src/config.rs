use std::env;
use std::str::FromStr;
use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgPoolOptions};

use crate::CoreError;

/// Connection settings for the single physical database instance shared by
/// the control schema and every tenant schema.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    /// Pool size for the shared control connection (registry + DDL).
    pub control_max_connections: u32,
    /// Per-tenant pool sizing (smaller than the control pool).
    pub tenant_max_connections: u32,
    pub tenant_min_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self, CoreError> {
        Ok(Self {
            host: env_or("DB_HOST", "localhost"),
            port: env_parse("DB_PORT", 5432)?,
            database: env_or("DB_NAME", "fitgrid_db"),
            user: env_or("DB_USER", "fitgrid_user"),
            password: env_or("DB_PASSWORD", ""),
            control_max_connections: env_parse("DB_CONTROL_POOL_MAX", 10)?,
            tenant_max_connections: env_parse("DB_TENANT_POOL_MAX", 10)?,
            tenant_min_connections: env_parse("DB_TENANT_POOL_MIN", 2)?,
            acquire_timeout: Duration::from_millis(env_parse("DB_ACQUIRE_TIMEOUT_MS", 40_000)?),
            idle_timeout: Duration::from_millis(env_parse("DB_IDLE_TIMEOUT_MS", 40_000)?),
        })
    }

    /// Base connect options for the control database.
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.database)
            .username(&self.user)
            .password(&self.password)
    }

    /// Connect options scoped to one schema. The search path is fixed at
    /// construction time; no per-query schema switching ever happens.
    pub fn schema_connect_options(&self, schema_name: &str) -> PgConnectOptions {
        self.connect_options()
            .options([("search_path", schema_name)])
    }

    pub fn control_pool_options(&self) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(self.control_max_connections)
            .acquire_timeout(self.acquire_timeout)
            .idle_timeout(self.idle_timeout)
    }

    pub fn tenant_pool_options(&self) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(self.tenant_max_connections)
            .min_connections(self.tenant_min_connections)
            .acquire_timeout(self.acquire_timeout)
            .idle_timeout(self.idle_timeout)
    }
}

/// Tenant lifecycle policy knobs.
#[derive(Debug, Clone)]
pub struct TenancyConfig {
    /// Provision the schema synchronously inside `create_tenant`.
    pub auto_provision: bool,
    /// Length of the trial window stamped on new tenants.
    pub trial_days: i64,
    /// Ceiling on cached tenant pools; 0 disables LRU eviction.
    pub max_cached_pools: usize,
    /// TTL for the domain -> record lookup cache.
    pub record_cache_ttl: Duration,
}

impl TenancyConfig {
    pub fn from_env() -> Result<Self, CoreError> {
        Ok(Self {
            auto_provision: env_or("AUTO_CREATE_TENANT_SCHEMA", "true") == "true",
            trial_days: env_parse("TENANT_TRIAL_DAYS", 30)?,
            max_cached_pools: env_parse("MAX_CACHED_TENANT_POOLS", 0)?,
            record_cache_ttl: Duration::from_secs(env_parse("TENANT_CACHE_TTL_SECONDS", 30)?),
        })
    }
}

impl Default for TenancyConfig {
    fn default() -> Self {
        Self {
            auto_provision: true,
            trial_days: 30,
            max_cached_pools: 0,
            record_cache_ttl: Duration::from_secs(30),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: FromStr>(key: &str, default: T) -> Result<T, CoreError> {
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| CoreError::Configuration(format!("{key} is not a valid value: {raw}"))),
        Err(_) => Ok(default),
    }
}
