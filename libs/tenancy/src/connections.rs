use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use async_trait::async_trait;
use core_lib::CoreError;
use core_lib::config::DatabaseConfig;
use dashmap::DashMap;
use futures_util::future::join_all;
use sqlx::PgPool;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::naming::validate_schema_name;

/// Constructs the pooled connection for one schema. Injected so tests can
/// count construction side effects without a live server.
#[async_trait]
pub trait PoolFactory: Send + Sync {
    async fn create_pool(&self, schema_name: &str) -> Result<PgPool, CoreError>;
}

/// Production factory: one pool per schema, search path fixed at connect
/// time. Connects eagerly so a broken schema surfaces at initialization, not
/// on the first query.
pub struct PgPoolFactory {
    db: DatabaseConfig,
}

impl PgPoolFactory {
    pub fn new(db: DatabaseConfig) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PoolFactory for PgPoolFactory {
    async fn create_pool(&self, schema_name: &str) -> Result<PgPool, CoreError> {
        let options = self.db.schema_connect_options(schema_name);
        let pool = self
            .db
            .tenant_pool_options()
            .connect_with(options)
            .await?;
        Ok(pool)
    }
}

struct SchemaEntry {
    pool: OnceCell<PgPool>,
    last_used: AtomicU64,
}

/// Process-wide registry of tenant connection pools, keyed by schema name.
///
/// One pool per tenant schema, created lazily on first access and reused
/// across requests. Owned by the composition root and passed down
/// explicitly. Initialization is serialized per key through a `OnceCell`:
/// concurrent cold-cache callers share one in-flight construction instead of
/// racing to create duplicate pools. Entries survive until explicit `close`,
/// `close_all`, or LRU eviction when a ceiling is configured.
pub struct SchemaConnections {
    entries: DashMap<String, Arc<SchemaEntry>>,
    factory: Arc<dyn PoolFactory>,
    /// 0 disables eviction.
    max_cached: usize,
    epoch: Instant,
}

impl SchemaConnections {
    pub fn new(factory: Arc<dyn PoolFactory>, max_cached: usize) -> Self {
        Self {
            entries: DashMap::new(),
            factory,
            max_cached,
            epoch: Instant::now(),
        }
    }

    /// Returns the live pool for `schema_name`, constructing it on first
    /// access. A failed construction leaves the cell empty, so the next
    /// caller retries.
    pub async fn get(&self, schema_name: &str) -> Result<PgPool, CoreError> {
        validate_schema_name(schema_name)?;

        let entry = self
            .entries
            .entry(schema_name.to_string())
            .or_insert_with(|| {
                Arc::new(SchemaEntry {
                    pool: OnceCell::new(),
                    last_used: AtomicU64::new(self.now_millis()),
                })
            })
            .clone();
        entry.last_used.store(self.now_millis(), Ordering::Relaxed);

        let cold = !entry.pool.initialized();
        let pool = entry
            .pool
            .get_or_try_init(|| async {
                debug!(schema = schema_name, "initializing tenant connection pool");
                self.factory.create_pool(schema_name).await
            })
            .await?
            .clone();

        if cold && entry.pool.initialized() {
            info!(schema = schema_name, "tenant connection pool ready");
            if self.max_cached > 0 {
                self.evict_lru(schema_name).await;
            }
        }
        Ok(pool)
    }

    /// Closes and removes one entry; no-op for unknown keys.
    pub async fn close(&self, schema_name: &str) {
        if let Some((_, entry)) = self.entries.remove(schema_name) {
            if let Some(pool) = entry.pool.get() {
                pool.close().await;
            }
            info!(schema = schema_name, "tenant connection pool closed");
        }
    }

    /// Closes every pool concurrently and clears the registry. Process
    /// shutdown only.
    pub async fn close_all(&self) {
        let entries: Vec<Arc<SchemaEntry>> = self
            .entries
            .iter()
            .map(|item| item.value().clone())
            .collect();
        self.entries.clear();

        let closes = entries
            .into_iter()
            .filter_map(|entry| entry.pool.get().cloned())
            .map(|pool| async move { pool.close().await });
        join_all(closes).await;
        info!("all tenant connection pools closed");
    }

    pub fn contains(&self, schema_name: &str) -> bool {
        self.entries.contains_key(schema_name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn now_millis(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    /// Closes least-recently-used entries until the registry fits the
    /// ceiling again. The entry just created is exempt.
    async fn evict_lru(&self, keep: &str) {
        while self.entries.len() > self.max_cached {
            let victim = self
                .entries
                .iter()
                .filter(|item| item.key() != keep)
                .min_by_key(|item| item.value().last_used.load(Ordering::Relaxed))
                .map(|item| item.key().clone());
            match victim {
                Some(key) => {
                    warn!(schema = %key, "evicting least-recently-used tenant pool");
                    self.close(&key).await;
                }
                None => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    /// Counts pool constructions; hands out lazy pools so no server is
    /// needed. An optional delay widens the initialization window to let
    /// concurrent callers pile up on the same cold key.
    struct CountingFactory {
        created: AtomicUsize,
        init_delay: Duration,
    }

    impl CountingFactory {
        fn new(init_delay: Duration) -> Self {
            Self {
                created: AtomicUsize::new(0),
                init_delay,
            }
        }

        fn created(&self) -> usize {
            self.created.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PoolFactory for CountingFactory {
        async fn create_pool(&self, _schema_name: &str) -> Result<PgPool, CoreError> {
            tokio::time::sleep(self.init_delay).await;
            self.created.fetch_add(1, Ordering::SeqCst);
            let options = PgConnectOptions::new().host("127.0.0.1").port(1);
            Ok(PgPoolOptions::new().connect_lazy_with(options))
        }
    }

    fn registry(factory: Arc<CountingFactory>, max_cached: usize) -> SchemaConnections {
        SchemaConnections::new(factory, max_cached)
    }

    #[tokio::test]
    async fn concurrent_cold_lookups_create_exactly_one_pool() {
        let factory = Arc::new(CountingFactory::new(Duration::from_millis(20)));
        let connections = Arc::new(registry(factory.clone(), 0));

        let lookups = (0..16).map(|_| {
            let connections = connections.clone();
            async move { connections.get("tenant_acmegym").await }
        });
        let results = join_all(lookups).await;

        assert!(results.iter().all(Result::is_ok));
        assert_eq!(factory.created(), 1);
        assert_eq!(connections.len(), 1);
    }

    #[tokio::test]
    async fn warm_lookups_reuse_the_cached_pool() {
        let factory = Arc::new(CountingFactory::new(Duration::ZERO));
        let connections = registry(factory.clone(), 0);

        connections.get("tenant_acmegym").await.unwrap();
        connections.get("tenant_acmegym").await.unwrap();
        connections.get("tenant_acmegym").await.unwrap();

        assert_eq!(factory.created(), 1);
    }

    #[tokio::test]
    async fn distinct_schemas_get_distinct_pools() {
        let factory = Arc::new(CountingFactory::new(Duration::ZERO));
        let connections = registry(factory.clone(), 0);

        connections.get("tenant_acmegym").await.unwrap();
        connections.get("tenant_fitmax").await.unwrap();

        assert_eq!(factory.created(), 2);
        assert_eq!(connections.len(), 2);
    }

    #[tokio::test]
    async fn invalid_schema_names_never_reach_the_factory() {
        let factory = Arc::new(CountingFactory::new(Duration::ZERO));
        let connections = registry(factory.clone(), 0);

        let result = connections.get("tenant\"; DROP SCHEMA sys;--").await;
        assert!(matches!(result, Err(CoreError::InvalidIdentifier(_))));
        assert_eq!(factory.created(), 0);
        assert!(connections.is_empty());
    }

    #[tokio::test]
    async fn close_removes_the_entry_and_ignores_unknown_keys() {
        let factory = Arc::new(CountingFactory::new(Duration::ZERO));
        let connections = registry(factory.clone(), 0);

        connections.get("tenant_acmegym").await.unwrap();
        assert!(connections.contains("tenant_acmegym"));

        connections.close("tenant_acmegym").await;
        assert!(!connections.contains("tenant_acmegym"));

        // Absent key: no-op.
        connections.close("tenant_never_seen").await;

        // A later lookup rebuilds the pool.
        connections.get("tenant_acmegym").await.unwrap();
        assert_eq!(factory.created(), 2);
    }

    #[tokio::test]
    async fn close_all_clears_every_entry() {
        let factory = Arc::new(CountingFactory::new(Duration::ZERO));
        let connections = registry(factory.clone(), 0);

        connections.get("tenant_a").await.unwrap();
        connections.get("tenant_b").await.unwrap();
        connections.get("tenant_c").await.unwrap();

        connections.close_all().await;
        assert!(connections.is_empty());
    }

    #[tokio::test]
    async fn lru_ceiling_evicts_the_coldest_entry() {
        let factory = Arc::new(CountingFactory::new(Duration::ZERO));
        let connections = registry(factory.clone(), 2);

        connections.get("tenant_a").await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        connections.get("tenant_b").await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        // Touch a so b becomes the coldest.
        connections.get("tenant_a").await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        connections.get("tenant_c").await.unwrap();

        assert_eq!(connections.len(), 2);
        assert!(connections.contains("tenant_a"));
        assert!(!connections.contains("tenant_b"));
        assert!(connections.contains("tenant_c"));
    }
}
