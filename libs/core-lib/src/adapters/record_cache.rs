use std::time::Duration;

use moka::future::Cache as MokaCache;

use crate::domain::tenant::TenantRecord;

/// In-memory cache of tenant records keyed by domain, used on the
/// per-request resolution path so the hot lookup stays off the control
/// database. Entries are short-lived; writes go through the registry, which
/// invalidates on update and delete.
#[derive(Clone, Debug)]
pub struct TenantRecordCache {
    cache: MokaCache<String, TenantRecord>,
}

impl TenantRecordCache {
    pub fn new(max_capacity: u64, ttl: Duration) -> Self {
        let cache = MokaCache::builder()
            .max_capacity(max_capacity)
            .time_to_live(ttl)
            .build();
        Self { cache }
    }

    pub async fn get(&self, domain: &str) -> Option<TenantRecord> {
        self.cache.get(domain).await
    }

    pub async fn insert(&self, record: TenantRecord) {
        self.cache.insert(record.domain.clone(), record).await;
    }

    pub async fn invalidate(&self, domain: &str) {
        self.cache.invalidate(domain).await;
    }
}

impl Default for TenantRecordCache {
    /// Capacity for a few thousand tenants with a 30 second TTL.
    fn default() -> Self {
        Self::new(10_000, Duration::from_secs(30))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tenant::{ProvisioningState, TenantStatus, TenantType};
    use chrono::Utc;
    use tokio::time::sleep;
    use uuid::Uuid;

    fn record(domain: &str) -> TenantRecord {
        TenantRecord {
            id: Uuid::new_v4(),
            name: domain.to_string(),
            domain: domain.to_string(),
            schema_name: format!("tenant_{}", domain.replace('-', "")),
            tenant_type: TenantType::Gym,
            status: TenantStatus::Active,
            provisioning_state: ProvisioningState::Ready,
            description: None,
            settings: None,
            contact: None,
            trial_start_date: None,
            trial_end_date: None,
            last_access_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn insert_and_get() {
        let cache = TenantRecordCache::default();
        cache.insert(record("acme-gym")).await;

        let hit = cache.get("acme-gym").await.unwrap();
        assert_eq!(hit.domain, "acme-gym");
        assert!(cache.get("unknown").await.is_none());
    }

    #[tokio::test]
    async fn invalidate_removes_entry() {
        let cache = TenantRecordCache::default();
        cache.insert(record("acme-gym")).await;
        cache.invalidate("acme-gym").await;

        assert!(cache.get("acme-gym").await.is_none());
    }

    #[tokio::test]
    async fn entries_expire_after_ttl() {
        let cache = TenantRecordCache::new(100, Duration::from_millis(50));
        cache.insert(record("acme-gym")).await;
        assert!(cache.get("acme-gym").await.is_some());

        sleep(Duration::from_millis(120)).await;
        assert!(cache.get("acme-gym").await.is_none());
    }
}
