//! Control-schema migrations: the tenant registry and subscriptions.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;

use crate::migrate::Migration;

pub(super) fn migrations() -> Vec<Arc<dyn Migration>> {
    vec![Arc::new(CreateTenants), Arc::new(CreateSubscriptions)]
}

struct CreateTenants;

#[async_trait]
impl Migration for CreateTenants {
    fn name(&self) -> &'static str {
        "m1717516900000_create_tenants"
    }

    async fn up(&self, pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS tenants (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                name VARCHAR(200) NOT NULL,
                domain VARCHAR(100) NOT NULL UNIQUE,
                schema_name VARCHAR(63) NOT NULL UNIQUE,
                tenant_type VARCHAR(50) NOT NULL,
                status VARCHAR(50) NOT NULL DEFAULT 'TRIAL',
                provisioning_state VARCHAR(50) NOT NULL DEFAULT 'NOT_STARTED',
                description TEXT,
                settings JSONB,
                contact JSONB,
                trial_start_date TIMESTAMPTZ,
                trial_end_date TIMESTAMPTZ,
                last_access_at TIMESTAMPTZ,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
        )
        .execute(pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_tenants_domain ON tenants (domain)")
            .execute(pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_tenants_schema_name ON tenants (schema_name)")
            .execute(pool)
            .await?;
        Ok(())
    }

    async fn down(&self, pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::query("DROP TABLE IF EXISTS tenants CASCADE")
            .execute(pool)
            .await?;
        Ok(())
    }
}

struct CreateSubscriptions;

#[async_trait]
impl Migration for CreateSubscriptions {
    fn name(&self) -> &'static str {
        "m1717516950000_create_subscriptions"
    }

    async fn up(&self, pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS subscriptions (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                tenant_id UUID NOT NULL REFERENCES tenants (id) ON DELETE CASCADE,
                plan VARCHAR(50) NOT NULL,
                status VARCHAR(50) NOT NULL DEFAULT 'ACTIVE',
                monthly_price NUMERIC(10, 2) NOT NULL,
                start_date TIMESTAMPTZ NOT NULL,
                end_date TIMESTAMPTZ,
                auto_renew BOOLEAN NOT NULL DEFAULT true,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
        )
        .execute(pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_subscriptions_tenant_id ON subscriptions (tenant_id)",
        )
        .execute(pool)
        .await?;
        Ok(())
    }

    async fn down(&self, pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::query("DROP TABLE IF EXISTS subscriptions")
            .execute(pool)
            .await?;
        Ok(())
    }
}
