//! Per-tenant schema migrations. Every tenant schema holds an identical
//! table set; these run through the tenant's own schema-scoped pool, so
//! table names stay unqualified.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;

use crate::migrate::Migration;

pub(super) fn migrations() -> Vec<Arc<dyn Migration>> {
    vec![
        Arc::new(CreateUsers),
        Arc::new(CreateRoleTypes),
        Arc::new(CreateRoles),
        Arc::new(CreatePermissions),
        Arc::new(CreateSettings),
    ]
}

struct CreateUsers;

#[async_trait]
impl Migration for CreateUsers {
    fn name(&self) -> &'static str {
        "m1717517100000_create_users"
    }

    async fn up(&self, pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS users (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                email VARCHAR(255) NOT NULL UNIQUE,
                password VARCHAR(255) NOT NULL,
                first_name VARCHAR(100) NOT NULL,
                last_name VARCHAR(100) NOT NULL,
                status VARCHAR(50) NOT NULL DEFAULT 'ACTIVE',
                role VARCHAR(50) NOT NULL,
                phone VARCHAR(50),
                profile_image VARCHAR(255),
                details JSONB,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
        )
        .execute(pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_users_email ON users (email)")
            .execute(pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_users_role ON users (role)")
            .execute(pool)
            .await?;
        Ok(())
    }

    async fn down(&self, pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::query("DROP TABLE IF EXISTS users")
            .execute(pool)
            .await?;
        Ok(())
    }
}

struct CreateRoleTypes;

#[async_trait]
impl Migration for CreateRoleTypes {
    fn name(&self) -> &'static str {
        "m1717517150000_create_role_types"
    }

    async fn up(&self, pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS role_types (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                name VARCHAR(100) NOT NULL UNIQUE,
                description TEXT,
                permissions JSONB,
                is_system BOOLEAN NOT NULL DEFAULT false,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
        )
        .execute(pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_role_types_name ON role_types (name)")
            .execute(pool)
            .await?;
        Ok(())
    }

    async fn down(&self, pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::query("DROP TABLE IF EXISTS role_types")
            .execute(pool)
            .await?;
        Ok(())
    }
}

struct CreateRoles;

#[async_trait]
impl Migration for CreateRoles {
    fn name(&self) -> &'static str {
        "m1717517200000_create_roles"
    }

    async fn up(&self, pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS roles (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                role_type_id UUID REFERENCES role_types (id) ON DELETE SET NULL,
                name VARCHAR(100) NOT NULL UNIQUE,
                description TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
        )
        .execute(pool)
        .await?;
        Ok(())
    }

    async fn down(&self, pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::query("DROP TABLE IF EXISTS roles")
            .execute(pool)
            .await?;
        Ok(())
    }
}

struct CreatePermissions;

#[async_trait]
impl Migration for CreatePermissions {
    fn name(&self) -> &'static str {
        "m1717517250000_create_permissions"
    }

    async fn up(&self, pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS permissions (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                role_id UUID NOT NULL REFERENCES roles (id) ON DELETE CASCADE,
                resource VARCHAR(100) NOT NULL,
                action VARCHAR(50) NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                UNIQUE (role_id, resource, action)
            )",
        )
        .execute(pool)
        .await?;
        Ok(())
    }

    async fn down(&self, pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::query("DROP TABLE IF EXISTS permissions")
            .execute(pool)
            .await?;
        Ok(())
    }
}

struct CreateSettings;

#[async_trait]
impl Migration for CreateSettings {
    fn name(&self) -> &'static str {
        "m1717517280000_create_settings"
    }

    async fn up(&self, pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS settings (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                key VARCHAR(255) NOT NULL UNIQUE,
                value JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
        )
        .execute(pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_settings_key ON settings (key)")
            .execute(pool)
            .await?;
        Ok(())
    }

    async fn down(&self, pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::query("DROP TABLE IF EXISTS settings")
            .execute(pool)
            .await?;
        Ok(())
    }
}
