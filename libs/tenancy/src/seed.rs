//! Initial data for a freshly migrated tenant schema. Which role types get
//! seeded depends on the tenant's business category, so this runs as a
//! provisioning step after the migrations rather than as a migration itself.

use core_lib::CoreError;
use core_lib::domain::tenant::TenantType;
use serde_json::json;
use sqlx::PgPool;
use tracing::debug;

struct RoleTypeSeed {
    name: &'static str,
    description: &'static str,
    permissions: serde_json::Value,
}

fn role_types_for(tenant_type: TenantType) -> Vec<RoleTypeSeed> {
    match tenant_type {
        TenantType::Gym => vec![
            RoleTypeSeed {
                name: "gym-owner",
                description: "Full control over the gym account",
                permissions: json!(["*"]),
            },
            RoleTypeSeed {
                name: "coach",
                description: "Manages classes, programs and member progress",
                permissions: json!(["classes:*", "programs:*", "members:read"]),
            },
            RoleTypeSeed {
                name: "front-desk",
                description: "Handles check-ins and member administration",
                permissions: json!(["members:*", "attendance:*"]),
            },
            RoleTypeSeed {
                name: "member",
                description: "Regular gym member",
                permissions: json!(["self:*"]),
            },
        ],
        TenantType::Studio => vec![
            RoleTypeSeed {
                name: "studio-owner",
                description: "Full control over the studio account",
                permissions: json!(["*"]),
            },
            RoleTypeSeed {
                name: "instructor",
                description: "Runs classes and appointments",
                permissions: json!(["classes:*", "appointments:*"]),
            },
            RoleTypeSeed {
                name: "member",
                description: "Regular studio member",
                permissions: json!(["self:*"]),
            },
        ],
        TenantType::PersonalTrainer => vec![
            RoleTypeSeed {
                name: "trainer",
                description: "Owns the training business",
                permissions: json!(["*"]),
            },
            RoleTypeSeed {
                name: "client",
                description: "Coached client",
                permissions: json!(["self:*", "programs:read"]),
            },
        ],
        TenantType::Enterprise => vec![
            RoleTypeSeed {
                name: "admin",
                description: "Full control over the enterprise account",
                permissions: json!(["*"]),
            },
            RoleTypeSeed {
                name: "manager",
                description: "Manages a location or department",
                permissions: json!(["members:*", "classes:*", "reports:read"]),
            },
            RoleTypeSeed {
                name: "staff",
                description: "Day-to-day operations",
                permissions: json!(["members:read", "attendance:*"]),
            },
            RoleTypeSeed {
                name: "member",
                description: "Regular member",
                permissions: json!(["self:*"]),
            },
        ],
    }
}

/// Inserts the default role types for the tenant's category. Idempotent:
/// existing names are left untouched, so re-provisioning never duplicates or
/// overwrites operator edits.
pub async fn seed_tenant_defaults(pool: &PgPool, tenant_type: TenantType) -> Result<(), CoreError> {
    let seeds = role_types_for(tenant_type);
    for seed in &seeds {
        sqlx::query(
            "INSERT INTO role_types (name, description, permissions, is_system)
             VALUES ($1, $2, $3, true)
             ON CONFLICT (name) DO NOTHING",
        )
        .bind(seed.name)
        .bind(seed.description)
        .bind(&seed.permissions)
        .execute(pool)
        .await?;
    }
    debug!(tenant_type = %tenant_type, count = seeds.len(), "seeded default role types");
    Ok(())
}
