//! Tenant schema lifecycle and connection routing.
//!
//! Every tenant is isolated in its own Postgres schema; the shared `sys`
//! schema holds the tenant registry. This crate owns the mapping from a
//! tenant's domain to its physical schema, the per-schema connection pools,
//! and the migration machinery that brings a schema to its expected shape.

pub mod connections;
pub mod ddl;
pub mod migrate;
pub mod migrations;
pub mod naming;
pub mod registry;
pub mod seed;

pub use connections::{PgPoolFactory, PoolFactory, SchemaConnections};
pub use ddl::SchemaDdl;
pub use migrate::{Migration, MigrationRunner};
pub use naming::{SchemaClass, resolve_schema_name, validate_schema_name};
pub use registry::TenantRegistry;
