// Import necessary items from the crate's library (lib.rs)
use api_gateway::{AppState, create_app};
use core_lib::adapters::record_cache::TenantRecordCache;
use core_lib::config::{DatabaseConfig, TenancyConfig};
use dotenvy::dotenv;
use sqlx::PgPool;
use std::net::SocketAddr;
use std::sync::Arc;
use tenancy::connections::{PgPoolFactory, SchemaConnections};
use tenancy::ddl::SchemaDdl;
use tenancy::migrate::MigrationRunner;
use tenancy::naming::{SYS_SCHEMA, SchemaClass};
use tenancy::registry::TenantRegistry;
use tokio::net::TcpListener;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

// main.rs only contains the binary entry point and wiring; all shared
// application logic (router creation, state, handlers) is in lib.rs.

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Ensures the control schema exists and is at the expected version before
/// the registry serves its first request.
async fn bootstrap_control_schema(pool: &PgPool) -> Result<(), BoxError> {
    let ddl = SchemaDdl::new(pool.clone());
    if !ddl.create_schema(SYS_SCHEMA).await? {
        return Err("could not create the sys schema".into());
    }
    info!("Applying control-schema migrations...");
    let applied = MigrationRunner::for_class(SchemaClass::Sys).run(pool).await?;
    if applied > 0 {
        info!("Applied {applied} control-schema migrations");
    } else {
        info!("No new control-schema migrations to apply");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // Initialize tracing (logging)
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env()) // Allow RUST_LOG
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting API Gateway v{}...", env!("CARGO_PKG_VERSION"));
    // Load environment (.env) if present
    dotenv().ok();

    let db_config = DatabaseConfig::from_env()?;
    let tenancy_config = TenancyConfig::from_env()?;

    // Single shared control pool, scoped to the sys schema.
    let control_pool = db_config
        .control_pool_options()
        .connect_with(db_config.schema_connect_options(SYS_SCHEMA))
        .await?;
    info!("Control database connection established");

    bootstrap_control_schema(&control_pool).await?;

    // --- Dependency wiring ---
    // The connection registry and tenant registry are owned here and passed
    // down explicitly; nothing below holds global state.
    let connections = Arc::new(SchemaConnections::new(
        Arc::new(PgPoolFactory::new(db_config.clone())),
        tenancy_config.max_cached_pools,
    ));
    let record_cache = TenantRecordCache::new(10_000, tenancy_config.record_cache_ttl);
    let registry = Arc::new(TenantRegistry::new(
        control_pool,
        connections.clone(),
        record_cache,
        tenancy_config,
    ));

    let app_state = AppState {
        registry,
        connections: connections.clone(),
    };
    let app = create_app(app_state);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(4000);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("API Gateway listening on {addr}");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Shutdown sweep: every cached tenant pool is closed exactly once, here.
    info!("Shutting down; closing tenant connection pools");
    connections.close_all().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {err}");
    }
}
