use std::sync::Arc;

use axum::{
    Json, Router,
    middleware::{self},
    routing::{get, post},
};
use core_lib::CoreError;
use http::StatusCode;
use tower_http::cors::{Any, CorsLayer};
use tracing::error;

use tenancy::{SchemaConnections, TenantRegistry};

// Re-export or declare modules needed by public items
pub mod application;
use application::middleware::resolve_tenant;
use application::{tenants, users};

// Holds shared dependencies
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<TenantRegistry>,
    pub connections: Arc<SchemaConnections>,
}

// Function to create the main Axum router with state
pub fn create_app(state: AppState) -> Router {
    let api_routes = Router::new()
        // Tenant lifecycle (operator surface)
        .route(
            "/tenants",
            post(tenants::handle_create_tenant).get(tenants::handle_list_tenants),
        )
        .route(
            "/tenants/{tenant_id}",
            get(tenants::handle_get_tenant)
                .patch(tenants::handle_update_tenant)
                .delete(tenants::handle_delete_tenant),
        )
        .route(
            "/tenants/{tenant_id}/provision",
            post(tenants::handle_provision_tenant),
        )
        .route(
            "/tenants/by-domain/{domain}",
            get(tenants::handle_get_tenant_by_domain),
        )
        // Tenant-scoped surface: everything below runs against the resolved
        // tenant's own schema connection.
        .route(
            "/users",
            get(users::handle_list_users).route_layer(middleware::from_fn_with_state(
                state.clone(),
                resolve_tenant,
            )),
        );

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(cors)
        .with_state(state)
}

// Map CoreError to HTTP status codes; "tenant not ready" stays
// distinguishable from "tenant not found" and from generic server errors.
pub fn map_core_error(err: &CoreError) -> StatusCode {
    match err {
        CoreError::NotFound(_) => StatusCode::NOT_FOUND,
        CoreError::AlreadyExists(_) => StatusCode::CONFLICT,
        CoreError::Validation(_) | CoreError::InvalidIdentifier(_) => StatusCode::BAD_REQUEST,
        CoreError::TenantNotActive(_) => StatusCode::FORBIDDEN,
        CoreError::TenantNotReady { .. } | CoreError::PoolExhausted(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        CoreError::NoMigrationsApplied => StatusCode::CONFLICT,
        CoreError::SchemaOperationFailed(_)
        | CoreError::MigrationFailed { .. }
        | CoreError::Configuration(_)
        | CoreError::Infrastructure(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// Shared error-body shape for all handlers.
pub fn error_response(err: CoreError) -> (StatusCode, Json<serde_json::Value>) {
    let status = map_core_error(&err);
    if status.is_server_error() {
        error!("request failed: {err:?}");
    }
    (status, Json(serde_json::json!({ "error": err.to_string() })))
}
