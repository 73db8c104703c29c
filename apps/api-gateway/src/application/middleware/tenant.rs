use axum::{
    Json,
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use core_lib::domain::tenant::TenantRecord;
use http::StatusCode;
use tracing::debug;

use crate::{AppState, error_response};

const TENANT_DOMAIN_HEADER: &str = "x-tenant-domain";

/// Tenant context attached to the request once resolution succeeds.
#[derive(Clone, Debug)]
pub struct ResolvedTenant {
    pub record: TenantRecord,
}

/// Middleware for tenant-scoped routes: extracts the domain token from the
/// `X-Tenant-Domain` header (or a `tenant` query parameter as a fallback),
/// resolves it through the registry, and rejects anything that is missing,
/// inactive or not fully provisioned before a connection is ever attempted.
pub async fn resolve_tenant(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, (StatusCode, Json<serde_json::Value>)> {
    let domain = req
        .headers()
        .get(TENANT_DOMAIN_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .or_else(|| query_param(req.uri().query(), "tenant"));

    let Some(domain) = domain else {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "Tenant domain is required" })),
        ));
    };

    match state.registry.resolve_active(&domain).await {
        Ok(record) => {
            debug!(domain = %record.domain, schema = %record.schema_name, "tenant resolved");
            req.extensions_mut().insert(ResolvedTenant { record });
            Ok(next.run(req).await)
        }
        Err(err) => Err(error_response(err)),
    }
}

fn query_param(query: Option<&str>, key: &str) -> Option<String> {
    query?
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v.to_string())
}
