use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use core_lib::domain::tenant::{NewTenant, TenantPatch};
use http::StatusCode;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::{AppState, error_response};

const DEFAULT_PAGE_SIZE: u32 = 20;
const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

fn normalize(params: &ListParams) -> (u32, u32) {
    let page = params.page.unwrap_or(1).max(1);
    let mut per_page = params.per_page.unwrap_or(DEFAULT_PAGE_SIZE);
    if per_page == 0 {
        per_page = DEFAULT_PAGE_SIZE;
    }
    (page, per_page.min(MAX_PAGE_SIZE))
}

// POST /api/v1/tenants
pub async fn handle_create_tenant(
    State(state): State<AppState>,
    Json(payload): Json<NewTenant>,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    let record = state
        .registry
        .create_tenant(payload)
        .await
        .map_err(error_response)?;
    Ok((StatusCode::CREATED, Json(record)))
}

// GET /api/v1/tenants
pub async fn handle_list_tenants(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    let (page, per_page) = normalize(&params);
    let (records, total) = state
        .registry
        .list_tenants(page, per_page)
        .await
        .map_err(error_response)?;

    let returned = records.len();
    Ok(Json(json!({
        "data": records,
        "pagination": {
            "page": page,
            "per_page": per_page,
            "total": total,
            "returned": returned,
        }
    })))
}

// GET /api/v1/tenants/{tenant_id}
pub async fn handle_get_tenant(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    let record = state
        .registry
        .get_tenant_by_id(tenant_id)
        .await
        .map_err(error_response)?;
    let subscriptions = state
        .registry
        .subscription_count(tenant_id)
        .await
        .map_err(error_response)?;

    Ok(Json(json!({
        "tenant": record,
        "subscription_count": subscriptions,
    })))
}

// GET /api/v1/tenants/by-domain/{domain}
pub async fn handle_get_tenant_by_domain(
    State(state): State<AppState>,
    Path(domain): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    let record = state
        .registry
        .get_tenant_by_domain(&domain)
        .await
        .map_err(error_response)?;
    Ok(Json(record))
}

// PATCH /api/v1/tenants/{tenant_id}
pub async fn handle_update_tenant(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
    Json(patch): Json<TenantPatch>,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    let record = state
        .registry
        .update_tenant(tenant_id, patch)
        .await
        .map_err(error_response)?;
    Ok(Json(record))
}

// DELETE /api/v1/tenants/{tenant_id}
pub async fn handle_delete_tenant(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, Json<serde_json::Value>)> {
    state
        .registry
        .delete_tenant(tenant_id)
        .await
        .map_err(error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

// POST /api/v1/tenants/{tenant_id}/provision
// Retry endpoint for tenants whose provisioning stopped partway.
pub async fn handle_provision_tenant(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    let record = state
        .registry
        .get_tenant_by_id(tenant_id)
        .await
        .map_err(error_response)?;
    let record = state
        .registry
        .provision_tenant(&record.domain)
        .await
        .map_err(error_response)?;
    Ok(Json(record))
}
