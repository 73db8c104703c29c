use axum::{
    Extension, Json,
    extract::{Query, State},
    response::IntoResponse,
};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use super::middleware::ResolvedTenant;
use crate::{AppState, error_response};

const DEFAULT_LIMIT: u32 = 50;
const MAX_LIMIT: u32 = 200;

#[derive(Debug, Deserialize)]
pub struct Pagination {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

fn normalize_pagination(p: &Pagination) -> (u32, u32) {
    let mut limit = p.limit.unwrap_or(DEFAULT_LIMIT);
    if limit == 0 {
        limit = DEFAULT_LIMIT;
    }
    (limit.min(MAX_LIMIT), p.offset.unwrap_or(0))
}

#[derive(sqlx::FromRow, Serialize)]
pub struct UserRow {
    id: Uuid,
    email: String,
    first_name: String,
    last_name: String,
    status: String,
    role: String,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

// GET /api/v1/users — runs on the resolved tenant's own schema connection;
// scoping comes from the connection's search path, not from the query.
pub async fn handle_list_users(
    State(state): State<AppState>,
    Extension(tenant): Extension<ResolvedTenant>,
    Query(p): Query<Pagination>,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    let pool = state
        .connections
        .get(&tenant.record.schema_name)
        .await
        .map_err(error_response)?;

    let (limit, offset) = normalize_pagination(&p);
    let rows: Vec<UserRow> = sqlx::query_as(
        "SELECT id, email, first_name, last_name, status, role, created_at, updated_at \
         FROM users ORDER BY created_at DESC LIMIT $1 OFFSET $2",
    )
    .bind(i64::from(limit))
    .bind(i64::from(offset))
    .fetch_all(&pool)
    .await
    .map_err(|err| error_response(err.into()))?;

    let returned = rows.len();
    Ok(Json(json!({
        "data": rows,
        "tenant": tenant.record.domain,
        "pagination": {
            "limit": limit,
            "offset": offset,
            "returned": returned,
        }
    })))
}
