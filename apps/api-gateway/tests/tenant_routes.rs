//! End-to-end route tests: tenant lifecycle over HTTP against a disposable
//! Postgres container, including the tenant-resolution middleware.

use api_gateway::{AppState, create_app};
use axum_test::TestServer;
use core_lib::adapters::record_cache::TenantRecordCache;
use core_lib::config::{DatabaseConfig, TenancyConfig};
use http::StatusCode;
use serde_json::{Value, json};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tenancy::connections::{PgPoolFactory, SchemaConnections};
use tenancy::ddl::SchemaDdl;
use tenancy::migrate::MigrationRunner;
use tenancy::naming::{SYS_SCHEMA, SchemaClass};
use tenancy::registry::TenantRegistry;
use testcontainers::runners::AsyncRunner;
use testcontainers_modules::postgres::Postgres;

/// Spins up Postgres, bootstraps the sys schema and returns a ready server.
async fn setup_server() -> (TestServer, PgPool) {
    let container = Postgres::default().start().await.unwrap();
    let port = container
        .get_host_port_ipv4(5432)
        .await
        .expect("retrieve mapped postgres port");
    // Leak so the container lives for the test duration.
    Box::leak(Box::new(container));

    let db_config = DatabaseConfig {
        host: "127.0.0.1".into(),
        port,
        database: "postgres".into(),
        user: "postgres".into(),
        password: "postgres".into(),
        control_max_connections: 5,
        tenant_max_connections: 3,
        tenant_min_connections: 0,
        acquire_timeout: Duration::from_secs(10),
        idle_timeout: Duration::from_secs(30),
    };

    let control_pool = db_config
        .control_pool_options()
        .connect_with(db_config.schema_connect_options(SYS_SCHEMA))
        .await
        .expect("connect control pool");
    let ddl = SchemaDdl::new(control_pool.clone());
    assert!(ddl.create_schema(SYS_SCHEMA).await.unwrap());
    MigrationRunner::for_class(SchemaClass::Sys)
        .run(&control_pool)
        .await
        .expect("sys migrations");

    let connections = Arc::new(SchemaConnections::new(
        Arc::new(PgPoolFactory::new(db_config.clone())),
        0,
    ));
    let registry = Arc::new(TenantRegistry::new(
        control_pool.clone(),
        connections.clone(),
        TenantRecordCache::default(),
        TenancyConfig::default(),
    ));

    let app = create_app(AppState {
        registry,
        connections,
    });
    (TestServer::new(app).expect("test server"), control_pool)
}

fn create_body(domain: &str) -> Value {
    json!({
        "name": format!("{domain} fitness"),
        "domain": domain,
        "tenant_type": "GYM",
        "contact_email": format!("owner@{domain}.test"),
    })
}

#[tokio::test]
async fn create_tenant_end_to_end() {
    let (server, control_pool) = setup_server().await;

    let response = server
        .post("/api/v1/tenants")
        .json(&create_body("acme-gym"))
        .await;
    response.assert_status(StatusCode::CREATED);

    let body: Value = response.json();
    assert_eq!(body["domain"], "acme-gym");
    assert_eq!(body["schema_name"], "tenant_acmegym");
    assert_eq!(body["provisioning_state"], "READY");
    assert_eq!(body["status"], "TRIAL");

    // Physical schema exists.
    let exists = SchemaDdl::new(control_pool)
        .schema_exists("tenant_acmegym")
        .await
        .unwrap();
    assert!(exists);

    // Row retrievable by domain.
    let response = server.get("/api/v1/tenants/by-domain/acme-gym").await;
    response.assert_status_ok();
    let fetched: Value = response.json();
    assert_eq!(fetched["id"], body["id"]);
}

#[tokio::test]
async fn injection_domain_is_rejected_with_bad_request() {
    let (server, _pool) = setup_server().await;

    let response = server
        .post("/api/v1/tenants")
        .json(&create_body("\"; DROP TABLE tenants; --"))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn duplicate_domain_conflicts() {
    let (server, _pool) = setup_server().await;

    server
        .post("/api/v1/tenants")
        .json(&create_body("acme-gym"))
        .await
        .assert_status(StatusCode::CREATED);
    let response = server
        .post("/api/v1/tenants")
        .json(&create_body("acme-gym"))
        .await;
    response.assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
async fn unknown_domain_resolves_to_not_found_without_connection() {
    let (server, _pool) = setup_server().await;

    let response = server
        .get("/api/v1/users")
        .add_header(
            http::HeaderName::from_static("x-tenant-domain"),
            http::HeaderValue::from_static("unknown-domain"),
        )
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn missing_domain_token_is_a_bad_request() {
    let (server, _pool) = setup_server().await;

    let response = server.get("/api/v1/users").await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn tenant_scoped_route_requires_an_active_tenant() {
    let (server, _pool) = setup_server().await;

    let created: Value = server
        .post("/api/v1/tenants")
        .json(&create_body("acme-gym"))
        .await
        .json();
    let tenant_id = created["id"].as_str().unwrap().to_string();

    // TRIAL is not ACTIVE: the middleware rejects before any connection.
    let response = server
        .get("/api/v1/users")
        .add_header(
            http::HeaderName::from_static("x-tenant-domain"),
            http::HeaderValue::from_static("acme-gym"),
        )
        .await;
    response.assert_status(StatusCode::FORBIDDEN);

    // Activate, then the tenant-scoped query runs on the tenant schema.
    server
        .patch(&format!("/api/v1/tenants/{tenant_id}"))
        .json(&json!({ "status": "ACTIVE" }))
        .await
        .assert_status_ok();

    let response = server
        .get("/api/v1/users")
        .add_header(
            http::HeaderName::from_static("x-tenant-domain"),
            http::HeaderValue::from_static("acme-gym"),
        )
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["tenant"], "acme-gym");
    assert_eq!(body["data"].as_array().unwrap().len(), 0);

    // The query parameter works as a fallback token source.
    let response = server.get("/api/v1/users?tenant=acme-gym").await;
    response.assert_status_ok();
}

#[tokio::test]
async fn delete_tenant_removes_row_and_schema() {
    let (server, control_pool) = setup_server().await;

    let created: Value = server
        .post("/api/v1/tenants")
        .json(&create_body("acme-gym"))
        .await
        .json();
    let tenant_id = created["id"].as_str().unwrap().to_string();

    server
        .delete(&format!("/api/v1/tenants/{tenant_id}"))
        .await
        .assert_status(StatusCode::NO_CONTENT);

    server
        .get("/api/v1/tenants/by-domain/acme-gym")
        .await
        .assert_status(StatusCode::NOT_FOUND);

    let exists = SchemaDdl::new(control_pool)
        .schema_exists("tenant_acmegym")
        .await
        .unwrap();
    assert!(!exists);
}

#[tokio::test]
async fn list_tenants_returns_pagination_envelope() {
    let (server, _pool) = setup_server().await;

    for domain in ["gym-one", "gym-two"] {
        server
            .post("/api/v1/tenants")
            .json(&create_body(domain))
            .await
            .assert_status(StatusCode::CREATED);
    }

    let response = server.get("/api/v1/tenants?page=1&per_page=1").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["pagination"]["total"], 2);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}
