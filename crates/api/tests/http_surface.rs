//! HTTP surface scenarios driven through the router with `oneshot`.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use a2e_api::{router, AppState};
use a2e_auth::AgentDirectory;
use a2e_core::{AgentId, ApiId, CredentialId, QueryId};
use a2e_credential::{CredentialKind, CredentialVault, MasterKey};
use a2e_engine::{Engine, EngineServices};
use a2e_journal::AuditJournal;
use a2e_registry::{ApiCatalog, ApiDefinition, SqlCatalog, SqlQuery};
use a2e_resilience::{CacheConfig, RateLimitConfig, RateLimiter, ResultCache, RetryPolicy};
use a2e_response::ResponseFormat;
use a2e_validator::ValidationLevel;

struct TestServer {
    app: Router,
    api_key: String,
    directory: Arc<AgentDirectory>,
    _journal_dir: tempfile::TempDir,
}

async fn server() -> TestServer {
    server_with_limits(RateLimitConfig::default()).await
}

async fn server_with_limits(limits: RateLimitConfig) -> TestServer {
    let journal_dir = tempfile::tempdir().unwrap();

    let directory = Arc::new(AgentDirectory::new());
    let api_key = directory
        .register(
            AgentId::new("reporter").unwrap(),
            "Reporter",
            vec![],
            vec![],
            vec![],
            BTreeMap::new(),
        )
        .unwrap();

    let vault = Arc::new(CredentialVault::new(&MasterKey::generate()));
    vault
        .store(
            CredentialId::new("api-token").unwrap(),
            CredentialKind::BearerToken,
            "secret-XYZ",
            BTreeMap::from([("api".to_string(), json!("user-api"))]),
            "Token for the user API",
        )
        .await
        .unwrap();

    let mut apis = ApiCatalog::new();
    apis.insert(ApiDefinition {
        id: ApiId::new("user-api").unwrap(),
        name: "User API".into(),
        base_url: "https://api.example.com".into(),
        description: "Manages users".into(),
        endpoints: vec![],
    });

    let mut sql = SqlCatalog::new();
    sql.insert(SqlQuery {
        id: QueryId::new("active-users").unwrap(),
        sql: "SELECT * FROM users WHERE active".into(),
        description: "Users active this month".into(),
        database: "main".into(),
        category: "users".into(),
        parameters: vec![],
    });

    let limiter = Arc::new(RateLimiter::new(limits));
    let cache = Arc::new(ResultCache::new(CacheConfig::default()));
    let journal = Arc::new(AuditJournal::open(journal_dir.path()).unwrap());

    let services = EngineServices::new(
        Arc::clone(&vault),
        Arc::clone(&limiter),
        Arc::clone(&cache),
        Arc::clone(&journal),
    )
    .with_retry_policy(RetryPolicy::new(0, std::time::Duration::from_millis(1)));
    let engine = Arc::new(Engine::new(Arc::new(services)));

    let state = AppState {
        directory,
        vault,
        apis: Arc::new(apis),
        sql: Arc::new(sql),
        limiter,
        cache,
        journal,
        engine,
        validation_level: ValidationLevel::Moderate,
        response_format: ResponseFormat::Summary,
    };

    let directory = Arc::clone(&state.directory);
    TestServer {
        app: router(state),
        api_key,
        directory,
        _journal_dir: journal_dir,
    }
}

impl TestServer {
    async fn request(&self, request: Request<Body>) -> (StatusCode, Value, axum::http::HeaderMap) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body, headers)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value, axum::http::HeaderMap) {
        self.request(
            Request::builder()
                .uri(uri)
                .header("X-API-Key", &self.api_key)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value, axum::http::HeaderMap) {
        self.request(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("X-API-Key", &self.api_key)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }
}

fn wait_workflow() -> String {
    let update = json!({"operationUpdate": {"workflowId": "ping", "operations": [
        {"id": "tick", "operation": {"Wait": {"duration": 1}}}
    ]}});
    let begin = json!({"beginExecution": {"workflowId": "ping", "root": "tick"}});
    format!("{update}\n{begin}")
}

#[tokio::test]
async fn health_is_open_and_everything_else_requires_auth() {
    let server = server().await;

    let (status, body, _) = server
        .request(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("ok"));

    let (status, body, _) = server
        .request(
            Request::builder()
                .uri("/api/v1/capabilities")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["category"], json!("authentication"));
}

#[tokio::test]
async fn capabilities_advertise_credentials_without_plaintext() {
    let server = server().await;
    let (status, body, _) = server.get("/api/v1/capabilities").await;

    assert_eq!(status, StatusCode::OK);
    let text = body.to_string();
    assert!(text.contains("api-token"));
    assert!(text.contains("bearer-token"));
    assert!(text.contains("user-api"));
    // The sealed secret never crosses the capability surface.
    assert!(!text.contains("secret-XYZ"));

    let operations = body["supportedOperations"].as_array().unwrap();
    assert_eq!(operations.len(), 16);
}

#[tokio::test]
async fn rate_limited_third_request_gets_429_with_headers() {
    let server = server_with_limits(RateLimitConfig {
        requests_per_minute: 2,
        ..RateLimitConfig::default()
    })
    .await;

    for _ in 0..2 {
        let (status, _, _) = server
            .post("/api/v1/workflows/execute", json!({"workflow": wait_workflow()}))
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body, headers) = server
        .post("/api/v1/workflows/execute", json!({"workflow": wait_workflow()}))
        .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(headers["X-RateLimit-Remaining"], "0");
    let retry_after: u64 = headers["Retry-After"].to_str().unwrap().parse().unwrap();
    assert!(retry_after <= 60);
    assert_eq!(body["error"]["category"], json!("rate_limited"));
}

#[tokio::test]
async fn duplicate_operation_ids_fail_validation() {
    let server = server().await;
    let workflow = json!({"operationUpdate": {"workflowId": "dup", "operations": [
        {"id": "fetch", "operation": {"Wait": {"duration": 1}}},
        {"id": "fetch", "operation": {"Wait": {"duration": 1}}}
    ]}})
    .to_string();

    let (status, body, _) = server
        .post("/api/v1/workflows/validate", json!({"workflow": workflow}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], json!(false));
    assert!(body["errors"].as_u64().unwrap() >= 1);
    assert!(body.to_string().contains("Duplicate operation ID: fetch"));

    // Executing the same body is refused outright.
    let (status, body, _) = server
        .post("/api/v1/workflows/execute", json!({"workflow": workflow}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], json!("error"));
}

#[tokio::test]
async fn execute_then_inspect_the_execution_record() {
    let server = server().await;

    let (status, body, _) = server
        .post("/api/v1/workflows/execute", json!({"workflow": wait_workflow()}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("success"));
    let execution_id = body["execution_id"].as_str().unwrap().to_string();

    let (status, listing, _) = server.get("/api/v1/executions").await;
    assert_eq!(status, StatusCode::OK);
    assert!(listing["executions"].as_array().unwrap().iter().any(|event| {
        event["execution_id"].as_str() == Some(execution_id.as_str())
    }));

    let (status, details, _) = server
        .get(&format!("/api/v1/executions/{execution_id}"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(details["timeline"].as_array().unwrap().len() >= 3);

    let (status, _, _) = server
        .get("/api/v1/executions/00000000-0000-0000-0000-000000000001")
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn sql_catalog_endpoints() {
    let server = server().await;

    let (status, body, _) = server.get("/api/v1/sql-queries").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["queries"].as_array().unwrap().len(), 1);

    let (status, body, _) = server.get("/api/v1/sql-queries/active-users").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], json!("active-users"));

    let (status, _, _) = server.get("/api/v1/sql-queries/missing").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body, _) = server
        .post("/api/v1/sql-queries/search", json!({"query": "active users"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"][0]["query"]["id"], json!("active-users"));
}

#[tokio::test]
async fn knowledge_surface_lists_and_searches() {
    let server = server().await;

    let (status, body, _) = server.get("/api/v1/knowledge/bases").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["bases"].as_array().unwrap().len(), 3);

    let (status, body, _) = server
        .post("/api/v1/knowledge/search", json!({"query": "user token"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    let text = body.to_string();
    assert!(text.contains("api-token"));
    assert!(!text.contains("secret-XYZ"));
}

#[tokio::test]
async fn rate_limit_status_reports_windows() {
    let server = server().await;
    let (status, body, _) = server.get("/api/v1/rate-limit/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["limits"]["requests_per_minute"], json!(60));
    // The status request itself was counted.
    assert!(body["usage"]["requests_per_minute"].as_u64().unwrap() >= 1);
}

#[tokio::test]
async fn bearer_token_authentication_works_end_to_end() {
    let server = server().await;
    let token = server
        .directory
        .issue_token(
            &AgentId::new("reporter").unwrap(),
            std::time::Duration::from_secs(60),
        )
        .unwrap();

    let (status, body, _) = server
        .request(
            Request::builder()
                .uri("/api/v1/capabilities")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["supportedOperations"].is_array());

    let (status, _, _) = server
        .request(
            Request::builder()
                .uri("/api/v1/capabilities")
                .header(header::AUTHORIZATION, "Bearer not-a-real-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
