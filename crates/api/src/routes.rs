//! The versioned route table.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use a2e_core::{ExecutionId, ExecutionStatus};
use a2e_engine::ExecutionOptions;
use a2e_error::A2eError;
use a2e_journal::QueryFilter;
use a2e_registry::operation_names;
use a2e_response::ResponseFormat;
use a2e_validator::{ValidationLevel, WorkflowValidator};
use a2e_workflow::{parse_frames, Workflow};

use crate::auth::AuthenticatedAgent;
use crate::error::ApiError;
use crate::state::AppState;

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/capabilities", get(capabilities))
        .route("/api/v1/workflows/validate", post(validate_workflow))
        .route("/api/v1/workflows/execute", post(execute_workflow))
        .route("/api/v1/executions", get(list_executions))
        .route("/api/v1/executions/{id}", get(get_execution))
        .route("/api/v1/knowledge/search", post(search_knowledge))
        .route("/api/v1/knowledge/bases", get(list_knowledge_bases))
        .route("/api/v1/sql-queries/search", post(search_sql))
        .route("/api/v1/sql-queries", get(list_sql))
        .route("/api/v1/sql-queries/{id}", get(get_sql))
        .route("/api/v1/rate-limit/status", get(rate_limit_status))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

async fn capabilities(
    State(state): State<AppState>,
    AuthenticatedAgent(agent): AuthenticatedAgent,
) -> Json<Value> {
    let view = state.directory.filter_capabilities(
        &agent,
        state.apis.list().into_iter().cloned().collect(),
        state.vault.list(),
        operation_names().iter().map(ToString::to_string).collect(),
    );
    Json(json!(view))
}

#[derive(Debug, Deserialize)]
struct ValidateRequest {
    workflow: String,
    level: Option<ValidationLevel>,
}

async fn validate_workflow(
    State(state): State<AppState>,
    AuthenticatedAgent(agent): AuthenticatedAgent,
    Json(request): Json<ValidateRequest>,
) -> Json<Value> {
    let level = request.level.unwrap_or(state.validation_level);
    let validator = WorkflowValidator::new(level)
        .with_registry(&state.apis)
        .with_vault(&state.vault)
        .with_auth(&state.directory);
    let report = validator.validate(&request.workflow, Some(&agent));
    Json(json!(report))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExecuteRequest {
    workflow: String,
    validate: Option<bool>,
    format: Option<ResponseFormat>,
    max_execution_time_ms: Option<u64>,
}

async fn execute_workflow(
    State(state): State<AppState>,
    AuthenticatedAgent(agent): AuthenticatedAgent,
    Json(request): Json<ExecuteRequest>,
) -> Result<Response, ApiError> {
    if request.validate.unwrap_or(true) {
        let validator = WorkflowValidator::new(state.validation_level)
            .with_registry(&state.apis)
            .with_vault(&state.vault)
            .with_auth(&state.directory);
        let report = validator.validate(&request.workflow, Some(&agent));
        if !report.valid {
            let body = json!({"status": "error", "validation": report});
            return Ok((StatusCode::BAD_REQUEST, Json(body)).into_response());
        }
    }

    let frames = parse_frames(&request.workflow)?;
    let workflow = Workflow::from_frames(&frames)
        .ok_or_else(|| A2eError::validation("workflow contains no operations"))?;

    let format = request.format.unwrap_or(state.response_format);
    let mut options = ExecutionOptions::new(agent.clone()).with_format(format);
    if let Some(bound) = request.max_execution_time_ms {
        options = options.with_max_execution_time(std::time::Duration::from_millis(bound));
    }

    info!(workflow = %workflow.id, agent = %agent, "executing workflow");
    let outcome = state.engine.execute(&workflow, &options).await;

    if let Some(refusal) = outcome.rate_limit_error() {
        return Err(ApiError(refusal.clone()));
    }

    Ok(Json(outcome.response(format)).into_response())
}

#[derive(Debug, Deserialize)]
struct ExecutionsQuery {
    status: Option<String>,
    workflow_id: Option<String>,
    limit: Option<usize>,
}

async fn list_executions(
    State(state): State<AppState>,
    AuthenticatedAgent(agent): AuthenticatedAgent,
    Query(query): Query<ExecutionsQuery>,
) -> Result<Json<Value>, ApiError> {
    let status = query
        .status
        .map(|raw| {
            serde_json::from_value::<ExecutionStatus>(json!(raw))
                .map_err(|_| A2eError::validation(format!("unknown status filter: {raw}")))
        })
        .transpose()?;
    let workflow_id = query
        .workflow_id
        .map(|raw| a2e_core::WorkflowId::new(&raw).map_err(A2eError::from))
        .transpose()?;

    let executions = state.journal.query(&QueryFilter {
        agent_id: Some(agent),
        workflow_id,
        status,
        limit: query.limit,
        ..QueryFilter::default()
    });
    Ok(Json(json!({"executions": executions})))
}

async fn get_execution(
    State(state): State<AppState>,
    AuthenticatedAgent(agent): AuthenticatedAgent,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let execution_id = ExecutionId::parse(&id)
        .map_err(|_| A2eError::not_found("Execution", &id))?;
    let details = state
        .journal
        .execution_details(&execution_id)
        .ok_or_else(|| A2eError::not_found("Execution", &id))?;

    // Executions are visible only to the agent that ran them.
    let owner = details
        .timeline
        .iter()
        .find_map(|event| event.get("agent_id").and_then(Value::as_str).map(str::to_owned));
    if owner.as_deref() != Some(agent.as_str()) {
        return Err(ApiError(A2eError::not_found("Execution", &id)));
    }

    Ok(Json(json!(details)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KnowledgeSearchRequest {
    query: String,
    #[serde(rename = "type")]
    kind: Option<String>,
    top_k: Option<usize>,
}

async fn search_knowledge(
    State(state): State<AppState>,
    AuthenticatedAgent(agent): AuthenticatedAgent,
    Json(request): Json<KnowledgeSearchRequest>,
) -> Result<Json<Value>, ApiError> {
    let top_k = request.top_k.unwrap_or(5);
    let mut results = Vec::new();

    let want = |name: &str| request.kind.as_deref().is_none_or(|kind| kind == name);

    if want("api") {
        for (score, api) in state.apis.search_apis(&request.query, top_k).await? {
            if state.directory.is_api_allowed(&agent, &api.id) {
                results.push(json!({"kind": "api", "score": score, "item": api}));
            }
        }
    }
    if want("sql") {
        for (score, entry) in state.sql.search(&request.query, None, None, top_k).await? {
            results.push(json!({"kind": "sql", "score": score, "item": entry}));
        }
    }
    if want("credential") {
        for (score, meta) in state.vault.search(&request.query, None, top_k).await? {
            if state.directory.is_credential_allowed(&agent, &meta.id) {
                results.push(json!({"kind": "credential", "score": score, "item": meta}));
            }
        }
    }

    Ok(Json(json!({"results": results})))
}

async fn list_knowledge_bases(
    State(state): State<AppState>,
    AuthenticatedAgent(_agent): AuthenticatedAgent,
) -> Json<Value> {
    Json(json!({
        "bases": [
            {"id": "apis", "entries": state.apis.len()},
            {"id": "sql-queries", "entries": state.sql.len()},
            {"id": "credentials", "entries": state.vault.len()},
        ]
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SqlSearchRequest {
    query: String,
    database: Option<String>,
    category: Option<String>,
    top_k: Option<usize>,
}

async fn search_sql(
    State(state): State<AppState>,
    AuthenticatedAgent(_agent): AuthenticatedAgent,
    Json(request): Json<SqlSearchRequest>,
) -> Result<Json<Value>, ApiError> {
    let hits = state
        .sql
        .search(
            &request.query,
            request.database.as_deref(),
            request.category.as_deref(),
            request.top_k.unwrap_or(5),
        )
        .await?;
    let results: Vec<Value> = hits
        .into_iter()
        .map(|(score, entry)| json!({"score": score, "query": entry}))
        .collect();
    Ok(Json(json!({"results": results})))
}

#[derive(Debug, Deserialize)]
struct SqlListQuery {
    database: Option<String>,
    category: Option<String>,
}

async fn list_sql(
    State(state): State<AppState>,
    AuthenticatedAgent(_agent): AuthenticatedAgent,
    Query(query): Query<SqlListQuery>,
) -> Json<Value> {
    let entries = state
        .sql
        .list(query.database.as_deref(), query.category.as_deref());
    Json(json!({"queries": entries}))
}

async fn get_sql(
    State(state): State<AppState>,
    AuthenticatedAgent(_agent): AuthenticatedAgent,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let query_id = a2e_core::QueryId::new(&id)
        .map_err(|_| A2eError::not_found("SQL query", &id))?;
    let entry = state
        .sql
        .get(&query_id)
        .ok_or_else(|| A2eError::not_found("SQL query", &id))?;
    Ok(Json(json!(entry)))
}

async fn rate_limit_status(
    State(state): State<AppState>,
    AuthenticatedAgent(agent): AuthenticatedAgent,
) -> Json<Value> {
    Json(json!(state.limiter.status(&agent)))
}
