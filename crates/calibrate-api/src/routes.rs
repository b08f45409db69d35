use std::sync::Arc;

use axum::extract::{Path, Request, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use calibrate_core::EntityKind;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::verify_bearer_token;
use crate::config::AppConfig;
use crate::error::AppError;
use crate::store::{RecordStore, WriteOutcome};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    store: RecordStore,
}

impl AppState {
    pub const fn new(config: Arc<AppConfig>, store: RecordStore) -> Self {
        Self { config, store }
    }
}

pub fn app_router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/records/{table}", get(list_records))
        .route(
            "/records/{table}/{id}",
            get(get_record).put(put_record).delete(delete_record),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/healthz", get(healthz))
        .nest("/v1", protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods(Any),
        )
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: i64,
}

async fn healthz() -> impl IntoResponse {
    (
        [(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-cache, no-store"),
        )],
        Json(HealthResponse {
            status: "ok",
            timestamp: Utc::now().timestamp(),
        }),
    )
}

async fn require_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    verify_bearer_token(request.headers(), &state.config.api_token)?;
    Ok(next.run(request).await)
}

#[derive(Debug, Serialize)]
struct WriteResponse {
    id: String,
    applied: bool,
}

async fn list_records(
    State(state): State<AppState>,
    Path(table): Path<String>,
) -> Result<Json<Vec<Value>>, AppError> {
    let kind = parse_table(&table)?;
    Ok(Json(state.store.list(kind).await?))
}

async fn get_record(
    State(state): State<AppState>,
    Path((table, id)): Path<(String, String)>,
) -> Result<Json<Value>, AppError> {
    let kind = parse_table(&table)?;
    state
        .store
        .get(kind, &id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found(format!("{kind} {id}")))
}

async fn put_record(
    State(state): State<AppState>,
    Path((table, id)): Path<(String, String)>,
    Json(document): Json<Value>,
) -> Result<Json<WriteResponse>, AppError> {
    let kind = parse_table(&table)?;
    let id = validate_id(&id)?;
    match document.get("id").and_then(Value::as_str) {
        Some(body_id) if body_id == id => {}
        Some(body_id) => {
            return Err(AppError::bad_request(format!(
                "body id `{body_id}` does not match path id `{id}`"
            )));
        }
        None => return Err(AppError::bad_request("record must include an `id`")),
    }

    let outcome = state.store.upsert(kind, id, &document).await?;
    match outcome {
        WriteOutcome::Applied => tracing::info!(table = kind.table(), id, "Stored record"),
        WriteOutcome::Stale => {
            tracing::info!(table = kind.table(), id, "Ignored stale record version");
        }
    }

    Ok(Json(WriteResponse {
        id: id.to_string(),
        applied: outcome == WriteOutcome::Applied,
    }))
}

async fn delete_record(
    State(state): State<AppState>,
    Path((table, id)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    let kind = parse_table(&table)?;
    let id = validate_id(&id)?;
    if state.store.delete(kind, id).await? {
        tracing::info!(table = kind.table(), id, "Deleted record");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found(format!("{kind} {id}")))
    }
}

fn parse_table(table: &str) -> Result<EntityKind, AppError> {
    EntityKind::from_table(table)
        .ok_or_else(|| AppError::bad_request(format!("unknown table `{table}`")))
}

fn validate_id(id: &str) -> Result<&str, AppError> {
    let trimmed = id.trim();
    if trimmed.is_empty() || trimmed.len() != id.len() {
        return Err(AppError::bad_request("record id must not be blank or padded with whitespace"));
    }
    Ok(id)
}
