use std::sync::Arc;

use axum::http::{HeaderValue, StatusCode};
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use pricewatch_core::errors::Error as CoreError;
use pricewatch_core::import::ImportResult;
use pricewatch_core::jobs::{SyncJob, PRICE_SYNC_JOB};

use crate::{
    config::Config,
    error::{ApiError, ApiResult},
    main_lib::AppState,
};

const DEFAULT_LIST_LIMIT: i64 = 20;
const MAX_LIST_LIMIT: i64 = 200;

pub async fn healthz() -> &'static str {
    "ok"
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EnqueuedJob {
    job_id: String,
}

async fn enqueue_price_sync(
    State(state): State<Arc<AppState>>,
) -> ApiResult<(StatusCode, Json<EnqueuedJob>)> {
    let job = state.runner.enqueue(PRICE_SYNC_JOB, Value::Null).await?;
    tracing::info!("Price sync job {} enqueued", job.id);
    Ok((StatusCode::ACCEPTED, Json(EnqueuedJob { job_id: job.id })))
}

async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<SyncJob>> {
    let job = state.jobs.get_by_id(&id)?.ok_or(ApiError::NotFound)?;
    Ok(Json(job))
}

#[derive(Deserialize)]
struct ListJobsQuery {
    limit: Option<i64>,
}

async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListJobsQuery>,
) -> ApiResult<Json<Vec<SyncJob>>> {
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    if !(1..=MAX_LIST_LIMIT).contains(&limit) {
        return Err(ApiError::BadRequest(format!(
            "limit must be between 1 and {}",
            MAX_LIST_LIMIT
        )));
    }
    Ok(Json(state.jobs.list_recent(limit)?))
}

async fn cancel_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<SyncJob>> {
    let flagged = state.jobs.request_cancel(&id).await?;
    let job = state.jobs.get_by_id(&id)?.ok_or(ApiError::NotFound)?;
    if !flagged {
        return Err(ApiError::Conflict(format!(
            "job {} is already {}",
            id,
            job.status.as_str()
        )));
    }
    tracing::info!("Cancellation requested for job {}", id);
    Ok(Json(job))
}

async fn reimport_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<ImportResult>> {
    // Detached so a request timeout cannot drop the drain before the staging
    // file is closed.
    let service = state.price_sync.clone();
    let result = tokio::spawn(async move { service.reimport(&id).await })
        .await
        .map_err(|e| CoreError::Unexpected(format!("reimport task failed: {}", e)))??;
    Ok(Json(result))
}

pub fn app_router(state: Arc<AppState>, config: &Config) -> Router {
    let cors = if config.cors_allow.iter().any(|o| o == "*") {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins = config
            .cors_allow
            .iter()
            .filter_map(|o| o.parse::<HeaderValue>().ok())
            .collect::<Vec<_>>();
        CorsLayer::new().allow_origin(origins)
    };

    let api = Router::new()
        .route("/healthz", get(healthz))
        .route("/jobs", get(list_jobs))
        .route("/jobs/price-sync", post(enqueue_price_sync))
        .route("/jobs/{id}", get(get_job))
        .route("/jobs/{id}/cancel", post(cancel_job))
        .route("/jobs/{id}/reimport", post(reimport_job));

    Router::new()
        .nest("/api/v1", api)
        .with_state(state)
        .layer(cors)
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TimeoutLayer::new(config.request_timeout))
        .layer(TraceLayer::new_for_http())
}
