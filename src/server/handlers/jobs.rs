use crate::downloader::{AdmissionStats, Job};
use crate::server::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use tracing::debug;

use super::{ApiResponse, HealthResponse};

/// GET /health
pub async fn health_check(State(app_state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: env!("CARGO_PKG_NAME").to_string(),
        connections: app_state.ws_manager.connection_count(),
    })
}

/// GET /api/v1/jobs
/// 所有任务，最新的在前
pub async fn list_jobs(State(app_state): State<AppState>) -> Json<ApiResponse<Vec<Job>>> {
    let jobs = app_state.registry.list();
    debug!("API: 查询任务列表，共 {} 个", jobs.len());
    Json(ApiResponse::success(jobs))
}

/// GET /api/v1/jobs/:id
pub async fn get_job(
    State(app_state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<ApiResponse<Job>>, StatusCode> {
    match app_state.registry.get(&job_id) {
        Some(job) => Ok(Json(ApiResponse::success(job))),
        None => Err(StatusCode::NOT_FOUND),
    }
}

/// GET /api/v1/admission
/// 当前并发槽位使用情况
pub async fn admission_status(
    State(app_state): State<AppState>,
) -> Json<ApiResponse<AdmissionStats>> {
    Json(ApiResponse::success(
        app_state.download_manager.admission().stats(),
    ))
}
