use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use common::{
    ClusterSnapshot, ErrorResponse, Payload, SubmitError, SubmitRequest, SubmitResponse, Summary,
    TaskId, TaskView,
};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::cluster::Cluster;

type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn build_router(cluster: Cluster) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/tasks", post(submit_task))
        .route("/api/v1/tasks/:id", get(get_task))
        .route("/api/v1/status", get(status))
        .route("/api/v1/summary", post(summary))
        .layer(TraceLayer::new_for_http())
        .with_state(cluster)
}

/* ---------------- handlers HTTP ---------------- */

async fn health() -> &'static str {
    "ok"
}

fn api_error(code: StatusCode, msg: impl ToString) -> ApiError {
    (code, Json(ErrorResponse { error: msg.to_string() }))
}

// Valida el payload en la frontera y lo encola
async fn submit_task(
    State(cluster): State<Cluster>,
    Json(req): Json<SubmitRequest>,
) -> Result<(StatusCode, Json<SubmitResponse>), ApiError> {
    let payload: Payload = req
        .data
        .parse()
        .map_err(|e: SubmitError| api_error(StatusCode::BAD_REQUEST, e))?;

    match cluster.submit(payload) {
        Ok(task_id) => {
            info!("tarea {} recibida por HTTP", task_id);
            Ok((StatusCode::CREATED, Json(SubmitResponse { task_id })))
        }
        Err(e @ SubmitError::ShuttingDown) => Err(api_error(StatusCode::SERVICE_UNAVAILABLE, e)),
        Err(e) => Err(api_error(StatusCode::BAD_REQUEST, e)),
    }
}

// Devuelve una tarea con su estado y resultado
async fn get_task(
    State(cluster): State<Cluster>,
    Path(id): Path<TaskId>,
) -> Result<Json<TaskView>, ApiError> {
    cluster
        .task(id)
        .map(Json)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("task {} not found", id)))
}

async fn status(State(cluster): State<Cluster>) -> Json<ClusterSnapshot> {
    Json(cluster.snapshot())
}

// Resumen a demanda; también queda en el log de eventos
async fn summary(State(cluster): State<Cluster>) -> Json<Summary> {
    Json(cluster.request_summary())
}
