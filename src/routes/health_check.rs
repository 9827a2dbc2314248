use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
}

/// Liveness probe. Always reports `ok` while the process is serving.
pub async fn health_check() -> Json<HealthStatus> {
    Json(HealthStatus { status: "ok" })
}
