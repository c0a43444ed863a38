use axum::{http::StatusCode, response::IntoResponse};
use chrono::Utc;
use serde_json::json;

use crate::utils::success_to_api_response;

/// 存活检查
pub async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        success_to_api_response(json!({ "status": "ok", "timestamp": Utc::now().to_rfc3339() })),
    )
}
