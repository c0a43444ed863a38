use axum::{
    extract::{Extension, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use crate::extract::{Json, Path};
use crate::{
    AppState, error::AppResult, middleware::CurrentUser, utils::success_to_api_response,
};

use super::model::{ProcessRequestBody, Request};

#[axum::debug_handler]
pub async fn create_join_request(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(group_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let request = Request::create_join(&state.db, group_id, current.id).await?;
    Ok((StatusCode::CREATED, success_to_api_response(request)))
}

#[axum::debug_handler]
pub async fn user_requests(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> AppResult<impl IntoResponse> {
    let requests = Request::list_for_user(&state.db, current.id).await?;
    Ok((StatusCode::OK, success_to_api_response(requests)))
}

#[axum::debug_handler]
pub async fn list_requests(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let requests = Request::list_all(&state.db).await?;
    Ok((StatusCode::OK, success_to_api_response(requests)))
}

#[axum::debug_handler]
pub async fn pending_requests(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let requests = Request::list_pending(&state.db).await?;
    Ok((StatusCode::OK, success_to_api_response(requests)))
}

#[axum::debug_handler]
pub async fn process_request(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(body): Json<ProcessRequestBody>,
) -> AppResult<impl IntoResponse> {
    let request = Request::process(&state.db, &state.notifier, id, current.id, body).await?;
    Ok((StatusCode::OK, success_to_api_response(request)))
}
