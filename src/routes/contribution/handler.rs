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

use super::model::{Contribution, CreateContributionRequest, UpdateContributionStatusRequest};

#[axum::debug_handler]
pub async fn my_contributions(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> AppResult<impl IntoResponse> {
    let contributions = Contribution::list_for_user(&state.db, current.id).await?;
    Ok((StatusCode::OK, success_to_api_response(contributions)))
}

#[axum::debug_handler]
pub async fn pending_contributions(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> AppResult<impl IntoResponse> {
    let contributions = Contribution::list_pending_for_user(&state.db, current.id).await?;
    Ok((StatusCode::OK, success_to_api_response(contributions)))
}

#[axum::debug_handler]
pub async fn group_contributions(
    State(state): State<AppState>,
    Path(group_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let contributions = Contribution::list_for_group(&state.db, group_id).await?;
    Ok((StatusCode::OK, success_to_api_response(contributions)))
}

#[axum::debug_handler]
pub async fn create_contribution(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<CreateContributionRequest>,
) -> AppResult<impl IntoResponse> {
    let contribution = Contribution::create(&state.db, current.id, req).await?;
    Ok((StatusCode::CREATED, success_to_api_response(contribution)))
}

#[axum::debug_handler]
pub async fn update_contribution_status(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateContributionStatusRequest>,
) -> AppResult<impl IntoResponse> {
    let contribution = Contribution::update_status(&state.db, id, current.id, req.status).await?;
    Ok((StatusCode::OK, success_to_api_response(contribution)))
}
