use axum::{
    extract::{Extension, State},
    http::StatusCode,
    response::IntoResponse,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use uuid::Uuid;

use crate::extract::{Json, Path};
use crate::{
    AppState,
    error::{AppError, AppResult},
    middleware::CurrentUser,
    utils::{message_to_api_response, success_to_api_response},
};

use super::model::{
    BenefitRequestBody, CreateGroupRequest, Group, GroupType, JoinByCodeRequest,
    ProcessBenefitRequestBody, UpdateGroupRequest, UpdateGroupStatusRequest,
};

#[axum::debug_handler]
pub async fn list_groups(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let groups = Group::list_active(&state.db).await?;
    Ok((StatusCode::OK, success_to_api_response(groups)))
}

#[axum::debug_handler]
pub async fn my_groups(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> AppResult<impl IntoResponse> {
    let groups = Group::list_for_user(&state.db, current.id).await?;
    Ok((StatusCode::OK, success_to_api_response(groups)))
}

#[axum::debug_handler]
pub async fn list_equbs(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let groups = Group::list_active_by_type(&state.db, GroupType::Equb).await?;
    Ok((StatusCode::OK, success_to_api_response(groups)))
}

#[axum::debug_handler]
pub async fn list_edirs(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let groups = Group::list_active_by_type(&state.db, GroupType::Edir).await?;
    Ok((StatusCode::OK, success_to_api_response(groups)))
}

#[axum::debug_handler]
pub async fn available_edirs(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> AppResult<impl IntoResponse> {
    let groups = Group::available_edirs(&state.db, current.id).await?;
    Ok((StatusCode::OK, success_to_api_response(groups)))
}

#[axum::debug_handler]
pub async fn get_equb(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let group = Group::find_by_type(&state.db, id, GroupType::Equb).await?;
    Ok((StatusCode::OK, success_to_api_response(group)))
}

#[axum::debug_handler]
pub async fn get_edir(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let group = Group::find_by_type(&state.db, id, GroupType::Edir).await?;
    Ok((StatusCode::OK, success_to_api_response(group)))
}

#[axum::debug_handler]
pub async fn get_group(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let group = Group::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| AppError::not_found("Group not found"))?;
    Ok((StatusCode::OK, success_to_api_response(group.into_inner())))
}

#[axum::debug_handler]
pub async fn create_group(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<CreateGroupRequest>,
) -> AppResult<impl IntoResponse> {
    let group = Group::create(&state.db, req, current.id).await?;
    Ok((StatusCode::CREATED, success_to_api_response(group)))
}

#[axum::debug_handler]
pub async fn update_group(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateGroupRequest>,
) -> AppResult<impl IntoResponse> {
    let group = Group::update(&state.db, id, current.id, req).await?;
    Ok((StatusCode::OK, success_to_api_response(group)))
}

#[axum::debug_handler]
pub async fn update_group_status(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateGroupStatusRequest>,
) -> AppResult<impl IntoResponse> {
    let group = Group::update_status(&state.db, id, current.id, req.status).await?;
    Ok((StatusCode::OK, success_to_api_response(group)))
}

#[axum::debug_handler]
pub async fn delete_group(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    Group::delete(&state.db, id, current.id).await?;
    Ok((StatusCode::OK, message_to_api_response("Group deleted successfully")))
}

#[axum::debug_handler]
pub async fn join_group(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let group = Group::join(&state.db, &state.notifier, id, &current).await?;
    Ok((StatusCode::OK, success_to_api_response(group)))
}

#[axum::debug_handler]
pub async fn join_by_code(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<JoinByCodeRequest>,
) -> AppResult<impl IntoResponse> {
    let group = Group::join_by_code(&state.db, &state.notifier, req.code, &current).await?;
    Ok((StatusCode::OK, success_to_api_response(group)))
}

#[axum::debug_handler]
pub async fn perform_draw(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path((id, round_number)): Path<(Uuid, u32)>,
) -> AppResult<impl IntoResponse> {
    let mut rng = StdRng::from_entropy();
    let result = Group::perform_draw(
        &state.db,
        &state.notifier,
        id,
        round_number,
        current.id,
        &mut rng,
    )
    .await?;
    Ok((StatusCode::OK, success_to_api_response(result)))
}

#[axum::debug_handler]
pub async fn request_benefit(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<BenefitRequestBody>,
) -> AppResult<impl IntoResponse> {
    let request = Group::request_benefit(&state.db, &state.notifier, id, &current, req).await?;
    Ok((StatusCode::CREATED, success_to_api_response(request)))
}

#[axum::debug_handler]
pub async fn process_benefit(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path((id, request_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<ProcessBenefitRequestBody>,
) -> AppResult<impl IntoResponse> {
    let request =
        Group::process_benefit(&state.db, &state.notifier, id, request_id, current.id, req).await?;
    Ok((StatusCode::OK, success_to_api_response(request)))
}
