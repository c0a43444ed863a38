use axum::{
    extract::{Extension, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::extract::Json;
use crate::{
    AppState,
    error::{AppError, AppResult},
    middleware::CurrentUser,
    utils::{message_to_api_response, success_to_api_response},
};

use super::model::{DeviceTokenRequest, LoginRequest, RegisterRequest, Role, User, UserProfile};

#[axum::debug_handler]
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> AppResult<impl IntoResponse> {
    let user = User::register(&state.db, req, Role::User).await?;
    // 注册成功直接签发令牌
    let response = user.issue_token(&state.config)?;
    Ok((StatusCode::CREATED, success_to_api_response(response)))
}

#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> AppResult<impl IntoResponse> {
    let response = User::login(&state.db, &state.config, req, false).await?;
    Ok((StatusCode::OK, success_to_api_response(response)))
}

#[axum::debug_handler]
pub async fn profile(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> AppResult<impl IntoResponse> {
    let user = User::find_by_id(&state.db, current.id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    Ok((StatusCode::OK, success_to_api_response(UserProfile::from(&*user))))
}

#[axum::debug_handler]
pub async fn update_device_token(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<DeviceTokenRequest>,
) -> AppResult<impl IntoResponse> {
    User::update_device_token(&state.db, current.id, req.device_token).await?;
    tracing::debug!("Device token updated for user {}", current.id);
    Ok((
        StatusCode::OK,
        message_to_api_response("Device token updated successfully"),
    ))
}
