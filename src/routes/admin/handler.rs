use axum::{
    extract::{Extension, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use crate::extract::{Json, Path};
use crate::{
    AppState,
    error::AppResult,
    middleware::CurrentUser,
    routes::user::{LoginRequest, RegisterRequest, Role, User, UserProfile},
    utils::{message_to_api_response, success_to_api_response},
};

use super::model::{AdminStats, UpdateUserRoleRequest, UpdateUserStatusRequest};

#[axum::debug_handler]
pub async fn admin_login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> AppResult<impl IntoResponse> {
    let response = User::login(&state.db, &state.config, req, true).await?;
    Ok((StatusCode::OK, success_to_api_response(response)))
}

#[axum::debug_handler]
pub async fn dashboard_stats(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let stats = AdminStats::collect(&state.db).await?;
    Ok((StatusCode::OK, success_to_api_response(stats)))
}

#[axum::debug_handler]
pub async fn list_users(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> AppResult<impl IntoResponse> {
    let users = User::list_visible_to(&state.db, current.role).await?;
    Ok((StatusCode::OK, success_to_api_response(users)))
}

#[axum::debug_handler]
pub async fn create_admin(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<RegisterRequest>,
) -> AppResult<impl IntoResponse> {
    let admin = User::register(&state.db, req, Role::Admin).await?;
    tracing::info!("Admin {} created by {}", admin.email, current.id);
    Ok((StatusCode::CREATED, success_to_api_response(UserProfile::from(&admin))))
}

#[axum::debug_handler]
pub async fn update_user_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateUserStatusRequest>,
) -> AppResult<impl IntoResponse> {
    let user = User::set_active(&state.db, id, req.is_active).await?;
    Ok((StatusCode::OK, success_to_api_response(user)))
}

#[axum::debug_handler]
pub async fn update_user_role(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateUserRoleRequest>,
) -> AppResult<impl IntoResponse> {
    let user = User::set_role(&state.db, current.role, id, req.role.as_deref()).await?;
    Ok((StatusCode::OK, success_to_api_response(user)))
}

#[axum::debug_handler]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    User::remove(&state.db, id).await?;
    Ok((StatusCode::OK, message_to_api_response("User deleted successfully")))
}
