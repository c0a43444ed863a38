use axum::{
    extract::{Extension, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use crate::extract::{Json, Path};
use crate::{
    AppState,
    error::{AppError, AppResult},
    middleware::CurrentUser,
    routes::group::Group,
    routes::user::User,
    utils::{message_to_api_response, success_to_api_response},
};

use super::model::{
    Notification, NotificationKind, RelatedTo, SendGroupNotificationRequest,
    SendNotificationRequest, SentCount,
};

fn title_and_message(
    title: Option<String>,
    message: Option<String>,
) -> AppResult<(String, String)> {
    match (
        title.filter(|t| !t.trim().is_empty()),
        message.filter(|m| !m.trim().is_empty()),
    ) {
        (Some(title), Some(message)) => Ok((title, message)),
        _ => Err(AppError::validation("Title and message are required")),
    }
}

#[axum::debug_handler]
pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> AppResult<impl IntoResponse> {
    let notifications = Notification::list_for_user(&state.db, current.id).await?;
    Ok((StatusCode::OK, success_to_api_response(notifications)))
}

#[axum::debug_handler]
pub async fn mark_as_read(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let notification = Notification::mark_read(&state.db, id, current.id).await?;
    Ok((StatusCode::OK, success_to_api_response(notification)))
}

#[axum::debug_handler]
pub async fn mark_all_as_read(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> AppResult<impl IntoResponse> {
    let count = Notification::mark_all_read(&state.db, current.id).await?;
    tracing::debug!("Marked {} notifications read for {}", count, current.id);
    Ok((
        StatusCode::OK,
        message_to_api_response("All notifications marked as read"),
    ))
}

#[axum::debug_handler]
pub async fn send_notification(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<SendNotificationRequest>,
) -> AppResult<impl IntoResponse> {
    current.require_admin()?;
    let user_id = req
        .user_id
        .ok_or_else(|| AppError::validation("User id is required"))?;
    let (title, message) = title_and_message(req.title, req.message)?;

    User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    let notification = Notification::new(
        user_id,
        title,
        message,
        req.kind.unwrap_or(NotificationKind::Info),
        req.related_to.unwrap_or(RelatedTo::System),
        req.related_id,
    );
    state.notifier.send(vec![notification.clone()]).await?;

    Ok((StatusCode::CREATED, success_to_api_response(notification)))
}

#[axum::debug_handler]
pub async fn send_group_notification(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<SendGroupNotificationRequest>,
) -> AppResult<impl IntoResponse> {
    current.require_admin()?;
    let group_id = req
        .group_id
        .ok_or_else(|| AppError::validation("Group id is required"))?;
    let (title, message) = title_and_message(req.title, req.message)?;

    let group = Group::find_by_id(&state.db, group_id)
        .await?
        .ok_or_else(|| AppError::not_found("Group not found"))?;

    let kind = req.kind.unwrap_or(NotificationKind::Info);
    let notifications: Vec<Notification> = group
        .member_ids()
        .map(|user_id| {
            Notification::new(
                user_id,
                title.clone(),
                message.clone(),
                kind,
                group.related_to(),
                Some(group.id),
            )
        })
        .collect();

    let sent = notifications.len();
    state.notifier.send(notifications).await?;
    tracing::info!("Sent notification to {} members of group {}", sent, group.id);

    Ok((StatusCode::CREATED, success_to_api_response(SentCount { sent })))
}
