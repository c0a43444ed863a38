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

use super::model::{CreateBranchPaymentRequest, Payment, PaymentStatus, RejectPaymentRequest};

#[axum::debug_handler]
pub async fn create_branch_payment(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<CreateBranchPaymentRequest>,
) -> AppResult<impl IntoResponse> {
    let payment = Payment::create_branch(&state.db, &state.notifier, current.id, req).await?;
    Ok((StatusCode::CREATED, success_to_api_response(payment)))
}

#[axum::debug_handler]
pub async fn pending_payments(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let payments = Payment::list_pending(&state.db).await?;
    Ok((StatusCode::OK, success_to_api_response(payments)))
}

#[axum::debug_handler]
pub async fn confirm_payment(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let payment = Payment::resolve(
        &state.db,
        &state.notifier,
        id,
        current.id,
        PaymentStatus::Confirmed,
        None,
    )
    .await?;
    Ok((StatusCode::OK, success_to_api_response(payment)))
}

#[axum::debug_handler]
pub async fn reject_payment(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<RejectPaymentRequest>,
) -> AppResult<impl IntoResponse> {
    let payment = Payment::resolve(
        &state.db,
        &state.notifier,
        id,
        current.id,
        PaymentStatus::Rejected,
        req.reason,
    )
    .await?;
    Ok((StatusCode::OK, success_to_api_response(payment)))
}

#[axum::debug_handler]
pub async fn payment_stats(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let stats = Payment::stats(&state.db).await?;
    Ok((StatusCode::OK, success_to_api_response(stats)))
}
