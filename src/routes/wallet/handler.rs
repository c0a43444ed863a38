use axum::{
    extract::{Extension, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::extract::Json;
use crate::{
    AppState, error::AppResult, middleware::CurrentUser, utils::success_to_api_response,
};

use super::model::{
    AddFundsBody, DepositByReferenceBody, DepositRequestBody, ProcessTransactionBody,
    TransactionType, TransferRequestBody, Wallet, WithdrawalRequestBody,
};

#[axum::debug_handler]
pub async fn get_wallet(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> AppResult<impl IntoResponse> {
    let wallet = Wallet::get_or_create(&state.db, current.id).await?;
    Ok((StatusCode::OK, success_to_api_response(wallet.into_inner())))
}

#[axum::debug_handler]
pub async fn request_deposit(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(body): Json<DepositRequestBody>,
) -> AppResult<impl IntoResponse> {
    let transaction =
        Wallet::request_deposit_for(&state.db, &state.notifier, &current, body).await?;
    Ok((StatusCode::CREATED, success_to_api_response(transaction)))
}

#[axum::debug_handler]
pub async fn request_withdrawal(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(body): Json<WithdrawalRequestBody>,
) -> AppResult<impl IntoResponse> {
    let transaction =
        Wallet::request_withdrawal_for(&state.db, &state.notifier, &current, body).await?;
    Ok((StatusCode::CREATED, success_to_api_response(transaction)))
}

#[axum::debug_handler]
pub async fn transfer(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(body): Json<TransferRequestBody>,
) -> AppResult<impl IntoResponse> {
    let transaction = Wallet::transfer(&state.db, &state.notifier, &current, body).await?;
    Ok((StatusCode::OK, success_to_api_response(transaction)))
}

#[axum::debug_handler]
pub async fn list_wallets(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let wallets = Wallet::list_all(&state.db).await?;
    Ok((StatusCode::OK, success_to_api_response(wallets)))
}

#[axum::debug_handler]
pub async fn pending_deposits(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let deposits = Wallet::list_pending_deposits(&state.db).await?;
    Ok((StatusCode::OK, success_to_api_response(deposits)))
}

#[axum::debug_handler]
pub async fn process_deposit(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(body): Json<ProcessTransactionBody>,
) -> AppResult<impl IntoResponse> {
    let transaction = Wallet::process_transaction(
        &state.db,
        &state.notifier,
        &current,
        TransactionType::Deposit,
        body,
    )
    .await?;
    Ok((StatusCode::OK, success_to_api_response(transaction)))
}

#[axum::debug_handler]
pub async fn process_withdrawal(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(body): Json<ProcessTransactionBody>,
) -> AppResult<impl IntoResponse> {
    let transaction = Wallet::process_transaction(
        &state.db,
        &state.notifier,
        &current,
        TransactionType::Withdrawal,
        body,
    )
    .await?;
    Ok((StatusCode::OK, success_to_api_response(transaction)))
}

#[axum::debug_handler]
pub async fn add_funds(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(body): Json<AddFundsBody>,
) -> AppResult<impl IntoResponse> {
    let transaction = Wallet::add_funds(&state.db, &state.notifier, &current, body).await?;
    Ok((StatusCode::OK, success_to_api_response(transaction)))
}

#[axum::debug_handler]
pub async fn deposit_by_reference(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(body): Json<DepositByReferenceBody>,
) -> AppResult<impl IntoResponse> {
    let transaction =
        Wallet::deposit_by_reference(&state.db, &state.notifier, &current, body).await?;
    Ok((StatusCode::OK, success_to_api_response(transaction)))
}
