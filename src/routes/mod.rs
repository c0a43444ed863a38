pub mod admin;
pub mod contribution;
pub mod group;
pub mod health;
pub mod notification;
pub mod payment;
pub mod request;
pub mod user;
pub mod wallet;

use axum::{
    Router,
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, patch, post, put},
};
use tower_http::trace::TraceLayer;

use crate::AppState;
use crate::middleware::{admin_only, auth_middleware, log_errors};

/// 组装全部接口，挂载在 `config.api_base_uri` 下
pub fn build_router(state: AppState) -> Router {
    // 公开路由
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/auth/register", post(user::register))
        .route("/auth/login", post(user::login))
        .route("/admin/auth/login", post(admin::admin_login));

    // 登录用户可访问的路由
    let user_routes = Router::new()
        .route("/users/profile", get(user::profile))
        .route("/users/device-token", post(user::update_device_token))
        // 群组
        .route("/groups", get(group::list_groups))
        .route("/groups/mine", get(group::my_groups))
        .route("/groups/equbs", get(group::list_equbs))
        .route("/groups/edirs", get(group::list_edirs))
        .route("/groups/edirs/available", get(group::available_edirs))
        .route("/groups/edirs/join-by-code", post(group::join_by_code))
        .route("/groups/equbs/{id}", get(group::get_equb))
        .route("/groups/edirs/{id}", get(group::get_edir))
        .route(
            "/groups/{id}",
            get(group::get_group)
                .put(group::update_group)
                .delete(group::delete_group),
        )
        .route("/groups/{id}/status", patch(group::update_group_status))
        .route("/groups/{id}/members", post(group::join_group))
        .route("/groups/{id}/join", post(request::create_join_request))
        .route("/groups/{id}/rounds/{round}/draw", post(group::perform_draw))
        .route("/groups/{id}/benefits", post(group::request_benefit))
        .route(
            "/groups/{id}/benefits/{request_id}",
            put(group::process_benefit),
        )
        // 申请
        .route("/requests/user", get(request::user_requests))
        // 钱包
        .route("/wallet", get(wallet::get_wallet))
        .route("/wallet/deposit/request", post(wallet::request_deposit))
        .route("/wallet/withdrawal/request", post(wallet::request_withdrawal))
        .route("/wallet/transfer", post(wallet::transfer))
        // 通知
        .route("/notifications", get(notification::list_notifications))
        .route("/notifications/read-all", put(notification::mark_all_as_read))
        .route("/notifications/{id}/read", put(notification::mark_as_read))
        // 缴费记录
        .route(
            "/contributions",
            post(contribution::create_contribution),
        )
        .route(
            "/contributions/my-contributions",
            get(contribution::my_contributions),
        )
        .route(
            "/contributions/pending",
            get(contribution::pending_contributions),
        )
        .route(
            "/contributions/group/{id}",
            get(contribution::group_contributions),
        )
        .route(
            "/contributions/{id}/status",
            patch(contribution::update_contribution_status),
        );

    // 仅管理员可访问的路由
    let admin_routes = Router::new()
        .route("/admin/stats", get(admin::dashboard_stats))
        .route("/admin/users", get(admin::list_users))
        .route("/admin/create-admin", post(admin::create_admin))
        .route("/admin/users/{id}", delete(admin::delete_user))
        .route("/admin/users/{id}/status", patch(admin::update_user_status))
        .route("/admin/users/{id}/role", patch(admin::update_user_role))
        .route("/groups/create", post(group::create_group))
        .route("/requests", get(request::list_requests))
        .route("/requests/pending", get(request::pending_requests))
        .route("/requests/{id}", put(request::process_request))
        .route("/wallet/admin/all", get(wallet::list_wallets))
        .route(
            "/wallet/admin/deposit-requests",
            get(wallet::pending_deposits),
        )
        .route(
            "/wallet/admin/process-deposit",
            post(wallet::process_deposit),
        )
        .route(
            "/wallet/admin/process-withdrawal",
            post(wallet::process_withdrawal),
        )
        .route("/wallet/admin/add-funds", post(wallet::add_funds))
        .route(
            "/wallet/admin/process-deposit-by-reference",
            post(wallet::deposit_by_reference),
        )
        .route("/notifications/send", post(notification::send_notification))
        .route(
            "/notifications/send-group",
            post(notification::send_group_notification),
        )
        .route("/payments/branch", post(payment::create_branch_payment))
        .route("/payments/pending", get(payment::pending_payments))
        .route("/payments/stats", get(payment::payment_stats))
        .route("/payments/{id}/confirm", patch(payment::confirm_payment))
        .route("/payments/{id}/reject", patch(payment::reject_payment))
        .route_layer(from_fn(admin_only));

    // 认证中间件在外层，先于 admin_only 执行
    let protected_routes = user_routes
        .merge(admin_routes)
        .route_layer(from_fn_with_state(state.clone(), auth_middleware));

    let api = Router::new().merge(public_routes).merge(protected_routes);
    let base = state.config.api_base_uri.clone();

    Router::new()
        .nest(&base, api)
        .layer(from_fn(log_errors))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
