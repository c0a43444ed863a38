mod common;

use axum::http::StatusCode;
use common::TestApp;
use equb_backend::routes::user::Role;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{Value, json};

fn registration(email: &str, phone: &str) -> Value {
    json!({
        "first_name": "Abebe",
        "last_name": "Kebede",
        "email": email,
        "password": "s3cret-pass",
        "phone": phone,
        "address": "Addis Ababa",
        "occupation": "Accountant",
        "emergency_contact": "+251911000000"
    })
}

#[tokio::test]
async fn test_health_check() {
    let app = TestApp::new();
    let (status, body) = app.call("GET", "/api/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], 0);
    assert_eq!(body["data"]["status"], "ok");
}

#[tokio::test]
async fn test_register_login_and_profile() {
    let app = TestApp::new();

    let (status, body) = app
        .call(
            "POST",
            "/api/auth/register",
            None,
            Some(registration("Abebe@Example.com", "+251911111111")),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["user"]["email"], "abebe@example.com");
    assert_eq!(body["data"]["user"]["role"], "user");
    assert!(body["data"]["user"].get("password_hash").is_none());

    let (status, body) = app
        .call(
            "POST",
            "/api/auth/register",
            None,
            Some(registration("abebe@example.com", "+251922222222")),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], 1001);

    let (status, body) = app
        .call(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": "abebe@example.com", "password": "wrong" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], 1002);

    let (status, body) = app
        .call(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": "ABEBE@example.com", "password": "s3cret-pass" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["data"]["token"].as_str().unwrap().to_string();

    let (status, body) = app
        .call("GET", "/api/users/profile", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["first_name"], "Abebe");

    // 普通用户不能走管理员登录
    let (status, _) = app
        .call(
            "POST",
            "/api/admin/auth/login",
            None,
            Some(json!({ "email": "abebe@example.com", "password": "s3cret-pass" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_register_requires_all_fields() {
    let app = TestApp::new();
    let (status, body) = app
        .call(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({ "email": "partial@example.com" })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 1000);
    assert_eq!(body["message"], "All fields are required");
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let app = TestApp::new();

    let (status, body) = app.call("GET", "/api/wallet", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], 1002);

    let (status, _) = app
        .call("GET", "/api/wallet", Some("not-a-jwt"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_deactivated_user_is_rejected() {
    let app = TestApp::new();
    let admin = app.seed_user(Role::Admin).await;
    let user = app.seed_user(Role::User).await;
    let admin_token = app.token_for(admin.id, &admin.email);
    let user_token = app.token_for(user.id, &user.email);

    let (status, _) = app
        .call(
            "PATCH",
            &format!("/api/admin/users/{}/status", user.id),
            Some(&admin_token),
            Some(json!({ "is_active": false })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .call("GET", "/api/users/profile", Some(&user_token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], 1003);
}

#[tokio::test]
async fn test_admin_routes_reject_regular_users() {
    let app = TestApp::new();
    let user = app.seed_user(Role::User).await;
    let token = app.token_for(user.id, &user.email);

    for (method, uri) in [
        ("GET", "/api/admin/stats"),
        ("GET", "/api/requests/pending"),
        ("GET", "/api/wallet/admin/all"),
        ("GET", "/api/payments/stats"),
    ] {
        let (status, body) = app.call(method, uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{} {}", method, uri);
        assert_eq!(body["code"], 1003);
    }

    let (status, _) = app
        .call(
            "POST",
            "/api/groups/create",
            Some(&token),
            Some(json!({ "name": "Sneaky", "type": "equb" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_group_draw_over_http() {
    let app = TestApp::new();
    let admin = app.seed_user(Role::Admin).await;
    let member = app.seed_user(Role::User).await;
    let admin_token = app.token_for(admin.id, &admin.email);
    let member_token = app.token_for(member.id, &member.email);

    let (status, body) = app
        .call(
            "POST",
            "/api/groups/create",
            Some(&admin_token),
            Some(json!({
                "name": "Office Equb",
                "type": "equb",
                "amount": 200,
                "total_rounds": 2,
                "start_date": "2026-01-01T00:00:00Z",
                "frequency": "weekly"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let group_id = body["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["rounds"].as_array().unwrap().len(), 2);

    let (status, body) = app
        .call(
            "POST",
            &format!("/api/groups/{}/members", group_id),
            Some(&member_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let (status, body) = app
        .call(
            "POST",
            &format!("/api/groups/{}/members", group_id),
            Some(&member_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], 1001);

    let (status, _) = app
        .call(
            "POST",
            &format!("/api/groups/{}/rounds/1/draw", group_id),
            Some(&member_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .call(
            "POST",
            &format!("/api/groups/{}/rounds/1/draw", group_id),
            Some(&admin_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let winner = body["data"]["winner"].as_str().unwrap().to_string();
    assert!(winner == admin.id.to_string() || winner == member.id.to_string());
    assert_eq!(body["data"]["round"]["status"], "completed");

    let (status, body) = app
        .call(
            "GET",
            &format!("/api/groups/equbs/{}", group_id),
            Some(&member_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["current_round"], 2);

    let (status, _) = app
        .call(
            "GET",
            &format!("/api/groups/edirs/{}", group_id),
            Some(&member_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_wallet_transfer_over_http() {
    let app = TestApp::new();
    let admin = app.seed_user(Role::Admin).await;
    let sender = app.seed_user(Role::User).await;
    let recipient = app.seed_user(Role::User).await;
    let admin_token = app.token_for(admin.id, &admin.email);
    let sender_token = app.token_for(sender.id, &sender.email);

    let (status, _) = app
        .call(
            "POST",
            "/api/wallet/admin/add-funds",
            Some(&admin_token),
            Some(json!({ "user_id": sender.id, "amount": 120.5 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .call(
            "POST",
            "/api/wallet/transfer",
            Some(&sender_token),
            Some(json!({ "recipient_email": recipient.email, "amount": 500 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 1007);

    let (status, _) = app
        .call(
            "POST",
            "/api/wallet/transfer",
            Some(&sender_token),
            Some(json!({ "recipient_email": recipient.email, "amount": 20.5 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .call("GET", "/api/wallet", Some(&sender_token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    // 金额以字符串形式序列化
    let balance: Decimal = body["data"]["balance"].as_str().unwrap().parse().unwrap();
    assert_eq!(balance, dec!(100));
    assert_eq!(body["data"]["transactions"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_malformed_input_returns_validation_envelope() {
    let app = TestApp::new();
    let admin = app.seed_user(Role::Admin).await;
    let token = app.token_for(admin.id, &admin.email);

    for body in [
        json!({ "name": "Odd", "type": "savings", "amount": 100, "total_rounds": 3 }),
        json!({ "name": "Odd", "type": "equb", "amount": 100, "total_rounds": -3 }),
        json!({ "name": "Odd", "type": "equb", "amount": "lots", "total_rounds": 3 }),
    ] {
        let (status, response) = app
            .call("POST", "/api/groups/create", Some(&token), Some(body))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response["code"], 1000);
        assert!(response["message"].as_str().unwrap().starts_with("Invalid request body"));
    }

    let (status, response) = app
        .call("GET", "/api/groups/not-a-uuid", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["code"], 1000);

    let (status, response) = app
        .call("POST", "/api/groups/00000000-0000-0000-0000-000000000000/rounds/first/draw", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["code"], 1000);

    // 缺少请求体
    let (status, response) = app.call("POST", "/api/auth/login", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["code"], 1000);
}
