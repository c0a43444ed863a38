mod common;

use chrono::Utc;
use common::TestApp;
use equb_backend::error::AppError;
use equb_backend::routes::admin::AdminStats;
use equb_backend::routes::contribution::{
    Contribution, ContributionStatus, CreateContributionRequest, PaymentMethod,
};
use equb_backend::routes::group::{CreateGroupRequest, Group, GroupType};
use equb_backend::routes::notification::Notification;
use equb_backend::routes::payment::{
    CreateBranchPaymentRequest, Payment, PaymentStatus, PaymentType,
};
use equb_backend::routes::request::Request;
use equb_backend::routes::user::{Role, User};
use rust_decimal_macros::dec;
use uuid::Uuid;

async fn equb(app: &TestApp, admin: Uuid) -> Group {
    Group::create(
        app.db(),
        CreateGroupRequest {
            name: Some("Saris Equb".into()),
            group_type: Some(GroupType::Equb),
            amount: Some(dec!(300)),
            total_rounds: Some(2),
            start_date: Some(Utc::now()),
            ..Default::default()
        },
        admin,
    )
    .await
    .unwrap()
}

fn contribution_for(group: Uuid, round: u32) -> CreateContributionRequest {
    CreateContributionRequest {
        group_id: Some(group),
        amount: Some(dec!(300)),
        round: Some(round),
        payment_method: Some(PaymentMethod::MobileMoney),
        transaction_id: Some("TX-1".into()),
        notes: None,
    }
}

#[tokio::test]
async fn test_completed_contribution_updates_group() {
    let app = TestApp::new();
    let admin = app.seed_current(Role::Admin).await;
    let member = app.seed_current(Role::User).await;
    let group = equb(&app, admin.id).await;
    Group::join(app.db(), &app.state.notifier, group.id, &member)
        .await
        .unwrap();

    let contribution = Contribution::create(app.db(), member.id, contribution_for(group.id, 1))
        .await
        .unwrap();
    assert_eq!(contribution.status, ContributionStatus::Pending);
    assert_eq!(
        Contribution::list_pending_for_user(app.db(), member.id)
            .await
            .unwrap()
            .len(),
        1
    );

    let err = Contribution::update_status(
        app.db(),
        contribution.id,
        member.id,
        Some(ContributionStatus::Completed),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    for _ in 0..2 {
        let updated = Contribution::update_status(
            app.db(),
            contribution.id,
            admin.id,
            Some(ContributionStatus::Completed),
        )
        .await
        .unwrap();
        assert_eq!(updated.status, ContributionStatus::Completed);
    }

    // 重复确认不会重复累计
    let stored = Group::find_by_id(app.db(), group.id).await.unwrap().unwrap();
    assert_eq!(stored.member(member.id).unwrap().total_contributed, dec!(300));
    let payer = stored
        .round(1)
        .unwrap()
        .contributing_members
        .iter()
        .find(|c| c.user == member.id)
        .unwrap();
    assert!(payer.has_paid);
    assert!(payer.payment_date.is_some());

    assert!(Contribution::list_pending_for_user(app.db(), member.id)
        .await
        .unwrap()
        .is_empty());
    assert_eq!(
        Contribution::list_for_group(app.db(), group.id)
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn test_contribution_rejections() {
    let app = TestApp::new();
    let admin = app.seed_current(Role::Admin).await;
    let outsider = app.seed_current(Role::User).await;
    let group = equb(&app, admin.id).await;

    let err = Contribution::create(app.db(), outsider.id, contribution_for(group.id, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let err = Contribution::create(app.db(), admin.id, contribution_for(group.id, 3))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = Contribution::create(app.db(), admin.id, contribution_for(Uuid::new_v4(), 1))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let err = Contribution::create(
        app.db(),
        admin.id,
        CreateContributionRequest {
            payment_method: None,
            ..contribution_for(group.id, 1)
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    assert!(Contribution::list_for_user(app.db(), admin.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_branch_payment_confirmation() {
    let app = TestApp::new();
    let admin = app.seed_current(Role::Admin).await;
    let payer = app.seed_current(Role::User).await;
    let group = equb(&app, admin.id).await;

    let request = |amount| CreateBranchPaymentRequest {
        user_id: Some(payer.id),
        group_id: Some(group.id),
        amount: Some(amount),
        payment_type: Some(PaymentType::Equb),
        due_date: Some(Utc::now()),
    };

    let first = Payment::create_branch(app.db(), &app.state.notifier, admin.id, request(dec!(300)))
        .await
        .unwrap();
    let second = Payment::create_branch(app.db(), &app.state.notifier, admin.id, request(dec!(150)))
        .await
        .unwrap();
    assert_eq!(Payment::list_pending(app.db()).await.unwrap().len(), 2);

    let confirmed = Payment::resolve(
        app.db(),
        &app.state.notifier,
        first.id,
        admin.id,
        PaymentStatus::Confirmed,
        None,
    )
    .await
    .unwrap();
    assert_eq!(confirmed.confirmed_by, Some(admin.id));

    let rejected = Payment::resolve(
        app.db(),
        &app.state.notifier,
        second.id,
        admin.id,
        PaymentStatus::Rejected,
        Some("Receipt unreadable".into()),
    )
    .await
    .unwrap();
    assert_eq!(rejected.reason.as_deref(), Some("Receipt unreadable"));

    let err = Payment::resolve(
        app.db(),
        &app.state.notifier,
        first.id,
        admin.id,
        PaymentStatus::Rejected,
        None,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));

    let stats = Payment::stats(app.db()).await.unwrap();
    assert_eq!(stats.total_payments, 2);
    assert_eq!(stats.confirmed_payments, 1);
    assert_eq!(stats.rejected_payments, 1);
    assert_eq!(stats.pending_payments, 0);
    assert_eq!(stats.total_amount, dec!(300));

    let notes = Notification::list_for_user(app.db(), payer.id).await.unwrap();
    assert_eq!(notes.len(), 2);
    assert!(notes.iter().any(|n| n.message.contains("Receipt unreadable")));
}

#[tokio::test]
async fn test_branch_payment_requires_known_user() {
    let app = TestApp::new();
    let admin = app.seed_current(Role::Admin).await;
    let group = equb(&app, admin.id).await;

    let err = Payment::create_branch(
        app.db(),
        &app.state.notifier,
        admin.id,
        CreateBranchPaymentRequest {
            user_id: Some(Uuid::new_v4()),
            group_id: Some(group.id),
            amount: Some(dec!(10)),
            payment_type: Some(PaymentType::Equb),
            due_date: Some(Utc::now()),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    assert!(Payment::list_pending(app.db()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_admin_user_management_and_stats() {
    let app = TestApp::new();
    let admin = app.seed_current(Role::Admin).await;
    let superadmin = app.seed_current(Role::Superadmin).await;
    let user = app.seed_current(Role::User).await;
    let other = app.seed_current(Role::User).await;
    let group = equb(&app, admin.id).await;
    Request::create_join(app.db(), group.id, user.id).await.unwrap();

    let stats = AdminStats::collect(app.db()).await.unwrap();
    assert_eq!(stats.total_users, 4);
    assert_eq!(stats.active_equbs, 1);
    assert_eq!(stats.pending_requests, 1);

    assert_eq!(User::list_visible_to(app.db(), admin.role).await.unwrap().len(), 2);
    assert_eq!(
        User::list_visible_to(app.db(), superadmin.role)
            .await
            .unwrap()
            .len(),
        4
    );

    let promoted = User::set_role(app.db(), admin.role, user.id, Some("admin")).await.unwrap();
    assert_eq!(promoted.role, Role::Admin);
    let err = User::set_role(app.db(), admin.role, user.id, Some("owner")).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    // admin 不能授予或撤销 superadmin
    let err = User::set_role(app.db(), admin.role, user.id, Some("superadmin"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
    let err = User::set_role(app.db(), admin.role, superadmin.id, Some("user"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
    let stored = User::find_by_id(app.db(), superadmin.id).await.unwrap().unwrap();
    assert_eq!(stored.role, Role::Superadmin);

    let elevated = User::set_role(app.db(), superadmin.role, user.id, Some("superadmin"))
        .await
        .unwrap();
    assert_eq!(elevated.role, Role::Superadmin);

    let deactivated = User::set_active(app.db(), other.id, Some(false)).await.unwrap();
    assert!(!deactivated.is_active);

    User::remove(app.db(), other.id).await.unwrap();
    assert!(User::find_by_id(app.db(), other.id).await.unwrap().is_none());
    let err = User::remove(app.db(), other.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}
