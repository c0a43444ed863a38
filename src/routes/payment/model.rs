use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::database::{Collection, Database, Entity, Stored, Write};
use crate::error::{AppError, AppResult};
use crate::infrastructure::Notifier;
use crate::money::Amount;
use crate::routes::group::Group;
use crate::routes::notification::{Notification, NotificationKind, RelatedTo};
use crate::routes::user::User;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentType {
    Equb,
    Edir,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Confirmed,
    Rejected,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentChannel {
    #[default]
    BranchPayment,
}

/// 线下网点缴费记录，需管理员确认
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub group_id: Uuid,
    pub amount: Decimal,
    pub payment_type: PaymentType,
    pub status: PaymentStatus,
    pub payment_method: PaymentChannel,
    pub due_date: DateTime<Utc>,
    pub confirmed_by: Option<Uuid>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Entity for Payment {
    const COLLECTION: Collection = Collection::Payments;

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateBranchPaymentRequest {
    pub user_id: Option<Uuid>,
    pub group_id: Option<Uuid>,
    pub amount: Option<Decimal>,
    pub payment_type: Option<PaymentType>,
    pub due_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RejectPaymentRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentStats {
    pub total_payments: usize,
    pub pending_payments: usize,
    pub confirmed_payments: usize,
    pub rejected_payments: usize,
    pub total_amount: Decimal,
}

impl PaymentStats {
    pub fn from_payments<'a>(payments: impl IntoIterator<Item = &'a Payment>) -> Self {
        payments
            .into_iter()
            .fold(PaymentStats::default(), |mut stats, payment| {
                stats.total_payments += 1;
                match payment.status {
                    PaymentStatus::Pending => stats.pending_payments += 1,
                    PaymentStatus::Confirmed => {
                        stats.confirmed_payments += 1;
                        stats.total_amount = stats.total_amount.saturating_add(payment.amount);
                    }
                    PaymentStatus::Rejected => stats.rejected_payments += 1,
                }
                stats
            })
    }
}

impl Payment {
    pub async fn create_branch(
        db: &Database,
        notifier: &Notifier,
        admin: Uuid,
        req: CreateBranchPaymentRequest,
    ) -> AppResult<Self> {
        let (Some(user_id), Some(group_id), Some(payment_type), Some(due_date)) =
            (req.user_id, req.group_id, req.payment_type, req.due_date)
        else {
            return Err(AppError::validation("All fields are required"));
        };
        let amount = Amount::parse(req.amount)?;

        User::find_by_id(db, user_id)
            .await?
            .ok_or_else(|| AppError::not_found("User not found"))?;
        Group::find_by_id(db, group_id)
            .await?
            .ok_or_else(|| AppError::not_found("Group not found"))?;

        let payment = Payment {
            id: Uuid::new_v4(),
            user_id,
            group_id,
            amount: amount.value(),
            payment_type,
            status: PaymentStatus::Pending,
            payment_method: PaymentChannel::BranchPayment,
            due_date,
            confirmed_by: None,
            confirmed_at: None,
            reason: None,
            created_at: Utc::now(),
        };

        let notifications = vec![Notification::new(
            admin,
            "New Branch Payment",
            format!("New branch payment of ETB {} pending confirmation", amount),
            NotificationKind::Info,
            RelatedTo::Payment,
            Some(payment.id),
        )];
        let mut writes = vec![Write::insert(&payment)?];
        writes.extend(Notifier::stage(&notifications)?);
        db.commit(writes).await?;
        notifier.dispatch(&notifications).await;

        tracing::info!("Branch payment {} of {} created", payment.id, amount);
        Ok(payment)
    }

    pub async fn list_pending(db: &Database) -> AppResult<Vec<Self>> {
        let mut payments: Vec<Self> = db
            .find::<Payment>(json!({ "status": PaymentStatus::Pending }))
            .await?
            .into_iter()
            .rev()
            .map(Stored::into_inner)
            .collect();
        payments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(payments)
    }

    pub async fn stats(db: &Database) -> AppResult<PaymentStats> {
        let payments = db.all::<Payment>().await?;
        Ok(PaymentStats::from_payments(payments.iter().map(|p| &p.doc)))
    }

    /// 确认或拒绝一笔待处理缴费，并通知缴费人
    pub async fn resolve(
        db: &Database,
        notifier: &Notifier,
        id: Uuid,
        admin: Uuid,
        decision: PaymentStatus,
        reason: Option<String>,
    ) -> AppResult<Self> {
        let mut payment = db
            .get::<Payment>(id)
            .await?
            .ok_or_else(|| AppError::not_found("Payment not found"))?;
        if payment.status != PaymentStatus::Pending {
            return Err(AppError::invalid_state("Payment is not pending"));
        }

        payment.status = decision;
        payment.confirmed_by = Some(admin);
        payment.confirmed_at = Some(Utc::now());

        let notification = match decision {
            PaymentStatus::Confirmed => Notification::new(
                payment.user_id,
                "Payment Confirmed",
                format!("Your payment of ETB {} has been confirmed", payment.amount),
                NotificationKind::Success,
                RelatedTo::Payment,
                Some(payment.id),
            ),
            _ => {
                payment.reason = reason;
                Notification::new(
                    payment.user_id,
                    "Payment Rejected",
                    format!(
                        "Your payment of ETB {} has been rejected. Reason: {}",
                        payment.amount,
                        payment.reason.as_deref().unwrap_or("not specified")
                    ),
                    NotificationKind::Error,
                    RelatedTo::Payment,
                    Some(payment.id),
                )
            }
        };

        let notifications = vec![notification];
        let mut writes = vec![Write::update(&payment)?];
        writes.extend(Notifier::stage(&notifications)?);
        db.commit(writes).await?;
        notifier.dispatch(&notifications).await;

        tracing::info!("Payment {} {:?} by {}", payment.id, decision, admin);
        Ok(payment.into_inner())
    }
}
