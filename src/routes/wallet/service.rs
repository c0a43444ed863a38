use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use super::model::{
    AddFundsBody, DepositByReferenceBody, DepositRequestBody, PendingDeposit,
    ProcessTransactionBody, Transaction, TransactionStatus, TransactionType, TransferRequestBody,
    Wallet, WithdrawalRequestBody,
};
use crate::database::{Database, StoreError, Stored, Write};
use crate::error::{AppError, AppResult};
use crate::infrastructure::Notifier;
use crate::middleware::CurrentUser;
use crate::money::Amount;
use crate::routes::notification::{Notification, NotificationKind, RelatedTo};
use crate::routes::user::User;

fn required(value: Option<String>, message: &str) -> AppResult<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::validation(message))
}

/// 写入钱包变更和通知，提交后推送
async fn commit_with_notifications(
    db: &Database,
    notifier: &Notifier,
    mut writes: Vec<Write>,
    notifications: Vec<Notification>,
) -> AppResult<()> {
    writes.extend(Notifier::stage(&notifications)?);
    db.commit(writes).await?;
    notifier.dispatch(&notifications).await;
    Ok(())
}

/// 已存在的钱包生成 update，新建的生成 insert
fn wallet_write(wallet: &Stored<Wallet>, created: bool) -> Result<Write, StoreError> {
    if created {
        Write::insert(&wallet.doc)
    } else {
        Write::update(wallet)
    }
}

impl Wallet {
    pub async fn find_by_user(db: &Database, user_id: Uuid) -> AppResult<Option<Stored<Self>>> {
        Ok(db
            .find_one::<Wallet>(json!({ "user_id": user_id }))
            .await?)
    }

    /// 读取用户钱包，不存在时创建。并发创建时以已存储的为准。
    pub async fn get_or_create(db: &Database, user_id: Uuid) -> AppResult<Stored<Self>> {
        if let Some(wallet) = Self::find_by_user(db, user_id).await? {
            return Ok(wallet);
        }

        let wallet = Wallet::new(user_id, Utc::now());
        match db.insert(&wallet).await {
            Ok(()) => {
                tracing::info!("Wallet {} created for user {}", wallet.id, user_id);
                Ok(Stored {
                    version: 1,
                    doc: wallet,
                })
            }
            Err(StoreError::Duplicate { .. }) => Self::find_by_user(db, user_id)
                .await?
                .ok_or_else(|| AppError::Internal("wallet vanished after duplicate insert".into())),
            Err(e) => Err(e.into()),
        }
    }

    /// 读取钱包，尚未创建时返回未持久化的新钱包
    async fn load_or_new(db: &Database, user_id: Uuid) -> AppResult<(Stored<Self>, bool)> {
        Ok(match Self::find_by_user(db, user_id).await? {
            Some(wallet) => (wallet, false),
            None => (
                Stored {
                    version: 0,
                    doc: Wallet::new(user_id, Utc::now()),
                },
                true,
            ),
        })
    }

    pub async fn request_deposit_for(
        db: &Database,
        notifier: &Notifier,
        user: &CurrentUser,
        body: DepositRequestBody,
    ) -> AppResult<Transaction> {
        let amount = Amount::parse(body.amount)?;
        let branch_name = required(body.branch_name, "Branch name is required")?;
        let reference_number = required(body.reference_number, "Reference number is required")?;

        let (mut wallet, created) = Self::load_or_new(db, user.id).await?;
        let transaction =
            wallet.request_deposit(amount, branch_name, reference_number, Utc::now());

        let notifications = notifier
            .admin_recipients()
            .await?
            .into_iter()
            .map(|admin| {
                Notification::new(
                    admin,
                    "New deposit request",
                    format!(
                        "User {} has requested a deposit of {} ETB.",
                        user.display_name(),
                        amount
                    ),
                    NotificationKind::Info,
                    RelatedTo::Payment,
                    Some(transaction.id),
                )
            })
            .collect();

        commit_with_notifications(db, notifier, vec![wallet_write(&wallet, created)?], notifications)
            .await?;
        tracing::info!("Deposit request {} of {} by {}", transaction.id, amount, user.id);
        Ok(transaction)
    }

    pub async fn request_withdrawal_for(
        db: &Database,
        notifier: &Notifier,
        user: &CurrentUser,
        body: WithdrawalRequestBody,
    ) -> AppResult<Transaction> {
        let amount = Amount::parse(body.amount)?;
        let bank_name = required(body.bank_name, "Bank name is required")?;
        let account_number = required(body.account_number, "Account number is required")?;

        let (mut wallet, created) = Self::load_or_new(db, user.id).await?;
        let transaction =
            wallet.request_withdrawal(amount, bank_name, account_number, Utc::now())?;

        let notifications = notifier
            .admin_recipients()
            .await?
            .into_iter()
            .map(|admin| {
                Notification::new(
                    admin,
                    "New withdrawal request",
                    format!(
                        "User {} has requested a withdrawal of {} ETB.",
                        user.display_name(),
                        amount
                    ),
                    NotificationKind::Info,
                    RelatedTo::Payment,
                    Some(transaction.id),
                )
            })
            .collect();

        commit_with_notifications(db, notifier, vec![wallet_write(&wallet, created)?], notifications)
            .await?;
        tracing::info!("Withdrawal request {} of {} by {}", transaction.id, amount, user.id);
        Ok(transaction)
    }

    /// 转账：两个钱包在同一次提交中更新，任一版本冲突则整体失败
    pub async fn transfer(
        db: &Database,
        notifier: &Notifier,
        sender: &CurrentUser,
        body: TransferRequestBody,
    ) -> AppResult<Transaction> {
        let amount = Amount::parse(body.amount)?;
        let recipient_email = required(body.recipient_email, "Recipient email is required")?;

        let (mut sender_wallet, sender_created) = Self::load_or_new(db, sender.id).await?;
        if amount.value() > sender_wallet.balance {
            return Err(AppError::InsufficientFunds);
        }

        let recipient = User::find_by_email(db, &recipient_email)
            .await?
            .ok_or_else(|| AppError::not_found("Recipient not found"))?;
        if recipient.id == sender.id {
            return Err(AppError::validation("Cannot transfer to yourself"));
        }

        let (mut recipient_wallet, recipient_created) = Self::load_or_new(db, recipient.id).await?;
        let now = Utc::now();

        let description = body
            .description
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| format!("Transfer to {}", recipient.display_name()));
        let sent = sender_wallet.debit_transfer(amount, recipient.id, description, now)?;
        recipient_wallet.credit(
            amount,
            format!("Transfer from {}", sender.display_name()),
            None,
            None,
            now,
        )?;

        let notification = Notification::new(
            recipient.id,
            "Funds received",
            format!(
                "You have received {} ETB from {}.",
                amount,
                sender.display_name()
            ),
            NotificationKind::Success,
            RelatedTo::Payment,
            Some(sent.id),
        );

        commit_with_notifications(
            db,
            notifier,
            vec![
                wallet_write(&sender_wallet, sender_created)?,
                wallet_write(&recipient_wallet, recipient_created)?,
            ],
            vec![notification],
        )
        .await?;
        tracing::info!(
            "Transfer {} of {} from {} to {}",
            sent.id,
            amount,
            sender.id,
            recipient.id
        );
        Ok(sent)
    }

    /// 管理员确认充值或提现
    pub async fn process_transaction(
        db: &Database,
        notifier: &Notifier,
        admin: &CurrentUser,
        expected_type: TransactionType,
        body: ProcessTransactionBody,
    ) -> AppResult<Transaction> {
        admin.require_admin()?;
        let (Some(wallet_id), Some(transaction_id)) = (body.wallet_id, body.transaction_id) else {
            return Err(AppError::validation("Missing required fields"));
        };
        let decision = TransactionStatus::parse_decision(body.status.as_deref())?;

        let mut wallet = db
            .get::<Wallet>(wallet_id)
            .await?
            .ok_or_else(|| AppError::not_found("Wallet not found"))?;
        let transaction =
            wallet.resolve(transaction_id, expected_type, decision, admin.id, Utc::now())?;

        let label = match expected_type {
            TransactionType::Withdrawal => "withdrawal",
            _ => "deposit",
        };
        let notification = match decision {
            TransactionStatus::Completed => Notification::new(
                wallet.user_id,
                format!("Your {} was approved", label),
                format!(
                    "Your {} of {} ETB has been approved.",
                    label, transaction.amount
                ),
                NotificationKind::Success,
                RelatedTo::Payment,
                Some(transaction.id),
            ),
            _ => Notification::new(
                wallet.user_id,
                format!("Your {} was rejected", label),
                format!(
                    "Your {} of {} ETB has been rejected.",
                    label, transaction.amount
                ),
                NotificationKind::Error,
                RelatedTo::Payment,
                Some(transaction.id),
            ),
        };

        commit_with_notifications(db, notifier, vec![Write::update(&wallet)?], vec![notification])
            .await?;
        tracing::info!(
            "{} {} {:?} by {}",
            label,
            transaction.id,
            decision,
            admin.id
        );
        Ok(transaction)
    }

    #[allow(clippy::too_many_arguments)]
    async fn admin_credit(
        db: &Database,
        notifier: &Notifier,
        admin: &CurrentUser,
        user_id: Uuid,
        amount: Amount,
        description: String,
        reference_number: Option<String>,
        message: String,
    ) -> AppResult<Transaction> {
        User::find_by_id(db, user_id)
            .await?
            .ok_or_else(|| AppError::not_found("User not found"))?;

        let (mut wallet, created) = Self::load_or_new(db, user_id).await?;
        let transaction = wallet.credit(
            amount,
            description,
            reference_number,
            Some(admin.id),
            Utc::now(),
        )?;

        let notification = Notification::new(
            user_id,
            "Funds added",
            message,
            NotificationKind::Success,
            RelatedTo::Payment,
            Some(transaction.id),
        );
        commit_with_notifications(db, notifier, vec![wallet_write(&wallet, created)?], vec![notification])
            .await?;
        tracing::info!(
            "Admin {} credited {} to user {}",
            admin.id,
            amount,
            user_id
        );
        Ok(transaction)
    }

    pub async fn add_funds(
        db: &Database,
        notifier: &Notifier,
        admin: &CurrentUser,
        body: AddFundsBody,
    ) -> AppResult<Transaction> {
        admin.require_admin()?;
        let user_id = body
            .user_id
            .ok_or_else(|| AppError::validation("Invalid input"))?;
        let amount = Amount::parse(body.amount)?;
        let description = body
            .note
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| "Funds added by admin".into());

        Self::admin_credit(
            db,
            notifier,
            admin,
            user_id,
            amount,
            description,
            None,
            format!("{} ETB has been added to your wallet by admin.", amount),
        )
        .await
    }

    pub async fn deposit_by_reference(
        db: &Database,
        notifier: &Notifier,
        admin: &CurrentUser,
        body: DepositByReferenceBody,
    ) -> AppResult<Transaction> {
        admin.require_admin()?;
        let (Some(user_id), Some(reference_number)) = (
            body.user_id,
            body.reference_number
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty()),
        ) else {
            return Err(AppError::validation("Missing required fields"));
        };
        let amount = Amount::parse(body.amount)?;
        let description = body
            .note
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| format!("Branch deposit (Ref: {})", reference_number));
        let message = format!(
            "{} ETB has been deposited to your wallet (Ref: {}).",
            amount, reference_number
        );

        Self::admin_credit(
            db,
            notifier,
            admin,
            user_id,
            amount,
            description,
            Some(reference_number),
            message,
        )
        .await
    }

    pub async fn list_all(db: &Database) -> AppResult<Vec<Self>> {
        Ok(db
            .all::<Wallet>()
            .await?
            .into_iter()
            .map(Stored::into_inner)
            .collect())
    }

    pub async fn list_pending_deposits(db: &Database) -> AppResult<Vec<PendingDeposit>> {
        let wallets = db
            .find::<Wallet>(json!({
                "transactions": [{ "type": TransactionType::Deposit, "status": TransactionStatus::Pending }]
            }))
            .await?;
        Ok(wallets
            .iter()
            .flat_map(|w| w.pending_deposits())
            .collect())
    }
}
