// 钱包账本的纯内存操作。余额只在交易状态变为 completed 时变动，且永不为负。

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use super::model::{PendingDeposit, Transaction, TransactionStatus, TransactionType, Wallet};
use crate::error::{AppError, AppResult};
use crate::money::{Amount, checked_add};

impl TransactionStatus {
    /// 管理员处理结果只能是 completed / failed
    pub fn parse_decision(value: Option<&str>) -> AppResult<Self> {
        match value {
            Some("completed") => Ok(TransactionStatus::Completed),
            Some("failed") => Ok(TransactionStatus::Failed),
            _ => Err(AppError::validation("Invalid status")),
        }
    }
}

impl Transaction {
    fn new(
        transaction_type: TransactionType,
        amount: Amount,
        description: String,
        status: TransactionStatus,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            transaction_type,
            amount: amount.value(),
            description,
            status,
            reference_number: None,
            branch_name: None,
            bank_name: None,
            account_number: None,
            recipient_id: None,
            processed_by: None,
            processed_at: None,
            created_at: now,
        }
    }
}

impl Wallet {
    pub fn new(user_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            balance: Decimal::ZERO,
            transactions: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn transaction_mut(&mut self, id: Uuid) -> Option<&mut Transaction> {
        self.transactions.iter_mut().find(|t| t.id == id)
    }

    fn push(&mut self, transaction: Transaction, now: DateTime<Utc>) -> Transaction {
        self.transactions.push(transaction.clone());
        self.updated_at = now;
        transaction
    }

    pub fn request_deposit(
        &mut self,
        amount: Amount,
        branch_name: String,
        reference_number: String,
        now: DateTime<Utc>,
    ) -> Transaction {
        let mut transaction = Transaction::new(
            TransactionType::Deposit,
            amount,
            format!("Deposit request at {}", branch_name),
            TransactionStatus::Pending,
            now,
        );
        transaction.branch_name = Some(branch_name);
        transaction.reference_number = Some(reference_number);
        self.push(transaction, now)
    }

    pub fn request_withdrawal(
        &mut self,
        amount: Amount,
        bank_name: String,
        account_number: String,
        now: DateTime<Utc>,
    ) -> AppResult<Transaction> {
        if amount.value() > self.balance {
            return Err(AppError::InsufficientFunds);
        }
        let mut transaction = Transaction::new(
            TransactionType::Withdrawal,
            amount,
            format!("Withdrawal request to {}", bank_name),
            TransactionStatus::Pending,
            now,
        );
        transaction.bank_name = Some(bank_name);
        transaction.account_number = Some(account_number);
        Ok(self.push(transaction, now))
    }

    /// 转出：扣减余额并记录一笔已完成的 transfer
    pub fn debit_transfer(
        &mut self,
        amount: Amount,
        recipient: Uuid,
        description: String,
        now: DateTime<Utc>,
    ) -> AppResult<Transaction> {
        if amount.value() > self.balance {
            return Err(AppError::InsufficientFunds);
        }
        self.balance -= amount.value();
        let mut transaction = Transaction::new(
            TransactionType::Transfer,
            amount,
            description,
            TransactionStatus::Completed,
            now,
        );
        transaction.recipient_id = Some(recipient);
        Ok(self.push(transaction, now))
    }

    /// 直接入账：记录一笔已完成的 deposit
    pub fn credit(
        &mut self,
        amount: Amount,
        description: String,
        reference_number: Option<String>,
        processed_by: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> AppResult<Transaction> {
        self.balance = checked_add(self.balance, amount.value())?;
        let mut transaction = Transaction::new(
            TransactionType::Deposit,
            amount,
            description,
            TransactionStatus::Completed,
            now,
        );
        transaction.reference_number = reference_number;
        if processed_by.is_some() {
            transaction.processed_by = processed_by;
            transaction.processed_at = Some(now);
        }
        Ok(self.push(transaction, now))
    }

    /// 确认或拒绝一笔待处理交易。completed 时按类型调整余额。
    pub fn resolve(
        &mut self,
        transaction_id: Uuid,
        expected_type: TransactionType,
        decision: TransactionStatus,
        admin: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<Transaction> {
        let balance = self.balance;
        let transaction = self
            .transaction_mut(transaction_id)
            .ok_or_else(|| AppError::not_found("Transaction not found"))?;

        if transaction.status != TransactionStatus::Pending {
            return Err(AppError::invalid_state("Transaction is not pending"));
        }
        if transaction.transaction_type != expected_type {
            return Err(AppError::invalid_state(match expected_type {
                TransactionType::Deposit => "Transaction is not a deposit",
                TransactionType::Withdrawal => "Transaction is not a withdrawal",
                TransactionType::Transfer => "Transaction is not a transfer",
            }));
        }

        let amount = transaction.amount;
        let new_balance = match (decision, expected_type) {
            (TransactionStatus::Completed, TransactionType::Deposit) => checked_add(balance, amount)?,
            (TransactionStatus::Completed, TransactionType::Withdrawal) => {
                if amount > balance {
                    return Err(AppError::InsufficientFunds);
                }
                balance - amount
            }
            _ => balance,
        };

        transaction.status = decision;
        transaction.processed_by = Some(admin);
        transaction.processed_at = Some(now);
        let resolved = transaction.clone();

        self.balance = new_balance;
        self.updated_at = now;
        Ok(resolved)
    }

    pub fn pending_deposits(&self) -> impl Iterator<Item = PendingDeposit> + '_ {
        self.transactions
            .iter()
            .filter(|t| {
                t.transaction_type == TransactionType::Deposit
                    && t.status == TransactionStatus::Pending
            })
            .map(|t| PendingDeposit {
                transaction_id: t.id,
                wallet_id: self.id,
                user_id: self.user_id,
                amount: t.amount,
                description: t.description.clone(),
                branch_name: t.branch_name.clone(),
                reference_number: t.reference_number.clone(),
                created_at: t.created_at,
            })
    }
}
