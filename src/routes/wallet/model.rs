use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::{Collection, Entity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    Transfer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub amount: Decimal,
    pub description: String,
    pub status: TransactionStatus,
    pub reference_number: Option<String>,
    pub branch_name: Option<String>,
    pub bank_name: Option<String>,
    pub account_number: Option<String>,
    pub recipient_id: Option<Uuid>,
    pub processed_by: Option<Uuid>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    pub id: Uuid,
    pub user_id: Uuid,
    pub balance: Decimal,
    pub transactions: Vec<Transaction>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Wallet {
    const COLLECTION: Collection = Collection::Wallets;

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct DepositRequestBody {
    pub amount: Option<Decimal>,
    pub branch_name: Option<String>,
    pub reference_number: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WithdrawalRequestBody {
    pub amount: Option<Decimal>,
    pub bank_name: Option<String>,
    pub account_number: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TransferRequestBody {
    pub amount: Option<Decimal>,
    pub recipient_email: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProcessTransactionBody {
    pub wallet_id: Option<Uuid>,
    pub transaction_id: Option<Uuid>,
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AddFundsBody {
    pub user_id: Option<Uuid>,
    pub amount: Option<Decimal>,
    pub note: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DepositByReferenceBody {
    pub user_id: Option<Uuid>,
    pub amount: Option<Decimal>,
    pub reference_number: Option<String>,
    pub note: Option<String>,
}

/// 待确认的充值，供管理员列表使用
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingDeposit {
    pub transaction_id: Uuid,
    pub wallet_id: Uuid,
    pub user_id: Uuid,
    pub amount: Decimal,
    pub description: String,
    pub branch_name: Option<String>,
    pub reference_number: Option<String>,
    pub created_at: DateTime<Utc>,
}
