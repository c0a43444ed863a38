use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// 正数金额
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, AppError> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(AppError::validation("Invalid amount"))
        }
    }

    /// 可选输入，缺失或非正数都视为无效
    pub fn parse(value: Option<Decimal>) -> Result<Self, AppError> {
        value
            .ok_or_else(|| AppError::validation("Invalid amount"))
            .and_then(Self::new)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = AppError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl std::fmt::Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 金额相加，超出 Decimal 范围时返回校验错误
pub fn checked_add(total: Decimal, amount: Decimal) -> Result<Decimal, AppError> {
    total
        .checked_add(amount)
        .ok_or_else(|| AppError::validation("Amount out of range"))
}

/// 单笔金额乘以人数
pub fn checked_mul(amount: Decimal, count: usize) -> Result<Decimal, AppError> {
    amount
        .checked_mul(Decimal::from(count))
        .ok_or_else(|| AppError::validation("Amount out of range"))
}
