mod handler;
mod ledger;
mod model;
mod service;

pub use handler::{
    add_funds, deposit_by_reference, get_wallet, list_wallets, pending_deposits, process_deposit,
    process_withdrawal, request_deposit, request_withdrawal, transfer,
};
pub use model::{
    AddFundsBody, DepositByReferenceBody, DepositRequestBody, PendingDeposit,
    ProcessTransactionBody, Transaction, TransactionStatus, TransactionType, TransferRequestBody,
    Wallet, WithdrawalRequestBody,
};
