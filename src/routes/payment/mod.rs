mod handler;
mod model;

pub use handler::{
    confirm_payment, create_branch_payment, payment_stats, pending_payments, reject_payment,
};
pub use model::{
    CreateBranchPaymentRequest, Payment, PaymentChannel, PaymentStats, PaymentStatus, PaymentType,
};
