mod handler;
mod model;

pub use handler::{
    create_contribution, group_contributions, my_contributions, pending_contributions,
    update_contribution_status,
};
pub use model::{
    Contribution, ContributionStatus, CreateContributionRequest, PaymentMethod,
    UpdateContributionStatusRequest,
};
