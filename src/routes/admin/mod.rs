mod handler;
mod model;

pub use handler::{
    admin_login, create_admin, dashboard_stats, delete_user, list_users, update_user_role,
    update_user_status,
};
pub use model::AdminStats;
