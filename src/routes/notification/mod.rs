mod handler;
mod model;

pub use handler::{
    list_notifications, mark_all_as_read, mark_as_read, send_group_notification,
    send_notification,
};
pub use model::{Notification, NotificationKind, RelatedTo};
