use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::database::{Collection, Database, Entity, Write};
use crate::error::{AppError, AppResult};

/// 列表接口最多返回的条数
pub const LIST_LIMIT: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Warning,
    Info,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelatedTo {
    Equb,
    Edir,
    Payment,
    System,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub related_to: RelatedTo,
    pub related_id: Option<Uuid>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl Entity for Notification {
    const COLLECTION: Collection = Collection::Notifications;

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Deserialize)]
pub struct SendNotificationRequest {
    pub user_id: Option<Uuid>,
    pub title: Option<String>,
    pub message: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<NotificationKind>,
    pub related_to: Option<RelatedTo>,
    pub related_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct SendGroupNotificationRequest {
    pub group_id: Option<Uuid>,
    pub title: Option<String>,
    pub message: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<NotificationKind>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SentCount {
    pub sent: usize,
}

impl Notification {
    pub fn new(
        user_id: Uuid,
        title: impl Into<String>,
        message: impl Into<String>,
        kind: NotificationKind,
        related_to: RelatedTo,
        related_id: Option<Uuid>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            title: title.into(),
            message: message.into(),
            kind,
            related_to,
            related_id,
            is_read: false,
            created_at: Utc::now(),
        }
    }

    /// 最近的通知，按时间倒序
    pub async fn list_for_user(db: &Database, user_id: Uuid) -> AppResult<Vec<Self>> {
        let mut notifications: Vec<Self> = db
            .find::<Notification>(json!({ "user_id": user_id }))
            .await?
            .into_iter()
            .map(|n| n.into_inner())
            .collect();

        notifications.reverse();
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        notifications.truncate(LIST_LIMIT);
        Ok(notifications)
    }

    pub async fn mark_read(db: &Database, id: Uuid, user_id: Uuid) -> AppResult<Self> {
        let mut notification = db
            .get::<Notification>(id)
            .await?
            .filter(|n| n.user_id == user_id)
            .ok_or_else(|| AppError::not_found("Notification not found"))?;

        if !notification.is_read {
            notification.is_read = true;
            db.save(&notification).await?;
        }
        Ok(notification.into_inner())
    }

    /// 返回本次标记的数量
    pub async fn mark_all_read(db: &Database, user_id: Uuid) -> AppResult<usize> {
        let unread = db
            .find::<Notification>(json!({ "user_id": user_id, "is_read": false }))
            .await?;

        let writes = unread
            .into_iter()
            .map(|mut n| {
                n.is_read = true;
                Write::update(&n)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let count = writes.len();
        db.commit(writes).await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_kind_as_type_field() {
        let n = Notification::new(
            Uuid::new_v4(),
            "Title",
            "Body",
            NotificationKind::Success,
            RelatedTo::Equb,
            None,
        );
        let value = serde_json::to_value(&n).unwrap();
        assert_eq!(value["type"], "success");
        assert_eq!(value["related_to"], "equb");
        assert_eq!(value["is_read"], false);
    }
}
