use std::sync::Arc;

use futures_util::future::join_all;
use serde_json::json;
use uuid::Uuid;

use super::push::{PushMessage, PushSender};
use crate::database::{Database, StoreError, Write};
use crate::routes::notification::Notification;
use crate::routes::user::{Role, User};

/// 通知服务：通知记录随业务写操作一起提交，提交成功后再推送。
/// 推送失败只记日志，不影响业务结果。
#[derive(Clone)]
pub struct Notifier {
    db: Database,
    push: Arc<dyn PushSender>,
}

impl Notifier {
    pub fn new(db: Database, push: Arc<dyn PushSender>) -> Self {
        Self { db, push }
    }

    /// 所有 admin / superadmin 用户的ID
    pub async fn admin_recipients(&self) -> Result<Vec<Uuid>, StoreError> {
        let mut ids = Vec::new();
        for role in [Role::Admin, Role::Superadmin] {
            let admins = self.db.find::<User>(json!({ "role": role })).await?;
            ids.extend(admins.into_iter().map(|u| u.id));
        }
        Ok(ids)
    }

    /// 把通知转为写操作，供业务提交时一并写入
    pub fn stage(notifications: &[Notification]) -> Result<Vec<Write>, StoreError> {
        notifications.iter().map(Write::insert).collect()
    }

    /// 单独写入并推送
    pub async fn send(&self, notifications: Vec<Notification>) -> Result<(), StoreError> {
        self.db.commit(Self::stage(&notifications)?).await?;
        self.dispatch(&notifications).await;
        Ok(())
    }

    /// 推送已提交的通知
    pub async fn dispatch(&self, notifications: &[Notification]) {
        let deliveries = notifications.iter().map(|n| self.deliver(n));
        join_all(deliveries).await;
    }

    async fn deliver(&self, notification: &Notification) {
        let user = match self.db.get::<User>(notification.user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                tracing::warn!("Notification addressed to unknown user {}", notification.user_id);
                return;
            }
            Err(e) => {
                tracing::warn!("Failed to load push recipient {}: {}", notification.user_id, e);
                return;
            }
        };

        let Some(token) = user.device_token.clone() else {
            tracing::debug!("No device token for user {}", user.id);
            return;
        };

        let message = PushMessage {
            device_token: token,
            title: notification.title.clone(),
            body: notification.message.clone(),
            data: json!({
                "notification_id": notification.id,
                "type": notification.kind,
                "related_to": notification.related_to,
                "related_id": notification.related_id,
            }),
        };

        if let Err(e) = self.push.send(&message).await {
            tracing::warn!("Push delivery to user {} failed: {}", user.id, e);
        }
    }
}
