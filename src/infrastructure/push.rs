use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PushError {
    #[error("push request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("push service rejected message: {0}")]
    Rejected(String),
}

/// 发往单个设备的推送消息
#[derive(Debug, Clone, Serialize)]
pub struct PushMessage {
    pub device_token: String,
    pub title: String,
    pub body: String,
    pub data: Value,
}

/// 推送通道，按设备令牌投递
#[async_trait]
pub trait PushSender: Send + Sync {
    async fn send(&self, message: &PushMessage) -> Result<(), PushError>;
}

/// 未配置推送服务时使用，只写日志
pub struct LogPushSender;

#[async_trait]
impl PushSender for LogPushSender {
    async fn send(&self, message: &PushMessage) -> Result<(), PushError> {
        tracing::debug!(
            "Push (not delivered) to {}: {}",
            message.device_token,
            message.title
        );
        Ok(())
    }
}

/// 基于 HTTP 的推送服务（FCM legacy 格式）
pub struct HttpPushSender {
    client: reqwest::Client,
    endpoint: String,
    server_key: Option<String>,
}

impl HttpPushSender {
    pub fn new(endpoint: impl Into<String>, server_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            server_key,
        }
    }
}

#[async_trait]
impl PushSender for HttpPushSender {
    async fn send(&self, message: &PushMessage) -> Result<(), PushError> {
        let payload = json!({
            "to": message.device_token,
            "notification": {
                "title": message.title,
                "body": message.body,
            },
            "data": message.data,
        });

        let mut request = self.client.post(&self.endpoint).json(&payload);
        if let Some(key) = &self.server_key {
            request = request.header(reqwest::header::AUTHORIZATION, format!("key={}", key));
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PushError::Rejected(format!("{}: {}", status, body)));
        }

        tracing::debug!("Push delivered: {}", message.title);
        Ok(())
    }
}
