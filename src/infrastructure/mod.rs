// 外部协作方：令牌校验、推送通知
pub mod auth;
pub mod notifier;
pub mod push;

pub use auth::{AuthVerifier, JwtVerifier};
pub use notifier::Notifier;
pub use push::{HttpPushSender, LogPushSender, PushError, PushMessage, PushSender};
