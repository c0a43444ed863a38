use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppError;
use crate::utils::verify_token;

/// 令牌校验接口，返回令牌中的用户ID
#[async_trait]
pub trait AuthVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Uuid, AppError>;
}

/// HS256 JWT 校验
pub struct JwtVerifier {
    secret: String,
}

impl JwtVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }
}

#[async_trait]
impl AuthVerifier for JwtVerifier {
    async fn verify(&self, token: &str) -> Result<Uuid, AppError> {
        let claims = verify_token(token, &self.secret).map_err(|e| {
            tracing::debug!("Token rejected: {}", e);
            AppError::Unauthorized("Token is not valid".into())
        })?;

        Uuid::parse_str(&claims.sub)
            .map_err(|_| AppError::Unauthorized("Token is not valid".into()))
    }
}
