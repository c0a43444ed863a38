use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;

use crate::{
    config::Config,
    utils::{error_codes, error_to_api_response},
};

/// 解析客户端IP：x-real-ip 优先，其次 x-forwarded-for 的第一个地址，最后是连接地址
pub fn client_ip(headers: &HeaderMap, remote: Option<SocketAddr>) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    header("x-real-ip")
        .or_else(|| {
            header("x-forwarded-for")
                .and_then(|list| list.split(',').map(str::trim).find(|ip| !ip.is_empty()))
        })
        .map(str::to_string)
        .or_else(|| remote.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".into())
}

/// 固定窗口计数键，窗口编号随时间推进，过期的键由 Redis 清理
fn window_key(ip: &str, window_secs: u64, now_secs: i64) -> String {
    let window = now_secs.max(0) as u64 / window_secs.max(1);
    format!("rate_limit:{}:{}", ip, window)
}

/// 基于 Redis 的固定窗口限流，按客户端IP计数
#[derive(Clone)]
pub struct RateLimiter {
    redis: Arc<redis::Client>,
    window_secs: u64,
    max_requests: u64,
}

impl RateLimiter {
    pub fn new(redis: redis::Client, config: &Config) -> Self {
        Self {
            redis: Arc::new(redis),
            window_secs: config.rate_limit_window().as_secs(),
            max_requests: u64::from(config.rate_limit_requests),
        }
    }

    /// 当前窗口内的请求数（含本次）
    async fn hit(&self, key: &str) -> redis::RedisResult<u64> {
        let mut conn = self.redis.get_multiplexed_async_connection().await?;
        let (count,): (u64,) = redis::pipe()
            .atomic()
            .incr(key, 1)
            .expire(key, self.window_secs as i64)
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(count)
    }

    fn rejection(&self) -> Response {
        (
            StatusCode::TOO_MANY_REQUESTS,
            error_to_api_response::<()>(
                error_codes::RATE_LIMIT,
                format!("Too many requests, retry in {} seconds", self.window_secs),
            ),
        )
            .into_response()
    }

    pub async fn check_rate_limit(self: Arc<Self>, req: Request<Body>, next: Next) -> Response {
        let remote = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ci| ci.0);
        let ip = client_ip(req.headers(), remote);
        let key = window_key(&ip, self.window_secs, Utc::now().timestamp());

        match self.hit(&key).await {
            Ok(count) if count > self.max_requests => {
                tracing::warn!("Rate limit exceeded for {} ({} requests)", ip, count);
                self.rejection()
            }
            Ok(count) => {
                tracing::debug!("{} request {} in current window", ip, count);
                next.run(req).await
            }
            Err(e) => {
                // Redis 不可用时放行
                tracing::warn!("Rate limiter unavailable: {}", e);
                next.run(req).await
            }
        }
    }
}

pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    limiter.check_rate_limit(req, next).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn forwarded_headers_take_precedence_over_peer_address() {
        let peer: SocketAddr = "10.0.0.9:5000".parse().unwrap();
        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers, Some(peer)), "10.0.0.9");
        assert_eq!(client_ip(&headers, None), "unknown");

        headers.insert("x-forwarded-for", HeaderValue::from_static(" , 196.188.1.2, 10.0.0.1"));
        assert_eq!(client_ip(&headers, Some(peer)), "196.188.1.2");

        headers.insert("x-real-ip", HeaderValue::from_static("196.188.7.7"));
        assert_eq!(client_ip(&headers, Some(peer)), "196.188.7.7");
    }

    #[test]
    fn window_key_changes_only_at_window_boundary() {
        assert_eq!(window_key("1.2.3.4", 60, 120), "rate_limit:1.2.3.4:2");
        assert_eq!(window_key("1.2.3.4", 60, 179), "rate_limit:1.2.3.4:2");
        assert_eq!(window_key("1.2.3.4", 60, 180), "rate_limit:1.2.3.4:3");
    }
}
