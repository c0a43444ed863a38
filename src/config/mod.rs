use std::env;
use std::time::Duration;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub jwt_secret: String,
    pub jwt_expiration_secs: u64,
    pub rate_limit_window_secs: u64,
    pub rate_limit_requests: u32,
    pub server_host: String,
    pub server_port: u16,
    pub api_base_uri: String,
    pub db_max_connections: u32,
    pub db_connect_retries: u32,
    pub db_retry_base_delay_ms: u64,
    /// 推送服务地址，未配置时只记录日志
    pub push_endpoint: Option<String>,
    pub push_server_key: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        dotenv::dotenv().ok();

        let jwt_expiration = env::var("JWT_EXPIRATION")
            .unwrap_or_else(|_| "1h".into())
            .trim_end_matches('h')
            .parse::<u64>()
            .unwrap_or(1);

        Ok(Config {
            database_url: env::var("DATABASE_URL")?,
            redis_url: env::var("REDIS_URL")?,
            jwt_secret: env::var("JWT_SECRET")?,
            jwt_expiration_secs: jwt_expiration * 3600,
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            server_port: parse_or("SERVER_PORT", 5000),
            api_base_uri: env::var("API_BASE_URI").unwrap_or_else(|_| "/api".into()),
            rate_limit_window_secs: parse_or("RATE_LIMIT_WINDOW", 60),
            rate_limit_requests: parse_or("RATE_LIMIT_REQUESTS", 100),
            db_max_connections: parse_or("DB_MAX_CONNECTIONS", 10),
            db_connect_retries: parse_or("DB_CONNECT_RETRIES", 5),
            db_retry_base_delay_ms: parse_or("DB_RETRY_BASE_DELAY_MS", 5000),
            push_endpoint: env::var("PUSH_ENDPOINT").ok().filter(|s| !s.is_empty()),
            push_server_key: env::var("PUSH_SERVER_KEY").ok().filter(|s| !s.is_empty()),
        })
    }

    pub fn jwt_expiration(&self) -> Duration {
        Duration::from_secs(self.jwt_expiration_secs)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    pub fn db_retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.db_retry_base_delay_ms)
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
