use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use equb_backend::{
    AppState, build_router,
    config::Config,
    database::{Database, PgStore, connect_with_retry},
    infrastructure::{HttpPushSender, JwtVerifier, LogPushSender, PushSender},
    middleware::{RateLimiter, rate_limit},
};
#[cfg(debug_assertions)]
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 加载配置
    let config = Config::from_env().expect("Failed to load configuration");

    #[cfg(debug_assertions)]
    tracing::info!("Running in debug mode with CORS enabled");

    #[cfg(not(debug_assertions))]
    tracing::info!("Running in production mode with CORS disabled");

    // 连接数据库并建表
    let pool = connect_with_retry(&config)
        .await
        .expect("Failed to connect to Postgres");
    let store = PgStore::new(pool);
    store.migrate().await.expect("Failed to prepare schema");
    let db = Database::new(Arc::new(store));

    // 推送通道
    let push: Arc<dyn PushSender> = match &config.push_endpoint {
        Some(endpoint) => {
            tracing::info!("Push notifications via {}", endpoint);
            Arc::new(HttpPushSender::new(
                endpoint.clone(),
                config.push_server_key.clone(),
            ))
        }
        None => {
            tracing::info!("No push endpoint configured, push notifications are logged only");
            Arc::new(LogPushSender)
        }
    };

    let auth = Arc::new(JwtVerifier::new(config.jwt_secret.clone()));
    let state = AppState::new(db, config.clone(), auth, push);

    // 设置 Redis 限流器
    let redis_client =
        redis::Client::open(config.redis_url.clone()).expect("Failed to create Redis client");
    let rate_limiter = Arc::new(RateLimiter::new(redis_client, &config));

    let router = build_router(state).layer(axum::middleware::from_fn_with_state(
        rate_limiter,
        rate_limit,
    ));

    // 根据编译模式决定是否添加CORS
    #[cfg(debug_assertions)]
    let router = {
        tracing::debug!("Adding CORS layer for development mode");
        router.layer(CorsLayer::permissive())
    };

    // 启动服务器
    let addr = SocketAddr::new(
        config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        config.server_port,
    );
    tracing::info!("Server listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Failed to start server");
}
