#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use chrono::Utc;
use equb_backend::{
    AppState, build_router,
    config::Config,
    database::{Collection, Database, Document, MemoryStore, Store, StoreError, Write},
    infrastructure::{JwtVerifier, PushError, PushMessage, PushSender},
    middleware::CurrentUser,
    routes::user::{Role, User},
    utils::generate_token,
};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

pub const JWT_SECRET: &str = "test-secret";

/// 记录所有推送消息，不做实际投递
#[derive(Default)]
pub struct RecordingPushSender {
    pub sent: Mutex<Vec<PushMessage>>,
}

impl RecordingPushSender {
    pub fn titles_for(&self, device_token: &str) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.device_token == device_token)
            .map(|m| m.title.clone())
            .collect()
    }
}

#[async_trait]
impl PushSender for RecordingPushSender {
    async fn send(&self, message: &PushMessage) -> Result<(), PushError> {
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

/// 在下一次提交前先落下一组预设写入，模拟另一个请求在读取和提交之间抢先完成
#[derive(Default)]
pub struct InterleavingStore {
    inner: MemoryStore,
    pending: Mutex<Option<Vec<Write>>>,
}

impl InterleavingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn before_next_commit(&self, writes: Vec<Write>) {
        *self.pending.lock().unwrap() = Some(writes);
    }
}

#[async_trait]
impl Store for InterleavingStore {
    async fn get(&self, collection: Collection, id: Uuid) -> Result<Option<Document>, StoreError> {
        self.inner.get(collection, id).await
    }

    async fn find(
        &self,
        collection: Collection,
        filter: &Value,
    ) -> Result<Vec<Document>, StoreError> {
        self.inner.find(collection, filter).await
    }

    async fn count(&self, collection: Collection, filter: &Value) -> Result<u64, StoreError> {
        self.inner.count(collection, filter).await
    }

    async fn commit(&self, writes: Vec<Write>) -> Result<(), StoreError> {
        let interleaved = self.pending.lock().unwrap().take();
        if let Some(interleaved) = interleaved {
            self.inner.commit(interleaved).await?;
        }
        self.inner.commit(writes).await
    }
}

pub fn test_config() -> Config {
    Config {
        database_url: String::new(),
        redis_url: String::new(),
        jwt_secret: JWT_SECRET.into(),
        jwt_expiration_secs: 3600,
        rate_limit_window_secs: 60,
        rate_limit_requests: 100,
        server_host: "127.0.0.1".into(),
        server_port: 0,
        api_base_uri: "/api".into(),
        db_max_connections: 1,
        db_connect_retries: 0,
        db_retry_base_delay_ms: 1,
        push_endpoint: None,
        push_server_key: None,
    }
}

pub struct TestApp {
    pub state: AppState,
    pub push: Arc<RecordingPushSender>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()))
    }

    pub fn with_store(store: Arc<dyn Store>) -> Self {
        let config = test_config();
        let db = Database::new(store);
        let push = Arc::new(RecordingPushSender::default());
        let state = AppState::new(
            db,
            config.clone(),
            Arc::new(JwtVerifier::new(config.jwt_secret.clone())),
            push.clone(),
        );
        Self { state, push }
    }

    pub fn db(&self) -> &Database {
        &self.state.db
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    /// 直接写入用户，跳过密码哈希
    pub async fn seed_user(&self, role: Role) -> User {
        let id = Uuid::new_v4();
        let short = &id.simple().to_string()[..8];
        let user = User {
            id,
            first_name: "Test".into(),
            last_name: short.to_string(),
            email: format!("{}@example.com", short),
            phone: format!("+2519{}", short),
            address: "Addis Ababa".into(),
            occupation: "Tester".into(),
            emergency_contact: "+251900000000".into(),
            password_hash: "not-a-hash".into(),
            role,
            is_active: true,
            device_token: Some(format!("device-{}", short)),
            created_at: Utc::now(),
        };
        self.db().insert(&user).await.unwrap();
        user
    }

    pub async fn seed_current(&self, role: Role) -> CurrentUser {
        CurrentUser::from(&self.seed_user(role).await)
    }

    pub fn token_for(&self, user_id: Uuid, email: &str) -> String {
        generate_token(user_id, email, &self.state.config).unwrap().0
    }

    pub async fn call(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }
}
