// 数据库模块
// 所有集合都以 JSON 文档形式存储，子文档（成员、轮次、交易）嵌入在父文档中。
// 每个文档带有版本号，写入时做条件更新（乐观并发控制）。

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::{PgStore, connect_with_retry};

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Users,
    Groups,
    Requests,
    Wallets,
    Notifications,
    Payments,
    Contributions,
}

impl Collection {
    pub const ALL: [Collection; 7] = [
        Collection::Users,
        Collection::Groups,
        Collection::Requests,
        Collection::Wallets,
        Collection::Notifications,
        Collection::Payments,
        Collection::Contributions,
    ];

    pub fn table(&self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Groups => "groups",
            Collection::Requests => "requests",
            Collection::Wallets => "wallets",
            Collection::Notifications => "notifications",
            Collection::Payments => "payments",
            Collection::Contributions => "contributions",
        }
    }

    /// 需要唯一约束的顶层字段
    pub fn unique_keys(&self) -> &'static [&'static str] {
        match self {
            Collection::Users => &["email", "phone"],
            Collection::Wallets => &["user_id"],
            _ => &[],
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("version conflict on {collection}/{id}")]
    VersionConflict { collection: Collection, id: Uuid },

    #[error("duplicate document in {collection}")]
    Duplicate { collection: Collection },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("document codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

/// 存储层返回的原始文档
#[derive(Debug, Clone)]
pub struct Document {
    pub id: Uuid,
    pub version: i64,
    pub body: Value,
}

/// 一次提交中的单个写操作
#[derive(Debug, Clone)]
pub enum Write {
    Insert {
        collection: Collection,
        id: Uuid,
        body: Value,
    },
    /// 仅当存储中的版本等于 `expected_version` 时才生效
    Update {
        collection: Collection,
        id: Uuid,
        expected_version: i64,
        body: Value,
    },
    Delete {
        collection: Collection,
        id: Uuid,
    },
}

impl Write {
    pub fn insert<T: Entity>(entity: &T) -> Result<Self, StoreError> {
        Ok(Write::Insert {
            collection: T::COLLECTION,
            id: entity.id(),
            body: serde_json::to_value(entity)?,
        })
    }

    pub fn update<T: Entity>(stored: &Stored<T>) -> Result<Self, StoreError> {
        Ok(Write::Update {
            collection: T::COLLECTION,
            id: stored.doc.id(),
            expected_version: stored.version,
            body: serde_json::to_value(&stored.doc)?,
        })
    }

    pub fn delete<T: Entity>(id: Uuid) -> Self {
        Write::Delete {
            collection: T::COLLECTION,
            id,
        }
    }
}

/// 文档存储接口。`find` 的过滤条件是 JSON 包含关系（与 Postgres 的 `@>` 语义一致），
/// 结果按插入顺序返回。`commit` 中的所有写操作要么全部生效，要么全部不生效。
#[async_trait]
pub trait Store: Send + Sync {
    async fn get(&self, collection: Collection, id: Uuid) -> Result<Option<Document>, StoreError>;
    async fn find(&self, collection: Collection, filter: &Value)
    -> Result<Vec<Document>, StoreError>;
    async fn count(&self, collection: Collection, filter: &Value) -> Result<u64, StoreError>;
    async fn commit(&self, writes: Vec<Write>) -> Result<(), StoreError>;
}

/// 持久化实体
pub trait Entity: Serialize + DeserializeOwned + Send + Sync {
    const COLLECTION: Collection;

    fn id(&self) -> Uuid;
}

/// 带版本号的实体，用于条件更新
#[derive(Debug, Clone)]
pub struct Stored<T> {
    pub version: i64,
    pub doc: T,
}

impl<T> Stored<T> {
    pub fn into_inner(self) -> T {
        self.doc
    }
}

impl<T> Deref for Stored<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.doc
    }
}

impl<T> DerefMut for Stored<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.doc
    }
}

fn decode<T: Entity>(doc: Document) -> Result<Stored<T>, StoreError> {
    Ok(Stored {
        version: doc.version,
        doc: serde_json::from_value(doc.body)?,
    })
}

/// 类型化的存储访问入口
#[derive(Clone)]
pub struct Database {
    store: Arc<dyn Store>,
}

impl Database {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn get<T: Entity>(&self, id: Uuid) -> Result<Option<Stored<T>>, StoreError> {
        match self.store.get(T::COLLECTION, id).await? {
            Some(doc) => Ok(Some(decode(doc)?)),
            None => Ok(None),
        }
    }

    pub async fn find<T: Entity>(&self, filter: Value) -> Result<Vec<Stored<T>>, StoreError> {
        self.store
            .find(T::COLLECTION, &filter)
            .await?
            .into_iter()
            .map(decode)
            .collect()
    }

    pub async fn find_one<T: Entity>(&self, filter: Value) -> Result<Option<Stored<T>>, StoreError> {
        Ok(self.find(filter).await?.into_iter().next())
    }

    pub async fn all<T: Entity>(&self) -> Result<Vec<Stored<T>>, StoreError> {
        self.find(json!({})).await
    }

    pub async fn count<T: Entity>(&self, filter: Value) -> Result<u64, StoreError> {
        self.store.count(T::COLLECTION, &filter).await
    }

    pub async fn insert<T: Entity>(&self, entity: &T) -> Result<(), StoreError> {
        self.commit(vec![Write::insert(entity)?]).await
    }

    pub async fn save<T: Entity>(&self, stored: &Stored<T>) -> Result<(), StoreError> {
        self.commit(vec![Write::update(stored)?]).await
    }

    pub async fn delete<T: Entity>(&self, id: Uuid) -> Result<(), StoreError> {
        self.commit(vec![Write::delete::<T>(id)]).await
    }

    pub async fn commit(&self, writes: Vec<Write>) -> Result<(), StoreError> {
        if writes.is_empty() {
            return Ok(());
        }
        self.store.commit(writes).await
    }
}
