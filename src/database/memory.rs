use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Collection, Document, Store, StoreError, Write};

/// 内存文档存储，用于测试和本地开发。
///
/// 每个集合是一个按插入顺序排列的 `Vec<Document>`；提交时在副本上应用所有写操作，
/// 全部成功后才替换原数据。
#[derive(Default, Clone)]
pub struct MemoryStore {
    collections: Arc<RwLock<HashMap<Collection, Vec<Document>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// JSON 包含关系，与 Postgres jsonb `@>` 的规则一致
pub(crate) fn json_contains(target: &Value, pattern: &Value) -> bool {
    match (target, pattern) {
        (Value::Object(t), Value::Object(p)) => p
            .iter()
            .all(|(key, pv)| t.get(key).is_some_and(|tv| json_contains(tv, pv))),
        (Value::Array(t), Value::Array(p)) => p
            .iter()
            .all(|pv| t.iter().any(|tv| json_contains(tv, pv))),
        (t, p) => t == p,
    }
}

fn check_unique(
    docs: &[Document],
    collection: Collection,
    id: Uuid,
    body: &Value,
) -> Result<(), StoreError> {
    for key in collection.unique_keys() {
        let Some(value) = body.get(*key).filter(|v| !v.is_null()) else {
            continue;
        };
        if docs
            .iter()
            .any(|doc| doc.id != id && doc.body.get(*key) == Some(value))
        {
            return Err(StoreError::Duplicate { collection });
        }
    }
    Ok(())
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, collection: Collection, id: Uuid) -> Result<Option<Document>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(&collection)
            .and_then(|docs| docs.iter().find(|doc| doc.id == id))
            .cloned())
    }

    async fn find(
        &self,
        collection: Collection,
        filter: &Value,
    ) -> Result<Vec<Document>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(&collection)
            .map(|docs| {
                docs.iter()
                    .filter(|doc| json_contains(&doc.body, filter))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn count(&self, collection: Collection, filter: &Value) -> Result<u64, StoreError> {
        Ok(self.find(collection, filter).await?.len() as u64)
    }

    async fn commit(&self, writes: Vec<Write>) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        let mut staged = collections.clone();

        for write in writes {
            match write {
                Write::Insert {
                    collection,
                    id,
                    body,
                } => {
                    let docs = staged.entry(collection).or_default();
                    if docs.iter().any(|doc| doc.id == id) {
                        return Err(StoreError::Duplicate { collection });
                    }
                    check_unique(docs, collection, id, &body)?;
                    docs.push(Document {
                        id,
                        version: 1,
                        body,
                    });
                }
                Write::Update {
                    collection,
                    id,
                    expected_version,
                    body,
                } => {
                    let docs = staged.entry(collection).or_default();
                    check_unique(docs, collection, id, &body)?;
                    let doc = docs
                        .iter_mut()
                        .find(|doc| doc.id == id && doc.version == expected_version)
                        .ok_or(StoreError::VersionConflict { collection, id })?;
                    doc.version += 1;
                    doc.body = body;
                }
                Write::Delete { collection, id } => {
                    if let Some(docs) = staged.get_mut(&collection) {
                        docs.retain(|doc| doc.id != id);
                    }
                }
            }
        }

        *collections = staged;
        Ok(())
    }
}
