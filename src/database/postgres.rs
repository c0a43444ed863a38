use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{Executor, FromRow, PgPool};
use uuid::Uuid;

use super::{Collection, Document, Store, StoreError, Write};
use crate::config::Config;

#[derive(FromRow)]
struct DocumentRow {
    id: Uuid,
    version: i64,
    body: Json<Value>,
}

impl From<DocumentRow> for Document {
    fn from(row: DocumentRow) -> Self {
        Document {
            id: row.id,
            version: row.version,
            body: row.body.0,
        }
    }
}

/// 初始连接失败时按指数退避重试，之后的业务操作不做重试
pub async fn connect_with_retry(config: &Config) -> Result<PgPool, sqlx::Error> {
    let mut attempt: u32 = 0;
    loop {
        let result = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    conn.execute("SET application_name = 'equb_backend';").await?;
                    Ok(())
                })
            })
            .connect(&config.database_url)
            .await;

        match result {
            Ok(pool) => {
                tracing::info!("Connected to Postgres");
                return Ok(pool);
            }
            Err(e) if attempt < config.db_connect_retries => {
                let delay = config.db_retry_base_delay() * 2u32.saturating_pow(attempt);
                attempt += 1;
                tracing::warn!(
                    "Postgres connection failed ({}), attempt {}/{}: retrying in {:?}",
                    e,
                    attempt,
                    config.db_connect_retries,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                tracing::error!("Max retry attempts reached, giving up: {}", e);
                return Err(e);
            }
        }
    }
}

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 建表和索引，可重复执行
    pub async fn migrate(&self) -> Result<(), StoreError> {
        for collection in Collection::ALL {
            let table = collection.table();
            self.pool
                .execute(
                    format!(
                        r#"
                        CREATE TABLE IF NOT EXISTS {table} (
                            id UUID PRIMARY KEY,
                            seq BIGSERIAL,
                            version BIGINT NOT NULL,
                            body JSONB NOT NULL,
                            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                        )
                        "#
                    )
                    .as_str(),
                )
                .await?;

            self.pool
                .execute(
                    format!(
                        "CREATE INDEX IF NOT EXISTS {table}_body_idx ON {table} USING GIN (body jsonb_path_ops)"
                    )
                    .as_str(),
                )
                .await?;

            for key in collection.unique_keys() {
                self.pool
                    .execute(
                        format!(
                            "CREATE UNIQUE INDEX IF NOT EXISTS {table}_{key}_key ON {table} ((body->>'{key}'))"
                        )
                        .as_str(),
                    )
                    .await?;
            }
        }

        tracing::info!("Database schema is up to date");
        Ok(())
    }
}

fn map_write_error(collection: Collection, err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Duplicate { collection },
        _ => StoreError::Database(err),
    }
}

#[async_trait]
impl Store for PgStore {
    async fn get(&self, collection: Collection, id: Uuid) -> Result<Option<Document>, StoreError> {
        let row = sqlx::query_as::<_, DocumentRow>(&format!(
            "SELECT id, version, body FROM {} WHERE id = $1",
            collection.table()
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Document::from))
    }

    async fn find(
        &self,
        collection: Collection,
        filter: &Value,
    ) -> Result<Vec<Document>, StoreError> {
        let rows = sqlx::query_as::<_, DocumentRow>(&format!(
            "SELECT id, version, body FROM {} WHERE body @> $1 ORDER BY seq",
            collection.table()
        ))
        .bind(Json(filter.clone()))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Document::from).collect())
    }

    async fn count(&self, collection: Collection, filter: &Value) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM {} WHERE body @> $1",
            collection.table()
        ))
        .bind(Json(filter.clone()))
        .fetch_one(&self.pool)
        .await?;

        Ok(count.max(0) as u64)
    }

    async fn commit(&self, writes: Vec<Write>) -> Result<(), StoreError> {
        // 任一写操作失败时事务被丢弃并回滚
        let mut tx = self.pool.begin().await?;

        for write in writes {
            match write {
                Write::Insert {
                    collection,
                    id,
                    body,
                } => {
                    sqlx::query(&format!(
                        "INSERT INTO {} (id, version, body) VALUES ($1, 1, $2)",
                        collection.table()
                    ))
                    .bind(id)
                    .bind(Json(body))
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| map_write_error(collection, e))?;
                }
                Write::Update {
                    collection,
                    id,
                    expected_version,
                    body,
                } => {
                    let result = sqlx::query(&format!(
                        "UPDATE {} SET body = $1, version = version + 1, updated_at = NOW() \
                         WHERE id = $2 AND version = $3",
                        collection.table()
                    ))
                    .bind(Json(body))
                    .bind(id)
                    .bind(expected_version)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| map_write_error(collection, e))?;

                    if result.rows_affected() == 0 {
                        tracing::warn!("Version conflict on {}/{}", collection, id);
                        return Err(StoreError::VersionConflict { collection, id });
                    }
                }
                Write::Delete { collection, id } => {
                    sqlx::query(&format!("DELETE FROM {} WHERE id = $1", collection.table()))
                        .bind(id)
                        .execute(&mut *tx)
                        .await?;
                }
            }
        }

        tx.commit().await?;
        Ok(())
    }
}
