//! Redis-backed key-value store.
//!
//! Every key is namespaced with the configured prefix, so `flush` only
//! removes keys this service owns.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{debug, info};

use crate::storage::{KvItem, KvStore, StorageError};

#[derive(Clone)]
pub struct RedisKv {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisKv {
    pub async fn connect(redis_url: &str, prefix: &str) -> Result<Self, StorageError> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        info!("Redis key-value store connected (prefix: '{prefix}')");

        Ok(Self {
            conn,
            prefix: prefix.to_string(),
        })
    }

    fn namespaced(&self, key: &str) -> String {
        namespaced(&self.prefix, key)
    }

    async fn scan(&self, pattern: &str) -> Result<Vec<String>, StorageError> {
        let mut conn = self.conn.clone();
        let mut keys = Vec::new();
        let mut iter = conn.scan_match::<_, String>(self.namespaced(pattern)).await?;
        while let Some(key) = iter.next_item().await {
            keys.push(key);
        }
        Ok(keys)
    }
}

fn namespaced(prefix: &str, key: &str) -> String {
    format!("{prefix}{key}")
}

fn strip_namespace<'a>(prefix: &str, key: &'a str) -> &'a str {
    key.strip_prefix(prefix).unwrap_or(key)
}

#[async_trait]
impl KvStore for RedisKv {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let mut conn = self.conn.clone();
        Ok(conn.get(self.namespaced(key)).await?)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(self.namespaced(key), value).await?;
        debug!(key, "KV set");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(self.namespaced(key)).await?;
        Ok(())
    }

    async fn list(
        &self,
        pattern: &str,
        include_values: bool,
    ) -> Result<Vec<KvItem>, StorageError> {
        let mut keys = self.scan(pattern).await?;
        keys.sort();
        keys.dedup();

        let values: Vec<Option<String>> = if include_values && !keys.is_empty() {
            let mut conn = self.conn.clone();
            // MGET always returns a list, even for a single key
            redis::cmd("MGET")
                .arg(&keys)
                .query_async(&mut conn)
                .await?
        } else {
            vec![None; keys.len()]
        };

        Ok(keys
            .iter()
            .zip(values)
            .map(|(key, value)| KvItem {
                key: strip_namespace(&self.prefix, key).to_string(),
                value,
            })
            .collect())
    }

    async fn flush(&self) -> Result<(), StorageError> {
        let keys = self.scan("*").await?;
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(&keys).await?;
        info!("Flushed {} keys under prefix '{}'", keys.len(), self.prefix);
        Ok(())
    }
}
