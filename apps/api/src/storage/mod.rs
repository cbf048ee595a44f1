//! Storage collaborators: the key-value store and the file store.
//!
//! Both are reached through traits so the analysis flow and handlers can run
//! against in-memory fakes in tests.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod files;
pub mod handlers;
pub mod kv;
#[cfg(test)]
pub mod memory;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("S3 error: {0}")]
    S3(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A key returned by `KvStore::list`, with its value when requested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KvItem {
    pub key: String,
    pub value: Option<String>,
}

#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Lists keys matching a glob `pattern` (e.g. `resume:*`).
    async fn list(&self, pattern: &str, include_values: bool)
        -> Result<Vec<KvItem>, StorageError>;

    /// Removes every key owned by this store.
    async fn flush(&self) -> Result<(), StorageError>;
}

/// A stored file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FsItem {
    pub id: String,
    pub name: String,
    pub path: String,
    pub size: u64,
}

/// A file about to be uploaded.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub bytes: Bytes,
    pub content_type: Option<String>,
}

#[async_trait]
pub trait FileStore: Send + Sync {
    async fn upload(&self, file: UploadFile) -> Result<FsItem, StorageError>;

    async fn read(&self, path: &str) -> Result<Bytes, StorageError>;

    async fn delete(&self, path: &str) -> Result<(), StorageError>;

    async fn read_dir(&self, path: &str) -> Result<Vec<FsItem>, StorageError>;
}

/// Keeps only the final component of a client-supplied file name.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(&['/', '\\'][..]).next().unwrap_or("").trim();
    if base.is_empty() || base == "." || base == ".." {
        "upload".to_string()
    } else {
        base.to_string()
    }
}
