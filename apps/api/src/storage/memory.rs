//! In-memory stand-ins for the storage collaborators, used by tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use crate::storage::{
    sanitize_file_name, FileStore, FsItem, KvItem, KvStore, StorageError, UploadFile,
};

/// Matches Redis-style globs where `*` is the only wildcard.
fn glob_match(pattern: &str, key: &str) -> bool {
    match pattern.split_once('*') {
        None => pattern == key,
        Some((head, tail)) => {
            key.starts_with(head)
                && key.len() >= head.len()
                && (0..=key.len() - head.len()).any(|i| {
                    let rest = &key[head.len()..];
                    rest.is_char_boundary(i) && glob_match(tail, &rest[i..])
                })
        }
    }
}

#[derive(Default)]
pub struct MemoryKv {
    entries: Mutex<BTreeMap<String, String>>,
    fail_writes: AtomicBool,
    /// Number of successful `set` calls that may happen before writes start failing.
    writes_before_failure: Mutex<Option<usize>>,
}

impl MemoryKv {
    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    pub fn fail_writes_after(&self, successful_writes: usize) {
        *self.writes_before_failure.lock() = Some(successful_writes);
    }

    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.entries.lock().clone()
    }

    fn write_error() -> StorageError {
        StorageError::S3("scripted KV write failure".to_string())
    }
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Self::write_error());
        }
        {
            let mut budget = self.writes_before_failure.lock();
            if let Some(remaining) = budget.as_mut() {
                if *remaining == 0 {
                    return Err(Self::write_error());
                }
                *remaining -= 1;
            }
        }
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.entries.lock().remove(key);
        Ok(())
    }

    async fn list(
        &self,
        pattern: &str,
        include_values: bool,
    ) -> Result<Vec<KvItem>, StorageError> {
        Ok(self
            .entries
            .lock()
            .iter()
            .filter(|(key, _)| glob_match(pattern, key))
            .map(|(key, value)| KvItem {
                key: key.clone(),
                value: include_values.then(|| value.clone()),
            })
            .collect())
    }

    async fn flush(&self) -> Result<(), StorageError> {
        self.entries.lock().clear();
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryFiles {
    files: Mutex<BTreeMap<String, (FsItem, Bytes)>>,
    next_id: AtomicUsize,
    fail_uploads_after: Mutex<Option<usize>>,
    undeletable: Mutex<Vec<String>>,
    unreadable: Mutex<Vec<String>>,
}

impl MemoryFiles {
    /// Uploads succeed `count` times, then fail.
    pub fn fail_uploads_after(&self, count: usize) {
        *self.fail_uploads_after.lock() = Some(count);
    }

    /// Deleting `path` fails.
    pub fn make_undeletable(&self, path: &str) {
        self.undeletable.lock().push(path.to_string());
    }

    /// Reading `path` fails even though it exists.
    pub fn make_unreadable(&self, path: &str) {
        self.unreadable.lock().push(path.to_string());
    }

    pub fn insert(&self, path: &str, bytes: &'static [u8]) {
        let item = FsItem {
            id: path.to_string(),
            name: sanitize_file_name(path),
            path: path.to_string(),
            size: bytes.len() as u64,
        };
        self.files
            .lock()
            .insert(path.to_string(), (item, Bytes::from_static(bytes)));
    }

    pub fn paths(&self) -> Vec<String> {
        self.files.lock().keys().cloned().collect()
    }
}

#[async_trait]
impl FileStore for MemoryFiles {
    async fn upload(&self, file: UploadFile) -> Result<FsItem, StorageError> {
        {
            let mut budget = self.fail_uploads_after.lock();
            if let Some(remaining) = budget.as_mut() {
                if *remaining == 0 {
                    return Err(StorageError::S3("scripted upload failure".to_string()));
                }
                *remaining -= 1;
            }
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst).to_string();
        let name = sanitize_file_name(&file.name);
        let path = format!("uploads/{id}/{name}");
        let item = FsItem {
            id,
            name,
            path: path.clone(),
            size: file.bytes.len() as u64,
        };
        self.files
            .lock()
            .insert(path, (item.clone(), file.bytes));
        Ok(item)
    }

    async fn read(&self, path: &str) -> Result<Bytes, StorageError> {
        if self.unreadable.lock().iter().any(|p| p == path) {
            return Err(StorageError::S3(format!("cannot read {path}")));
        }
        self.files
            .lock()
            .get(path)
            .map(|(_, bytes)| bytes.clone())
            .ok_or_else(|| StorageError::NotFound(path.to_string()))
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        if self.undeletable.lock().iter().any(|p| p == path) {
            return Err(StorageError::S3(format!("cannot delete {path}")));
        }
        self.files.lock().remove(path);
        Ok(())
    }

    async fn read_dir(&self, _path: &str) -> Result<Vec<FsItem>, StorageError> {
        Ok(self
            .files
            .lock()
            .values()
            .map(|(item, _)| item.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_match() {
        assert!(glob_match("resume:*", "resume:abc"));
        assert!(glob_match("resume:*", "resume:"));
        assert!(!glob_match("resume:*", "other:abc"));
        assert!(glob_match("*", "anything"));
        assert!(glob_match("a*c", "abbbc"));
        assert!(!glob_match("a*c", "abbb"));
        assert!(glob_match("exact", "exact"));
    }

    #[tokio::test]
    async fn test_memory_kv_list_and_flush() {
        let kv = MemoryKv::default();
        kv.set("resume:1", "a").await.unwrap();
        kv.set("resume:2", "b").await.unwrap();
        kv.set("session:1", "c").await.unwrap();

        let listed = kv.list("resume:*", true).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].value.as_deref(), Some("a"));

        let keys_only = kv.list("resume:*", false).await.unwrap();
        assert!(keys_only.iter().all(|i| i.value.is_none()));

        kv.flush().await.unwrap();
        assert!(kv.snapshot().is_empty());
    }
}
