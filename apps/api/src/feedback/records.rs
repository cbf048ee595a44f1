//! Persistence of `ResumeRecord`s in the key-value store.

use std::cmp::Reverse;

use tracing::warn;
use uuid::Uuid;

use crate::models::resume::{resume_key, ResumeRecord, RESUME_KEY_PATTERN};
use crate::storage::{KvStore, StorageError};

pub async fn save_record(kv: &dyn KvStore, record: &ResumeRecord) -> Result<(), StorageError> {
    let value = serde_json::to_string(record)?;
    kv.set(&resume_key(record.id), &value).await
}

pub async fn load_record(kv: &dyn KvStore, id: Uuid) -> Result<Option<ResumeRecord>, StorageError> {
    match kv.get(&resume_key(id)).await? {
        Some(value) => Ok(Some(serde_json::from_str(&value)?)),
        None => Ok(None),
    }
}

/// Every stored résumé, newest first. Entries that fail to decode are
/// skipped with a warning.
pub async fn load_resumes(kv: &dyn KvStore) -> Result<Vec<ResumeRecord>, StorageError> {
    let items = kv.list(RESUME_KEY_PATTERN, true).await?;

    let mut records: Vec<ResumeRecord> = items
        .into_iter()
        .filter_map(|item| {
            let value = item.value?;
            match serde_json::from_str(&value) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(key = %item.key, error = %e, "Skipping unreadable resume record");
                    None
                }
            }
        })
        .collect();

    // records without a timestamp sort last
    records.sort_by_key(|r| Reverse(r.created_at));
    Ok(records)
}
