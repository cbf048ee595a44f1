//! S3-backed file store (MinIO locally, AWS in production).

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use tracing::info;
use uuid::Uuid;

use crate::storage::{sanitize_file_name, FileStore, FsItem, StorageError, UploadFile};

/// Every upload lands under this prefix as `uploads/{id}/{file name}`.
pub const UPLOAD_ROOT: &str = "uploads/";

#[derive(Clone)]
pub struct S3FileStore {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3FileStore {
    pub fn new(client: aws_sdk_s3::Client, bucket: &str) -> Self {
        Self {
            client,
            bucket: bucket.to_string(),
        }
    }
}

/// Maps a directory path to an object prefix. The root (`""`, `"."`, `"./"`,
/// `"/"`) is the upload root.
fn dir_prefix(path: &str) -> String {
    let trimmed = path.trim().trim_start_matches("./").trim_matches('/');
    if trimmed.is_empty() || trimmed == "." {
        UPLOAD_ROOT.to_string()
    } else {
        format!("{trimmed}/")
    }
}

/// Builds an `FsItem` from an object key of the form `uploads/{id}/{name}`.
fn item_from_key(key: &str, size: u64) -> FsItem {
    let rest = key.strip_prefix(UPLOAD_ROOT).unwrap_or(key);
    let (id, name) = match rest.split_once('/') {
        Some((id, name)) => (id.to_string(), name.to_string()),
        None => (rest.to_string(), rest.to_string()),
    };
    FsItem {
        id,
        name,
        path: key.to_string(),
        size,
    }
}

#[async_trait]
impl FileStore for S3FileStore {
    async fn upload(&self, file: UploadFile) -> Result<FsItem, StorageError> {
        let id = Uuid::new_v4();
        let name = sanitize_file_name(&file.name);
        let key = format!("{UPLOAD_ROOT}{id}/{name}");
        let size = file.bytes.len() as u64;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(file.bytes))
            .content_type(
                file.content_type
                    .unwrap_or_else(|| "application/octet-stream".to_string()),
            )
            .send()
            .await
            .map_err(|e| StorageError::S3(format!("upload of {key} failed: {e}")))?;

        info!("Uploaded s3://{}/{} ({size} bytes)", self.bucket, key);
        Ok(item_from_key(&key, size))
    }

    async fn read(&self, path: &str) -> Result<Bytes, StorageError> {
        let object = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
            .map_err(|e| {
                let service_error = e.into_service_error();
                if service_error.is_no_such_key() {
                    StorageError::NotFound(path.to_string())
                } else {
                    StorageError::S3(format!("read of {path} failed: {service_error}"))
                }
            })?;

        let data = object
            .body
            .collect()
            .await
            .map_err(|e| StorageError::S3(format!("read of {path} failed: {e}")))?;
        Ok(data.into_bytes())
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
            .map_err(|e| StorageError::S3(format!("delete of {path} failed: {e}")))?;
        Ok(())
    }

    async fn read_dir(&self, path: &str) -> Result<Vec<FsItem>, StorageError> {
        let prefix = dir_prefix(path);
        let mut items = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let page = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&prefix)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|e| StorageError::S3(format!("listing {prefix} failed: {e}")))?;

            for object in page.contents() {
                if let Some(key) = object.key() {
                    let size = object.size().unwrap_or(0).max(0) as u64;
                    items.push(item_from_key(key, size));
                }
            }

            match page.next_continuation_token() {
                Some(token) if page.is_truncated().unwrap_or(false) => {
                    continuation = Some(token.to_string());
                }
                _ => break,
            }
        }

        Ok(items)
    }
}
