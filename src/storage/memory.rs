//! 进程内存储后端
//!
//! 用于本地开发（`storage.backend: memory`）和测试。签名 URL 只是
//! `memory://` 形式的描述符，无法被浏览器直接访问。

use super::{
    validate_expires, ObjectStorage, SignedUrlAction, SignedUrlOptions, StorageError,
    StoredObject,
};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;

/// 进程内存储
#[derive(Debug, Default)]
pub struct MemoryStorage {
    bucket: String,
    objects: RwLock<HashMap<String, StoredObject>>,
}

impl MemoryStorage {
    /// 创建空存储
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            objects: RwLock::new(HashMap::new()),
        }
    }

    /// 当前对象名列表（已排序）
    pub fn object_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.objects.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// 对象数量
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    async fn signed_url(
        &self,
        object_name: &str,
        action: SignedUrlAction,
        options: &SignedUrlOptions,
    ) -> Result<String, StorageError> {
        let expires = options.effective_expires();
        validate_expires(expires).map_err(StorageError::Configuration)?;

        let mut url = format!(
            "memory://{}/{}?method={}&expires={}",
            self.bucket,
            urlencoding::encode(object_name),
            action.http_method(),
            Utc::now().timestamp() + expires as i64
        );
        if action == SignedUrlAction::Write {
            url.push_str("&contentType=");
            url.push_str(&urlencoding::encode(options.effective_content_type()));
        }
        Ok(url)
    }

    async fn download_object(&self, object_name: &str) -> Result<StoredObject, StorageError> {
        self.objects
            .read()
            .get(object_name)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(object_name.to_string()))
    }

    async fn upload_buffer(
        &self,
        object_name: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<(), StorageError> {
        self.objects.write().insert(
            object_name.to_string(),
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn delete_object(&self, object_name: &str) -> Result<(), StorageError> {
        self.objects.write().remove(object_name);
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
