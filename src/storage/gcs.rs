//! Google Cloud Storage 后端
//!
//! 使用服务账号私钥生成 V4 签名 URL（`GOOG4-RSA-SHA256`），
//! 缓冲区上传/下载/删除同样通过即时签发的 URL 完成，不依赖其他 GCS API。
//!
//! 签名过程：
//! 1. 构造规范请求（方法、URI、查询串、签名头、`UNSIGNED-PAYLOAD`）
//! 2. 对规范请求做 SHA-256，拼接成待签字符串
//! 3. 使用 RSA PKCS#1 v1.5 + SHA-256 签名，十六进制编码后附加到查询串

use super::{
    validate_expires, ObjectStorage, SignedUrlAction, SignedUrlOptions, StorageError,
    StoredObject, DEFAULT_CONTENT_TYPE,
};
use crate::config::StorageConfig;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::{header, StatusCode};
use ring::rand::SystemRandom;
use ring::signature::{RsaKeyPair, RSA_PKCS1_SHA256};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use url::Url;

/// 签名算法标识
pub const SIGNING_ALGORITHM: &str = "GOOG4-RSA-SHA256";

/// 内部读写操作使用的签名有效期（秒）
const INTERNAL_URL_EXPIRES_SECS: u64 = 300;

/// 服务账号签名器
pub struct ServiceAccountSigner {
    client_email: String,
    key_pair: RsaKeyPair,
    rng: SystemRandom,
}

impl std::fmt::Debug for ServiceAccountSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountSigner")
            .field("client_email", &self.client_email)
            .finish_non_exhaustive()
    }
}

impl ServiceAccountSigner {
    /// 从 PKCS#8 PEM 私钥创建签名器
    pub fn from_pem(client_email: impl Into<String>, pem: &str) -> Result<Self, StorageError> {
        let mut reader = pem.as_bytes();
        let key = rustls_pemfile::pkcs8_private_keys(&mut reader)
            .next()
            .ok_or_else(|| StorageError::InvalidKey("未找到 PKCS#8 私钥".to_string()))?
            .map_err(|e| StorageError::InvalidKey(format!("PEM 解析失败: {}", e)))?;

        let key_pair = RsaKeyPair::from_pkcs8(key.secret_pkcs8_der())
            .map_err(|e| StorageError::InvalidKey(format!("RSA 私钥无效: {}", e)))?;

        Ok(Self {
            client_email: client_email.into(),
            key_pair,
            rng: SystemRandom::new(),
        })
    }

    /// 服务账号邮箱
    pub fn client_email(&self) -> &str {
        &self.client_email
    }

    /// RSA 公钥（DER 编码的 RSAPublicKey）
    pub fn public_key_der(&self) -> Vec<u8> {
        use ring::signature::KeyPair;
        self.key_pair.public_key().as_ref().to_vec()
    }

    /// 签名
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>, StorageError> {
        let mut signature = vec![0u8; self.key_pair.public_modulus_len()];
        self.key_pair
            .sign(&RSA_PKCS1_SHA256, &self.rng, message, &mut signature)
            .map_err(|_| StorageError::InvalidKey("RSA 签名失败".to_string()))?;
        Ok(signature)
    }
}

/// GCS 存储后端
///
/// 凭证或存储桶缺失时仍可构造，错误在首次使用时以 `Configuration` 返回。
pub struct GcsStorage {
    http: reqwest::Client,
    endpoint: Result<Url, StorageError>,
    bucket: Option<String>,
    signer: Result<Arc<ServiceAccountSigner>, StorageError>,
}

impl GcsStorage {
    /// 从配置创建
    pub fn from_config(config: &StorageConfig) -> Self {
        let signer = match (
            non_empty(&config.project_id),
            non_empty(&config.client_email),
            non_empty(&config.private_key),
        ) {
            (Some(_), Some(email), Some(key)) => ServiceAccountSigner::from_pem(email, key)
                .map(Arc::new),
            _ => Err(StorageError::Configuration(
                "GCP credentials are not configured. Set GCP_PROJECT_ID, GCP_CLIENT_EMAIL, and GCP_PRIVATE_KEY."
                    .to_string(),
            )),
        };

        Self::new(&config.endpoint, config.bucket.clone(), signer)
    }

    /// 使用已有签名器创建
    pub fn new(
        endpoint: &str,
        bucket: Option<String>,
        signer: Result<Arc<ServiceAccountSigner>, StorageError>,
    ) -> Self {
        let endpoint = Url::parse(endpoint).map_err(|e| {
            StorageError::Configuration(format!("存储端点无效 {}: {}", endpoint, e))
        });

        Self {
            http: reqwest::Client::new(),
            endpoint,
            bucket: bucket.filter(|b| !b.trim().is_empty()),
            signer,
        }
    }

    fn bucket(&self) -> Result<&str, StorageError> {
        self.bucket.as_deref().ok_or_else(|| {
            StorageError::Configuration(
                "GCS bucket name is not configured. Set GCS_BUCKET_NAME.".to_string(),
            )
        })
    }

    /// 在指定时间点签名（便于测试固定时间）
    pub fn sign_url_at(
        &self,
        method: &str,
        object_name: &str,
        expires_in_seconds: u64,
        content_type: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<String, StorageError> {
        let signer = self.signer.as_ref().map_err(Clone::clone)?;
        let endpoint = self.endpoint.as_ref().map_err(Clone::clone)?;
        let bucket = self.bucket()?;
        validate_expires(expires_in_seconds).map_err(StorageError::Configuration)?;

        let datetime = now.format("%Y%m%dT%H%M%SZ").to_string();
        let scope = format!("{}/auto/storage/goog4_request", &datetime[..8]);
        let uri = canonical_uri(bucket, object_name);

        let mut headers = vec![("host".to_string(), host_header(endpoint)?)];
        if let Some(content_type) = content_type {
            headers.push(("content-type".to_string(), content_type.trim().to_string()));
        }
        headers.sort();
        let signed_headers = headers
            .iter()
            .map(|(name, _)| name.as_str())
            .collect::<Vec<_>>()
            .join(";");

        let params = vec![
            ("X-Goog-Algorithm".to_string(), SIGNING_ALGORITHM.to_string()),
            (
                "X-Goog-Credential".to_string(),
                format!("{}/{}", signer.client_email(), scope),
            ),
            ("X-Goog-Date".to_string(), datetime.clone()),
            ("X-Goog-Expires".to_string(), expires_in_seconds.to_string()),
            ("X-Goog-SignedHeaders".to_string(), signed_headers.clone()),
        ];
        let query = canonical_query(&params);

        let request = canonical_request(
            method,
            &uri,
            &query,
            &canonical_headers(&headers),
            &signed_headers,
        );
        let signature = hex::encode(signer.sign(string_to_sign(&datetime, &scope, &request).as_bytes())?);

        Ok(format!(
            "{}{}?{}&X-Goog-Signature={}",
            endpoint.origin().ascii_serialization(),
            uri,
            query,
            signature
        ))
    }

    fn sign_now(
        &self,
        method: &str,
        object_name: &str,
        expires_in_seconds: u64,
        content_type: Option<&str>,
    ) -> Result<String, StorageError> {
        self.sign_url_at(method, object_name, expires_in_seconds, content_type, Utc::now())
    }
}

#[async_trait]
impl ObjectStorage for GcsStorage {
    async fn signed_url(
        &self,
        object_name: &str,
        action: SignedUrlAction,
        options: &SignedUrlOptions,
    ) -> Result<String, StorageError> {
        let content_type = match action {
            SignedUrlAction::Write => Some(options.effective_content_type()),
            SignedUrlAction::Read => None,
        };
        self.sign_now(
            action.http_method(),
            object_name,
            options.effective_expires(),
            content_type,
        )
    }

    async fn download_object(&self, object_name: &str) -> Result<StoredObject, StorageError> {
        let url = self.sign_now("GET", object_name, INTERNAL_URL_EXPIRES_SECS, None)?;
        let response = self.http.get(url).send().await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound(object_name.to_string()));
        }
        if !status.is_success() {
            return Err(status_error(response).await);
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();
        let bytes = response.bytes().await?;

        tracing::debug!(
            "[STORAGE] 下载对象 {} ({} 字节, {})",
            object_name,
            bytes.len(),
            content_type
        );
        Ok(StoredObject {
            bytes,
            content_type,
        })
    }

    async fn upload_buffer(
        &self,
        object_name: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let url = self.sign_now(
            "PUT",
            object_name,
            INTERNAL_URL_EXPIRES_SECS,
            Some(content_type),
        )?;
        let size = bytes.len();
        let response = self
            .http
            .put(url)
            .header(header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        tracing::debug!("[STORAGE] 上传对象 {} ({} 字节)", object_name, size);
        Ok(())
    }

    async fn delete_object(&self, object_name: &str) -> Result<(), StorageError> {
        let url = self.sign_now("DELETE", object_name, INTERNAL_URL_EXPIRES_SECS, None)?;
        let response = self.http.delete(url).send().await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND || status.is_success() {
            return Ok(());
        }
        Err(status_error(response).await)
    }

    fn backend_name(&self) -> &'static str {
        "gcs"
    }
}

async fn status_error(response: reqwest::Response) -> StorageError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    StorageError::Status {
        status,
        message: body.chars().take(200).collect(),
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

// ============================================================================
// V4 签名辅助函数
// ============================================================================

/// RFC 3986 编码（仅保留非保留字符）
pub fn encode_component(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// 规范 URI：`/<bucket>/<object>`，对象名逐段编码并保留 `/`
pub fn canonical_uri(bucket: &str, object_name: &str) -> String {
    let object = object_name
        .split('/')
        .map(encode_component)
        .collect::<Vec<_>>()
        .join("/");
    format!("/{}/{}", encode_component(bucket), object)
}

/// 规范查询串：键值编码后按字典序排列
pub fn canonical_query<K, V>(params: &[(K, V)]) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (encode_component(k.as_ref()), encode_component(v.as_ref())))
        .collect();
    encoded.sort();
    encoded
        .into_iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

/// 规范头部块：每行 `name:value\n`，名称小写且已排序
pub fn canonical_headers(headers: &[(String, String)]) -> String {
    headers
        .iter()
        .map(|(name, value)| format!("{}:{}\n", name.to_lowercase(), value.trim()))
        .collect()
}

/// 规范请求
pub fn canonical_request(
    method: &str,
    canonical_uri: &str,
    canonical_query: &str,
    canonical_headers: &str,
    signed_headers: &str,
) -> String {
    format!(
        "{}\n{}\n{}\n{}\n{}\nUNSIGNED-PAYLOAD",
        method, canonical_uri, canonical_query, canonical_headers, signed_headers
    )
}

/// 待签字符串
pub fn string_to_sign(datetime: &str, scope: &str, canonical_request: &str) -> String {
    let digest = Sha256::digest(canonical_request.as_bytes());
    format!(
        "{}\n{}\n{}\n{}",
        SIGNING_ALGORITHM,
        datetime,
        scope,
        hex::encode(digest)
    )
}

/// 请求中实际发送的 Host 头（非默认端口时包含端口）
pub fn host_header(endpoint: &Url) -> Result<String, StorageError> {
    let host = endpoint
        .host_str()
        .ok_or_else(|| StorageError::Configuration(format!("存储端点缺少主机名: {}", endpoint)))?;
    Ok(match endpoint.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}
