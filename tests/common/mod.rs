//! 集成测试公共设施
//!
//! - `FakeUpstream`: 进程内的上游翻译服务，记录收到的表单并按脚本返回进度流
//! - `FakeBucket`: 进程内的 GCS 存储桶，校验 V4 签名后读写对象
//! - `TestApp`: 组装好的路由，直接通过 `oneshot` 驱动

#![allow(dead_code)]

use axum::{
    body::{Body, Bytes},
    extract::{Multipart, State},
    http::{header, HeaderMap, Method, Request, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{NaiveDateTime, Utc};
use docrelay_lib::config::{Config, StorageConfig};
use docrelay_lib::server::{build_router, AppState};
use docrelay_lib::storage::gcs::{
    canonical_headers, canonical_query, canonical_request, string_to_sign, GcsStorage,
    ServiceAccountSigner,
};
use docrelay_lib::storage::ObjectStorage;
use docrelay_lib::upstream::TranslationClient;
use parking_lot::Mutex;
use ring::signature::{UnparsedPublicKey, RSA_PKCS1_2048_8192_SHA256};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceExt;

pub const TEST_KEY: &str = include_str!("../fixtures/test-service-account.pem");
pub const CLIENT_EMAIL: &str = "relay@test-project.iam.gserviceaccount.com";
pub const BUCKET: &str = "test-bucket";
pub const SESSION_TOKEN: &str = "test-session-token";
pub const DOCX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const ARTIFACT_BYTES: &[u8] = b"PK\x03\x04 translated document bytes";

/// 在随机端口上启动一个路由
pub async fn spawn_server(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

// ============================================================================
// 上游
// ============================================================================

/// 上游收到的一次请求
#[derive(Debug, Clone, Default)]
pub struct RecordedCall {
    pub path: String,
    pub fields: Vec<(String, String)>,
    pub file: Option<RecordedFile>,
}

impl RecordedCall {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|(n, _)| n == name)
    }
}

#[derive(Debug, Clone)]
pub struct RecordedFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// 上游行为脚本
#[derive(Debug, Clone)]
pub struct UpstreamScript {
    /// 翻译/摘要端点返回的 chunk
    pub chunks: Vec<String>,
    /// 产物下载端点返回的状态码
    pub artifact_status: u16,
    /// 翻译端点返回空响应体
    pub empty_body: bool,
}

impl Default for UpstreamScript {
    fn default() -> Self {
        Self {
            chunks: vec![
                "{\"progress\":10,\"status\":\"queued\"}\n".to_string(),
                "{\"progress\":60,\"status\":\"translating\",\"message\":null}\n".to_string(),
                "{\"progress\":100,\"status\":\"done\",\"downloadUrl\":\"/files/out.docx\"}\n"
                    .to_string(),
            ],
            artifact_status: 200,
            empty_body: false,
        }
    }
}

#[derive(Clone, Default)]
pub struct FakeUpstream {
    pub calls: Arc<Mutex<Vec<RecordedCall>>>,
    pub script: Arc<Mutex<UpstreamScript>>,
}

impl FakeUpstream {
    pub async fn spawn() -> (Self, String) {
        let upstream = FakeUpstream::default();
        let app = Router::new()
            .route("/translate", post(job_handler))
            .route("/translate-pdf", post(job_handler))
            .route("/summarize-pdf", post(job_handler))
            .route("/export-summary", post(export_handler))
            .route("/files/*path", get(artifact_handler))
            .route("/health", get(|| async { Json(serde_json::json!({"status": "ok"})) }))
            .route(
                "/clear-cache",
                post(|| async { Json(serde_json::json!({"cleared": true})) }),
            )
            .with_state(upstream.clone());
        let addr = spawn_server(app).await;
        (upstream, format!("http://{}", addr))
    }

    pub fn set_script(&self, script: UpstreamScript) {
        *self.script.lock() = script;
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }
}

async fn job_handler(
    State(upstream): State<FakeUpstream>,
    uri: Uri,
    mut multipart: Multipart,
) -> Response {
    let mut call = RecordedCall {
        path: uri.path().to_string(),
        ..RecordedCall::default()
    };
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        if let Some(file_name) = field.file_name().map(str::to_string) {
            let content_type = field.content_type().map(str::to_string);
            let bytes = field.bytes().await.unwrap().to_vec();
            call.file = Some(RecordedFile {
                file_name,
                content_type,
                bytes,
            });
        } else {
            let value = field.text().await.unwrap();
            call.fields.push((name, value));
        }
    }
    upstream.calls.lock().push(call);

    let script = upstream.script.lock().clone();
    if script.empty_body {
        return Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_LENGTH, "0")
            .body(Body::empty())
            .unwrap();
    }

    let chunks = script
        .chunks
        .into_iter()
        .map(|c| Ok::<_, std::io::Error>(Bytes::from(c)));
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/x-ndjson")
        .body(Body::from_stream(futures::stream::iter(chunks)))
        .unwrap()
}

async fn artifact_handler(State(upstream): State<FakeUpstream>, uri: Uri) -> Response {
    upstream.calls.lock().push(RecordedCall {
        path: uri.path().to_string(),
        ..RecordedCall::default()
    });
    let status = upstream.script.lock().artifact_status;
    if status != 200 {
        return (
            StatusCode::from_u16(status).unwrap(),
            "artifact unavailable",
        )
            .into_response();
    }
    Response::builder()
        .header(header::CONTENT_TYPE, DOCX_CONTENT_TYPE)
        .header(
            header::CONTENT_DISPOSITION,
            "attachment; filename=\"report_fr.docx\"",
        )
        .body(Body::from(ARTIFACT_BYTES))
        .unwrap()
}

async fn export_handler(
    State(upstream): State<FakeUpstream>,
    Json(body): Json<serde_json::Value>,
) -> Response {
    upstream.calls.lock().push(RecordedCall {
        path: "/export-summary".to_string(),
        fields: vec![(
            "summary".to_string(),
            body["summary"].as_str().unwrap_or_default().to_string(),
        )],
        file: None,
    });
    Response::builder()
        .header(header::CONTENT_TYPE, "application/pdf")
        .header(
            header::CONTENT_DISPOSITION,
            "attachment; filename=\"summary.pdf\"",
        )
        .body(Body::from("%PDF-1.7 summary"))
        .unwrap()
}

// ============================================================================
// 存储桶
// ============================================================================

#[derive(Clone)]
pub struct FakeBucket {
    pub objects: Arc<Mutex<HashMap<String, (Vec<u8>, String)>>>,
    /// 收到的 HTTP 请求（方法 + 路径），不含测试直接写入的对象
    pub requests: Arc<Mutex<Vec<String>>>,
    public_key: Arc<Vec<u8>>,
}

impl FakeBucket {
    pub async fn spawn(signer: &ServiceAccountSigner) -> (Self, String) {
        let bucket = FakeBucket {
            objects: Arc::new(Mutex::new(HashMap::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
            public_key: Arc::new(signer.public_key_der()),
        };
        let app = Router::new()
            .fallback(bucket_handler)
            .with_state(bucket.clone());
        let addr = spawn_server(app).await;
        (bucket, format!("http://{}", addr))
    }

    pub fn object_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.objects.lock().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }

    pub fn get(&self, object_name: &str) -> Option<(Vec<u8>, String)> {
        self.objects.lock().get(object_name).cloned()
    }

    pub fn put(&self, object_name: &str, bytes: &[u8], content_type: &str) {
        self.objects.lock().insert(
            object_name.to_string(),
            (bytes.to_vec(), content_type.to_string()),
        );
    }

    /// 按 V4 规则重建规范请求并校验签名
    fn verify(&self, method: &Method, uri: &Uri, headers: &HeaderMap) -> Result<(), String> {
        let query = uri.query().ok_or("missing query")?;
        let params: Vec<(String, String)> = url::form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect();
        let param = |name: &str| {
            params
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
                .ok_or_else(|| format!("missing {}", name))
        };

        let signature = hex::decode(param("X-Goog-Signature")?).map_err(|e| e.to_string())?;
        let datetime = param("X-Goog-Date")?;
        let expires: i64 = param("X-Goog-Expires")?
            .parse()
            .map_err(|_| "bad expires".to_string())?;
        let credential = param("X-Goog-Credential")?;
        let signed_headers = param("X-Goog-SignedHeaders")?;

        let signed_at = NaiveDateTime::parse_from_str(&datetime, "%Y%m%dT%H%M%SZ")
            .map_err(|e| e.to_string())?
            .and_utc();
        if (Utc::now() - signed_at).num_seconds() > expires {
            return Err("expired".to_string());
        }

        let scope = credential
            .split_once('/')
            .map(|(_, scope)| scope.to_string())
            .ok_or("bad credential")?;

        let unsigned: Vec<(String, String)> = params
            .iter()
            .filter(|(k, _)| k != "X-Goog-Signature")
            .cloned()
            .collect();

        let mut header_pairs = Vec::new();
        for name in signed_headers.split(';') {
            let value = headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| format!("missing signed header {}", name))?;
            header_pairs.push((name.to_string(), value.to_string()));
        }

        let request = canonical_request(
            method.as_str(),
            uri.path(),
            &canonical_query(&unsigned),
            &canonical_headers(&header_pairs),
            &signed_headers,
        );
        let message = string_to_sign(&datetime, &scope, &request);

        UnparsedPublicKey::new(&RSA_PKCS1_2048_8192_SHA256, self.public_key.as_slice())
            .verify(message.as_bytes(), &signature)
            .map_err(|_| "signature mismatch".to_string())
    }
}

async fn bucket_handler(
    State(bucket): State<FakeBucket>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    bucket
        .requests
        .lock()
        .push(format!("{} {}", method, uri.path()));
    if let Err(reason) = bucket.verify(&method, &uri, &headers) {
        return (StatusCode::FORBIDDEN, reason).into_response();
    }

    let path = uri.path().trim_start_matches('/');
    let Some((bucket_name, object)) = path.split_once('/') else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    if bucket_name != BUCKET {
        return StatusCode::NOT_FOUND.into_response();
    }
    let object = urlencoding::decode(object).unwrap().into_owned();

    match method {
        Method::PUT => {
            let content_type = headers
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("application/octet-stream")
                .to_string();
            bucket.put(&object, &body, &content_type);
            StatusCode::OK.into_response()
        }
        Method::GET => match bucket.get(&object) {
            Some((bytes, content_type)) => {
                ([(header::CONTENT_TYPE, content_type)], bytes).into_response()
            }
            None => StatusCode::NOT_FOUND.into_response(),
        },
        Method::DELETE => match bucket.objects.lock().remove(&object) {
            Some(_) => StatusCode::NO_CONTENT.into_response(),
            None => StatusCode::NOT_FOUND.into_response(),
        },
        _ => StatusCode::METHOD_NOT_ALLOWED.into_response(),
    }
}

// ============================================================================
// 应用
// ============================================================================

pub struct TestApp {
    pub router: Router,
    pub upstream: FakeUpstream,
    pub bucket: FakeBucket,
    pub bucket_url: String,
    pub storage: Arc<dyn ObjectStorage>,
}

pub fn signer() -> Arc<ServiceAccountSigner> {
    Arc::new(ServiceAccountSigner::from_pem(CLIENT_EMAIL, TEST_KEY).unwrap())
}

pub fn test_config(upstream_url: &str, bucket_url: &str) -> Config {
    let mut config = Config::default();
    config.upstream.base_url = upstream_url.to_string();
    config.storage = StorageConfig {
        bucket: Some(BUCKET.to_string()),
        project_id: Some("test-project".to_string()),
        client_email: Some(CLIENT_EMAIL.to_string()),
        private_key: Some(TEST_KEY.to_string()),
        endpoint: bucket_url.to_string(),
        ..StorageConfig::default()
    };
    config.auth.session_tokens = vec![SESSION_TOKEN.to_string()];
    config
}

impl TestApp {
    pub async fn spawn() -> Self {
        let signer = signer();
        let (upstream, upstream_url) = FakeUpstream::spawn().await;
        let (bucket, bucket_url) = FakeBucket::spawn(&signer).await;

        let config = test_config(&upstream_url, &bucket_url);
        let storage: Arc<dyn ObjectStorage> = Arc::new(GcsStorage::new(
            &bucket_url,
            Some(BUCKET.to_string()),
            Ok(signer),
        ));
        let client = TranslationClient::with_http_client(reqwest::Client::new(), &upstream_url);
        let state = AppState::new(config, client, storage.clone());

        Self {
            router: build_router(state),
            upstream,
            bucket,
            bucket_url,
            storage,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }
}

// ============================================================================
// 请求构造
// ============================================================================

pub const BOUNDARY: &str = "----docrelay-test-boundary";

/// 构造 multipart 请求体
pub fn multipart_body(fields: &[(&str, &str)], file: Option<(&str, &str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    if let Some((file_name, content_type, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                BOUNDARY, file_name, content_type
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn multipart_request(
    path: &str,
    fields: &[(&str, &str)],
    file: Option<(&str, &str, &[u8])>,
    authenticated: bool,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(path)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        );
    if authenticated {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", SESSION_TOKEN));
    }
    builder
        .body(Body::from(multipart_body(fields, file)))
        .unwrap()
}

pub fn json_request(
    method: Method,
    path: &str,
    body: serde_json::Value,
    authenticated: bool,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json");
    if authenticated {
        builder = builder.header("x-api-key", SESSION_TOKEN);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn get_request(path: &str, authenticated: bool) -> Request<Body> {
    let mut builder = Request::builder().method(Method::GET).uri(path);
    if authenticated {
        builder = builder.header(header::COOKIE, format!("session_token={}", SESSION_TOKEN));
    }
    builder.body(Body::empty()).unwrap()
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

pub async fn body_lines(response: Response) -> Vec<serde_json::Value> {
    let bytes = body_bytes(response).await;
    String::from_utf8(bytes)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}
