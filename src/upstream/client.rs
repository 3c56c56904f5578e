//! 上游翻译/摘要服务客户端
//!
//! 根据输入文件类型选择端点：
//! - `.pdf` → `/translate-pdf`
//! - 其他 → `/translate`
//! - 摘要仅支持 PDF → `/summarize-pdf`，非 PDF 在发请求前直接拒绝
//!
//! 客户端无状态，可在多个请求间共享。

use super::request::{fields, InputFile, TranslationRequest};
use super::UpstreamError;
use crate::config::UpstreamConfig;
use crate::streaming::traits::{reqwest_stream_to_stream_response, StreamResponse};
use reqwest::{header, Client, Response};
use std::time::Duration;

/// 上游端点
pub mod endpoints {
    pub const TRANSLATE: &str = "/translate";
    pub const TRANSLATE_PDF: &str = "/translate-pdf";
    pub const SUMMARIZE_PDF: &str = "/summarize-pdf";
    pub const EXPORT_SUMMARY: &str = "/export-summary";
    pub const HEALTH: &str = "/health";
    pub const CLEAR_CACHE: &str = "/clear-cache";
}

/// 摘要仅支持 PDF 时的错误提示
pub const SUMMARIZE_PDF_ONLY: &str = "Only PDF files are supported for summarization";

/// 上游响应（响应体尚未读取）
pub struct UpstreamResponse {
    /// HTTP 状态码
    pub status: u16,
    /// 上游 content-type
    pub content_type: Option<String>,
    /// 上游 content-disposition
    pub content_disposition: Option<String>,
    /// 响应体字节流
    pub body: StreamResponse,
}

impl std::fmt::Debug for UpstreamResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamResponse")
            .field("status", &self.status)
            .field("content_type", &self.content_type)
            .field("content_disposition", &self.content_disposition)
            .finish_non_exhaustive()
    }
}

impl UpstreamResponse {
    fn from_reqwest(response: Response) -> Result<Self, UpstreamError> {
        if response.content_length() == Some(0) {
            return Err(UpstreamError::EmptyBody);
        }

        let header_value = |name: header::HeaderName| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let content_type = header_value(header::CONTENT_TYPE);
        let content_disposition = header_value(header::CONTENT_DISPOSITION);

        Ok(Self {
            status: response.status().as_u16(),
            content_type,
            content_disposition,
            body: reqwest_stream_to_stream_response(response),
        })
    }
}

/// 上游翻译服务客户端
#[derive(Debug, Clone)]
pub struct TranslationClient {
    http: Client,
    base_url: String,
}

impl TranslationClient {
    /// 从配置创建客户端
    ///
    /// 只设置连接超时：翻译任务可能持续很久，中继不限制整体时长。
    pub fn from_config(config: &UpstreamConfig) -> Result<Self, UpstreamError> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| UpstreamError::Network(format!("无法创建 HTTP 客户端: {}", e)))?;
        Ok(Self::with_http_client(http, &config.base_url))
    }

    /// 使用已有 HTTP 客户端创建
    pub fn with_http_client(http: Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// 上游基础地址
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// 构建完整的上游 URL
    ///
    /// 相对路径拼接到基础地址；已是 http(s) 绝对地址时原样返回。
    pub fn build_url(&self, path: &str) -> String {
        let lower = path.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            return path.to_string();
        }
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// 根据文件类型选择翻译端点
    pub fn translate_endpoint(file: &InputFile) -> &'static str {
        if file.is_pdf() {
            endpoints::TRANSLATE_PDF
        } else {
            endpoints::TRANSLATE
        }
    }

    /// 发起翻译任务，返回进度流
    pub async fn translate(
        &self,
        file: InputFile,
        request: &TranslationRequest,
    ) -> Result<UpstreamResponse, UpstreamError> {
        let url = self.build_url(Self::translate_endpoint(&file));
        tracing::info!(
            "[UPSTREAM] 翻译 {} -> {} (engine={}, master={})",
            file.file_name,
            url,
            request.engine,
            request.is_master_mode
        );

        let form = request.to_form(file);
        let response = self.http.post(&url).multipart(form).send().await?;
        self.stream_response(response).await
    }

    /// 发起摘要任务，仅支持 PDF
    pub async fn summarize(
        &self,
        file: InputFile,
        text_fields: &[(String, String)],
    ) -> Result<UpstreamResponse, UpstreamError> {
        if !file.is_pdf() {
            return Err(UpstreamError::InvalidInput(SUMMARIZE_PDF_ONLY.to_string()));
        }

        let url = self.build_url(endpoints::SUMMARIZE_PDF);
        tracing::info!("[UPSTREAM] 摘要 {} -> {}", file.file_name, url);

        let mut form = reqwest::multipart::Form::new().part(fields::FILE, file.into_part());
        for (name, value) in text_fields {
            form = form.text(name.clone(), value.clone());
        }
        let response = self.http.post(&url).multipart(form).send().await?;
        self.stream_response(response).await
    }

    /// 将摘要导出为文档
    pub async fn export_summary(&self, summary: &str) -> Result<UpstreamResponse, UpstreamError> {
        let url = self.build_url(endpoints::EXPORT_SUMMARY);
        let response = self
            .http
            .post(&url)
            .json(&serde_json::json!({ "summary": summary }))
            .send()
            .await?;
        self.stream_response(response).await
    }

    /// 下载上游文件（相对路径）
    pub async fn download(&self, path: &str) -> Result<UpstreamResponse, UpstreamError> {
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{}", path)
        };
        let url = format!("{}{}", self.base_url, path);
        let response = self.http.get(&url).send().await?;
        self.stream_response(response).await
    }

    /// 获取产物（`downloadUrl` 可以是相对路径或绝对地址）
    pub async fn fetch_artifact(&self, download_url: &str) -> Result<UpstreamResponse, UpstreamError> {
        let url = self.build_url(download_url);
        let response = self.http.get(&url).send().await?;
        self.stream_response(response).await
    }

    /// 上游健康检查
    pub async fn health(&self) -> Result<serde_json::Value, UpstreamError> {
        let response = self
            .http
            .get(self.build_url(endpoints::HEALTH))
            .send()
            .await?;
        self.json_response(response).await
    }

    /// 清空上游缓存
    pub async fn clear_cache(&self) -> Result<serde_json::Value, UpstreamError> {
        let response = self
            .http
            .post(self.build_url(endpoints::CLEAR_CACHE))
            .send()
            .await?;
        self.json_response(response).await
    }

    async fn stream_response(&self, response: Response) -> Result<UpstreamResponse, UpstreamError> {
        let response = ensure_success(response).await?;
        UpstreamResponse::from_reqwest(response)
    }

    async fn json_response(&self, response: Response) -> Result<serde_json::Value, UpstreamError> {
        let response = ensure_success(response).await?;
        response
            .json()
            .await
            .map_err(|e| UpstreamError::Network(format!("响应解析失败: {}", e)))
    }
}

async fn ensure_success(response: Response) -> Result<Response, UpstreamError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    tracing::warn!("[UPSTREAM] 上游返回 {}: {}", status, body);
    Err(UpstreamError::from_http_status(status.as_u16(), &body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn client() -> TranslationClient {
        TranslationClient::with_http_client(Client::new(), "http://engine.local:8000/")
    }

    #[test]
    fn test_build_url() {
        let client = client();
        assert_eq!(client.base_url(), "http://engine.local:8000");
        assert_eq!(
            client.build_url("/files/out.docx"),
            "http://engine.local:8000/files/out.docx"
        );
        assert_eq!(
            client.build_url("files/out.docx"),
            "http://engine.local:8000/files/out.docx"
        );
        assert_eq!(
            client.build_url("https://cdn.example/out.docx"),
            "https://cdn.example/out.docx"
        );
    }

    #[test]
    fn test_translate_endpoint_routing() {
        let pdf = InputFile::new("Scan.PdF", None, Bytes::new());
        let docx = InputFile::new("letter.docx", None, Bytes::new());
        assert_eq!(TranslationClient::translate_endpoint(&pdf), "/translate-pdf");
        assert_eq!(TranslationClient::translate_endpoint(&docx), "/translate");
    }

    #[tokio::test]
    async fn test_summarize_rejects_non_pdf_without_network() {
        // 指向不可达地址：如果发出了请求，错误会是 Network 而不是 InvalidInput
        let client = TranslationClient::with_http_client(Client::new(), "http://127.0.0.1:9");
        let file = InputFile::new("report.docx", None, Bytes::from_static(b"x"));
        let err = client.summarize(file, &[]).await.unwrap_err();
        assert_eq!(
            err,
            UpstreamError::InvalidInput(SUMMARIZE_PDF_ONLY.to_string())
        );
    }
}
