//! 翻译与摘要端点
//!
//! `POST /translate` 支持两种模式：
//! - `application/json`: 对象引用模式，文件已通过签名 URL 上传到存储桶
//! - 其他（multipart）: 直接上传模式，文件随请求一起提交
//!
//! `POST /summarize` 仅支持 multipart 上传的 PDF。
//!
//! 两者都在校验通过后才调用上游，响应体交给中继引擎逐行转发。

use crate::server::auth::verify_session;
use crate::server::error::ApiError;
use crate::server::response::relay_response;
use crate::server::AppState;
use crate::streaming::RelayEngine;
use crate::upstream::request::{fields, or_default};
use crate::upstream::{
    parse_flag, FileRef, InputFile, TranslationRequest, SUMMARIZE_PDF_ONLY,
};
use axum::{
    body::Bytes,
    extract::{FromRequest, Multipart, Request, State},
    http::{header, HeaderMap},
    response::Response,
};
use serde::Deserialize;
use serde_json::Value;

/// 对象引用模式的请求体
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectTranslateBody {
    #[serde(default)]
    pub object_name: Option<String>,
    #[serde(default)]
    pub target_lang: Option<String>,
    #[serde(default)]
    pub engine: Option<String>,
    #[serde(default)]
    pub tone: Option<String>,
    #[serde(default)]
    pub pdf_engine: Option<String>,
    /// 布尔值或 `"true"` / `"1"` 之类的字符串
    #[serde(default)]
    pub is_master_mode: Option<Value>,
}

impl ObjectTranslateBody {
    /// 校验并拆分为对象名和翻译请求
    pub fn into_request(self) -> Result<(String, TranslationRequest), ApiError> {
        let object_name = required(self.object_name, "objectName is required")?;
        let target_lang = required(self.target_lang, "targetLang is required")?;

        let mut request = TranslationRequest::new(target_lang);
        request.engine = or_default(self.engine, &request.engine);
        request.tone = or_default(self.tone, &request.tone);
        request.pdf_engine = or_default(self.pdf_engine, &request.pdf_engine);
        request.is_master_mode = self.is_master_mode.as_ref().map(json_flag).unwrap_or(false);
        Ok((object_name, request))
    }
}

/// 表单中读到的内容
#[derive(Debug, Default)]
pub struct FormPayload {
    /// 文件字段
    pub file: Option<InputFile>,
    /// 文本字段（按出现顺序）
    pub text_fields: Vec<(String, String)>,
}

/// 翻译
pub async fn translate(
    State(state): State<AppState>,
    request: Request,
) -> Result<Response, ApiError> {
    verify_session(request.headers(), &state.config.auth)?;

    let (file, translation) = if is_json(request.headers()) {
        let body = Bytes::from_request(request, &state)
            .await
            .map_err(|e| ApiError::validation(e.body_text()))?;
        let payload: ObjectTranslateBody =
            serde_json::from_slice(&body).map_err(|_| ApiError::validation("Invalid JSON body"))?;
        let (object_name, translation) = payload.into_request()?;
        let file = resolve_file(&state, FileRef::Object(object_name)).await?;
        (file, translation)
    } else {
        let multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|e| ApiError::validation(e.body_text()))?;
        let payload = read_form(multipart).await?;
        let file = payload
            .file
            .ok_or_else(|| ApiError::validation("file is required"))?;
        let translation = translation_from_fields(payload.text_fields)?;
        (resolve_file(&state, FileRef::Inline(file)).await?, translation)
    };

    let upstream = state.upstream.translate(file, &translation).await?;
    let engine = RelayEngine::new()
        .with_relocator(state.relocator.clone())
        .with_max_line_bytes(state.config.relay.max_line_bytes)
        .with_label("translate");
    Ok(relay_response(upstream, engine))
}

/// 摘要
pub async fn summarize(
    State(state): State<AppState>,
    request: Request,
) -> Result<Response, ApiError> {
    verify_session(request.headers(), &state.config.auth)?;

    let multipart = Multipart::from_request(request, &state)
        .await
        .map_err(|_| ApiError::validation(SUMMARIZE_PDF_ONLY))?;
    let payload = read_form(multipart).await?;
    let file = match payload.file {
        Some(file) if file.is_pdf() => file,
        _ => return Err(ApiError::validation(SUMMARIZE_PDF_ONLY)),
    };

    let upstream = state.upstream.summarize(file, &payload.text_fields).await?;
    let engine = RelayEngine::new()
        .with_max_line_bytes(state.config.relay.max_line_bytes)
        .with_label("summarize");
    Ok(relay_response(upstream, engine))
}

/// 把文件引用解析为实际的文件内容
///
/// 对象引用模式从存储桶下载文件，并用对象名最后一段作为上游看到的文件名。
pub async fn resolve_file(state: &AppState, file: FileRef) -> Result<InputFile, ApiError> {
    match file {
        FileRef::Inline(file) => Ok(file),
        FileRef::Object(object_name) => {
            let object = state.storage.download_object(&object_name).await?;
            tracing::info!(
                "[STORAGE] 读取对象 {} ({} 字节, {})",
                object_name,
                object.bytes.len(),
                object.content_type
            );
            Ok(InputFile::new(
                FileRef::object_file_name(&object_name),
                Some(object.content_type),
                object.bytes,
            ))
        }
    }
}

/// 读取 multipart 表单
///
/// 名为 `file` 的字段作为文件，其余字段按文本读取。
pub async fn read_form(mut multipart: Multipart) -> Result<FormPayload, ApiError> {
    let mut payload = FormPayload::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation(format!("Invalid multipart body: {}", e.body_text())))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == fields::FILE {
            let file_name = field.file_name().unwrap_or("upload").to_string();
            let content_type = field.content_type().map(str::to_string);
            let bytes = field.bytes().await.map_err(|e| {
                ApiError::validation(format!("Invalid multipart body: {}", e.body_text()))
            })?;
            payload.file = Some(InputFile::new(file_name, content_type, bytes));
        } else if !name.is_empty() {
            let value = field.text().await.map_err(|e| {
                ApiError::validation(format!("Invalid multipart body: {}", e.body_text()))
            })?;
            payload.text_fields.push((name, value));
        }
    }

    Ok(payload)
}

/// 由表单文本字段构造翻译请求
///
/// `is_master` 被消费后不再转发；浏览器自带的 `max_total_chars` 会被丢弃，
/// 由主控模式开关决定是否发送。其余未知字段原样转发。
pub fn translation_from_fields(
    text_fields: Vec<(String, String)>,
) -> Result<TranslationRequest, ApiError> {
    let mut target_lang = None;
    let mut engine = None;
    let mut tone = None;
    let mut pdf_engine = None;
    let mut is_master_mode = false;
    let mut extra_fields = Vec::new();

    for (name, value) in text_fields {
        match name.as_str() {
            fields::TARGET_LANG => target_lang = Some(value),
            fields::ENGINE => engine = Some(value),
            fields::TONE => tone = Some(value),
            fields::PDF_ENGINE => pdf_engine = Some(value),
            fields::IS_MASTER => is_master_mode = parse_flag(&value),
            fields::MAX_TOTAL_CHARS => {}
            _ => extra_fields.push((name, value)),
        }
    }

    let target_lang = required(target_lang, "targetLang is required")?;
    let mut request = TranslationRequest::new(target_lang);
    request.engine = or_default(engine, &request.engine);
    request.tone = or_default(tone, &request.tone);
    request.pdf_engine = or_default(pdf_engine, &request.pdf_engine);
    request.is_master_mode = is_master_mode;
    request.extra_fields = extra_fields;
    Ok(request)
}

fn required(value: Option<String>, message: &str) -> Result<String, ApiError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::validation(message))
}

fn json_flag(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => parse_flag(s),
        Value::Number(n) => n.as_f64().map(|n| n != 0.0).unwrap_or(false),
        _ => false,
    }
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
        .unwrap_or(false)
}
