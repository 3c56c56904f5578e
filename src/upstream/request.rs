//! 上游请求模型
//!
//! `TranslationRequest` 只在单次请求内存在，负责生成发往上游的 multipart 表单。

use bytes::Bytes;
use reqwest::multipart::{Form, Part};

/// 主控模式下的总字符预算
///
/// 该值的具体含义由上游引擎决定，这里只负责转发。
pub const MASTER_MODE_MAX_TOTAL_CHARS: u32 = 50_000;

/// 默认翻译引擎
pub const DEFAULT_ENGINE: &str = "gemini";
/// 默认语气
pub const DEFAULT_TONE: &str = "professional";
/// 默认 PDF 转换引擎
pub const DEFAULT_PDF_ENGINE: &str = "pdf2docx";

/// 上游表单字段名
pub mod fields {
    pub const FILE: &str = "file";
    pub const TARGET_LANG: &str = "targetLang";
    pub const ENGINE: &str = "engine";
    pub const TONE: &str = "tone";
    pub const PDF_ENGINE: &str = "pdfEngine";
    pub const MAX_TOTAL_CHARS: &str = "max_total_chars";
    /// 浏览器表单里的主控模式开关，不会转发给上游
    pub const IS_MASTER: &str = "is_master";
}

/// 待发送的输入文件
#[derive(Debug, Clone, PartialEq)]
pub struct InputFile {
    /// 文件名
    pub file_name: String,
    /// 内容类型
    pub content_type: Option<String>,
    /// 文件内容
    pub bytes: Bytes,
}

impl InputFile {
    /// 创建输入文件
    pub fn new(file_name: impl Into<String>, content_type: Option<String>, bytes: Bytes) -> Self {
        Self {
            file_name: file_name.into(),
            content_type,
            bytes,
        }
    }

    /// 文件名是否以 `.pdf` 结尾（不区分大小写）
    pub fn is_pdf(&self) -> bool {
        self.file_name.to_ascii_lowercase().ends_with(".pdf")
    }

    /// 转换为 multipart 文件字段
    pub fn into_part(self) -> Part {
        let InputFile {
            file_name,
            content_type,
            bytes,
        } = self;
        let part = || Part::bytes(bytes.to_vec()).file_name(file_name.clone());

        match content_type.as_deref().map(|ct| part().mime_str(ct)) {
            Some(Ok(part)) => part,
            // 无法解析的 MIME 类型交给上游自行判断
            _ => part(),
        }
    }
}

/// 文件引用：随请求内联上传，或引用已上传到存储桶的对象
#[derive(Debug, Clone, PartialEq)]
pub enum FileRef {
    /// 内联文件
    Inline(InputFile),
    /// 存储桶中的对象名
    Object(String),
}

impl FileRef {
    /// 由对象名推导文件名（取最后一段路径）
    pub fn object_file_name(object_name: &str) -> &str {
        object_name
            .rsplit('/')
            .find(|segment| !segment.is_empty())
            .unwrap_or(object_name)
    }
}

/// 翻译请求
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationRequest {
    /// 目标语言（非空）
    pub target_lang: String,
    /// 翻译引擎
    pub engine: String,
    /// 语气
    pub tone: String,
    /// PDF 转换引擎
    pub pdf_engine: String,
    /// 主控模式
    pub is_master_mode: bool,
    /// 其他原样转发的文本字段
    pub extra_fields: Vec<(String, String)>,
}

impl TranslationRequest {
    /// 使用默认参数创建请求
    pub fn new(target_lang: impl Into<String>) -> Self {
        Self {
            target_lang: target_lang.into(),
            engine: DEFAULT_ENGINE.to_string(),
            tone: DEFAULT_TONE.to_string(),
            pdf_engine: DEFAULT_PDF_ENGINE.to_string(),
            is_master_mode: false,
            extra_fields: Vec::new(),
        }
    }

    /// 字符预算：主控模式为 50000，否则不发送
    pub fn max_total_chars(&self) -> Option<u32> {
        self.is_master_mode.then_some(MASTER_MODE_MAX_TOTAL_CHARS)
    }

    /// 生成上游 multipart 表单
    pub fn to_form(&self, file: InputFile) -> Form {
        let mut form = Form::new()
            .part(fields::FILE, file.into_part())
            .text(fields::TARGET_LANG, self.target_lang.clone())
            .text(fields::ENGINE, self.engine.clone())
            .text(fields::TONE, self.tone.clone())
            .text(fields::PDF_ENGINE, self.pdf_engine.clone());

        if let Some(budget) = self.max_total_chars() {
            form = form.text(fields::MAX_TOTAL_CHARS, budget.to_string());
        }
        for (name, value) in &self.extra_fields {
            form = form.text(name.clone(), value.clone());
        }
        form
    }

    /// 上游表单中的文本字段（按发送顺序，不含文件）
    pub fn text_fields(&self) -> Vec<(String, String)> {
        let mut out = vec![
            (fields::TARGET_LANG.to_string(), self.target_lang.clone()),
            (fields::ENGINE.to_string(), self.engine.clone()),
            (fields::TONE.to_string(), self.tone.clone()),
            (fields::PDF_ENGINE.to_string(), self.pdf_engine.clone()),
        ];
        if let Some(budget) = self.max_total_chars() {
            out.push((fields::MAX_TOTAL_CHARS.to_string(), budget.to_string()));
        }
        out.extend(self.extra_fields.iter().cloned());
        out
    }
}

/// 解析表单里的布尔开关
///
/// `true`、`1`、`yes`、`on`（不区分大小写）为真，其余为假。
pub fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

/// 空字符串视为缺省
pub fn or_default(value: Option<String>, default: &str) -> String {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_pdf_case_insensitive() {
        let file = InputFile::new("Report.PDF", None, Bytes::new());
        assert!(file.is_pdf());
        let file = InputFile::new("report.docx", None, Bytes::new());
        assert!(!file.is_pdf());
        let file = InputFile::new("pdf", None, Bytes::new());
        assert!(!file.is_pdf());
    }

    #[test]
    fn test_max_total_chars_only_in_master_mode() {
        let mut request = TranslationRequest::new("French");
        assert_eq!(request.max_total_chars(), None);
        assert!(!request
            .text_fields()
            .iter()
            .any(|(name, _)| name == fields::MAX_TOTAL_CHARS));

        request.is_master_mode = true;
        assert_eq!(request.max_total_chars(), Some(50_000));
        assert!(request
            .text_fields()
            .contains(&(fields::MAX_TOTAL_CHARS.to_string(), "50000".to_string())));
    }

    #[test]
    fn test_defaults() {
        let request = TranslationRequest::new("German");
        assert_eq!(request.engine, "gemini");
        assert_eq!(request.tone, "professional");
        assert_eq!(request.pdf_engine, "pdf2docx");
    }

    #[test]
    fn test_parse_flag() {
        for truthy in ["true", "TRUE", "1", "yes", " on "] {
            assert!(parse_flag(truthy), "{truthy}");
        }
        for falsy in ["false", "0", "", "no", "null"] {
            assert!(!parse_flag(falsy), "{falsy}");
        }
    }

    #[test]
    fn test_object_file_name() {
        assert_eq!(FileRef::object_file_name("uploads/123-a.pdf"), "123-a.pdf");
        assert_eq!(FileRef::object_file_name("plain.docx"), "plain.docx");
        assert_eq!(FileRef::object_file_name("dir/"), "dir");
    }

    #[test]
    fn test_or_default() {
        assert_eq!(or_default(None, "gemini"), "gemini");
        assert_eq!(or_default(Some("  ".into()), "gemini"), "gemini");
        assert_eq!(or_default(Some("deepl".into()), "gemini"), "deepl");
    }
}
