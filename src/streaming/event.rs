//! 进度事件模型
//!
//! 上游以换行分隔的 JSON 推送进度事件。中继只关心两类事件：
//!
//! - `Progress`: 中间事件，原样透传
//! - `Final`: 流结束时仍被扣留的最后一个事件，唯一允许改写 `downloadUrl` 的事件
//!
//! 字段采用严格类型解码，未知字段通过 `extra` 原样保留。

use crate::streaming::StreamError;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Number, Value};

/// 事件字段
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFields {
    /// 进度（0-100，不强制校验），显式 `null` 会被保留
    #[serde(
        default,
        deserialize_with = "explicit_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub progress: Option<Option<Number>>,

    /// 状态文本，显式 `null` 会被保留
    #[serde(
        default,
        deserialize_with = "explicit_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub status: Option<Option<String>>,

    /// 日志消息，显式 `null` 会被保留
    #[serde(
        default,
        deserialize_with = "explicit_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub message: Option<Option<String>>,

    /// 摘要文本，显式 `null` 会被保留
    #[serde(
        default,
        deserialize_with = "explicit_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub summary: Option<Option<String>>,

    /// 结果下载地址，显式 `null` 会被保留
    #[serde(
        default,
        deserialize_with = "explicit_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub download_url: Option<Option<String>>,

    /// 其余字段
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// 区分"字段缺失"与"字段为 null"
fn explicit_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// 进度事件
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// 中间事件
    Progress(EventFields),
    /// 最终事件
    Final(EventFields),
}

impl ProgressEvent {
    /// 按中间事件解码
    pub fn decode_progress(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line).map(ProgressEvent::Progress)
    }

    /// 按最终事件解码
    pub fn decode_final(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line).map(ProgressEvent::Final)
    }

    /// 是否为最终事件
    pub fn is_final(&self) -> bool {
        matches!(self, ProgressEvent::Final(_))
    }

    /// 获取字段
    pub fn fields(&self) -> &EventFields {
        match self {
            ProgressEvent::Progress(fields) | ProgressEvent::Final(fields) => fields,
        }
    }

    /// 获取可改写的下载地址
    ///
    /// 只有最终事件的 `downloadUrl` 会被中继改写，中间事件始终返回 `None`。
    pub fn relocatable_url(&self) -> Option<&str> {
        match self {
            ProgressEvent::Final(fields) => fields.download_url.as_ref()?.as_deref(),
            ProgressEvent::Progress(_) => None,
        }
    }

    /// 替换最终事件的下载地址，中间事件保持不变
    pub fn with_download_url(self, url: String) -> Self {
        match self {
            ProgressEvent::Final(mut fields) => {
                fields.download_url = Some(Some(url));
                ProgressEvent::Final(fields)
            }
            other => other,
        }
    }

    /// 编码为以换行结尾的一行
    pub fn encode_line(&self) -> Result<String, StreamError> {
        let mut line = serde_json::to_string(self.fields())?;
        line.push('\n');
        Ok(line)
    }
}
