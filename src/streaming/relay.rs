//! 流式中继引擎
//!
//! 把上游的字节流转换为逐行转发的进度流：
//!
//! 1. `frame_lines` 负责分行（丢弃空行、处理跨 chunk 的半行）
//! 2. 始终扣留最近一行，新行到达时才放行上一行
//! 3. 上游结束时，扣留的那一行就是最终事件；如带有 `downloadUrl`，
//!    先尝试迁移产物再输出
//!
//! 迁移是尽力而为的：任何失败都回退到原始地址，不影响响应。

use crate::streaming::event::ProgressEvent;
use crate::streaming::line_decoder::{frame_lines, DEFAULT_MAX_LINE_BYTES};
use crate::streaming::metrics::{RelayMetrics, RelocationOutcome};
use crate::streaming::traits::{ArtifactRelocation, StreamResponse};
use crate::streaming::StreamError;
use async_stream::stream;
use bytes::Bytes;
use futures::StreamExt;
use serde_json::Value;
use std::sync::Arc;

const DOWNLOAD_URL_KEY: &str = "downloadUrl";

/// 中继引擎
///
/// 每个请求创建一个实例，`relay` 消费自身，没有跨请求共享的可变状态。
pub struct RelayEngine {
    relocator: Option<Arc<dyn ArtifactRelocation>>,
    max_line_bytes: usize,
    label: String,
}

impl Default for RelayEngine {
    fn default() -> Self {
        Self {
            relocator: None,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            label: "relay".to_string(),
        }
    }
}

impl RelayEngine {
    /// 创建不做迁移的中继（摘要流使用）
    pub fn new() -> Self {
        Self::default()
    }

    /// 启用最终事件的产物迁移
    pub fn with_relocator(mut self, relocator: Arc<dyn ArtifactRelocation>) -> Self {
        self.relocator = Some(relocator);
        self
    }

    /// 设置单行最大字节数
    pub fn with_max_line_bytes(mut self, max_line_bytes: usize) -> Self {
        self.max_line_bytes = max_line_bytes;
        self
    }

    /// 设置日志标签
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// 开始中继
    ///
    /// 返回的流在被轮询时才读取上游；丢弃它会同时丢弃上游连接和进行中的迁移。
    pub fn relay(self, source: StreamResponse) -> StreamResponse {
        let RelayEngine {
            relocator,
            max_line_bytes,
            label,
        } = self;

        Box::pin(stream! {
            let mut metrics = RelayMetrics::new();
            let mut lines = Box::pin(frame_lines(source, max_line_bytes));
            let mut pending: Option<String> = None;

            while let Some(line) = lines.next().await {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        tracing::warn!("[RELAY] {} 上游流中断: {}", label, e);
                        metrics.finish();
                        metrics.log_summary(&label);
                        yield Err(e);
                        return;
                    }
                };

                metrics.record_received(line.len());
                if let Some(progress) = progress_of(&line) {
                    metrics.record_progress(progress);
                }

                if let Some(previous) = pending.replace(line) {
                    metrics.record_line();
                    yield Ok(terminated(previous));
                }
            }

            if let Some(last) = pending.take() {
                match finalize_line(last, relocator.as_deref(), &mut metrics).await {
                    Ok(out) => {
                        metrics.record_line();
                        yield Ok(Bytes::from(out));
                    }
                    Err(e) => {
                        tracing::error!("[RELAY] {} 最终事件编码失败: {}", label, e);
                        metrics.finish();
                        metrics.log_summary(&label);
                        yield Err(e);
                        return;
                    }
                }
            }

            metrics.finish();
            metrics.log_summary(&label);
        })
    }
}

/// 处理扣留到流结束的最后一行
///
/// - 不是 JSON 对象：原样输出，不迁移
/// - 没有 `downloadUrl` 或未启用迁移：按原结构输出
/// - 迁移成功：只替换 `downloadUrl`；迁移失败：保留原地址
pub async fn finalize_line(
    line: String,
    relocator: Option<&dyn ArtifactRelocation>,
    metrics: &mut RelayMetrics,
) -> Result<String, StreamError> {
    let event = match ProgressEvent::decode_final(&line) {
        Ok(event) => event,
        Err(e) => {
            tracing::debug!("[RELAY] 最终行不符合事件结构: {}", e);
            return finalize_untyped(line, relocator, metrics).await;
        }
    };

    let (url, relocator) = match (event.relocatable_url(), relocator) {
        (Some(url), Some(relocator)) => (url.to_string(), relocator),
        _ => {
            metrics.record_relocation(RelocationOutcome::Skipped);
            return event.encode_line();
        }
    };

    match try_relocate(relocator, &url, metrics).await {
        Some(relocated) => event.with_download_url(relocated).encode_line(),
        None => event.encode_line(),
    }
}

/// 不符合事件结构的最后一行
///
/// 只要是带字符串 `downloadUrl` 的 JSON 对象就照常迁移，且只改写该字段；
/// 其余情况（包括迁移失败）原样输出。
async fn finalize_untyped(
    line: String,
    relocator: Option<&dyn ArtifactRelocation>,
    metrics: &mut RelayMetrics,
) -> Result<String, StreamError> {
    let mut object = match serde_json::from_str::<Value>(&line) {
        Ok(Value::Object(object)) => object,
        _ => {
            metrics.record_relocation(RelocationOutcome::Skipped);
            return Ok(format!("{}\n", line));
        }
    };

    let url = object.get(DOWNLOAD_URL_KEY).and_then(Value::as_str);
    let (url, relocator) = match (url, relocator) {
        (Some(url), Some(relocator)) => (url.to_string(), relocator),
        _ => {
            metrics.record_relocation(RelocationOutcome::Skipped);
            return Ok(format!("{}\n", line));
        }
    };

    match try_relocate(relocator, &url, metrics).await {
        Some(relocated) => {
            object.insert(DOWNLOAD_URL_KEY.to_string(), Value::String(relocated));
            let mut out = serde_json::to_string(&object)?;
            out.push('\n');
            Ok(out)
        }
        None => Ok(format!("{}\n", line)),
    }
}

async fn try_relocate(
    relocator: &dyn ArtifactRelocation,
    url: &str,
    metrics: &mut RelayMetrics,
) -> Option<String> {
    match relocator.relocate(url).await {
        Ok(relocated) => {
            metrics.record_relocation(RelocationOutcome::Relocated);
            Some(relocated)
        }
        Err(e) => {
            tracing::warn!("[RELAY] 产物迁移失败，保留原始地址 {}: {}", url, e);
            metrics.record_relocation(RelocationOutcome::Fallback);
            None
        }
    }
}

fn terminated(line: String) -> Bytes {
    let mut line = line;
    line.push('\n');
    Bytes::from(line)
}

fn progress_of(line: &str) -> Option<f64> {
    ProgressEvent::decode_progress(line)
        .ok()?
        .fields()
        .progress
        .as_ref()?
        .as_ref()?
        .as_f64()
}
