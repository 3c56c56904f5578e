//! 中继指标
//!
//! 每个中继实例独立收集，流结束时输出一条汇总日志。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

/// 最终事件的迁移结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelocationOutcome {
    /// 成功迁移并替换了下载地址
    Relocated,
    /// 迁移失败，保留原始地址
    Fallback,
    /// 无需迁移（无下载地址、非 JSON、或未启用迁移）
    Skipped,
}

/// 中继指标
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayMetrics {
    /// 首个事件到达时间（毫秒）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_event_ms: Option<u64>,

    /// 接收到的非空行数量
    pub lines_received: u32,

    /// 接收到的行字节总数
    pub total_bytes: usize,

    /// 已输出的行数（含最终事件）
    pub lines_forwarded: u32,

    /// 最近一次看到的进度值
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_progress: Option<f64>,

    /// 迁移结果
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relocation: Option<RelocationOutcome>,

    /// 开始时间
    pub start_time: DateTime<Utc>,

    /// 结束时间
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
}

impl Default for RelayMetrics {
    fn default() -> Self {
        Self {
            first_event_ms: None,
            lines_received: 0,
            total_bytes: 0,
            lines_forwarded: 0,
            last_progress: None,
            relocation: None,
            start_time: Utc::now(),
            end_time: None,
        }
    }
}

impl RelayMetrics {
    /// 创建新的指标实例
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录收到一行，第一次调用时计算首事件时间
    pub fn record_received(&mut self, bytes: usize) {
        if self.lines_received == 0 {
            self.first_event_ms =
                Some((Utc::now() - self.start_time).num_milliseconds().max(0) as u64);
        }
        self.lines_received += 1;
        self.total_bytes += bytes;
    }

    /// 记录输出一行
    pub fn record_line(&mut self) {
        self.lines_forwarded += 1;
    }

    /// 记录进度
    pub fn record_progress(&mut self, progress: f64) {
        self.last_progress = Some(progress);
    }

    /// 记录迁移结果
    pub fn record_relocation(&mut self, outcome: RelocationOutcome) {
        self.relocation = Some(outcome);
    }

    /// 标记结束
    pub fn finish(&mut self) {
        self.end_time = Some(Utc::now());
    }

    /// 持续时间（毫秒）
    pub fn duration_ms(&self) -> Option<u64> {
        self.end_time
            .map(|end| (end - self.start_time).num_milliseconds().max(0) as u64)
    }

    /// 输出汇总日志
    pub fn log_summary(&self, label: &str) {
        info!(
            "[RELAY] {} 完成: received={}, bytes={}, forwarded={}, first_event={:?}ms, duration={:?}ms, progress={:?}, relocation={:?}",
            label,
            self.lines_received,
            self.total_bytes,
            self.lines_forwarded,
            self.first_event_ms,
            self.duration_ms(),
            self.last_progress,
            self.relocation
        );
    }
}
