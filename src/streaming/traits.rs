//! 流式中继的类型别名与扩展点
//!
//! - `StreamResponse`: 统一的上游字节流类型
//! - `ArtifactRelocation`: 最终产物迁移的抽象接口，中继引擎只依赖该 trait

use crate::streaming::relocation::RelocationError;
use crate::streaming::StreamError;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;

/// 流式响应类型别名
///
/// 返回一个异步字节流，每个 Item 是一个 chunk 的字节数据或错误。
/// 使用 `Pin<Box<...>>` 以支持动态分发和异步迭代。
pub type StreamResponse = Pin<Box<dyn Stream<Item = Result<Bytes, StreamError>> + Send>>;

/// 产物迁移接口
///
/// 给定上游返回的 `downloadUrl`，把产物复制到本应用管理的存储桶中，
/// 返回新的短期签名下载地址。
///
/// 中继引擎把任何 `Err` 都视为"迁移失败"，回退到原始地址，
/// 所以实现方不需要自行兜底。
#[async_trait]
pub trait ArtifactRelocation: Send + Sync {
    /// 迁移产物并返回新的下载地址
    async fn relocate(&self, download_url: &str) -> Result<String, RelocationError>;
}

/// 将 reqwest 的 bytes_stream 转换为 StreamResponse
pub fn reqwest_stream_to_stream_response(response: reqwest::Response) -> StreamResponse {
    use futures::StreamExt;

    let stream = response.bytes_stream().map(|result| result.map_err(StreamError::from));

    Box::pin(stream)
}

/// 将内存中的若干 chunk 包装为 StreamResponse
///
/// 主要用于测试以及从已缓冲数据构造流。
pub fn chunks_to_stream_response<I>(chunks: I) -> StreamResponse
where
    I: IntoIterator<Item = Result<Bytes, StreamError>>,
    I::IntoIter: Send + 'static,
{
    Box::pin(futures::stream::iter(chunks))
}
