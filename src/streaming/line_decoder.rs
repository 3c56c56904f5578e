//! 行分帧解码器
//!
//! 把上游的任意切分的字节流重新组装为按换行符分隔的文本行。
//!
//! - 在字节层面按 `\n` 切分，再逐行做 UTF-8 解码，
//!   因此跨 chunk 截断的多字节字符不会被破坏
//! - 每行去除首尾空白（包括 `\r`），空行直接丢弃
//! - 未遇到换行符的残余数据有上限，超过后返回 `BufferOverflow`

use crate::streaming::traits::StreamResponse;
use crate::streaming::StreamError;
use async_stream::stream;
use futures::{Stream, StreamExt};

/// 默认的单行最大字节数（16MB）
///
/// 最终事件可能携带完整摘要文本，因此上限放得比较宽。
pub const DEFAULT_MAX_LINE_BYTES: usize = 16 * 1024 * 1024;

/// 行分帧解码器（sans-IO）
#[derive(Debug)]
pub struct LineDecoder {
    /// 尚未遇到换行符的残余字节
    buffer: Vec<u8>,
    /// 残余字节上限
    max_line_bytes: usize,
}

impl Default for LineDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl LineDecoder {
    /// 使用默认上限创建解码器
    pub fn new() -> Self {
        Self::with_max_line_bytes(DEFAULT_MAX_LINE_BYTES)
    }

    /// 使用指定上限创建解码器
    pub fn with_max_line_bytes(max_line_bytes: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_line_bytes,
        }
    }

    /// 当前残余字节数
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// 追加一个 chunk，返回其中所有完整的非空行
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<String>, StreamError> {
        self.buffer.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.buffer[start..].iter().position(|b| *b == b'\n') {
            let end = start + offset;
            if let Some(line) = decode_line(&self.buffer[start..end]) {
                lines.push(line);
            }
            start = end + 1;
        }
        self.buffer.drain(..start);

        if self.buffer.len() > self.max_line_bytes {
            return Err(StreamError::BufferOverflow {
                limit: self.max_line_bytes,
            });
        }

        Ok(lines)
    }

    /// 流结束时取出残余数据
    ///
    /// 上游最后一行没有以换行符结尾时，这里会把它作为完整的一行返回。
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        decode_line(&rest)
    }
}

fn decode_line(raw: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(raw);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// 把字节流转换为惰性的行流
///
/// 返回的流是有限、不可重启的：源流结束后产出残余行（如果有）然后结束；
/// 源流出错时产出该错误并立即结束。
pub fn frame_lines(
    source: StreamResponse,
    max_line_bytes: usize,
) -> impl Stream<Item = Result<String, StreamError>> + Send {
    stream! {
        let mut source = source;
        let mut decoder = LineDecoder::with_max_line_bytes(max_line_bytes);

        while let Some(chunk) = source.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };
            match decoder.push(&chunk) {
                Ok(lines) => {
                    for line in lines {
                        yield Ok(line);
                    }
                }
                Err(e) => {
                    yield Err(e);
                    return;
                }
            }
        }

        if let Some(line) = decoder.finish() {
            yield Ok(line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streaming::traits::chunks_to_stream_response;
    use bytes::Bytes;
    use proptest::prelude::*;

    fn decode_all(chunks: &[&[u8]]) -> Vec<String> {
        let mut decoder = LineDecoder::new();
        let mut lines = Vec::new();
        for chunk in chunks {
            lines.extend(decoder.push(chunk).unwrap());
        }
        lines.extend(decoder.finish());
        lines
    }

    #[test]
    fn test_split_lines_across_chunks() {
        let lines = decode_all(&[b"{\"progress\":1", b"0}\n{\"pro", b"gress\":20}\n"]);
        assert_eq!(lines, vec!["{\"progress\":10}", "{\"progress\":20}"]);
    }

    #[test]
    fn test_empty_lines_and_crlf_are_dropped() {
        let lines = decode_all(&[b"\r\n\n  a  \r\n\r\n\nb\r\n   \n"]);
        assert_eq!(lines, vec!["a", "b"]);
    }

    #[test]
    fn test_trailing_line_without_newline() {
        let lines = decode_all(&[b"first\nlast"]);
        assert_eq!(lines, vec!["first", "last"]);
    }

    #[test]
    fn test_multibyte_char_split_across_chunks() {
        let text = "翻译完成\n".as_bytes();
        let (head, tail) = text.split_at(4);
        let lines = decode_all(&[head, tail]);
        assert_eq!(lines, vec!["翻译完成"]);
    }

    #[test]
    fn test_buffer_overflow() {
        let mut decoder = LineDecoder::with_max_line_bytes(8);
        assert!(decoder.push(b"12345678").is_ok());
        let err = decoder.push(b"9").unwrap_err();
        assert_eq!(err, StreamError::BufferOverflow { limit: 8 });
    }

    #[test]
    fn test_complete_lines_do_not_count_against_limit() {
        let mut decoder = LineDecoder::with_max_line_bytes(4);
        let lines = decoder.push(b"abc\ndef\nghi\n").unwrap();
        assert_eq!(lines.len(), 3);
        assert_eq!(decoder.buffered_len(), 0);
    }

    #[tokio::test]
    async fn test_frame_lines_stops_on_error() {
        let source = chunks_to_stream_response(vec![
            Ok(Bytes::from_static(b"a\nb")),
            Err(StreamError::network("reset")),
            Ok(Bytes::from_static(b"\nc\n")),
        ]);
        let items: Vec<_> = frame_lines(source, DEFAULT_MAX_LINE_BYTES).collect().await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), "a");
        assert!(matches!(items[1], Err(StreamError::Network(_))));
    }

    #[tokio::test]
    async fn test_frame_lines_flushes_trailing_line() {
        let source = chunks_to_stream_response(vec![Ok(Bytes::from_static(b"a\n\nb"))]);
        let items: Vec<String> = frame_lines(source, DEFAULT_MAX_LINE_BYTES)
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert_eq!(items, vec!["a", "b"]);
    }

    proptest! {
        /// 任意切分方式得到的行序列都相同
        #[test]
        fn prop_chunking_does_not_change_lines(
            lines in prop::collection::vec("[a-z0-9{}\":,]{1,20}", 1..12),
            cuts in prop::collection::vec(0usize..200, 0..10),
            crlf in any::<bool>(),
        ) {
            let sep = if crlf { "\r\n" } else { "\n" };
            let payload = lines.join(sep) + sep;
            let bytes = payload.as_bytes();

            let mut points: Vec<usize> = cuts.into_iter().map(|c| c % (bytes.len() + 1)).collect();
            points.sort_unstable();
            points.dedup();

            let mut chunks = Vec::new();
            let mut prev = 0;
            for p in points {
                chunks.push(&bytes[prev..p]);
                prev = p;
            }
            chunks.push(&bytes[prev..]);

            prop_assert_eq!(decode_all(&chunks), lines);
        }
    }
}
