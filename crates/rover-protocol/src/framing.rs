//! 字节流按行切分
//!
//! TCP 是字节流，一次读取可能包含半帧或多帧。`LineFramer` 缓存未结束的
//! 部分，直到收到 `\n` 才产出完整的一行（去掉末尾 `\r`）。

use crate::ProtocolError;
use bytes::{Buf, BytesMut};
use tracing::warn;

/// 默认单行长度上限（字节）
pub const DEFAULT_MAX_LINE_LEN: usize = 4096;

/// 行切分器
///
/// # 示例
///
/// ```rust
/// use rover_protocol::LineFramer;
///
/// let mut framer = LineFramer::new();
/// assert!(framer.push(b"CMD_TEMPER").is_empty());
/// let lines = framer.push(b"ATURE#36.7\nCMD_CPU");
/// assert_eq!(lines, vec!["CMD_TEMPERATURE#36.7".to_string()]);
/// assert_eq!(framer.pending_len(), 7);
/// ```
#[derive(Debug)]
pub struct LineFramer {
    buf: BytesMut,
    max_line_len: usize,
    /// 正在丢弃超长行的剩余部分
    discarding: bool,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::with_max_line_len(DEFAULT_MAX_LINE_LEN)
    }

    pub fn with_max_line_len(max_line_len: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(256),
            max_line_len: max_line_len.max(1),
            discarding: false,
        }
    }

    /// 写入一段字节，返回所有新完成的非空行
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut lines = Vec::new();

        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line = self.buf.split_to(pos + 1);
            if self.discarding {
                // 超长行的尾部，连同换行一起丢弃
                self.discarding = false;
                continue;
            }
            let mut end = pos;
            if end > 0 && line[end - 1] == b'\r' {
                end -= 1;
            }
            let text = String::from_utf8_lossy(&line[..end]);
            let text = text.trim();
            if !text.is_empty() {
                lines.push(text.to_string());
            }
        }

        if self.buf.len() > self.max_line_len {
            let err = ProtocolError::LineTooLong {
                len: self.buf.len(),
                limit: self.max_line_len,
            };
            warn!("Dropping partial line: {}", err);
            self.buf.advance(self.buf.len());
            self.discarding = true;
        }

        lines
    }

    /// 尚未结束的字节数
    pub fn pending_len(&self) -> usize {
        self.buf.len()
    }

    /// 丢弃缓存（重连时使用）
    pub fn clear(&mut self) {
        self.buf.clear();
        self.discarding = false;
    }
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::new()
    }
}
