//! Newline-delimited framing with a bounded frame size.
//!
//! Every message is one JSON object terminated by `\n` or `\r\n`. The size
//! limit counts the line without its terminator. A frame longer than the
//! limit is skipped up to its terminating newline and reported as
//! [`Frame::Oversized`], so the connection can keep going.

use std::io;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};

pub const DEFAULT_MAX_FRAME_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// One line, without its terminator.
    Line(String),
    /// The line exceeded the frame limit and was discarded.
    Oversized,
    /// The line was not valid UTF-8.
    InvalidUtf8,
}

pub struct FrameReader<R> {
    inner: BufReader<R>,
    max_frame_bytes: usize,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(reader: R, max_frame_bytes: usize) -> Self {
        Self {
            inner: BufReader::new(reader),
            max_frame_bytes: max_frame_bytes.max(1),
            buf: Vec::new(),
        }
    }

    /// Read the next frame. `Ok(None)` means the peer closed the stream.
    pub async fn next_frame(&mut self) -> io::Result<Option<Frame>> {
        self.buf.clear();
        // the limit applies to the content; leave room for a "\r\n" terminator
        let limit = self.max_frame_bytes as u64 + 2;
        let n = (&mut self.inner)
            .take(limit)
            .read_until(b'\n', &mut self.buf)
            .await?;
        if n == 0 {
            return Ok(None);
        }

        if self.buf.last() == Some(&b'\n') {
            self.buf.pop();
            if self.buf.last() == Some(&b'\r') {
                self.buf.pop();
            }
        } else if self.buf.len() as u64 >= limit {
            self.discard_line().await?;
            return Ok(Some(Frame::Oversized));
        }
        if self.buf.len() > self.max_frame_bytes {
            return Ok(Some(Frame::Oversized));
        }

        match String::from_utf8(std::mem::take(&mut self.buf)) {
            Ok(line) => Ok(Some(Frame::Line(line))),
            Err(_) => Ok(Some(Frame::InvalidUtf8)),
        }
    }

    async fn discard_line(&mut self) -> io::Result<()> {
        loop {
            let available = self.inner.fill_buf().await?;
            if available.is_empty() {
                return Ok(());
            }
            match available.iter().position(|b| *b == b'\n') {
                Some(pos) => {
                    self.inner.consume(pos + 1);
                    return Ok(());
                }
                None => {
                    let len = available.len();
                    self.inner.consume(len);
                }
            }
        }
    }
}
