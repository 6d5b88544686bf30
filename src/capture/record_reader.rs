//! Line reader for piped capture-engine output.
//!
//! ffmpeg rewrites its progress line in place using carriage returns, so the
//! stderr stream is not newline-delimited while a capture is running. This
//! reader treats both `\n` and `\r` as record terminators so progress updates
//! surface as they are written.

use std::collections::VecDeque;
use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, BufReader};

const READ_CHUNK: usize = 4096;

/// Yields text records terminated by `\n` or `\r` from an async stream.
pub struct RecordLines<R> {
    source: BufReader<R>,
    carry: Vec<u8>,
    ready: VecDeque<String>,
    eof: bool,
}

impl<R> RecordLines<R>
where
    R: AsyncRead + Unpin,
{
    pub fn new(source: R) -> Self {
        Self {
            source: BufReader::new(source),
            carry: Vec::new(),
            ready: VecDeque::new(),
            eof: false,
        }
    }

    /// Next non-empty record, or `None` at end of stream.
    pub async fn next_line(&mut self) -> io::Result<Option<String>> {
        loop {
            if let Some(line) = self.ready.pop_front() {
                return Ok(Some(line));
            }
            if self.eof {
                return Ok(None);
            }

            let mut chunk = [0u8; READ_CHUNK];
            let n = self.source.read(&mut chunk).await?;
            if n == 0 {
                self.eof = true;
                // Whatever is left has no terminator; flush it as a record.
                let tail = std::mem::take(&mut self.carry);
                self.push_record(&tail);
                continue;
            }

            self.carry.extend_from_slice(&chunk[..n]);
            self.drain_complete_records();
        }
    }

    /// Splits every terminated record out of the carry buffer.
    fn drain_complete_records(&mut self) {
        while let Some(pos) = self.carry.iter().position(|&b| b == b'\n' || b == b'\r') {
            let record: Vec<u8> = self.carry.drain(..=pos).collect();
            self.push_record(&record[..record.len() - 1]);
        }
    }

    fn push_record(&mut self, raw: &[u8]) {
        let text = String::from_utf8_lossy(raw).trim().to_string();
        if !text.is_empty() {
            self.ready.push_back(text);
        }
    }
}
