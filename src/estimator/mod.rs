//! Single-pass line count estimation
//!
//! Counts end-of-line bytes without decoding the input as text. The first
//! `\r` or `\n` seen fixes the end-of-line byte for the rest of the scan;
//! the other value is ignored from then on. The result drives the
//! "expected N records" message of a restore and is never used for
//! control flow.
//!
//! A file ending in `\r\n` counts its last line once: any trailing CR or LF
//! marks the content as terminated.

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

/// Bytes read from the input per block
pub const BLOCK_SIZE: usize = 1024 * 1024;

const CR: u8 = b'\r';
const LF: u8 = b'\n';

/// Incremental line counter fed with consecutive blocks of a byte stream
#[derive(Debug, Default, Clone)]
pub struct LineCounter {
    eol: Option<u8>,
    lines: u64,
    last: Option<u8>,
}

impl LineCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// The end-of-line byte fixed so far, if any
    pub fn detected_eol(&self) -> Option<u8> {
        self.eol
    }

    /// Scan the next block of the stream
    pub fn feed(&mut self, block: &[u8]) {
        let Some(&last) = block.last() else {
            return;
        };
        self.last = Some(last);

        let mut rest = block;
        while self.eol.is_none() {
            let Some((&byte, tail)) = rest.split_first() else {
                return;
            };
            rest = tail;
            if byte == LF || byte == CR {
                self.eol = Some(byte);
                self.lines += 1;
            }
        }

        let Some(eol) = self.eol else {
            return;
        };

        let mut words = rest.chunks_exact(4);
        for w in &mut words {
            self.lines += u64::from(w[0] == eol)
                + u64::from(w[1] == eol)
                + u64::from(w[2] == eol)
                + u64::from(w[3] == eol);
        }
        for &byte in words.remainder() {
            self.lines += u64::from(byte == eol);
        }
    }

    /// Final estimate, counting trailing unterminated content as a line
    pub fn finish(&self) -> u64 {
        match self.last {
            Some(last) if last != CR && last != LF => self.lines + 1,
            _ => self.lines,
        }
    }
}

/// Estimate the number of lines in `reader`, consuming it to the end.
///
/// Reads [`BLOCK_SIZE`] blocks into a single reused buffer.
pub async fn estimate_lines<R>(reader: &mut R) -> std::io::Result<u64>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut buffer = vec![0u8; BLOCK_SIZE];
    let mut counter = LineCounter::new();
    let mut total = 0u64;

    loop {
        let read = reader.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        total += read as u64;
        counter.feed(&buffer[..read]);
    }

    let estimate = counter.finish();
    debug!(
        "Estimated {} lines in {} bytes (end-of-line byte {:?})",
        estimate,
        total,
        counter.detected_eol().map(char::from)
    );
    Ok(estimate)
}
