//! SSE (Server-Sent Events) line decoder for streamed completions.
//!
//! Handles the `data: ` prefix, `[DONE]` termination, comment and blank
//! lines, and lines split across TCP chunk boundaries. Unlike a best-effort
//! decoder, a `data:` payload that is not valid JSON is an error.

use crate::error::Result;
use serde_json::Value;

/// One meaningful SSE line.
#[derive(Debug, Clone, PartialEq)]
pub enum SseFrame {
    /// Parsed JSON payload of a `data:` line.
    Data(Value),
    /// The `data: [DONE]` terminator.
    Done,
}

/// Incremental SSE decoder.
///
/// # Example
///
/// ```
/// use llm_regress::backend::sse::{SseDecoder, SseFrame};
///
/// let mut decoder = SseDecoder::new();
/// let data = b"data: {\"choices\":[{\"delta\":{\"content\":\"Hello\"}}]}\n\ndata: [DONE]\n\n";
/// let frames = decoder.decode(data).unwrap();
/// assert_eq!(frames.len(), 2);
/// assert_eq!(frames[1], SseFrame::Done);
/// ```
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes and return the frames completed by them.
    ///
    /// Bytes are buffered until a newline so multi-byte characters and JSON
    /// payloads split across chunks are reassembled first.
    pub fn decode(&mut self, chunk: &[u8]) -> Result<Vec<SseFrame>> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            if let Some(frame) = parse_line(&line)? {
                frames.push(frame);
            }
        }

        Ok(frames)
    }

    /// Decode whatever is left once the body ends without a final newline.
    pub fn flush(&mut self) -> Result<Vec<SseFrame>> {
        let raw = std::mem::take(&mut self.buffer);
        let rest = String::from_utf8_lossy(&raw);

        let mut frames = Vec::new();
        for line in rest.lines() {
            if let Some(frame) = parse_line(line)? {
                frames.push(frame);
            }
        }
        Ok(frames)
    }
}

fn parse_line(line: &str) -> Result<Option<SseFrame>> {
    let line = line.trim_end_matches(['\r', '\n']);

    if line.is_empty() || line.starts_with(':') {
        return Ok(None);
    }

    let Some(data) = line
        .strip_prefix("data: ")
        .or_else(|| line.strip_prefix("data:"))
    else {
        // event:, id:, retry: and anything else carry nothing we use
        return Ok(None);
    };

    if data.trim() == "[DONE]" {
        return Ok(Some(SseFrame::Done));
    }

    Ok(Some(SseFrame::Data(serde_json::from_str(data)?)))
}
