//! Incremental Server-Sent Events decoding for llama-server streams.
//!
//! Frames look like `data: {"choices":[{"delta":{"content":"hi"}}]}\n\n`
//! and the stream ends with `data: [DONE]`. Chunks from the network can
//! split a line anywhere, including inside a UTF-8 sequence, so bytes are
//! buffered until a full line is available.

use bytes::BytesMut;
use serde_json::Value;

/// One decoded `data:` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    Data(String),
    Done,
}

/// Line-buffering SSE decoder.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: BytesMut,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes, returning every complete event they finish.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buf.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line = self.buf.split_to(pos + 1);
            if let Some(event) = parse_line(&line) {
                events.push(event);
            }
        }
        events
    }

    /// Drain a trailing line that was not newline-terminated.
    pub fn finish(&mut self) -> Option<SseEvent> {
        if self.buf.is_empty() {
            return None;
        }
        let line = self.buf.split();
        parse_line(&line)
    }
}

fn parse_line(line: &[u8]) -> Option<SseEvent> {
    let text = String::from_utf8_lossy(line);
    let trimmed = text.trim();
    // Blank separators and `:` comments carry nothing.
    if trimmed.is_empty() || trimmed.starts_with(':') {
        return None;
    }
    let data = trimmed.strip_prefix("data:")?.trim();
    if data == "[DONE]" {
        Some(SseEvent::Done)
    } else {
        Some(SseEvent::Data(data.to_string()))
    }
}

/// Which OpenAI-compatible endpoint produced a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkKind {
    /// `/v1/chat/completions`: text in `choices[0].delta.content`.
    Chat,
    /// `/v1/completions`: text in `choices[0].text`.
    Completion,
}

/// A parsed streaming chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chunk {
    /// Token text (possibly empty for role-only or finish chunks).
    Token(String),
    /// The server reported an error inside the stream.
    Error(String),
}

/// Interpret one `data:` JSON payload.
pub fn parse_chunk(kind: ChunkKind, data: &str) -> Result<Chunk, serde_json::Error> {
    let value: Value = serde_json::from_str(data)?;

    if let Some(error) = value.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .map_or_else(|| error.to_string(), str::to_string);
        return Ok(Chunk::Error(message));
    }

    let choice = &value["choices"][0];
    let text = match kind {
        ChunkKind::Chat => choice["delta"]["content"].as_str(),
        ChunkKind::Completion => choice["text"].as_str(),
    };
    Ok(Chunk::Token(text.unwrap_or_default().to_string()))
}
