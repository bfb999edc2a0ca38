//! `InferenceEngine` backed by a llama-server HTTP endpoint.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use futures_util::StreamExt;
use serde::Serialize;
use tokio::process::Child;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use soliloquy_core::domain::{ChatMessage, CompletionInput, CompletionRequest};
use soliloquy_core::ports::{EngineError, InferenceEngine, TokenSink};

use crate::process::shutdown_child;
use crate::sse::{Chunk, ChunkKind, SseDecoder, SseEvent, parse_chunk};

#[derive(Serialize)]
struct ChatBody<'a> {
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
    stop: &'a [String],
    stream: bool,
}

#[derive(Serialize)]
struct PromptBody<'a> {
    prompt: &'a str,
    max_tokens: u32,
    temperature: f32,
    stop: &'a [String],
    stream: bool,
}

/// A model resident in a llama-server process.
#[derive(Debug)]
pub struct LlamaServerEngine {
    base_url: String,
    model_path: Option<PathBuf>,
    client: reqwest::Client,
    /// `None` when attached to a server this engine does not own.
    child: Mutex<Option<Child>>,
    shutdown_grace: Duration,
    released: AtomicBool,
}

impl LlamaServerEngine {
    pub(crate) fn spawned(
        base_url: String,
        model_path: &Path,
        child: Child,
        client: reqwest::Client,
        shutdown_grace: Duration,
    ) -> Self {
        Self {
            base_url,
            model_path: Some(model_path.to_path_buf()),
            client,
            child: Mutex::new(Some(child)),
            shutdown_grace,
            released: AtomicBool::new(false),
        }
    }

    /// Use an already-running server. Release only stops using it.
    pub fn connect(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model_path: None,
            client,
            child: Mutex::new(None),
            shutdown_grace: Duration::ZERO,
            released: AtomicBool::new(false),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model_path(&self) -> Option<&Path> {
        self.model_path.as_deref()
    }

    async fn stream_completion(
        &self,
        request: &CompletionRequest,
        sink: &mut dyn TokenSink,
    ) -> Result<String> {
        let (path, kind, body) = match &request.input {
            CompletionInput::Messages(messages) => (
                "/v1/chat/completions",
                ChunkKind::Chat,
                serde_json::to_value(ChatBody {
                    messages,
                    max_tokens: request.max_tokens,
                    temperature: request.temperature,
                    stop: &request.stop,
                    stream: true,
                })?,
            ),
            CompletionInput::Prompt(prompt) => (
                "/v1/completions",
                ChunkKind::Completion,
                serde_json::to_value(PromptBody {
                    prompt,
                    max_tokens: request.max_tokens,
                    temperature: request.temperature,
                    stop: &request.stop,
                    stream: true,
                })?,
            ),
        };

        let url = format!("{}{path}", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            bail!("llama-server returned {status}: {detail}");
        }

        let mut decoder = SseDecoder::new();
        let mut text = String::new();
        let mut bytes = response.bytes_stream();
        while let Some(chunk) = bytes.next().await {
            let chunk = chunk.context("completion stream interrupted")?;
            for event in decoder.push(&chunk) {
                if !apply(kind, event, sink, &mut text)? {
                    return Ok(text);
                }
            }
        }
        if let Some(event) = decoder.finish() {
            apply(kind, event, sink, &mut text)?;
        }
        Ok(text)
    }
}

/// Route one SSE event; `false` means the stream is finished.
fn apply(kind: ChunkKind, event: SseEvent, sink: &mut dyn TokenSink, text: &mut String) -> Result<bool> {
    let data = match event {
        SseEvent::Done => return Ok(false),
        SseEvent::Data(data) => data,
    };
    match parse_chunk(kind, &data).with_context(|| format!("malformed chunk: {data}"))? {
        Chunk::Token(token) if token.is_empty() => {}
        Chunk::Token(token) => {
            sink.on_token(&token);
            text.push_str(&token);
        }
        Chunk::Error(message) => bail!("llama-server error: {message}"),
    }
    Ok(true)
}

#[async_trait]
impl InferenceEngine for LlamaServerEngine {
    async fn complete(
        &self,
        request: CompletionRequest,
        sink: &mut dyn TokenSink,
    ) -> Result<String, EngineError> {
        if self.released.load(Ordering::SeqCst) {
            return Err(EngineError::Released);
        }
        self.stream_completion(&request, sink).await.map_err(|e| {
            warn!(target: "soliloquy.runtime", error = %format!("{e:#}"), "Completion failed");
            EngineError::Completion(format!("{e:#}"))
        })
    }

    async fn release(&self) -> Result<(), EngineError> {
        if self.released.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let Some(mut child) = self.child.lock().await.take() else {
            return Ok(());
        };
        match shutdown_child(&mut child, self.shutdown_grace).await {
            Ok(status) => {
                debug!(target: "soliloquy.runtime", url = %self.base_url, %status, "llama-server stopped");
            }
            Err(e) => {
                // kill_on_drop still applies when `child` goes out of scope.
                warn!(target: "soliloquy.runtime", error = %e, "llama-server shutdown failed");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use soliloquy_core::domain::MessageRole;

    #[test]
    fn chat_body_uses_openai_shape() {
        let messages = vec![
            ChatMessage::new(MessageRole::System, "Be brief."),
            ChatMessage::new(MessageRole::User, "Hi"),
        ];
        let stop = vec!["User:".to_string()];
        let body = serde_json::to_value(ChatBody {
            messages: &messages,
            max_tokens: 64,
            temperature: 0.5,
            stop: &stop,
            stream: true,
        })
        .unwrap();

        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "Hi");
        assert_eq!(body["stop"][0], "User:");
        assert_eq!(body["stream"], true);
        assert_eq!(body["max_tokens"], 64);
    }

    #[test]
    fn apply_skips_empty_tokens_and_stops_on_done() {
        let mut seen = Vec::new();
        let mut sink = |t: &str| seen.push(t.to_string());
        let mut text = String::new();

        let role = SseEvent::Data(r#"{"choices":[{"delta":{"role":"assistant"}}]}"#.into());
        assert!(apply(ChunkKind::Chat, role, &mut sink, &mut text).unwrap());
        let token = SseEvent::Data(r#"{"choices":[{"delta":{"content":"Hi"}}]}"#.into());
        assert!(apply(ChunkKind::Chat, token, &mut sink, &mut text).unwrap());
        assert!(!apply(ChunkKind::Chat, SseEvent::Done, &mut sink, &mut text).unwrap());

        assert_eq!(text, "Hi");
        assert_eq!(seen, vec!["Hi"]);
    }
}
