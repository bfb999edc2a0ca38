//! Inference engine port.
//!
//! Token generation, context management and model execution are delegated
//! to an external engine. This port is the whole boundary: initialize an
//! engine from a model file, stream one completion at a time, release it.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{CompletionRequest, EngineParams};

/// Errors reported by an inference engine.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    /// The engine could not be created (bad path, unsupported format,
    /// resource exhaustion).
    #[error("Model initialization failed: {0}")]
    Init(String),

    /// A completion request failed mid-flight.
    #[error("Completion failed: {0}")]
    Completion(String),

    /// The engine was already released.
    #[error("Engine has been released")]
    Released,
}

/// Receives streamed tokens in emission order.
pub trait TokenSink: Send {
    fn on_token(&mut self, token: &str);
}

impl<F> TokenSink for F
where
    F: FnMut(&str) + Send,
{
    fn on_token(&mut self, token: &str) {
        self(token);
    }
}

/// Sink that drops every token, for non-streamed requests.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardTokens;

impl TokenSink for DiscardTokens {
    fn on_token(&mut self, _token: &str) {}
}

/// A resident inference engine.
#[async_trait]
pub trait InferenceEngine: Send + Sync + fmt::Debug {
    /// Run one completion, pushing each token into `sink` as it is produced.
    ///
    /// Returns the engine's final text. Callers that need the streamed
    /// transcript should rely on the sink, not on the return value.
    async fn complete(
        &self,
        request: CompletionRequest,
        sink: &mut dyn TokenSink,
    ) -> Result<String, EngineError>;

    /// Free all engine resources. Further calls fail with
    /// [`EngineError::Released`].
    async fn release(&self) -> Result<(), EngineError>;
}

/// Creates engines from model files.
#[async_trait]
pub trait EngineLoader: Send + Sync {
    /// Initialize an engine for the weights at `model_path`.
    async fn init(
        &self,
        model_path: &Path,
        params: &EngineParams,
    ) -> Result<Arc<dyn InferenceEngine>, EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closures_are_token_sinks() {
        let mut collected = String::new();
        {
            let mut sink = |t: &str| collected.push_str(t);
            let sink: &mut dyn TokenSink = &mut sink;
            sink.on_token("Hel");
            sink.on_token("lo");
        }
        assert_eq!(collected, "Hello");
    }

    #[test]
    fn discard_sink_accepts_tokens() {
        let mut sink = DiscardTokens;
        sink.on_token("ignored");
    }
}
