//! Inference request and engine parameter types.
//!
//! Pure data passed across the inference engine boundary. The engine itself
//! is an external collaborator (see `ports::inference`).

use serde::{Deserialize, Serialize};

use super::chat::{Message, MessageRole};

/// End-of-turn sentinels used by common chat templates, plus plain-text
/// role prefixes for models that ignore structured stop tokens.
pub const DEFAULT_STOP_MARKERS: &[&str] = &[
    "</s>",
    "<|end|>",
    "<|eot_id|>",
    "<|end_of_text|>",
    "<|im_end|>",
    "<|EOT|>",
    "<|END_OF_TURN_TOKEN|>",
    "<|end_of_turn|>",
    "<end_of_turn>",
    "<|endoftext|>",
    "User:",
    "Assistant:",
];

/// Fixed runtime parameters used when initializing an engine.
///
/// These are configuration constants, not user-tunable per load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineParams {
    /// Context window size in tokens.
    pub context_size: u32,
    /// Number of layers to offload to the GPU (99 = everything).
    pub gpu_layers: u32,
    /// CPU threads used for generation.
    pub threads: u32,
    /// Lock model weights in RAM.
    pub use_mlock: bool,
}

impl Default for EngineParams {
    fn default() -> Self {
        Self {
            context_size: 2048,
            gpu_layers: 99,
            threads: 4,
            use_mlock: false,
        }
    }
}

/// A role/content pair as sent to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

impl From<&Message> for ChatMessage {
    fn from(message: &Message) -> Self {
        Self::new(message.role, message.content.clone())
    }
}

/// What the model should complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionInput {
    /// A structured chat history, formatted by the engine's chat template.
    Messages(Vec<ChatMessage>),
    /// A raw prompt.
    Prompt(String),
}

/// One completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub input: CompletionInput,
    pub max_tokens: u32,
    pub stop: Vec<String>,
    pub temperature: f32,
}

impl CompletionRequest {
    /// Chat request with the default stop markers.
    pub fn chat(messages: Vec<ChatMessage>, max_tokens: u32, temperature: f32) -> Self {
        Self {
            input: CompletionInput::Messages(messages),
            max_tokens,
            stop: default_stop_markers(),
            temperature,
        }
    }

    /// Raw prompt request with the default stop markers.
    pub fn prompt(prompt: impl Into<String>, max_tokens: u32, temperature: f32) -> Self {
        Self {
            input: CompletionInput::Prompt(prompt.into()),
            max_tokens,
            stop: default_stop_markers(),
            temperature,
        }
    }
}

pub fn default_stop_markers() -> Vec<String> {
    DEFAULT_STOP_MARKERS.iter().map(ToString::to_string).collect()
}
