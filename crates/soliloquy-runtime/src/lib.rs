//! llama-server runtime for soliloquy.
//!
//! Implements the core `EngineLoader` / `InferenceEngine` ports by running
//! one `llama-server` process per loaded model and streaming completions
//! over its OpenAI-compatible HTTP API.
//!
//! - [`LlamaServerLoader`]: spawns the server on a free local port and waits
//!   for `/health`
//! - [`LlamaServerEngine`]: streams `/v1/chat/completions` or
//!   `/v1/completions` and terminates the process on release
//! - [`sse`]: incremental Server-Sent Events decoding

mod config;
mod engine;
mod loader;
pub mod process;
pub mod sse;

pub use config::{LLAMA_SERVER_ENV, LlamaServerConfig};
pub use engine::LlamaServerEngine;
pub use loader::LlamaServerLoader;
