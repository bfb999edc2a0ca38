//! `EngineLoader` that runs one llama-server process per model.

use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::{info, warn};

use soliloquy_core::domain::EngineParams;
use soliloquy_core::ports::{EngineError, EngineLoader, InferenceEngine};

use crate::config::LlamaServerConfig;
use crate::engine::LlamaServerEngine;
use crate::process::{allocate_port, shutdown_child, spawn_stream_reader, wait_for_http_health};

/// Spawns llama-server for each `init`.
#[derive(Debug, Clone)]
pub struct LlamaServerLoader {
    config: LlamaServerConfig,
    client: reqwest::Client,
}

impl LlamaServerLoader {
    pub fn new(config: LlamaServerConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { config, client })
    }

    pub const fn config(&self) -> &LlamaServerConfig {
        &self.config
    }

    async fn spawn(&self, model_path: &Path, params: &EngineParams) -> Result<LlamaServerEngine> {
        if !model_path.is_file() {
            bail!("model file not found: {}", model_path.display());
        }

        let port = allocate_port(self.config.base_port, &[])?;
        let mut child = Command::new(&self.config.binary)
            .args(server_args(model_path, port, params))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn {}", self.config.binary.display()))?;

        if let Some(stdout) = child.stdout.take() {
            spawn_stream_reader(stdout, port, "stdout");
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_stream_reader(stderr, port, "stderr");
        }

        let base_url = format!("http://127.0.0.1:{port}");
        if let Err(e) = wait_for_http_health(
            &self.client,
            &base_url,
            &mut child,
            self.config.startup_timeout,
            self.config.health_interval,
        )
        .await
        {
            if let Err(stop_err) = shutdown_child(&mut child, self.config.shutdown_grace).await {
                warn!(target: "soliloquy.runtime", error = %stop_err, "Failed to stop llama-server after failed start");
            }
            return Err(e);
        }

        info!(
            target: "soliloquy.runtime",
            model = %model_path.display(),
            port,
            "llama-server started"
        );
        Ok(LlamaServerEngine::spawned(
            base_url,
            model_path,
            child,
            self.client.clone(),
            self.config.shutdown_grace,
        ))
    }
}

#[async_trait]
impl EngineLoader for LlamaServerLoader {
    async fn init(
        &self,
        model_path: &Path,
        params: &EngineParams,
    ) -> Result<Arc<dyn InferenceEngine>, EngineError> {
        match self.spawn(model_path, params).await {
            Ok(engine) => Ok(Arc::new(engine)),
            Err(e) => {
                let message = format!("{e:#}");
                warn!(target: "soliloquy.runtime", error = %message, "llama-server failed to start");
                Err(EngineError::Init(message))
            }
        }
    }
}

/// Command line for serving `model_path` on `port`.
pub(crate) fn server_args(model_path: &Path, port: u16, params: &EngineParams) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "-m".into(),
        model_path.as_os_str().to_owned(),
        "--host".into(),
        "127.0.0.1".into(),
        "--port".into(),
        port.to_string().into(),
        "-c".into(),
        params.context_size.to_string().into(),
        "-ngl".into(),
        params.gpu_layers.to_string().into(),
        "-t".into(),
        params.threads.to_string().into(),
    ];
    if params.use_mlock {
        args.push("--mlock".into());
    }
    args
}
