//! llama-server runtime configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Environment variable overriding the llama-server binary.
pub const LLAMA_SERVER_ENV: &str = "SOLILOQUY_LLAMA_SERVER";

/// How the loader runs llama-server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlamaServerConfig {
    /// Binary to execute.
    pub binary: PathBuf,
    /// First port tried when allocating.
    pub base_port: u16,
    /// How long `/health` may take to answer after spawn.
    pub startup_timeout: Duration,
    /// Delay between health probes.
    pub health_interval: Duration,
    /// Grace period between SIGTERM and SIGKILL on release.
    pub shutdown_grace: Duration,
}

impl Default for LlamaServerConfig {
    fn default() -> Self {
        let binary = std::env::var_os(LLAMA_SERVER_ENV)
            .filter(|value| !value.is_empty())
            .map_or_else(|| PathBuf::from("llama-server"), PathBuf::from);
        Self {
            binary,
            base_port: 9000,
            startup_timeout: Duration::from_secs(120),
            health_interval: Duration::from_millis(250),
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

impl LlamaServerConfig {
    #[must_use]
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    #[must_use]
    pub const fn with_base_port(mut self, port: u16) -> Self {
        self.base_port = port;
        self
    }

    #[must_use]
    pub const fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }
}
