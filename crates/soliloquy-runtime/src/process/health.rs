//! Health check for llama-server processes.

use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use tokio::process::Child;
use tokio::time::{Instant, sleep};
use tracing::{debug, info};

const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Poll `/health` until it answers 200, the child exits, or `timeout` passes.
///
/// llama-server answers 503 while the model is still loading.
pub async fn wait_for_http_health(
    client: &reqwest::Client,
    base_url: &str,
    child: &mut Child,
    timeout: Duration,
    interval: Duration,
) -> Result<()> {
    let health_url = format!("{base_url}/health");
    let deadline = Instant::now() + timeout;
    debug!(target: "soliloquy.runtime", url = %health_url, "Waiting for llama-server");

    loop {
        if let Some(status) = child.try_wait()? {
            bail!("llama-server exited during startup ({status})");
        }

        match client.get(&health_url).timeout(PROBE_TIMEOUT).send().await {
            Ok(response) if response.status().is_success() => {
                info!(target: "soliloquy.runtime", url = %base_url, "llama-server is ready");
                return Ok(());
            }
            Ok(response) => {
                debug!(
                    target: "soliloquy.runtime",
                    status = %response.status(),
                    "llama-server not ready yet"
                );
            }
            Err(e) => {
                debug!(target: "soliloquy.runtime", error = %e, "Health probe failed");
            }
        }

        if Instant::now() >= deadline {
            return Err(anyhow!(
                "llama-server did not become healthy within {}s",
                timeout.as_secs()
            ));
        }
        sleep(interval).await;
    }
}
