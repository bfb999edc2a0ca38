//! Port allocation utilities.

use std::net::TcpListener;

use anyhow::{Result, anyhow};
use tracing::debug;

/// How many ports above the base are tried.
const PORT_RANGE: u16 = 100;

/// Check if a port is free by binding and immediately dropping a listener.
pub fn is_port_available(port: u16) -> bool {
    TcpListener::bind(("127.0.0.1", port)).is_ok_and(|listener| listener.local_addr().is_ok())
}

/// First available port in `base..base + 100`, skipping `used`.
pub fn allocate_port(base_port: u16, used: &[u16]) -> Result<u16> {
    for offset in 0..PORT_RANGE {
        let Some(port) = base_port.checked_add(offset) else {
            break;
        };
        if used.contains(&port) {
            continue;
        }
        if is_port_available(port) {
            debug!(target: "soliloquy.runtime", port, "Allocated port");
            return Ok(port);
        }
    }
    Err(anyhow!(
        "No available ports in range {}-{}",
        base_port,
        base_port.saturating_add(PORT_RANGE - 1)
    ))
}
