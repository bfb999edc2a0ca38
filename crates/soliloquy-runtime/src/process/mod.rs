//! llama-server process plumbing: ports, health, log forwarding, shutdown.

mod health;
mod logs;
mod ports;
mod shutdown;

pub use health::wait_for_http_health;
pub use logs::spawn_stream_reader;
pub use ports::{allocate_port, is_port_available};
pub use shutdown::shutdown_child;
