//! Forward llama-server output to tracing.
//!
//! llama-server can emit non-UTF-8 bytes, so lines are read as bytes and
//! decoded lossily; `lines()` would end the reader on the first bad byte.

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::debug;

pub fn spawn_stream_reader(
    stream: impl AsyncRead + Unpin + Send + 'static,
    port: u16,
    stream_type: &'static str,
) {
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut buf: Vec<u8> = Vec::with_capacity(1024);

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    while matches!(buf.last(), Some(b'\n' | b'\r')) {
                        buf.pop();
                    }
                    let line = String::from_utf8_lossy(&buf);
                    debug!(target: "soliloquy.runtime", port, stream = stream_type, "{line}");
                }
                Err(e) => {
                    debug!(target: "soliloquy.runtime", port, stream = stream_type, error = %e, "Log reader stopped");
                    break;
                }
            }
        }
    });
}
