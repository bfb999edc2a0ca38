//! Byte sources for downloads.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use reqwest::header::{CONTENT_RANGE, ETAG, IF_RANGE, LAST_MODIFIED, RANGE, USER_AGENT};
use reqwest::{Client, Response, StatusCode};

use soliloquy_core::download::DownloadError;

/// Stream of body chunks.
pub type ByteStream = BoxStream<'static, Result<Bytes, DownloadError>>;

/// An opened transfer.
pub struct TransferBody {
    /// Size of the whole resource in bytes, when the server reports it.
    pub total: Option<u64>,
    /// Whether the body starts at the requested offset. `false` means the
    /// server sent the resource from byte 0 (range ignored, resource
    /// changed, or the partial data no longer fits it).
    pub resumed: bool,
    /// `ETag` or `Last-Modified` of the resource, for the next resume.
    pub validator: Option<String>,
    pub chunks: ByteStream,
}

impl std::fmt::Debug for TransferBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferBody")
            .field("total", &self.total)
            .field("resumed", &self.resumed)
            .field("validator", &self.validator)
            .finish_non_exhaustive()
    }
}

/// Fetches a remote resource, optionally from a byte offset.
///
/// `validator` is the value a previous response reported for the bytes
/// already on disk; a resume only continues if the resource still matches.
#[async_trait]
pub trait DownloadTransport: Send + Sync {
    async fn open(
        &self,
        url: &str,
        offset: u64,
        validator: Option<&str>,
    ) -> Result<TransferBody, DownloadError>;
}

/// HTTP(S) transport using `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new() -> Result<Self, DownloadError> {
        let client = Client::builder()
            .connect_timeout(Self::CONNECT_TIMEOUT)
            .build()
            .map_err(|e| DownloadError::network(e.to_string()))?;
        Ok(Self { client })
    }

    /// Use a preconfigured client (proxies, custom TLS).
    pub const fn with_client(client: Client) -> Self {
        Self { client }
    }

    async fn send(
        &self,
        url: &str,
        offset: u64,
        validator: Option<&str>,
    ) -> Result<Response, DownloadError> {
        let mut request = self.client.get(url).header(USER_AGENT, "soliloquy");
        if offset > 0 {
            request = request.header(RANGE, format!("bytes={offset}-"));
            if let Some(validator) = validator {
                request = request.header(IF_RANGE, validator);
            }
        }
        request
            .send()
            .await
            .map_err(|e| DownloadError::network(e.to_string()))
    }
}

#[async_trait]
impl DownloadTransport for HttpTransport {
    async fn open(
        &self,
        url: &str,
        offset: u64,
        validator: Option<&str>,
    ) -> Result<TransferBody, DownloadError> {
        let response = self.send(url, offset, validator).await?;

        if response.status() == StatusCode::RANGE_NOT_SATISFIABLE && offset > 0 {
            let total = response
                .headers()
                .get(CONTENT_RANGE)
                .and_then(|v| v.to_str().ok())
                .and_then(total_from_unsatisfied_range);
            if total == Some(offset) {
                // Partial file already holds the whole resource.
                return Ok(TransferBody {
                    total,
                    resumed: true,
                    validator: validator.map(str::to_string),
                    chunks: futures_util::stream::empty().boxed(),
                });
            }
            tracing::debug!(
                target: "soliloquy.download",
                offset,
                total = ?total,
                "Partial data does not fit the remote resource, restarting"
            );
            let response = self.send(url, 0, None).await?;
            return into_body(response, 0);
        }

        into_body(response, offset)
    }
}

fn into_body(response: Response, offset: u64) -> Result<TransferBody, DownloadError> {
    let status = response.status();
    if !status.is_success() {
        return Err(DownloadError::network_with_status(
            format!("HTTP {status}"),
            status.as_u16(),
        ));
    }

    let resumed = offset > 0 && status == StatusCode::PARTIAL_CONTENT;
    let total = if resumed {
        response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(total_from_content_range)
            .or_else(|| response.content_length().map(|len| len + offset))
    } else {
        response.content_length()
    };
    let validator = response
        .headers()
        .get(ETAG)
        .or_else(|| response.headers().get(LAST_MODIFIED))
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let chunks = response
        .bytes_stream()
        .map(|chunk| chunk.map_err(|e| DownloadError::network(e.to_string())))
        .boxed();

    Ok(TransferBody {
        total,
        resumed,
        validator,
        chunks,
    })
}

/// Total from `Content-Range: bytes 100-199/200`.
fn total_from_content_range(value: &str) -> Option<u64> {
    let (_, total) = value.strip_prefix("bytes ")?.split_once('/')?;
    total.trim().parse().ok()
}

/// Total from `Content-Range: bytes */200`.
fn total_from_unsatisfied_range(value: &str) -> Option<u64> {
    value.strip_prefix("bytes */")?.trim().parse().ok()
}
