//! Shared fakes for download tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream;

use soliloquy_core::{AppEvent, AppEventEmitter, ModelDescriptor, WakeLockPort};
use soliloquy_download::{DownloadError, DownloadEvent, DownloadTransport, TransferBody};

/// How the next `open` call behaves.
#[derive(Debug, Clone, Copy)]
pub enum Behavior {
    /// Serve the remainder, honoring the offset.
    Serve,
    /// Serve from byte 0 regardless of the offset.
    IgnoreRange,
    /// Serve `n` bytes past the offset, then fail with a network error.
    FailAfter(usize),
    /// Serve `n` bytes past the offset, then never yield again.
    StallAfter(usize),
    /// Like `StallAfter`, but dropping the stream blocks on the transport's
    /// [`DropGate`] until the test releases it.
    HoldOnDrop(usize),
}

/// Blocks whoever drops a held stream until `release` is called.
#[derive(Default)]
pub struct DropGate {
    state: Mutex<(bool, bool)>,
    released: Condvar,
}

impl DropGate {
    /// Whether a held stream is currently being dropped.
    pub fn entered(&self) -> bool {
        self.state.lock().unwrap().0
    }

    pub fn release(&self) {
        self.state.lock().unwrap().1 = true;
        self.released.notify_all();
    }

    fn hold(&self) {
        let mut state = self.state.lock().unwrap();
        state.0 = true;
        while !state.1 {
            state = self.released.wait(state).unwrap();
        }
    }
}

struct HeldStream(Arc<DropGate>);

impl Drop for HeldStream {
    fn drop(&mut self) {
        self.0.hold();
    }
}

/// In-memory resource served in small chunks.
pub struct FakeTransport {
    content: Vec<u8>,
    chunk: usize,
    behaviors: Mutex<VecDeque<Behavior>>,
    offsets: Mutex<Vec<u64>>,
    validators: Mutex<Vec<Option<String>>>,
    etag: Option<String>,
    gate: Arc<DropGate>,
}

impl FakeTransport {
    pub fn new(content: impl Into<Vec<u8>>) -> Self {
        Self {
            content: content.into(),
            chunk: 4,
            behaviors: Mutex::new(VecDeque::new()),
            offsets: Mutex::new(Vec::new()),
            validators: Mutex::new(Vec::new()),
            etag: None,
            gate: Arc::new(DropGate::default()),
        }
    }

    /// Report `etag` as the resource validator on every response.
    pub fn with_etag(mut self, etag: &str) -> Self {
        self.etag = Some(etag.to_string());
        self
    }

    pub fn then(self, behavior: Behavior) -> Self {
        self.behaviors.lock().unwrap().push_back(behavior);
        self
    }

    /// Offsets requested by each `open`, in order.
    pub fn offsets(&self) -> Vec<u64> {
        self.offsets.lock().unwrap().clone()
    }

    /// Validators sent with each `open`, in order.
    pub fn validators(&self) -> Vec<Option<String>> {
        self.validators.lock().unwrap().clone()
    }

    pub fn gate(&self) -> Arc<DropGate> {
        Arc::clone(&self.gate)
    }

    fn chunks(&self, bytes: &[u8]) -> Vec<Result<Bytes, DownloadError>> {
        bytes
            .chunks(self.chunk)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect()
    }
}

#[async_trait]
impl DownloadTransport for FakeTransport {
    async fn open(
        &self,
        _url: &str,
        offset: u64,
        validator: Option<&str>,
    ) -> Result<TransferBody, DownloadError> {
        self.offsets.lock().unwrap().push(offset);
        self.validators
            .lock()
            .unwrap()
            .push(validator.map(str::to_string));
        let etag = self.etag.clone();
        let behavior = self
            .behaviors
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Behavior::Serve);
        let total = Some(self.content.len() as u64);
        let start = usize::try_from(offset).unwrap().min(self.content.len());

        let body = match behavior {
            Behavior::Serve => TransferBody {
                total,
                resumed: offset > 0,
                validator: etag.clone(),
                chunks: stream::iter(self.chunks(&self.content[start..])).boxed(),
            },
            Behavior::IgnoreRange => TransferBody {
                total,
                resumed: false,
                validator: etag.clone(),
                chunks: stream::iter(self.chunks(&self.content)).boxed(),
            },
            Behavior::FailAfter(n) => {
                let end = (start + n).min(self.content.len());
                let mut items = self.chunks(&self.content[start..end]);
                items.push(Err(DownloadError::network("connection reset")));
                TransferBody {
                    total,
                    resumed: offset > 0,
                    validator: etag.clone(),
                    chunks: stream::iter(items).boxed(),
                }
            }
            Behavior::StallAfter(n) => {
                let end = (start + n).min(self.content.len());
                TransferBody {
                    total,
                    resumed: offset > 0,
                    validator: etag.clone(),
                    chunks: stream::iter(self.chunks(&self.content[start..end]))
                        .chain(stream::pending())
                        .boxed(),
                }
            }
            Behavior::HoldOnDrop(n) => {
                let end = (start + n).min(self.content.len());
                let held = HeldStream(self.gate());
                TransferBody {
                    total,
                    resumed: offset > 0,
                    validator: etag.clone(),
                    chunks: stream::iter(self.chunks(&self.content[start..end]))
                        .chain(stream::pending())
                        .map(move |item| {
                            let _held = &held;
                            item
                        })
                        .boxed(),
                }
            }
        };
        Ok(body)
    }
}

/// Records every event; clones share the same log.
#[derive(Default, Clone)]
pub struct RecordingEmitter {
    events: Arc<Mutex<Vec<AppEvent>>>,
}

impl RecordingEmitter {
    pub fn download_events(&self) -> Vec<DownloadEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                AppEvent::Download { event } => Some(event.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn progress_percents(&self) -> Vec<u8> {
        self.download_events()
            .into_iter()
            .filter_map(|e| match e {
                DownloadEvent::Progress { percent, .. } => Some(percent),
                _ => None,
            })
            .collect()
    }
}

impl AppEventEmitter for RecordingEmitter {
    fn emit(&self, event: AppEvent) {
        self.events.lock().unwrap().push(event);
    }

    fn clone_box(&self) -> Box<dyn AppEventEmitter> {
        Box::new(self.clone())
    }
}

/// Wake lock that tracks how many tags are currently held.
#[derive(Default)]
pub struct CountingWakeLock {
    held: Mutex<Vec<String>>,
    acquired: Mutex<usize>,
}

impl CountingWakeLock {
    pub fn held(&self) -> usize {
        self.held.lock().unwrap().len()
    }

    pub fn acquired(&self) -> usize {
        *self.acquired.lock().unwrap()
    }
}

impl WakeLockPort for CountingWakeLock {
    fn acquire(&self, tag: &str) {
        self.held.lock().unwrap().push(tag.to_string());
        *self.acquired.lock().unwrap() += 1;
    }

    fn release(&self, tag: &str) {
        let mut held = self.held.lock().unwrap();
        if let Some(pos) = held.iter().position(|t| t == tag) {
            held.remove(pos);
        }
    }
}

pub fn descriptor(id: &str, filename: &str) -> ModelDescriptor {
    ModelDescriptor::new(
        id,
        format!("Model {id}"),
        "test model",
        "1 KB",
        filename,
        format!("https://models.test/{filename}"),
    )
}

/// Poll `check` until it holds, failing the test after a few seconds.
pub async fn wait_until(mut check: impl FnMut() -> bool) {
    for _ in 0..500 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}
