//! Hand-written fakes for the core ports.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use soliloquy_core::domain::{CompletionRequest, EngineParams};
use soliloquy_core::{AppEvent, AppEventEmitter, EngineError, EngineLoader, InferenceEngine, TokenSink, WakeLockPort};

/// What the next completion call does.
#[derive(Debug, Clone)]
pub enum Script {
    /// Stream these tokens, then succeed.
    Tokens(Vec<&'static str>),
    /// Stream these tokens, then fail.
    FailAfter(Vec<&'static str>, &'static str),
}

/// Counters shared by a loader and every engine it creates.
#[derive(Debug, Default)]
pub struct EngineStats {
    pub live: AtomicUsize,
    pub max_live: AtomicUsize,
    pub inits: AtomicUsize,
    pub releases: AtomicUsize,
}

/// Engine that replays scripted token streams.
#[derive(Debug)]
pub struct ScriptedEngine {
    scripts: Arc<Mutex<VecDeque<Script>>>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
    gate: Option<Arc<Notify>>,
    stats: Arc<EngineStats>,
    released: AtomicBool,
}

#[async_trait]
impl InferenceEngine for ScriptedEngine {
    async fn complete(
        &self,
        request: CompletionRequest,
        sink: &mut dyn TokenSink,
    ) -> Result<String, EngineError> {
        if self.released.load(Ordering::SeqCst) {
            return Err(EngineError::Released);
        }
        self.requests.lock().unwrap().push(request);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Script::Tokens(Vec::new()));

        match script {
            Script::Tokens(tokens) => {
                for token in &tokens {
                    sink.on_token(token);
                }
                Ok(tokens.concat())
            }
            Script::FailAfter(tokens, error) => {
                for token in &tokens {
                    sink.on_token(token);
                }
                Err(EngineError::Completion(error.to_string()))
            }
        }
    }

    async fn release(&self) -> Result<(), EngineError> {
        if !self.released.swap(true, Ordering::SeqCst) {
            self.stats.live.fetch_sub(1, Ordering::SeqCst);
            self.stats.releases.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// Loader that hands out [`ScriptedEngine`]s and tracks how many are alive.
#[derive(Debug, Default)]
pub struct FakeLoader {
    pub stats: Arc<EngineStats>,
    pub scripts: Arc<Mutex<VecDeque<Script>>>,
    pub requests: Arc<Mutex<Vec<CompletionRequest>>>,
    pub init_paths: Mutex<Vec<PathBuf>>,
    /// When set, `init` waits for a permit before returning.
    pub init_gate: Option<Arc<Notify>>,
    /// When set, every completion waits for a permit before streaming.
    pub completion_gate: Option<Arc<Notify>>,
    pub fail_init: AtomicBool,
}

impl FakeLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_init_gate(mut self, gate: Arc<Notify>) -> Self {
        self.init_gate = Some(gate);
        self
    }

    pub fn with_completion_gate(mut self, gate: Arc<Notify>) -> Self {
        self.completion_gate = Some(gate);
        self
    }

    pub fn push_script(&self, script: Script) {
        self.scripts.lock().unwrap().push_back(script);
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn live(&self) -> usize {
        self.stats.live.load(Ordering::SeqCst)
    }

    pub fn max_live(&self) -> usize {
        self.stats.max_live.load(Ordering::SeqCst)
    }

    pub fn inits(&self) -> usize {
        self.stats.inits.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.stats.releases.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EngineLoader for FakeLoader {
    async fn init(
        &self,
        model_path: &Path,
        _params: &EngineParams,
    ) -> Result<Arc<dyn InferenceEngine>, EngineError> {
        self.init_paths
            .lock()
            .unwrap()
            .push(model_path.to_path_buf());
        if let Some(gate) = &self.init_gate {
            gate.notified().await;
        }
        if self.fail_init.load(Ordering::SeqCst) {
            return Err(EngineError::Init("unsupported model format".to_string()));
        }

        let live = self.stats.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.stats.max_live.fetch_max(live, Ordering::SeqCst);
        self.stats.inits.fetch_add(1, Ordering::SeqCst);

        Ok(Arc::new(ScriptedEngine {
            scripts: Arc::clone(&self.scripts),
            requests: Arc::clone(&self.requests),
            gate: self.completion_gate.clone(),
            stats: Arc::clone(&self.stats),
            released: AtomicBool::new(false),
        }))
    }
}

/// Emitter that keeps every event.
#[derive(Debug, Clone, Default)]
pub struct RecordingEmitter {
    events: Arc<Mutex<Vec<AppEvent>>>,
}

impl RecordingEmitter {
    pub fn events(&self) -> Vec<AppEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events().iter().map(AppEvent::event_name).collect()
    }

    pub fn tokens(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                AppEvent::GenerationToken { token, .. } => Some(token),
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

/// Wake lock that counts acquisitions and releases.
#[derive(Debug, Default)]
pub struct CountingWakeLock {
    pub acquired: AtomicUsize,
    pub released: AtomicUsize,
}

impl CountingWakeLock {
    pub fn held(&self) -> usize {
        self.acquired.load(Ordering::SeqCst) - self.released.load(Ordering::SeqCst)
    }
}

impl WakeLockPort for CountingWakeLock {
    fn acquire(&self, _tag: &str) {
        self.acquired.fetch_add(1, Ordering::SeqCst);
    }

    fn release(&self, _tag: &str) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}
