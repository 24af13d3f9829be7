#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use redline_engine::{
    Dispatcher, InferenceBackend, InferenceError, InferenceFailure, InvokeRequest, ModelPair,
    RetryPolicy, Sampling,
};

static INIT: Once = Once::new();

pub fn init_logging() {
    INIT.call_once(|| {
        redline_logging::initialize_for_tests();
    });
}

/// Text between the quotes the prompt builder puts around a chunk.
pub fn chunk_from_prompt(prompt: &str) -> &str {
    let start = prompt
        .find(":\n\"")
        .map(|at| at + 3)
        .expect("chunk opening quote");
    let end = prompt.rfind("\"\n\n---").expect("chunk closing quote");
    &prompt[start..end]
}

pub fn failure(kind: InferenceFailure) -> InferenceError {
    InferenceError::new(kind, format!("scripted {kind}"))
}

/// Answers from a fixed script, then fails with `ServiceUnavailable`.
#[derive(Default)]
pub struct ScriptedBackend {
    script: Mutex<VecDeque<Result<String, InferenceError>>>,
    pub requests: Mutex<Vec<InvokeRequest>>,
    called_at: Mutex<Vec<tokio::time::Instant>>,
}

impl ScriptedBackend {
    pub fn new(script: Vec<Result<String, InferenceError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
            called_at: Mutex::new(Vec::new()),
        })
    }

    /// Time between consecutive calls.
    pub fn gaps(&self) -> Vec<Duration> {
        let called_at = self.called_at.lock().unwrap();
        called_at.windows(2).map(|w| w[1] - w[0]).collect()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn models(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.model_id.clone())
            .collect()
    }
}

#[async_trait::async_trait]
impl InferenceBackend for ScriptedBackend {
    async fn invoke(&self, request: &InvokeRequest) -> Result<String, InferenceError> {
        self.requests.lock().unwrap().push(request.clone());
        self.called_at.lock().unwrap().push(tokio::time::Instant::now());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(failure(InferenceFailure::ServiceUnavailable)))
    }
}

/// Returns each chunk with one substitution applied, optionally after a delay.
pub struct EditingBackend {
    pub from: String,
    pub to: String,
    pub delay: Duration,
    /// Chunks containing this marker fail with the given class.
    pub fail_on: Option<(String, InferenceFailure)>,
    pub calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl EditingBackend {
    pub fn new(from: &str, to: &str) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
            delay: Duration::ZERO,
            fail_on: None,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing_on(mut self, marker: &str, kind: InferenceFailure) -> Self {
        self.fail_on = Some((marker.to_string(), kind));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl InferenceBackend for EditingBackend {
    async fn invoke(&self, request: &InvokeRequest) -> Result<String, InferenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let chunk = chunk_from_prompt(&request.prompt);
        if let Some((marker, kind)) = &self.fail_on {
            if chunk.contains(marker.as_str()) {
                return Err(failure(*kind));
            }
        }
        Ok(chunk.replace(&self.from, &self.to))
    }
}

pub fn models() -> ModelPair {
    ModelPair {
        primary: "primary-model".to_string(),
        fallback: "fallback-model".to_string(),
    }
}

pub fn dispatcher(backend: Arc<dyn InferenceBackend>) -> Dispatcher {
    Dispatcher::new(backend, models(), Sampling::default(), RetryPolicy::default())
}
