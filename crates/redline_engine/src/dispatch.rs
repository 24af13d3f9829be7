use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use redline_core::{textutil::char_len, Chunk};
use redline_logging::{redline_debug, redline_info, redline_warn};

use crate::inference::{InferenceBackend, InvokeRequest};
use crate::prompts::{chunk_prompt, max_tokens_for};
use crate::{ChunkResult, InferenceError, InferenceFailure};

/// Generated text shorter than this is treated as no answer.
pub const MIN_RESPONSE_CHARS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            initial_backoff: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelPair {
    pub primary: String,
    pub fallback: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sampling {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub stop: Vec<String>,
}

impl Default for Sampling {
    fn default() -> Self {
        Self {
            temperature: 0.4,
            top_p: 0.7,
            top_k: 1,
            stop: vec!["</s>".to_string()],
        }
    }
}

/// Sends prompts to the backend with retry, backoff and model fallback.
pub struct Dispatcher {
    backend: Arc<dyn InferenceBackend>,
    models: ModelPair,
    sampling: Sampling,
    policy: RetryPolicy,
    on_fallback: AtomicBool,
}

impl Dispatcher {
    pub fn new(
        backend: Arc<dyn InferenceBackend>,
        models: ModelPair,
        sampling: Sampling,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            backend,
            models,
            sampling,
            policy,
            on_fallback: AtomicBool::new(false),
        }
    }

    pub fn model_id(&self) -> &str {
        if self.on_fallback.load(Ordering::Relaxed) {
            &self.models.fallback
        } else {
            &self.models.primary
        }
    }

    pub async fn invoke(&self, prompt: &str, max_tokens: u32) -> Result<String, InferenceError> {
        self.invoke_with_temperature(prompt, max_tokens, self.sampling.temperature)
            .await
    }

    /// Retries rate limiting and unavailability with doubling backoff; never
    /// sleeps after the final attempt. A not-ready primary model switches the
    /// dispatcher to the fallback model once, without waiting.
    pub async fn invoke_with_temperature(
        &self,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, InferenceError> {
        let attempts = self.policy.attempts.max(1);
        let mut backoff = self.policy.initial_backoff;
        let mut last_error = None;

        for attempt in 0..attempts {
            let request = InvokeRequest {
                model_id: self.model_id().to_string(),
                prompt: prompt.to_string(),
                max_tokens,
                temperature,
                top_p: self.sampling.top_p,
                top_k: self.sampling.top_k,
                stop: self.sampling.stop.clone(),
            };

            let err = match self.backend.invoke(&request).await {
                Ok(text) => return Ok(text),
                Err(err) => err,
            };

            let is_last = attempt + 1 == attempts;
            match err.kind {
                InferenceFailure::ModelNotReady
                    if !self.on_fallback.swap(true, Ordering::Relaxed) =>
                {
                    redline_warn!(
                        "Model {} not ready, switching to {}",
                        request.model_id,
                        self.models.fallback
                    );
                }
                kind if kind.is_retryable() || kind == InferenceFailure::ModelNotReady => {
                    if !is_last {
                        redline_warn!(
                            "Inference {kind} (attempt {}/{attempts}), retrying in {:?}",
                            attempt + 1,
                            backoff
                        );
                        tokio::time::sleep(backoff).await;
                        backoff *= 2;
                    }
                }
                _ => return Err(err),
            }
            last_error = Some(err);
        }

        Err(last_error.unwrap_or_else(|| {
            InferenceError::new(InferenceFailure::ServiceUnavailable, "no attempt made")
        }))
    }

    /// Send one chunk. Empty, short or malformed answers keep the original text.
    pub async fn process_chunk(
        &self,
        chunk: &Chunk,
        total: usize,
        instruction: &str,
        markup: bool,
    ) -> Result<ChunkResult, InferenceError> {
        let position = chunk.index + 1;
        let prompt = chunk_prompt(&chunk.text, position, total, instruction, markup);
        let max_tokens = max_tokens_for(char_len(&chunk.text));
        redline_debug!(
            "Dispatching chunk {position}/{total} ({} chars, priority {})",
            chunk.text.len(),
            chunk.priority
        );

        let generated = match self.invoke(&prompt, max_tokens).await {
            Ok(text) => text,
            Err(err) if err.kind == InferenceFailure::MalformedResponse => {
                redline_warn!("Chunk {position}/{total}: {err}; keeping original text");
                return Ok(ChunkResult::unchanged(chunk));
            }
            Err(err) => return Err(err),
        };

        if char_len(&generated) < MIN_RESPONSE_CHARS {
            redline_warn!(
                "Chunk {position}/{total}: response of {} chars too short; keeping original text",
                char_len(&generated)
            );
            return Ok(ChunkResult::unchanged(chunk));
        }

        if generated.to_lowercase() == chunk.text.to_lowercase() {
            redline_info!("Chunk {position}/{total}: no changes");
            return Ok(ChunkResult::unchanged(chunk));
        }

        redline_info!(
            "Chunk {position}/{total}: changed, {} chars returned",
            char_len(&generated)
        );
        Ok(ChunkResult {
            index: chunk.index,
            text: generated,
            changed: true,
        })
    }
}
