use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use redline_core::SplitSettings;
use serde::Deserialize;
use thiserror::Error;

use crate::dispatch::{ModelPair, RetryPolicy, Sampling};

pub const ENV_ENDPOINT: &str = "REDLINE_ENDPOINT";
pub const ENV_API_KEY: &str = "REDLINE_API_KEY";
pub const ENV_MODEL_ID: &str = "REDLINE_MODEL_ID";
pub const ENV_FALLBACK_MODEL_ID: &str = "REDLINE_FALLBACK_MODEL_ID";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Engine settings, read from a RON file with every field optional.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub primary_model: String,
    pub fallback_model: String,
    pub max_chunk_size: usize,
    pub chunk_overlap: usize,
    pub concurrency: usize,
    pub retries: u32,
    pub initial_backoff_ms: u64,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub stop_sequences: Vec<String>,
    pub request_timeout_secs: u64,
    pub warmup_interval_minutes: u64,
    pub warmup_enabled: bool,
    pub work_dir: PathBuf,
    pub queue_poll_ms: u64,
    pub idle_sleep_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8080".to_string(),
            api_key: None,
            primary_model: "mistral.mistral-8b-instruct-v1:0".to_string(),
            fallback_model: "mistral.mistral-8x7b-instruct-v0:1".to_string(),
            max_chunk_size: 25_000,
            chunk_overlap: 5_000,
            concurrency: 5,
            retries: 3,
            initial_backoff_ms: 1_000,
            temperature: 0.4,
            top_p: 0.7,
            top_k: 1,
            stop_sequences: vec!["</s>".to_string()],
            request_timeout_secs: 120,
            warmup_interval_minutes: 15,
            warmup_enabled: true,
            work_dir: PathBuf::from("./redline_work"),
            queue_poll_ms: 1_000,
            idle_sleep_ms: 100,
        }
    }
}

impl EngineConfig {
    /// Load `path`, falling back to defaults when the file does not exist, then
    /// apply environment overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            Self::from_ron(&raw).map_err(|message| ConfigError::Parse {
                path: path.to_path_buf(),
                message,
            })?
        } else {
            Self::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_ron(raw: &str) -> Result<Self, String> {
        ron::from_str(raw).map_err(|err| err.to_string())
    }

    /// Override connection settings from a variable lookup (the process
    /// environment in production).
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        if let Some(endpoint) = non_empty(ENV_ENDPOINT) {
            self.endpoint = endpoint;
        }
        if let Some(key) = non_empty(ENV_API_KEY) {
            self.api_key = Some(key);
        }
        if let Some(model) = non_empty(ENV_MODEL_ID) {
            self.primary_model = model;
        }
        if let Some(model) = non_empty(ENV_FALLBACK_MODEL_ID) {
            self.fallback_model = model;
        }
    }

    pub fn split_settings(&self) -> SplitSettings {
        SplitSettings {
            max_size: self.max_chunk_size.max(1),
            overlap: self.chunk_overlap,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.retries.max(1),
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
        }
    }

    pub fn models(&self) -> ModelPair {
        ModelPair {
            primary: self.primary_model.clone(),
            fallback: self.fallback_model.clone(),
        }
    }

    pub fn sampling(&self) -> Sampling {
        Sampling {
            temperature: self.temperature,
            top_p: self.top_p,
            top_k: self.top_k,
            stop: self.stop_sequences.clone(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn warmup_interval(&self) -> Duration {
        Duration::from_secs(self.warmup_interval_minutes.max(1) * 60)
    }

    pub fn queue_poll(&self) -> Duration {
        Duration::from_millis(self.queue_poll_ms)
    }

    pub fn idle_sleep(&self) -> Duration {
        Duration::from_millis(self.idle_sleep_ms)
    }
}
