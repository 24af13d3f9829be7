use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use redline_logging::{redline_debug, redline_info, redline_warn};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::dispatch::Dispatcher;
use crate::prompts::{WARMUP_MAX_TOKENS, WARMUP_PROMPT, WARMUP_TEMPERATURE};

/// Share of the interval that must pass without real traffic before a warm-up.
pub const IDLE_SHARE: f64 = 0.8;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WarmupStats {
    pub total_attempts: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub last_attempt: Option<DateTime<Utc>>,
    pub last_success: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextWarmup {
    Due,
    At(DateTime<Utc>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct WarmupSnapshot {
    pub stats: WarmupStats,
    pub success_rate: f64,
    pub minutes_since_last_request: f64,
    pub next_warmup: NextWarmup,
}

/// Keeps the model warm by sending a tiny prompt when real traffic is idle.
pub struct WarmupScheduler {
    dispatcher: Arc<Dispatcher>,
    interval: Duration,
    stats: Mutex<WarmupStats>,
    last_request: Mutex<Instant>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl WarmupScheduler {
    pub fn new(dispatcher: Arc<Dispatcher>, interval: Duration) -> Self {
        Self {
            dispatcher,
            interval,
            stats: Mutex::new(WarmupStats::default()),
            last_request: Mutex::new(Instant::now()),
        }
    }

    /// Note real traffic; called on every job submission.
    pub fn record_request(&self) {
        *lock(&self.last_request) = Instant::now();
    }

    fn idle_threshold(&self) -> Duration {
        self.interval.mul_f64(IDLE_SHARE)
    }

    fn since_last_request(&self) -> Duration {
        lock(&self.last_request).elapsed()
    }

    pub fn should_warm_up(&self) -> bool {
        self.since_last_request() > self.idle_threshold()
    }

    /// Send one warm-up prompt and record the outcome. Returns whether it succeeded.
    pub async fn trigger(&self) -> bool {
        redline_info!("Sending warm-up request to {}", self.dispatcher.model_id());
        let started = Instant::now();
        let outcome = self
            .dispatcher
            .invoke_with_temperature(WARMUP_PROMPT, WARMUP_MAX_TOKENS, WARMUP_TEMPERATURE)
            .await;

        let mut stats = lock(&self.stats);
        stats.total_attempts += 1;
        stats.last_attempt = Some(Utc::now());
        match outcome {
            Ok(_) => {
                stats.success_count += 1;
                stats.last_success = Some(true);
                redline_info!("Warm-up succeeded in {:?}", started.elapsed());
                true
            }
            Err(err) => {
                stats.failure_count += 1;
                stats.last_success = Some(false);
                redline_warn!("Warm-up failed: {err}");
                false
            }
        }
    }

    /// Warm up once immediately, then check every interval until cancelled.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        redline_info!("Warm-up scheduler started, interval {:?}", self.interval);
        self.trigger().await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
            if self.should_warm_up() {
                self.trigger().await;
            } else {
                redline_debug!(
                    "Skipping warm-up, last request {:?} ago",
                    self.since_last_request()
                );
            }
        }
        redline_info!("Warm-up scheduler stopped");
    }

    pub fn stats(&self) -> WarmupStats {
        lock(&self.stats).clone()
    }

    pub fn snapshot(&self) -> WarmupSnapshot {
        let stats = self.stats();
        let success_rate = if stats.total_attempts == 0 {
            0.0
        } else {
            stats.success_count as f64 * 100.0 / stats.total_attempts as f64
        };
        let since = self.since_last_request();
        let threshold = self.idle_threshold();
        let next_warmup = if since > threshold {
            NextWarmup::Due
        } else {
            let wait = chrono::Duration::from_std(threshold - since).unwrap_or_default();
            NextWarmup::At(Utc::now() + wait)
        };
        WarmupSnapshot {
            stats,
            success_rate,
            minutes_since_last_request: since.as_secs_f64() / 60.0,
            next_warmup,
        }
    }
}
