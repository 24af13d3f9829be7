mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{dispatcher, failure, init_logging, ScriptedBackend};
use redline_engine::{InferenceFailure, NextWarmup, WarmupScheduler, WARMUP_PROMPT};
use tokio_util::sync::CancellationToken;

const INTERVAL: Duration = Duration::from_secs(60);

fn scheduler(backend: Arc<ScriptedBackend>) -> Arc<WarmupScheduler> {
    init_logging();
    Arc::new(WarmupScheduler::new(Arc::new(dispatcher(backend)), INTERVAL))
}

#[tokio::test(start_paused = true)]
async fn warms_up_at_start_and_again_when_idle() {
    let backend = ScriptedBackend::new(vec![Ok("Hello".into()), Ok("Hello".into())]);
    let warmup = scheduler(backend.clone());
    let cancel = CancellationToken::new();
    let task = tokio::spawn(Arc::clone(&warmup).run(cancel.clone()));

    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(backend.calls(), 1);

    tokio::time::sleep(INTERVAL).await;
    assert_eq!(backend.calls(), 2);
    assert_eq!(warmup.stats().success_count, 2);

    let request = backend.requests.lock().unwrap()[0].clone();
    assert_eq!(request.prompt, WARMUP_PROMPT);
    assert_eq!(request.max_tokens, 5);

    cancel.cancel();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn recent_traffic_skips_the_warmup() {
    let backend = ScriptedBackend::new(vec![Ok("Hello".into()), Ok("Hello".into())]);
    let warmup = scheduler(backend.clone());
    let cancel = CancellationToken::new();
    let task = tokio::spawn(Arc::clone(&warmup).run(cancel.clone()));

    tokio::time::sleep(Duration::from_secs(55)).await;
    warmup.record_request();
    assert!(!warmup.should_warm_up());

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(backend.calls(), 1);

    cancel.cancel();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn failed_warmup_is_counted_not_raised() {
    let backend = ScriptedBackend::new(vec![Err(failure(InferenceFailure::RateLimited))]);
    let warmup = scheduler(backend.clone());

    assert!(!warmup.trigger().await);

    let stats = warmup.stats();
    assert_eq!(backend.calls(), 3);
    assert_eq!(stats.total_attempts, 1);
    assert_eq!(stats.failure_count, 1);
    assert_eq!(stats.last_success, Some(false));
    assert!(stats.last_attempt.is_some());
}

#[tokio::test(start_paused = true)]
async fn snapshot_reports_rate_and_next_warmup() {
    let backend = ScriptedBackend::new(vec![Ok("Hello".into())]);
    let warmup = scheduler(backend);

    let fresh = warmup.snapshot();
    assert_eq!(fresh.success_rate, 0.0);
    assert!(matches!(fresh.next_warmup, NextWarmup::At(_)));

    assert!(warmup.trigger().await);
    tokio::time::advance(Duration::from_secs(50)).await;

    let idle = warmup.snapshot();
    assert_eq!(idle.success_rate, 100.0);
    assert_eq!(idle.next_warmup, NextWarmup::Due);
    assert!((idle.minutes_since_last_request - 50.0 / 60.0).abs() < 0.01);
}
