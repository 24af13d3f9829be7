use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use redline_core::{JobMsg, JobResultView, JobStatusView};
use redline_logging::{redline_info, redline_warn};
use thiserror::Error;
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;

use crate::codec::{DocumentCodec, TextDocumentCodec};
use crate::config::EngineConfig;
use crate::dispatch::Dispatcher;
use crate::extract::StructuralExtractor;
use crate::inference::{HttpInferenceBackend, InferenceBackend};
use crate::persist::{ensure_work_dir, upload_filename, AtomicFileWriter, PersistError};
use crate::pipeline::Pipeline;
use crate::reconcile::{HtmlReconciler, Reconciler};
use crate::store::{JobQueue, JobStore, QueuedJob, StatusCounts};
use crate::warmup::{WarmupScheduler, WarmupSnapshot};
use crate::{InferenceError, JobId};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to start engine: {0}")]
    Startup(#[from] std::io::Error),
    #[error(transparent)]
    Persist(#[from] PersistError),
    #[error(transparent)]
    Inference(#[from] InferenceError),
    #[error("engine has shut down")]
    Stopped,
}

/// Pluggable collaborators of the engine.
#[derive(Clone)]
pub struct EngineComponents {
    pub backend: Arc<dyn InferenceBackend>,
    pub codec: Arc<dyn DocumentCodec>,
    pub reconciler: Arc<dyn Reconciler>,
}

impl EngineComponents {
    /// HTTP inference, plain-text documents, HTML reconciliation.
    pub fn from_config(config: &EngineConfig) -> Result<Self, EngineError> {
        let backend = HttpInferenceBackend::new(
            config.endpoint.clone(),
            config.api_key.clone(),
            config.request_timeout(),
        )?;
        Ok(Self {
            backend: Arc::new(backend),
            codec: Arc::new(TextDocumentCodec),
            reconciler: Arc::new(HtmlReconciler),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Diagnostics {
    pub queue_length: usize,
    pub worker_alive: bool,
    pub jobs: StatusCounts,
}

enum EngineCommand {
    Enqueue(QueuedJob),
    TriggerWarmup { reply: mpsc::Sender<bool> },
    DrainQueue { max: usize, reply: mpsc::Sender<usize> },
    WorkerAlive { reply: mpsc::Sender<bool> },
    StopWorker { reply: mpsc::Sender<()> },
    Shutdown,
}

struct Worker {
    pipeline: Arc<Pipeline>,
    queue: Arc<JobQueue>,
    warmup: Arc<WarmupScheduler>,
    warmup_enabled: bool,
    poll: Duration,
    idle: Duration,
    cancel: CancellationToken,
}

/// Owns the engine thread and its runtime; all methods are callable from
/// synchronous code.
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
    store: Arc<JobStore>,
    queue: Arc<JobQueue>,
    warmup: Arc<WarmupScheduler>,
    writer: AtomicFileWriter,
    thread: Option<thread::JoinHandle<()>>,
}

impl EngineHandle {
    pub fn start(config: EngineConfig) -> Result<Self, EngineError> {
        let components = EngineComponents::from_config(&config)?;
        Self::with_components(config, components)
    }

    pub fn with_components(
        config: EngineConfig,
        components: EngineComponents,
    ) -> Result<Self, EngineError> {
        ensure_work_dir(&config.work_dir)?;
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;
        let entered = runtime.enter();

        let store = Arc::new(JobStore::new());
        let queue = Arc::new(JobQueue::new());
        let writer = AtomicFileWriter::new(config.work_dir.clone());
        let dispatcher = Arc::new(Dispatcher::new(
            components.backend,
            config.models(),
            config.sampling(),
            config.retry_policy(),
        ));
        let warmup = Arc::new(WarmupScheduler::new(
            Arc::clone(&dispatcher),
            config.warmup_interval(),
        ));
        let pipeline = Arc::new(Pipeline {
            extractor: StructuralExtractor::new(Arc::clone(&components.codec)),
            codec: components.codec,
            dispatcher,
            reconciler: components.reconciler,
            store: Arc::clone(&store),
            writer: writer.clone(),
            split: config.split_settings(),
            concurrency: config.concurrency.max(1),
        });

        let worker = Worker {
            pipeline,
            queue: Arc::clone(&queue),
            warmup: Arc::clone(&warmup),
            warmup_enabled: config.warmup_enabled,
            poll: config.queue_poll(),
            idle: config.idle_sleep(),
            cancel: CancellationToken::new(),
        };
        let (cmd_tx, cmd_rx) = mpsc::channel();
        drop(entered);
        let thread = thread::Builder::new()
            .name("redline-engine".to_string())
            .spawn(move || command_loop(runtime, cmd_rx, worker))?;

        redline_info!("Engine started, work dir {}", config.work_dir.display());
        Ok(Self {
            cmd_tx,
            store,
            queue,
            warmup,
            writer,
            thread: Some(thread),
        })
    }

    /// Store the upload and queue the job. Returns immediately with its id.
    pub fn submit(
        &self,
        instruction: impl Into<String>,
        document: &[u8],
        filename: &str,
    ) -> Result<JobId, EngineError> {
        let id = self.store.create();
        let upload_path = match self.writer.write(&upload_filename(id, filename), document) {
            Ok(path) => path,
            Err(err) => {
                self.store
                    .apply(id, JobMsg::failed(format!("Failed to store upload: {err}")));
                return Err(err.into());
            }
        };
        self.warmup.record_request();
        redline_info!("Submitted job {id} ({filename}, {} bytes)", document.len());

        let job = QueuedJob {
            id,
            instruction: instruction.into(),
            filename: filename.to_string(),
            upload_path: upload_path.clone(),
        };
        if self.cmd_tx.send(EngineCommand::Enqueue(job)).is_err() {
            self.store.apply(id, JobMsg::failed("Engine has shut down"));
            let _ = std::fs::remove_file(&upload_path);
            return Err(EngineError::Stopped);
        }
        Ok(id)
    }

    pub fn poll_status(&self, id: JobId) -> Option<JobStatusView> {
        self.store.status(id)
    }

    /// Only completed jobs have a result.
    pub fn fetch_result(&self, id: JobId) -> Option<JobResultView> {
        self.store.result(id)
    }

    pub fn warmup_stats(&self) -> WarmupSnapshot {
        self.warmup.snapshot()
    }

    /// Send one warm-up request now and wait for its outcome.
    pub fn trigger_warmup(&self) -> Result<bool, EngineError> {
        let (reply, rx) = mpsc::channel();
        self.cmd_tx
            .send(EngineCommand::TriggerWarmup { reply })
            .map_err(|_| EngineError::Stopped)?;
        rx.recv().map_err(|_| EngineError::Stopped)
    }

    pub fn diagnostics(&self) -> Diagnostics {
        let (reply, rx) = mpsc::channel();
        let worker_alive = self
            .cmd_tx
            .send(EngineCommand::WorkerAlive { reply })
            .ok()
            .and_then(|_| rx.recv().ok())
            .unwrap_or(false);
        Diagnostics {
            queue_length: self.queue.len(),
            worker_alive,
            jobs: self.store.counts(),
        }
    }

    /// Start up to `max` queued jobs right away, outside the worker loop.
    pub fn drain_queue(&self, max: usize) -> Result<usize, EngineError> {
        let (reply, rx) = mpsc::channel();
        self.cmd_tx
            .send(EngineCommand::DrainQueue { max, reply })
            .map_err(|_| EngineError::Stopped)?;
        rx.recv().map_err(|_| EngineError::Stopped)
    }

    /// Stop the worker loop and keep the engine running. The job in flight
    /// finishes; later submissions are processed as they arrive.
    pub fn stop_worker(&self) -> Result<(), EngineError> {
        let (reply, rx) = mpsc::channel();
        self.cmd_tx
            .send(EngineCommand::StopWorker { reply })
            .map_err(|_| EngineError::Stopped)?;
        rx.recv().map_err(|_| EngineError::Stopped)
    }

    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = self.cmd_tx.send(EngineCommand::Shutdown);
            if thread.join().is_err() {
                redline_warn!("Engine thread panicked during shutdown");
            }
        }
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

fn command_loop(runtime: Runtime, cmd_rx: mpsc::Receiver<EngineCommand>, worker: Worker) {
    let worker_stop = worker.cancel.child_token();
    let worker_task = runtime.spawn(worker_loop(
        Arc::clone(&worker.pipeline),
        Arc::clone(&worker.queue),
        worker.poll,
        worker.idle,
        worker_stop.clone(),
    ));
    if worker.warmup_enabled {
        runtime.spawn(Arc::clone(&worker.warmup).run(worker.cancel.clone()));
    }

    while let Ok(command) = cmd_rx.recv() {
        match command {
            EngineCommand::Enqueue(job) => {
                let id = job.id;
                worker.queue.push(job);
                if worker_task.is_finished() {
                    redline_warn!("Worker loop is not running; processing job {id} immediately");
                    if let Some(job) = worker.queue.try_pop() {
                        runtime.spawn(Arc::clone(&worker.pipeline).run(job));
                    }
                }
            }
            EngineCommand::TriggerWarmup { reply } => {
                let warmup = Arc::clone(&worker.warmup);
                runtime.spawn(async move {
                    let _ = reply.send(warmup.trigger().await);
                });
            }
            EngineCommand::DrainQueue { max, reply } => {
                let mut started = 0;
                while started < max {
                    let Some(job) = worker.queue.try_pop() else {
                        break;
                    };
                    redline_info!("Draining job {} outside the worker loop", job.id);
                    runtime.spawn(Arc::clone(&worker.pipeline).run(job));
                    started += 1;
                }
                let _ = reply.send(started);
            }
            EngineCommand::WorkerAlive { reply } => {
                let _ = reply.send(!worker_task.is_finished());
            }
            EngineCommand::StopWorker { reply } => {
                redline_warn!("Stopping worker loop on request");
                worker_stop.cancel();
                let _ = reply.send(());
            }
            EngineCommand::Shutdown => break,
        }
    }

    worker.cancel.cancel();
    runtime.shutdown_timeout(Duration::from_secs(1));
    redline_info!("Engine stopped");
}

async fn worker_loop(
    pipeline: Arc<Pipeline>,
    queue: Arc<JobQueue>,
    poll: Duration,
    idle: Duration,
    cancel: CancellationToken,
) {
    redline_info!("Worker loop started");
    while !cancel.is_cancelled() {
        match queue.pop_timeout(poll).await {
            Some(job) => {
                redline_info!("Worker picked up job {}", job.id);
                Arc::clone(&pipeline).run(job).await;
            }
            None => tokio::time::sleep(idle).await,
        }
    }
    redline_info!("Worker loop stopped");
}
