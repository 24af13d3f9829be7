use std::sync::Arc;

use chrono::Utc;
use redline_core::{
    locate_targets, prioritize, single_chunk, split_text, textutil::char_len, Chunk, JobId,
    JobMsg, SplitSettings,
};
use redline_logging::{redline_debug, redline_error, redline_info};
use thiserror::Error;

use crate::codec::{DocumentCodec, RenderError};
use crate::dispatch::Dispatcher;
use crate::extract::{Extraction, StructuralExtractor};
use crate::persist::{output_filename, AtomicFileWriter, ArtifactGuard, PersistError};
use crate::process::{aggregate, process_all};
use crate::reconcile::{clean_response, reconcile_or_fallback, Reconciler};
use crate::render::render_with_fallback;
use crate::store::{JobStore, QueuedJob};
use crate::{InferenceError, InferenceFailure, ProgressSink};

/// Job-fatal failures; the display text becomes the job message.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Failed to read uploaded document: {0}")]
    Upload(#[from] std::io::Error),
    #[error("Failed to extract text from document")]
    EmptyDocument,
    #[error("Inference credentials were rejected: {0}")]
    Credentials(InferenceError),
    #[error("Inference failed: {0}")]
    Inference(InferenceError),
    #[error("Failed to render output document: {0}")]
    Render(#[from] RenderError),
    #[error("Failed to store output document: {0}")]
    Persist(#[from] PersistError),
    #[error("Processing task failed: {0}")]
    Task(String),
}

impl From<InferenceError> for PipelineError {
    fn from(err: InferenceError) -> Self {
        if err.kind == InferenceFailure::CredentialOrAuth {
            PipelineError::Credentials(err)
        } else {
            PipelineError::Inference(err)
        }
    }
}

struct StoreProgress<'a> {
    store: &'a JobStore,
    id: JobId,
}

impl ProgressSink for StoreProgress<'_> {
    fn progress(&self, progress: u8, message: String) {
        self.store.apply(self.id, JobMsg::progress(progress, message));
    }
}

/// Shared state for running jobs end to end.
pub(crate) struct Pipeline {
    pub extractor: StructuralExtractor,
    pub codec: Arc<dyn DocumentCodec>,
    pub dispatcher: Arc<Dispatcher>,
    pub reconciler: Arc<dyn Reconciler>,
    pub store: Arc<JobStore>,
    pub writer: AtomicFileWriter,
    pub split: SplitSettings,
    pub concurrency: usize,
}

impl Pipeline {
    /// Run one job in its own task so a panic only fails that job.
    pub async fn run(self: Arc<Self>, job: QueuedJob) {
        let id = job.id;
        let pipeline = Arc::clone(&self);
        let task = tokio::spawn(async move { pipeline.execute(job).await });
        if let Err(err) = task.await {
            let message = if err.is_panic() {
                "Processing failed: internal error".to_string()
            } else {
                "Processing was cancelled".to_string()
            };
            redline_error!("Job {id} task ended abnormally: {err}");
            self.store.apply(id, JobMsg::failed(message));
        }
    }

    async fn execute(&self, job: QueuedJob) {
        let mut artifacts = ArtifactGuard::new();
        artifacts.track(job.upload_path.clone());
        self.store.apply(
            job.id,
            JobMsg::Started {
                message: "Processing started".to_string(),
            },
        );

        match self.stages(&job, &mut artifacts).await {
            Ok((response, rendered_output)) => {
                redline_info!("Job {} completed", job.id);
                self.store.apply(
                    job.id,
                    JobMsg::Completed {
                        response,
                        rendered_output,
                    },
                );
            }
            Err(err) => {
                redline_error!("Job {} failed: {err}", job.id);
                self.store.apply(job.id, JobMsg::failed(err.to_string()));
            }
        }
    }

    fn report(&self, id: JobId, progress: u8, message: impl Into<String>) {
        let message = message.into();
        redline_info!("Job {id}: {progress}% {message}");
        self.store.apply(id, JobMsg::progress(progress, message));
    }

    async fn stages(
        &self,
        job: &QueuedJob,
        artifacts: &mut ArtifactGuard,
    ) -> Result<(String, Vec<u8>), PipelineError> {
        let id = job.id;
        self.report(id, 10, "Extracting text from document");
        let path = job.upload_path.clone();
        let extractor = self.extractor.clone();
        let extraction = tokio::task::spawn_blocking(move || {
            std::fs::read(&path).map(|bytes| extractor.extract(&bytes))
        })
        .await
        .map_err(|err| PipelineError::Task(err.to_string()))??;
        if extraction.flat_text.trim().is_empty() {
            return Err(PipelineError::EmptyDocument);
        }

        self.report(id, 30, "Locating instruction targets");
        let targets = locate_targets(&job.instruction, &extraction.flat_text);
        redline_info!("Job {id}: {} targets located", targets.len());

        let (chunks, markup) = self.chunks_for(&extraction);
        self.report(id, 40, format!("Processing {} chunks", chunks.len()));
        let ordered = prioritize(chunks.clone(), &targets);
        for chunk in &ordered {
            redline_debug!(
                "Job {id}: chunk {} priority {} ({} chars)",
                chunk.index + 1,
                chunk.priority,
                chunk.text.len()
            );
        }

        let sink = StoreProgress {
            store: &self.store,
            id,
        };
        let results = process_all(
            &self.dispatcher,
            &ordered,
            &job.instruction,
            self.concurrency,
            markup,
            &sink,
        )
        .await?;
        let aggregated = aggregate(&chunks, &results);

        self.report(id, 70, "Reconciling document structure");
        let cleaned = clean_response(&aggregated);
        let response = if cleaned.is_empty() {
            aggregated.clone()
        } else {
            cleaned.to_string()
        };
        let reconciled =
            reconcile_or_fallback(self.reconciler.as_ref(), &extraction.html, &aggregated);

        self.report(id, 85, "Rendering output document");
        let rendered = render_with_fallback(self.codec.as_ref(), &reconciled, &response)?;
        let name = output_filename(
            &job.filename,
            Utc::now(),
            id,
            self.codec.output_extension(),
        );
        let path = self.writer.write(&name, &rendered)?;
        artifacts.track(path);

        Ok((response, rendered))
    }

    /// Short documents go out whole, as markup when that is the richer form.
    fn chunks_for(&self, extraction: &Extraction) -> (Vec<Chunk>, bool) {
        let flat = &extraction.flat_text;
        if char_len(flat) < self.split.max_size {
            if extraction.html.len() > flat.len() {
                (single_chunk(extraction.html.as_str()), true)
            } else {
                (single_chunk(flat.as_str()), false)
            }
        } else {
            (split_text(flat, self.split), false)
        }
    }
}
