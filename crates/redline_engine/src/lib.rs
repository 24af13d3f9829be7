//! Redline engine: document extraction, inference dispatch, reconciliation
//! and the job worker.
mod codec;
mod config;
mod decode;
mod dispatch;
mod engine;
mod extract;
mod inference;
mod markup;
mod persist;
mod pipeline;
mod process;
mod prompts;
mod reconcile;
mod render;
mod store;
mod types;
mod warmup;

pub use codec::{
    DocumentCodec, Line, Page, ParagraphStyle, RenderError, Span, StyledParagraph, TextBlock,
    TextDocumentCodec,
};
pub use config::{ConfigError, EngineConfig};
pub use decode::{decode_text, DecodeError, DecodedText};
pub use dispatch::{Dispatcher, ModelPair, RetryPolicy, Sampling};
pub use engine::{Diagnostics, EngineComponents, EngineError, EngineHandle};
pub use extract::{
    classify_line, Block, BlockKind, Extraction, MarkupTree, SourceLocation, StructuralExtractor,
};
pub use inference::{parse_generation, HttpInferenceBackend, InferenceBackend, InvokeRequest};
pub use markup::{preformatted_document, wrap_document, STYLESHEET};
pub use persist::{
    ensure_work_dir, output_filename, upload_filename, ArtifactGuard, AtomicFileWriter,
    PersistError,
};
pub use pipeline::PipelineError;
pub use process::{aggregate, process_all};
pub use prompts::{chunk_prompt, max_tokens_for, WARMUP_PROMPT};
pub use reconcile::{
    clean_response, reconcile_or_fallback, HtmlReconciler, ReconcileError, Reconciler,
};
pub use render::{classify_paragraphs, render_with_fallback};
pub use store::{JobQueue, JobStore, QueuedJob, StatusCounts};
pub use types::{ChunkResult, InferenceError, InferenceFailure, JobId, ProgressSink};
pub use warmup::{NextWarmup, WarmupScheduler, WarmupSnapshot, WarmupStats};
