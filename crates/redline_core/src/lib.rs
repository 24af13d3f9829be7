//! Redline core: pure job lifecycle state machine and the text algorithms
//! that decide what gets sent to the inference backend.
mod chunk;
mod job;
mod msg;
mod prioritize;
mod targets;
pub mod textutil;
mod update;
mod view_model;

pub use chunk::{reassemble, single_chunk, split_text, Chunk, SplitSettings, SEPARATORS};
pub use job::{Job, JobId, JobStatus};
pub use msg::JobMsg;
pub use prioritize::{prioritize, score_chunk, STRUCTURE_MARKERS};
pub use targets::{
    dedupe_targets, extract_key_entities, locate_targets, Target, ACTION_VERBS, CONTRACT_FIELDS,
};
pub use update::update;
pub use view_model::{JobResultView, JobStatusView};
