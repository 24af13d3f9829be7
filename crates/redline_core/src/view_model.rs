use serde::Serialize;

use crate::{Job, JobId, JobStatus};

/// What a status poll returns: always a well-formed status/progress/message triple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobStatusView {
    pub job_id: JobId,
    pub status: JobStatus,
    pub progress: u8,
    pub message: String,
}

/// Result of a completed job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobResultView {
    pub job_id: JobId,
    pub text: String,
    pub rendered: Vec<u8>,
}

impl Job {
    pub fn view(&self) -> JobStatusView {
        JobStatusView {
            job_id: self.id,
            status: self.status,
            progress: self.progress,
            message: self.message.clone(),
        }
    }

    /// Only completed jobs carry a result.
    pub fn result(&self) -> Option<JobResultView> {
        if self.status != JobStatus::Completed {
            return None;
        }
        Some(JobResultView {
            job_id: self.id,
            text: self.response.clone()?,
            rendered: self.rendered_output.clone()?,
        })
    }
}
