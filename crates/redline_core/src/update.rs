use crate::{Job, JobMsg, JobStatus};

/// Pure update function: applies a message to a job record.
///
/// Terminal jobs are returned untouched, progress never moves backwards while
/// processing, and exactly one of `Completed`/`Error` can ever be reached.
pub fn update(mut job: Job, msg: JobMsg) -> Job {
    if job.status.is_terminal() {
        return job;
    }

    match msg {
        JobMsg::Started { message } => {
            job.status = JobStatus::Processing;
            job.message = message;
        }
        JobMsg::Progress { progress, message } => {
            job.status = JobStatus::Processing;
            job.progress = job.progress.max(progress.min(100));
            job.message = message;
        }
        JobMsg::Completed {
            response,
            rendered_output,
        } => {
            job.status = JobStatus::Completed;
            job.progress = 100;
            job.message = "Processing complete".to_string();
            job.response = Some(response);
            job.rendered_output = Some(rendered_output);
        }
        JobMsg::Failed { message } => {
            job.status = JobStatus::Error;
            job.progress = 100;
            job.message = message;
        }
    }

    job
}
