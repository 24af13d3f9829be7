#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobMsg {
    /// A consumer pulled the job off the queue.
    Started { message: String },
    /// A pipeline stage boundary or chunk completion.
    Progress { progress: u8, message: String },
    /// Pipeline finished with a rendered document.
    Completed {
        response: String,
        rendered_output: Vec<u8>,
    },
    /// Pipeline aborted.
    Failed { message: String },
}

impl JobMsg {
    pub fn progress(progress: u8, message: impl Into<String>) -> Self {
        JobMsg::Progress {
            progress,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        JobMsg::Failed {
            message: message.into(),
        }
    }
}
