use crate::types::{RunCompletion, RunDraft, SubmissionRecord, TestRun};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Request timed out")]
    Timeout,

    #[error("Service unavailable: {message}")]
    ServiceUnavailable { message: String },

    #[error("Authentication failed ({status}): {body}")]
    Authentication { status: u16, body: String },

    #[error("Service returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

impl ClientError {
    /// HTTP status of the failed call, when the service answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Authentication { status, .. } | ClientError::Http { status, .. } => {
                Some(*status)
            }
            ClientError::Network(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

/// The three calls a test-management service has to accept.
///
/// Implementations decode every response into a typed value right after the
/// call; a response that does not have the expected shape is an error, never
/// a partially filled value.
#[async_trait]
pub trait RunService: Send + Sync {
    async fn create_run(&self, draft: &RunDraft) -> ClientResult<TestRun>;

    async fn submit_result(&self, record: &SubmissionRecord) -> ClientResult<()>;

    async fn close_run(&self, completion: &RunCompletion) -> ClientResult<()>;

    fn service_name(&self) -> &'static str;
}

#[async_trait]
impl<T: RunService + ?Sized> RunService for Box<T> {
    async fn create_run(&self, draft: &RunDraft) -> ClientResult<TestRun> {
        (**self).create_run(draft).await
    }

    async fn submit_result(&self, record: &SubmissionRecord) -> ClientResult<()> {
        (**self).submit_result(record).await
    }

    async fn close_run(&self, completion: &RunCompletion) -> ClientResult<()> {
        (**self).close_run(completion).await
    }

    fn service_name(&self) -> &'static str {
        (**self).service_name()
    }
}
