pub mod config;
pub mod http;
pub mod service;
pub mod types;

pub use config::{ApiToken, CloseMethod, ClosePath, ServiceConfig};
pub use http::HttpRunService;
pub use service::{ClientError, ClientResult, RunService};
pub use types::{
    ExternalId, OutcomeStatus, RemoteStatus, RunCompletion, RunDraft, RunStatus,
    SubmissionRecord, TestOutcome, TestRun,
};
