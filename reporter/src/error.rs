use crate::config::ConfigError;
use crate::lifecycle::SessionState;
use crate::source::SourceError;
use crate::summary::{
    SessionSummary, EXIT_CONFIGURATION, EXIT_FINALIZATION, EXIT_RUN_CREATION,
    EXIT_SUBMISSION_FAILURES,
};
use run_client::{ClientError, ExternalId};
use thiserror::Error;
use tool_setup::ToolSetupError;

/// Everything that can go wrong in a reporting session.
///
/// Only [`ReportError::Submission`] is recoverable: the session catches it
/// per result and keeps going.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Could not read test results from {origin}: {source}")]
    Source {
        origin: String,
        #[source]
        source: SourceError,
    },

    #[error("Tool setup failed: {0}")]
    ToolSetup(#[from] ToolSetupError),

    #[error("Failed to create test run '{title}': {source}")]
    RunCreation {
        title: String,
        #[source]
        source: ClientError,
    },

    #[error("Failed to submit result for {external_id}: {source}")]
    Submission {
        external_id: ExternalId,
        #[source]
        source: ClientError,
    },

    #[error("Failed to complete test run {run_id}: {source}")]
    Finalization {
        run_id: String,
        /// Counts of the session that led up to the failed close
        summary: Option<Box<SessionSummary>>,
        #[source]
        source: ClientError,
    },

    #[error("Cannot {operation} while the session is {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },
}

pub type ReportResult<T> = Result<T, ReportError>;

impl ReportError {
    pub fn exit_code(&self) -> u8 {
        match self {
            ReportError::Configuration(_)
            | ReportError::Source { .. }
            | ReportError::ToolSetup(_)
            | ReportError::InvalidState { .. } => EXIT_CONFIGURATION,
            ReportError::RunCreation { .. } => EXIT_RUN_CREATION,
            ReportError::Submission { .. } => EXIT_SUBMISSION_FAILURES,
            ReportError::Finalization { .. } => EXIT_FINALIZATION,
        }
    }

    /// Session counts, when the error happened after submissions began.
    pub fn summary(&self) -> Option<&SessionSummary> {
        match self {
            ReportError::Finalization { summary, .. } => summary.as_deref(),
            _ => None,
        }
    }

    pub fn is_fatal(&self) -> bool {
        !matches!(self, ReportError::Submission { .. })
    }
}
