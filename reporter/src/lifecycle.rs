//! Test-run lifecycle and result submission.
//!
//! A session moves through these states:
//!
//! ```text
//! Unstarted --open--> Open --close--> Closing --> Closed
//!     |
//!     +--open fails--> FailedOpen
//! ```
//!
//! Results are only submitted while the run is open. The close call is made
//! exactly once per opened run, after every submission has been attempted,
//! and it is made even when some or all of the submissions failed.

use crate::config::{ConfigResult, ReporterConfig};
use crate::error::{ReportError, ReportResult};
use crate::resolver::IdentifierResolver;
use crate::summary::SessionSummary;
use chrono::{Local, Utc};
use run_client::{
    ExternalId, RemoteStatus, RunCompletion, RunDraft, RunService, RunStatus, SubmissionRecord,
    TestOutcome, TestRun,
};
use std::fmt;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No run has been requested yet
    Unstarted,
    /// The remote run exists and accepts results
    Open,
    /// The close request is in flight
    Closing,
    /// The close request was made; no further calls are possible
    Closed,
    /// Creating the run failed; nothing else will be sent
    FailedOpen,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Unstarted => write!(f, "unstarted"),
            SessionState::Open => write!(f, "open"),
            SessionState::Closing => write!(f, "closing"),
            SessionState::Closed => write!(f, "closed"),
            SessionState::FailedOpen => write!(f, "failed to open"),
        }
    }
}

/// Drives one reporting session against a [`RunService`].
pub struct RunReporter<S> {
    service: S,
    config: ReporterConfig,
    resolver: IdentifierResolver,
    state: SessionState,
    run: Option<TestRun>,
}

impl<S: RunService> RunReporter<S> {
    pub fn new(service: S, config: ReporterConfig) -> ConfigResult<Self> {
        let resolver = IdentifierResolver::from_config(&config)?;
        Ok(Self {
            service,
            config,
            resolver,
            state: SessionState::Unstarted,
            run: None,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn run(&self) -> Option<&TestRun> {
        self.run.as_ref()
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    fn invalid_state(&self, operation: &'static str) -> ReportError {
        ReportError::InvalidState {
            operation,
            state: self.state,
        }
    }

    /// Creates the remote run. Failure is final for this reporter.
    pub async fn open_run(&mut self, title: &str) -> ReportResult<TestRun> {
        if self.state != SessionState::Unstarted {
            return Err(self.invalid_state("open a run"));
        }

        let draft = RunDraft::new(self.config.project_id.trim(), title)
            .with_description(self.config.description.as_str())
            .with_source(self.config.source.as_str());

        match self.service.create_run(&draft).await {
            Ok(run) => {
                info!(run_id = %run.id, title = %run.title, "opened test run");
                self.state = SessionState::Open;
                self.run = Some(run.clone());
                Ok(run)
            }
            Err(source) => {
                error!(title = %title, error = %source, "failed to create test run");
                self.state = SessionState::FailedOpen;
                Err(ReportError::RunCreation {
                    title: title.to_string(),
                    source,
                })
            }
        }
    }

    /// Submits one result to the open run.
    ///
    /// A failure is logged with the external id and returned, but leaves the
    /// run open so later submissions can still be made.
    pub async fn submit_result(
        &mut self,
        external_id: &ExternalId,
        status: RemoteStatus,
        comment: &str,
    ) -> ReportResult<()> {
        let run_id = match (&self.state, &self.run) {
            (SessionState::Open, Some(run)) if run.is_open() => run.id.clone(),
            _ => return Err(self.invalid_state("submit a result")),
        };

        let record = SubmissionRecord {
            run_id,
            external_id: external_id.clone(),
            status,
            comment: comment.to_string(),
            source: self.config.source.clone(),
            submitted_at: Utc::now(),
        };

        match self.service.submit_result(&record).await {
            Ok(()) => {
                info!(external_id = %external_id, status = %status, "submitted result");
                Ok(())
            }
            Err(source) => {
                warn!(external_id = %external_id, error = %source, "failed to submit result");
                Err(ReportError::Submission {
                    external_id: external_id.clone(),
                    source,
                })
            }
        }
    }

    /// Completes the run. Made once; a failed close is not retried.
    pub async fn close_run(&mut self) -> ReportResult<TestRun> {
        let run = match (&self.state, &self.run) {
            (SessionState::Open, Some(run)) => run.clone(),
            _ => return Err(self.invalid_state("close the run")),
        };

        self.state = SessionState::Closing;
        let result = self
            .service
            .close_run(&RunCompletion::now(run.id.as_str()))
            .await;
        self.state = SessionState::Closed;

        match result {
            Ok(()) => {
                let completed = TestRun {
                    status: RunStatus::Completed,
                    ..run
                };
                info!(run_id = %completed.id, "closed test run");
                self.run = Some(completed.clone());
                Ok(completed)
            }
            Err(source) => {
                error!(run_id = %run.id, error = %source, "failed to complete test run");
                Err(ReportError::Finalization {
                    run_id: run.id,
                    summary: None,
                    source,
                })
            }
        }
    }

    pub fn comment_for(&self, outcome: &TestOutcome) -> String {
        format!(
            "Automated test execution from {} - {}",
            self.config.source, outcome.status
        )
    }

    /// Opens a run, submits every resolvable outcome in order, then closes
    /// the run.
    ///
    /// Run creation failure aborts before anything is submitted. Submission
    /// failures are counted and do not stop the loop. A close failure is
    /// returned as [`ReportError::Finalization`] carrying the summary.
    pub async fn run_session(&mut self, outcomes: &[TestOutcome]) -> ReportResult<SessionSummary> {
        let title = self.config.render_title(Local::now());
        let run = self.open_run(&title).await?;
        let mut summary = SessionSummary::for_run(&run);

        for outcome in outcomes {
            let resolution = self.resolver.resolve(outcome);
            let origin = resolution.origin();
            let Some(external_id) = resolution.into_external_id() else {
                info!(test = %outcome.name, "skipping test without external ID mapping");
                summary.record_skipped();
                continue;
            };
            debug!(test = %outcome.name, external_id = %external_id, origin, "resolved test");

            let status = self.config.status_mapping.remote_status(outcome.status);
            let comment = self.comment_for(outcome);
            match self.submit_result(&external_id, status, &comment).await {
                Ok(()) => summary.record_submitted(),
                Err(ReportError::Submission { .. }) => summary.record_failed(external_id),
                Err(other) => return Err(other),
            }
        }

        match self.close_run().await {
            Ok(run) => {
                summary.final_status = run.status;
                Ok(summary)
            }
            Err(ReportError::Finalization { run_id, source, .. }) => {
                Err(ReportError::Finalization {
                    run_id,
                    summary: Some(Box::new(summary)),
                    source,
                })
            }
            Err(other) => Err(other),
        }
    }
}
