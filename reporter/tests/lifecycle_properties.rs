//! Property tests for the reporting session
//!
//! Every generated outcome sequence is run through a session against a
//! recording service, and the recorded call sequence is checked.

use async_trait::async_trait;
use chrono::Utc;
use proptest::prelude::*;
use reporter::{ReportError, ReporterConfig, RunReporter, SessionState};
use run_client::{
    ClientError, ClientResult, OutcomeStatus, RemoteStatus, RunCompletion, RunDraft, RunService,
    RunStatus, SubmissionRecord, TestOutcome, TestRun,
};
use std::collections::HashSet;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Create,
    Submit(String, RemoteStatus),
    Close,
}

#[derive(Default)]
struct RecordingService {
    calls: Mutex<Vec<Call>>,
    fail_create: bool,
    fail_close: bool,
    failing_ids: HashSet<String>,
}

impl RecordingService {
    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

fn unavailable() -> ClientError {
    ClientError::Http {
        status: 503,
        body: String::new(),
    }
}

#[async_trait]
impl RunService for RecordingService {
    async fn create_run(&self, draft: &RunDraft) -> ClientResult<TestRun> {
        self.calls.lock().unwrap().push(Call::Create);
        if self.fail_create {
            return Err(unavailable());
        }
        Ok(TestRun {
            id: "1".to_string(),
            title: draft.title.clone(),
            status: RunStatus::Open,
            created_at: Utc::now(),
        })
    }

    async fn submit_result(&self, record: &SubmissionRecord) -> ClientResult<()> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Submit(record.external_id.to_string(), record.status));
        if self.failing_ids.contains(record.external_id.as_str()) {
            return Err(unavailable());
        }
        Ok(())
    }

    async fn close_run(&self, _completion: &RunCompletion) -> ClientResult<()> {
        self.calls.lock().unwrap().push(Call::Close);
        if self.fail_close {
            return Err(unavailable());
        }
        Ok(())
    }

    fn service_name(&self) -> &'static str {
        "recording"
    }
}

const MAPPED: [(&str, &str); 3] = [
    ("test_valid_login", "TC_LOGIN_001"),
    ("test_invalid_login", "TC_LOGIN_002"),
    ("test_logout", "TC_LOGOUT_001"),
];

fn config() -> ReporterConfig {
    MAPPED.iter().fold(
        ReporterConfig::default()
            .with_api_token("token")
            .with_project_id("1"),
        |config, (name, id)| config.with_mapping(*name, *id),
    )
}

fn outcome_strategy() -> impl Strategy<Value = TestOutcome> {
    let name = prop_oneof![
        Just("test_valid_login".to_string()),
        Just("test_invalid_login".to_string()),
        Just("test_logout".to_string()),
        "test_[a-z]{1,8}",
    ];
    let status = prop_oneof![
        Just(OutcomeStatus::Passed),
        Just(OutcomeStatus::Failed),
        Just(OutcomeStatus::Skipped),
    ];
    let annotation = prop::option::of((1u32..50).prop_map(|n| format!("[testinyId=TC-{}]", n)));

    (name, status, annotation).prop_map(|(name, status, annotation)| TestOutcome {
        name,
        status,
        annotation,
    })
}

/// External id the outcome should be submitted under, if any.
fn expected_id(outcome: &TestOutcome) -> Option<String> {
    if let Some(annotation) = &outcome.annotation {
        let id = annotation
            .trim_start_matches("[testinyId=")
            .trim_end_matches(']');
        return Some(id.to_string());
    }
    MAPPED
        .iter()
        .find(|(name, _)| *name == outcome.name)
        .map(|(_, id)| id.to_string())
}

fn expected_status(status: OutcomeStatus) -> RemoteStatus {
    match status {
        OutcomeStatus::Passed => RemoteStatus::Passed,
        OutcomeStatus::Failed | OutcomeStatus::Skipped => RemoteStatus::Failed,
    }
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
}

proptest! {
    #[test]
    fn session_submits_each_resolved_outcome_in_order(
        outcomes in prop::collection::vec(outcome_strategy(), 0..20),
    ) {
        let mut reporter = RunReporter::new(RecordingService::default(), config()).unwrap();
        let summary = block_on(reporter.run_session(&outcomes)).unwrap();

        let mut expected = vec![Call::Create];
        expected.extend(outcomes.iter().filter_map(|outcome| {
            expected_id(outcome).map(|id| Call::Submit(id, expected_status(outcome.status)))
        }));
        expected.push(Call::Close);

        prop_assert_eq!(reporter.service().calls(), expected);
        prop_assert_eq!(summary.submitted + summary.skipped + summary.failed, outcomes.len());
        prop_assert_eq!(summary.failed, 0);
        prop_assert_eq!(summary.final_status, RunStatus::Completed);
        prop_assert_eq!(reporter.state(), SessionState::Closed);
    }

    #[test]
    fn close_happens_once_despite_submission_failures(
        outcomes in prop::collection::vec(outcome_strategy(), 0..20),
        failing in prop::collection::hash_set("TC-[1-9]|TC_LOGIN_00[12]", 0..5),
        fail_close in any::<bool>(),
    ) {
        let service = RecordingService {
            failing_ids: failing.clone(),
            fail_close,
            ..Default::default()
        };
        let mut reporter = RunReporter::new(service, config()).unwrap();
        let result = block_on(reporter.run_session(&outcomes));

        let calls = reporter.service().calls();
        prop_assert_eq!(calls.first(), Some(&Call::Create));
        prop_assert_eq!(calls.last(), Some(&Call::Close));
        prop_assert_eq!(calls.iter().filter(|c| **c == Call::Close).count(), 1);

        let summary = match &result {
            Ok(summary) => summary,
            Err(err) => {
                prop_assert!(fail_close);
                let is_finalization = matches!(err, ReportError::Finalization { .. });
                prop_assert!(is_finalization);
                err.summary().unwrap()
            }
        };
        let failed_calls = calls
            .iter()
            .filter(|c| matches!(c, Call::Submit(id, _) if failing.contains(id)))
            .count();
        prop_assert_eq!(summary.failed, failed_calls);
        prop_assert_eq!(summary.submitted + summary.skipped + summary.failed, outcomes.len());
    }

    #[test]
    fn failed_creation_sends_nothing_else(
        outcomes in prop::collection::vec(outcome_strategy(), 0..10),
    ) {
        let service = RecordingService {
            fail_create: true,
            ..Default::default()
        };
        let mut reporter = RunReporter::new(service, config()).unwrap();
        let result = block_on(reporter.run_session(&outcomes));

        let is_creation_error = matches!(result, Err(ReportError::RunCreation { .. }));
        prop_assert!(is_creation_error);
        prop_assert_eq!(reporter.service().calls(), vec![Call::Create]);
        prop_assert_eq!(reporter.state(), SessionState::FailedOpen);
    }
}
