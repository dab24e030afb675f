use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Local result of one executed test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeStatus {
    Passed,
    Failed,
    Skipped,
}

impl OutcomeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeStatus::Passed => "passed",
            OutcomeStatus::Failed => "failed",
            OutcomeStatus::Skipped => "skipped",
        }
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestOutcome {
    pub name: String,
    pub status: OutcomeStatus,
    pub annotation: Option<String>,
}

impl TestOutcome {
    pub fn new(name: impl Into<String>, status: OutcomeStatus) -> Self {
        Self {
            name: name.into(),
            status,
            annotation: None,
        }
    }

    pub fn passed(name: impl Into<String>) -> Self {
        Self::new(name, OutcomeStatus::Passed)
    }

    pub fn failed(name: impl Into<String>) -> Self {
        Self::new(name, OutcomeStatus::Failed)
    }

    pub fn skipped(name: impl Into<String>) -> Self {
        Self::new(name, OutcomeStatus::Skipped)
    }

    pub fn with_annotation(mut self, annotation: impl Into<String>) -> Self {
        self.annotation = Some(annotation.into());
        self
    }
}

/// Identifier of a test case registered with the remote service.
///
/// Only ever looked up from a mapping table or an annotation, never minted
/// locally.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExternalId(String);

impl ExternalId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ExternalId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Result status as understood by the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RemoteStatus {
    Passed,
    Failed,
    Skipped,
    Blocked,
}

impl fmt::Display for RemoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteStatus::Passed => write!(f, "PASSED"),
            RemoteStatus::Failed => write!(f, "FAILED"),
            RemoteStatus::Skipped => write!(f, "SKIPPED"),
            RemoteStatus::Blocked => write!(f, "BLOCKED"),
        }
    }
}

/// Remote run status. Serialized using the service's wire names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunStatus {
    #[serde(rename = "IN_PROGRESS")]
    Open,
    #[serde(rename = "COMPLETED")]
    Completed,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Open => write!(f, "OPEN"),
            RunStatus::Completed => write!(f, "COMPLETED"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestRun {
    pub id: String,
    pub title: String,
    pub status: RunStatus,
    pub created_at: DateTime<Utc>,
}

impl TestRun {
    pub fn is_open(&self) -> bool {
        self.status == RunStatus::Open
    }
}

/// Everything needed to ask the service for a new run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunDraft {
    pub project_id: String,
    pub title: String,
    pub description: String,
    pub source: String,
    pub start_time: DateTime<Utc>,
}

impl RunDraft {
    pub fn new(project_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            title: title.into(),
            description: String::new(),
            source: String::new(),
            start_time: Utc::now(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }
}

/// One result submission against an open run. Not retained after the call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRecord {
    pub run_id: String,
    pub external_id: ExternalId,
    pub status: RemoteStatus,
    pub comment: String,
    pub source: String,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunCompletion {
    pub run_id: String,
    pub end_time: DateTime<Utc>,
}

impl RunCompletion {
    pub fn now(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            end_time: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_builders() {
        let outcome = TestOutcome::passed("test_valid_login").with_annotation("TC-40");
        assert_eq!(outcome.name, "test_valid_login");
        assert_eq!(outcome.status, OutcomeStatus::Passed);
        assert_eq!(outcome.annotation.as_deref(), Some("TC-40"));

        assert_eq!(TestOutcome::failed("a").status, OutcomeStatus::Failed);
        assert_eq!(TestOutcome::skipped("b").annotation, None);
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(
            serde_json::to_string(&RemoteStatus::Passed).unwrap(),
            "\"PASSED\""
        );
        assert_eq!(
            serde_json::to_string(&RemoteStatus::Blocked).unwrap(),
            "\"BLOCKED\""
        );
        assert_eq!(
            serde_json::to_string(&RunStatus::Open).unwrap(),
            "\"IN_PROGRESS\""
        );
        assert_eq!(
            serde_json::to_string(&RunStatus::Completed).unwrap(),
            "\"COMPLETED\""
        );
        assert_eq!(RunStatus::Open.to_string(), "OPEN");
    }

    #[test]
    fn test_external_id_is_transparent() {
        let id = ExternalId::new("TC_LOGIN_001");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"TC_LOGIN_001\"");
        assert_eq!(id.to_string(), "TC_LOGIN_001");
        assert_ne!(ExternalId::from("tc_login_001"), id);
    }
}
