use run_client::{ExternalId, RunStatus, TestRun};
use serde::Serialize;
use std::fmt;

pub const EXIT_OK: u8 = 0;
pub const EXIT_SUBMISSION_FAILURES: u8 = 1;
pub const EXIT_CONFIGURATION: u8 = 2;
pub const EXIT_RUN_CREATION: u8 = 3;
pub const EXIT_FINALIZATION: u8 = 4;

/// Counts for one reporting session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub run_id: String,
    pub run_title: String,
    pub submitted: usize,
    pub skipped: usize,
    pub failed: usize,
    pub final_status: RunStatus,
    /// External ids whose submission failed, in submission order
    pub failed_ids: Vec<ExternalId>,
}

impl SessionSummary {
    pub fn for_run(run: &TestRun) -> Self {
        Self {
            run_id: run.id.clone(),
            run_title: run.title.clone(),
            submitted: 0,
            skipped: 0,
            failed: 0,
            final_status: run.status,
            failed_ids: vec![],
        }
    }

    pub fn record_submitted(&mut self) {
        self.submitted += 1;
    }

    pub fn record_skipped(&mut self) {
        self.skipped += 1;
    }

    pub fn record_failed(&mut self, external_id: ExternalId) {
        self.failed += 1;
        self.failed_ids.push(external_id);
    }

    /// Number of submission calls made.
    pub fn attempted(&self) -> usize {
        self.submitted + self.failed
    }

    pub fn exit_code(&self, fail_on_submission_errors: bool) -> u8 {
        if self.failed > 0 && fail_on_submission_errors {
            EXIT_SUBMISSION_FAILURES
        } else {
            EXIT_OK
        }
    }
}

impl fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Test run {} ({})", self.run_id, self.run_title)?;
        writeln!(f, "  status:    {}", self.final_status)?;
        writeln!(f, "  submitted: {}", self.submitted)?;
        writeln!(f, "  skipped:   {}", self.skipped)?;
        write!(f, "  failed:    {}", self.failed)?;
        if !self.failed_ids.is_empty() {
            let ids: Vec<&str> = self.failed_ids.iter().map(|id| id.as_str()).collect();
            write!(f, " ({})", ids.join(", "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn summary() -> SessionSummary {
        SessionSummary::for_run(&TestRun {
            id: "12".to_string(),
            title: "Pytest Automation Run [2024-01-01 00:00:00]".to_string(),
            status: RunStatus::Open,
            created_at: Utc::now(),
        })
    }

    #[test]
    fn test_counts() {
        let mut summary = summary();
        summary.record_submitted();
        summary.record_skipped();
        summary.record_failed(ExternalId::new("TC_LOGIN_002"));

        assert_eq!(summary.submitted, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.attempted(), 2);
        assert_eq!(summary.failed_ids, vec![ExternalId::new("TC_LOGIN_002")]);
    }

    #[test]
    fn test_exit_code() {
        let mut summary = summary();
        assert_eq!(summary.exit_code(true), EXIT_OK);

        summary.record_failed(ExternalId::new("TC-1"));
        assert_eq!(summary.exit_code(true), EXIT_SUBMISSION_FAILURES);
        assert_eq!(summary.exit_code(false), EXIT_OK);
    }

    #[test]
    fn test_display() {
        let mut summary = summary();
        summary.final_status = RunStatus::Completed;
        summary.record_submitted();
        summary.record_failed(ExternalId::new("TC-2"));

        let text = summary.to_string();
        assert!(text.starts_with("Test run 12 (Pytest Automation Run"));
        assert!(text.contains("status:    COMPLETED"));
        assert!(text.contains("submitted: 1"));
        assert!(text.contains("failed:    1 (TC-2)"));
    }

    #[test]
    fn test_json() {
        let json = serde_json::to_value(summary()).unwrap();
        assert_eq!(json["run_id"], "12");
        assert_eq!(json["final_status"], "IN_PROGRESS");
        assert_eq!(json["failed_ids"], serde_json::json!([]));
    }
}
