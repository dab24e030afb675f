//! Result sources
//!
//! A result source turns a test report written by the local test runner into
//! an ordered list of [`TestOutcome`]s. Two report formats are understood:
//! pytest-json-report style JSON and JUnit XML.

pub mod json;
pub mod junit;

pub use json::JsonReportSource;
pub use junit::JunitReportSource;

use run_client::TestOutcome;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Failed to read report {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON report: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid JUnit XML report: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Malformed report: {message}")]
    Malformed { message: String },
}

pub type SourceResult<T> = Result<T, SourceError>;

pub trait ResultSource {
    /// Outcomes in the order the test runner produced them
    fn outcomes(&self) -> SourceResult<Vec<TestOutcome>>;

    fn describe(&self) -> String;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ReportFormat {
    Json,
    Junit,
}

impl ReportFormat {
    /// `.xml` files are JUnit, everything else is treated as JSON
    pub fn detect(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("xml") => ReportFormat::Junit,
            _ => ReportFormat::Json,
        }
    }
}

/// Builds the source for a report file.
pub fn open_report(
    path: &Path,
    format: Option<ReportFormat>,
    property_keys: Vec<String>,
) -> Box<dyn ResultSource> {
    match format.unwrap_or_else(|| ReportFormat::detect(path)) {
        ReportFormat::Json => {
            Box::new(JsonReportSource::new(path).with_property_keys(property_keys))
        }
        ReportFormat::Junit => {
            Box::new(JunitReportSource::new(path).with_property_keys(property_keys))
        }
    }
}

pub(crate) fn read_report(path: &Path) -> SourceResult<String> {
    std::fs::read_to_string(path).map_err(|source| SourceError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Removes the report file when dropped, if removal is enabled.
///
/// Holding the guard across the session means the file is gone afterwards
/// whether the session succeeded or not.
#[derive(Debug)]
pub struct ReportFileGuard {
    path: PathBuf,
    remove: bool,
}

impl ReportFileGuard {
    pub fn new(path: impl Into<PathBuf>, remove: bool) -> Self {
        Self {
            path: path.into(),
            remove,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Keep the file after all.
    pub fn keep(&mut self) {
        self.remove = false;
    }
}

impl Drop for ReportFileGuard {
    fn drop(&mut self) {
        if !self.remove {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "removed report file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to remove report file"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_format_detection() {
        assert_eq!(ReportFormat::detect(Path::new("report.xml")), ReportFormat::Junit);
        assert_eq!(ReportFormat::detect(Path::new("REPORT.XML")), ReportFormat::Junit);
        assert_eq!(ReportFormat::detect(Path::new("results.json")), ReportFormat::Json);
        assert_eq!(ReportFormat::detect(Path::new("results")), ReportFormat::Json);
    }

    #[test]
    fn test_guard_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(b"{}")
            .unwrap();

        {
            let _guard = ReportFileGuard::new(&path, true);
        }
        assert!(!path.exists());
    }

    #[test]
    fn test_guard_keeps_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        std::fs::write(&path, "{}").unwrap();

        {
            let _guard = ReportFileGuard::new(&path, false);
        }
        assert!(path.exists());

        {
            let mut guard = ReportFileGuard::new(&path, true);
            guard.keep();
        }
        assert!(path.exists());
    }

    #[test]
    fn test_guard_tolerates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let _guard = ReportFileGuard::new(dir.path().join("never-written.json"), true);
    }

    #[test]
    fn test_open_report_picks_parser() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.xml");
        std::fs::write(
            &path,
            r#"<testsuite><testcase name="test_a"/></testsuite>"#,
        )
        .unwrap();

        let source = open_report(&path, None, vec!["externalId".to_string()]);
        let outcomes = source.outcomes().unwrap();
        assert_eq!(outcomes, vec![TestOutcome::passed("test_a")]);
        assert!(source.describe().contains("JUnit"));

        let forced = open_report(&path, Some(ReportFormat::Json), vec![]);
        assert!(matches!(forced.outcomes(), Err(SourceError::Json(_))));
    }

    #[test]
    fn test_missing_report() {
        let source = open_report(Path::new("/nonexistent/results.json"), None, vec![]);
        assert!(matches!(source.outcomes(), Err(SourceError::Io { .. })));
    }
}
