pub mod config;
pub mod error;
pub mod lifecycle;
pub mod resolver;
pub mod source;
pub mod summary;

pub use config::{ConfigError, ConfigOverrides, ConfigResult, ReporterConfig, StatusMapping};
pub use error::{ReportError, ReportResult};
pub use lifecycle::{RunReporter, SessionState};
pub use resolver::{IdentifierMap, IdentifierResolver, Resolution};
pub use source::{
    open_report, JsonReportSource, JunitReportSource, ReportFileGuard, ReportFormat,
    ResultSource, SourceError, SourceResult,
};
pub use summary::SessionSummary;
