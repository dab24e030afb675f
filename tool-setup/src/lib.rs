//! Tool availability checks for testrun-reporter
//!
//! Some setups need an external command-line tool on `PATH` before a report
//! can be produced or uploaded. This crate probes for such a tool and, when
//! an install command is configured, installs it. The check runs as an
//! explicit setup step, outside the reporting lifecycle.

use serde::{Deserialize, Serialize};
use std::process::{Command, Stdio};
use std::sync::OnceLock;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors raised while making a tool available
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolSetupError {
    #[error("Invalid tool requirement: {0}")]
    InvalidRequirement(String),
    #[error("Required tool '{program}' was not found and no install command is configured")]
    NotFound { program: String },
    #[error("Install command '{command}' failed: {reason}")]
    InstallFailed { command: String, reason: String },
    #[error("Tool '{program}' is still unavailable after running '{command}'")]
    StillMissing { program: String, command: String },
}

pub type ToolSetupResult<T> = Result<T, ToolSetupError>;

/// A command-line tool the reporting session depends on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolRequirement {
    /// Program name or path
    pub program: String,
    /// Arguments for a cheap probe invocation
    #[serde(default = "default_version_args")]
    pub version_args: Vec<String>,
    /// Install command, program first; empty means "do not install"
    #[serde(default)]
    pub install: Vec<String>,
}

fn default_version_args() -> Vec<String> {
    vec!["--version".to_string()]
}

impl ToolRequirement {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            version_args: default_version_args(),
            install: vec![],
        }
    }

    pub fn with_version_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.version_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_install<I, S>(mut self, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.install = command.into_iter().map(Into::into).collect();
        self
    }

    pub fn validate(&self) -> ToolSetupResult<()> {
        if self.program.trim().is_empty() {
            return Err(ToolSetupError::InvalidRequirement(
                "program cannot be empty".to_string(),
            ));
        }
        if self.install.first().is_some_and(|p| p.trim().is_empty()) {
            return Err(ToolSetupError::InvalidRequirement(
                "install command must start with a program".to_string(),
            ));
        }
        Ok(())
    }

    fn install_display(&self) -> String {
        self.install.join(" ")
    }
}

/// How the tool became available
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolStatus {
    AlreadyAvailable,
    Installed,
}

/// Returns true if running the probe command succeeds
pub fn probe(requirement: &ToolRequirement) -> bool {
    Command::new(&requirement.program)
        .args(&requirement.version_args)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|status| status.success())
}

/// Make sure the tool can be run, installing it if configured to
pub fn ensure_tool(requirement: &ToolRequirement) -> ToolSetupResult<ToolStatus> {
    requirement.validate()?;

    if probe(requirement) {
        debug!(program = %requirement.program, "required tool is available");
        return Ok(ToolStatus::AlreadyAvailable);
    }

    let Some((installer, args)) = requirement.install.split_first() else {
        return Err(ToolSetupError::NotFound {
            program: requirement.program.clone(),
        });
    };

    let command = requirement.install_display();
    info!(program = %requirement.program, command = %command, "installing required tool");

    let output = Command::new(installer)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| ToolSetupError::InstallFailed {
            command: command.clone(),
            reason: e.to_string(),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        warn!(command = %command, status = %output.status, stderr = %stderr, "install command failed");
        return Err(ToolSetupError::InstallFailed {
            command,
            reason: format!("{}: {}", output.status, stderr),
        });
    }

    if !probe(requirement) {
        return Err(ToolSetupError::StillMissing {
            program: requirement.program.clone(),
            command,
        });
    }

    Ok(ToolStatus::Installed)
}

/// Runs [`ensure_tool`] at most once; later calls return the first result.
#[derive(Debug, Default)]
pub struct ToolSetup {
    outcome: OnceLock<ToolSetupResult<ToolStatus>>,
}

impl ToolSetup {
    pub const fn new() -> Self {
        Self {
            outcome: OnceLock::new(),
        }
    }

    pub fn ensure_once(&self, requirement: &ToolRequirement) -> ToolSetupResult<ToolStatus> {
        self.outcome
            .get_or_init(|| ensure_tool(requirement))
            .clone()
    }

    pub fn has_run(&self) -> bool {
        self.outcome.get().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MISSING: &str = "testrun-reporter-no-such-tool";

    #[test]
    fn test_requirement_defaults() {
        let req = ToolRequirement::new("testiny-importer");
        assert_eq!(req.version_args, vec!["--version".to_string()]);
        assert!(req.install.is_empty());
        assert!(req.validate().is_ok());

        assert!(ToolRequirement::new("  ").validate().is_err());
        assert!(ToolRequirement::new("x")
            .with_install([""])
            .validate()
            .is_err());
    }

    #[test]
    fn test_requirement_from_toml() {
        let req: ToolRequirement = toml::from_str(
            r#"
            program = "testiny-importer"
            install = ["npm", "install", "-g", "@testiny/cli"]
            "#,
        )
        .unwrap();
        assert_eq!(req.program, "testiny-importer");
        assert_eq!(req.version_args, vec!["--version".to_string()]);
        assert_eq!(req.install.len(), 4);
    }

    #[test]
    fn test_missing_tool_without_installer() {
        let req = ToolRequirement::new(MISSING);
        assert!(!probe(&req));
        assert_eq!(
            ensure_tool(&req),
            Err(ToolSetupError::NotFound {
                program: MISSING.to_string()
            })
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_available_tool() {
        let req = ToolRequirement::new("sh").with_version_args(["-c", "exit 0"]);
        assert_eq!(ensure_tool(&req), Ok(ToolStatus::AlreadyAvailable));
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_installer() {
        let req = ToolRequirement::new(MISSING).with_install(["sh", "-c", "echo nope >&2; exit 3"]);
        match ensure_tool(&req) {
            Err(ToolSetupError::InstallFailed { command, reason }) => {
                assert!(command.starts_with("sh -c"));
                assert!(reason.contains("nope"));
            }
            other => panic!("expected install failure, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_installer_that_does_not_help() {
        let req = ToolRequirement::new(MISSING).with_install(["sh", "-c", "exit 0"]);
        assert!(matches!(
            ensure_tool(&req),
            Err(ToolSetupError::StillMissing { .. })
        ));
    }

    #[test]
    fn test_setup_runs_once() {
        let setup = ToolSetup::new();
        assert!(!setup.has_run());

        let missing = ToolRequirement::new(MISSING);
        let first = setup.ensure_once(&missing);
        assert!(setup.has_run());

        // a different requirement does not trigger a second attempt
        let second = setup.ensure_once(&ToolRequirement::new("sh"));
        assert_eq!(first, second);
    }
}
