//! Reporter configuration.
//!
//! Settings come from an optional TOML file and are then overridden by
//! environment variables and command-line flags. The API token is only ever
//! taken from the environment or the command line.

use crate::resolver::IdentifierMap;
use chrono::{DateTime, Local};
use run_client::{ApiToken, OutcomeStatus, RemoteStatus, ServiceConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tool_setup::ToolRequirement;

pub const TIMESTAMP_PLACEHOLDER: &str = "{timestamp}";
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("API token is missing; set TESTINY_TOKEN or pass --api-token")]
    MissingToken,

    #[error("Project id is missing; set TESTINY_PROJECT_ID, pass --project-id, or set project_id in the config file")]
    MissingProjectId,

    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Local outcome → remote status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StatusMapping {
    pub passed: RemoteStatus,
    pub failed: RemoteStatus,
    pub skipped: RemoteStatus,
}

impl Default for StatusMapping {
    fn default() -> Self {
        Self {
            passed: RemoteStatus::Passed,
            failed: RemoteStatus::Failed,
            skipped: RemoteStatus::Failed,
        }
    }
}

impl StatusMapping {
    pub fn remote_status(&self, status: OutcomeStatus) -> RemoteStatus {
        match status {
            OutcomeStatus::Passed => self.passed,
            OutcomeStatus::Failed => self.failed,
            OutcomeStatus::Skipped => self.skipped,
        }
    }
}

/// Values supplied through the environment or the command line.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub api_token: Option<String>,
    pub project_id: Option<String>,
    pub base_url: Option<String>,
    pub run_title: Option<String>,
    pub keep_report: bool,
}

// Plain values come before tables so the struct serializes back to TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReporterConfig {
    pub project_id: String,
    /// Run title; `{timestamp}` is replaced with the local start time
    pub run_title: String,
    pub description: String,
    /// Name of the producing test framework, sent along with runs and results
    pub source: String,
    /// Key of bracketed annotations such as `[testinyId=TC-40]`
    pub annotation_key: String,
    pub fail_on_submission_errors: bool,
    /// Delete the report file once the session is over
    pub remove_report: bool,
    pub status_mapping: StatusMapping,
    pub identifier_map: BTreeMap<String, String>,
    pub service: ServiceConfig,
    pub required_tool: Option<ToolRequirement>,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            run_title: format!("Pytest Automation Run [{}]", TIMESTAMP_PLACEHOLDER),
            description: "Automated test execution from CI/CD pipeline".to_string(),
            source: "pytest".to_string(),
            annotation_key: "testinyId".to_string(),
            fail_on_submission_errors: true,
            remove_report: true,
            status_mapping: StatusMapping::default(),
            identifier_map: BTreeMap::new(),
            service: ServiceConfig::default(),
            required_tool: None,
        }
    }
}

impl ReporterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_toml_str(text: &str, origin: &Path) -> ConfigResult<Self> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text, path)
    }

    /// Loads `path` if given, otherwise starts from the defaults.
    pub fn load_optional(path: Option<&Path>) -> ConfigResult<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn with_project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = project_id.into();
        self
    }

    pub fn with_api_token(mut self, token: impl Into<String>) -> Self {
        self.service.api_token = ApiToken::new(token);
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.service.base_url = base_url.into();
        self
    }

    pub fn with_run_title(mut self, run_title: impl Into<String>) -> Self {
        self.run_title = run_title.into();
        self
    }

    pub fn with_status_mapping(mut self, mapping: StatusMapping) -> Self {
        self.status_mapping = mapping;
        self
    }

    pub fn with_mapping(mut self, name: impl Into<String>, external_id: impl Into<String>) -> Self {
        self.identifier_map.insert(name.into(), external_id.into());
        self
    }

    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(token) = overrides.api_token {
            self.service.api_token = ApiToken::new(token);
        }
        if let Some(project_id) = overrides.project_id {
            self.project_id = project_id;
        }
        if let Some(base_url) = overrides.base_url {
            self.service.base_url = base_url;
        }
        if let Some(run_title) = overrides.run_title {
            self.run_title = run_title;
        }
        if overrides.keep_report {
            self.remove_report = false;
        }
    }

    /// Checks everything that does not need the network.
    ///
    /// Blank strings count as missing for the token and the project id.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.service.api_token.is_blank() {
            return Err(ConfigError::MissingToken);
        }
        if self.project_id.trim().is_empty() {
            return Err(ConfigError::MissingProjectId);
        }
        self.validate_local()?;
        self.service
            .validate()
            .map_err(|message| ConfigError::Invalid { message })
    }

    /// The subset of [`validate`](Self::validate) needed for offline commands.
    pub fn validate_local(&self) -> ConfigResult<()> {
        if self.run_title.trim().is_empty() {
            return Err(invalid("run_title cannot be empty"));
        }

        if self.annotation_key.is_empty()
            || !self
                .annotation_key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        {
            return Err(invalid(format!(
                "annotation_key '{}' may only contain letters, digits, '_', '-' and '.'",
                self.annotation_key
            )));
        }

        for (name, external_id) in &self.identifier_map {
            if name.trim().is_empty() {
                return Err(invalid("identifier_map contains an empty test name"));
            }
            if external_id.trim().is_empty() {
                return Err(invalid(format!(
                    "identifier_map entry '{}' has an empty external id",
                    name
                )));
            }
        }

        if let Some(tool) = &self.required_tool {
            tool.validate().map_err(|e| invalid(e.to_string()))?;
        }

        Ok(())
    }

    pub fn render_title(&self, now: DateTime<Local>) -> String {
        self.run_title.replace(
            TIMESTAMP_PLACEHOLDER,
            &now.format(TIMESTAMP_FORMAT).to_string(),
        )
    }

    pub fn identifier_map(&self) -> IdentifierMap {
        self.identifier_map
            .iter()
            .map(|(name, id)| (name.clone(), id.trim().to_string()))
            .collect()
    }

    /// Keys looked up in report properties to find an annotation.
    pub fn property_keys(&self) -> Vec<String> {
        let mut keys = vec!["externalId".to_string()];
        if !keys.contains(&self.annotation_key) {
            keys.push(self.annotation_key.clone());
        }
        keys
    }
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        message: message.into(),
    }
}
