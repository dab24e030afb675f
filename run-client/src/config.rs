use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Bearer credential for the remote service. Never serialized or printed.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ApiToken(String);

impl ApiToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for ApiToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiToken(<redacted>)")
    }
}

/// HTTP method used to complete a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloseMethod {
    Post,
    Patch,
}

/// Which path completes a run: `/<runs>/{id}/complete` or `/<runs>/{id}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClosePath {
    Complete,
    Resource,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub base_url: String,
    #[serde(skip)]
    pub api_token: ApiToken,
    #[serde(rename = "timeout_secs", with = "duration_secs")]
    pub timeout: Duration,
    pub runs_resource: String,
    pub cases_resource: String,
    pub close_method: CloseMethod,
    pub close_path: ClosePath,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://app.testiny.io/api/v1".to_string(),
            api_token: ApiToken::default(),
            timeout: Duration::from_secs(30),
            runs_resource: "automation-test-run".to_string(),
            cases_resource: "test-case".to_string(),
            close_method: CloseMethod::Post,
            close_path: ClosePath::Complete,
        }
    }
}

impl ServiceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = ApiToken::new(token);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_resources(
        mut self,
        runs_resource: impl Into<String>,
        cases_resource: impl Into<String>,
    ) -> Self {
        self.runs_resource = runs_resource.into();
        self.cases_resource = cases_resource.into();
        self
    }

    pub fn with_close(mut self, method: CloseMethod, path: ClosePath) -> Self {
        self.close_method = method;
        self.close_path = path;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.base_url.is_empty() {
            return Err("Base URL cannot be empty".to_string());
        }

        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err("Base URL must start with http:// or https://".to_string());
        }

        if self.api_token.is_blank() {
            return Err("API token cannot be empty".to_string());
        }

        if self.timeout.is_zero() {
            return Err("Timeout must be greater than 0".to_string());
        }

        for (label, resource) in [
            ("Runs resource", &self.runs_resource),
            ("Cases resource", &self.cases_resource),
        ] {
            if resource.trim().is_empty() {
                return Err(format!("{} cannot be empty", label));
            }
            if resource.contains('/') {
                return Err(format!("{} must be a single path segment", label));
            }
        }

        Ok(())
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
