use super::{read_report, ResultSource, SourceError, SourceResult};
use run_client::{OutcomeStatus, TestOutcome};
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct JsonReport {
    #[serde(default)]
    tests: Vec<JsonTest>,
}

#[derive(Debug, Deserialize)]
struct JsonTest {
    #[serde(default)]
    nodeid: Option<String>,
    #[serde(default)]
    name: Option<String>,
    outcome: String,
    #[serde(default)]
    annotation: Option<String>,
    #[serde(default)]
    user_properties: Vec<Value>,
}

/// Reads a pytest-json-report style `results.json`.
#[derive(Debug, Clone)]
pub struct JsonReportSource {
    path: PathBuf,
    property_keys: Vec<String>,
}

impl JsonReportSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            property_keys: vec!["externalId".to_string()],
        }
    }

    pub fn with_property_keys(mut self, keys: Vec<String>) -> Self {
        self.property_keys = keys;
        self
    }

    pub fn parse(text: &str, property_keys: &[String]) -> SourceResult<Vec<TestOutcome>> {
        let report: JsonReport = serde_json::from_str(text)?;

        report
            .tests
            .into_iter()
            .enumerate()
            .map(|(index, test)| {
                let name = test_name(&test).ok_or_else(|| SourceError::Malformed {
                    message: format!("test #{} has neither a name nor a nodeid", index),
                })?;

                let annotation = test
                    .annotation
                    .filter(|a| !a.trim().is_empty())
                    .or_else(|| property_annotation(&test.user_properties, property_keys));

                Ok(TestOutcome {
                    name,
                    status: pytest_status(&test.outcome),
                    annotation,
                })
            })
            .collect()
    }
}

impl ResultSource for JsonReportSource {
    fn outcomes(&self) -> SourceResult<Vec<TestOutcome>> {
        let text = read_report(&self.path)?;
        Self::parse(&text, &self.property_keys)
    }

    fn describe(&self) -> String {
        format!("JSON report {}", self.path.display())
    }
}

/// `passed` passes; `skipped` and `xfailed` are skips; anything else failed.
pub fn pytest_status(outcome: &str) -> OutcomeStatus {
    match outcome.trim().to_ascii_lowercase().as_str() {
        "passed" => OutcomeStatus::Passed,
        "skipped" | "xfailed" => OutcomeStatus::Skipped,
        _ => OutcomeStatus::Failed,
    }
}

fn test_name(test: &JsonTest) -> Option<String> {
    if let Some(name) = test.name.as_deref().filter(|n| !n.trim().is_empty()) {
        return Some(name.to_string());
    }
    test.nodeid
        .as_deref()
        .and_then(|id| id.rsplit("::").next())
        .filter(|n| !n.is_empty())
        .map(str::to_string)
}

/// pytest writes user properties either as `[key, value]` pairs or as
/// single-entry objects.
fn property_annotation(properties: &[Value], keys: &[String]) -> Option<String> {
    for property in properties {
        match property {
            Value::Array(pair) if pair.len() == 2 => {
                let matches_key = pair[0]
                    .as_str()
                    .is_some_and(|k| keys.iter().any(|key| key == k));
                if matches_key {
                    if let Some(value) = value_text(&pair[1]) {
                        return Some(value);
                    }
                }
            }
            Value::Object(map) => {
                if let Some(value) = keys.iter().find_map(|key| map.get(key).and_then(value_text)) {
                    return Some(value);
                }
            }
            _ => {}
        }
    }
    None
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
