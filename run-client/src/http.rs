use crate::config::{ClosePath, CloseMethod, ServiceConfig};
use crate::service::{ClientError, ClientResult, RunService};
use crate::types::{
    RemoteStatus, RunCompletion, RunDraft, RunStatus, SubmissionRecord, TestRun,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, USER_AGENT};
use reqwest::{Method, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

const USER_AGENT_VALUE: &str = concat!("testrun-reporter/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Serialize)]
struct CreateRunBody<'a> {
    project_id: serde_json::Value,
    title: &'a str,
    start_time: DateTime<Utc>,
    status: RunStatus,
    #[serde(skip_serializing_if = "str::is_empty")]
    description: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    source: &'a str,
}

#[derive(Debug, Serialize)]
struct SubmitResultBody<'a> {
    status: RemoteStatus,
    comment: &'a str,
    execution_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "str::is_empty")]
    automation_source: &'a str,
}

#[derive(Debug, Serialize)]
struct CloseRunBody {
    status: RunStatus,
    end_time: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct CreateRunResponse {
    id: RunIdentifier,
}

/// The service hands out numeric ids, but string ids are accepted as well.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RunIdentifier {
    Number(u64),
    Text(String),
}

impl RunIdentifier {
    fn into_string(self) -> String {
        match self {
            RunIdentifier::Number(n) => n.to_string(),
            RunIdentifier::Text(s) => s,
        }
    }
}

/// [`RunService`] backed by the service's JSON-over-HTTP API.
#[derive(Debug, Clone)]
pub struct HttpRunService {
    client: reqwest::Client,
    base_url: Url,
    config: ServiceConfig,
}

impl HttpRunService {
    pub fn new(config: ServiceConfig) -> ClientResult<Self> {
        config
            .validate()
            .map_err(|message| ClientError::InvalidConfig { message })?;

        let base_url = Url::parse(&config.base_url).map_err(|e| ClientError::InvalidConfig {
            message: format!("Invalid base URL '{}': {}", config.base_url, e),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidConfig {
                message: format!("Base URL '{}' cannot carry a path", config.base_url),
            });
        }

        let mut authorization =
            HeaderValue::from_str(&format!("Bearer {}", config.api_token.expose().trim()))
                .map_err(|_| ClientError::InvalidConfig {
                    message: "API token contains characters not allowed in a header".to_string(),
                })?;
        authorization.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, authorization);
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| ClientError::InvalidConfig {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url,
            config,
        })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    fn endpoint<I>(&self, segments: I) -> Url
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut url = self.base_url.clone();
        // `new` rejects cannot-be-a-base URLs, so the segments are always available
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    pub(crate) fn runs_url(&self) -> Url {
        self.endpoint([self.config.runs_resource.as_str()])
    }

    pub(crate) fn result_url(&self, record: &SubmissionRecord) -> Url {
        self.endpoint([
            self.config.runs_resource.as_str(),
            record.run_id.as_str(),
            self.config.cases_resource.as_str(),
            record.external_id.as_str(),
            "result",
        ])
    }

    pub(crate) fn close_url(&self, run_id: &str) -> Url {
        match self.config.close_path {
            ClosePath::Complete => {
                self.endpoint([self.config.runs_resource.as_str(), run_id, "complete"])
            }
            ClosePath::Resource => self.endpoint([self.config.runs_resource.as_str(), run_id]),
        }
    }

    fn close_method(&self) -> Method {
        match self.config.close_method {
            CloseMethod::Post => Method::POST,
            CloseMethod::Patch => Method::PATCH,
        }
    }

    /// Canonical numeric project ids go out as JSON numbers, anything else
    /// (including "007") as the string it was given.
    fn project_id_value(project_id: &str) -> serde_json::Value {
        let trimmed = project_id.trim();
        match trimmed.parse::<u64>() {
            Ok(n) if n.to_string() == trimmed => serde_json::Value::from(n),
            _ => serde_json::Value::String(trimmed.to_string()),
        }
    }

    fn handle_http_error(err: reqwest::Error) -> ClientError {
        if err.is_timeout() {
            ClientError::Timeout
        } else if err.is_connect() {
            ClientError::ServiceUnavailable {
                message: format!("Cannot connect to test-management service: {}", err),
            }
        } else {
            ClientError::Network(err)
        }
    }

    /// Sends one JSON request and returns the body of a 2xx response.
    ///
    /// Non-2xx bodies are logged before the error is returned.
    async fn send_json<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: Url,
        body: &B,
    ) -> ClientResult<String> {
        debug!(%method, %url, "sending request");

        let response = self
            .client
            .request(method.clone(), url.clone())
            .json(body)
            .send()
            .await
            .map_err(Self::handle_http_error)?;

        let status = response.status();
        let text = response.text().await.map_err(Self::handle_http_error)?;

        if status.is_success() {
            return Ok(text);
        }

        warn!(
            %method,
            %url,
            status = status.as_u16(),
            body = %text,
            "test-management service rejected request"
        );

        Err(match status.as_u16() {
            401 | 403 => ClientError::Authentication {
                status: status.as_u16(),
                body: text,
            },
            code => ClientError::Http {
                status: code,
                body: text,
            },
        })
    }

    fn decode_created_run(text: &str) -> ClientResult<String> {
        let decoded: CreateRunResponse =
            serde_json::from_str(text).map_err(|e| ClientError::InvalidResponse {
                message: format!("unexpected create-run response ({}): {}", e, text),
            })?;

        let id = decoded.id.into_string();
        if id.trim().is_empty() {
            return Err(ClientError::InvalidResponse {
                message: "create-run response carried an empty run id".to_string(),
            });
        }
        Ok(id)
    }
}

#[async_trait]
impl RunService for HttpRunService {
    async fn create_run(&self, draft: &RunDraft) -> ClientResult<TestRun> {
        let body = CreateRunBody {
            project_id: Self::project_id_value(&draft.project_id),
            title: &draft.title,
            start_time: draft.start_time,
            status: RunStatus::Open,
            description: &draft.description,
            source: &draft.source,
        };

        let text = self.send_json(Method::POST, self.runs_url(), &body).await?;
        let id = Self::decode_created_run(&text)?;

        info!(run_id = %id, title = %draft.title, "created test run");

        Ok(TestRun {
            id,
            title: draft.title.clone(),
            status: RunStatus::Open,
            created_at: draft.start_time,
        })
    }

    async fn submit_result(&self, record: &SubmissionRecord) -> ClientResult<()> {
        let body = SubmitResultBody {
            status: record.status,
            comment: &record.comment,
            execution_time: record.submitted_at,
            automation_source: &record.source,
        };

        let text = self
            .send_json(Method::POST, self.result_url(record), &body)
            .await?;
        debug!(external_id = %record.external_id, response = %text, "result accepted");
        Ok(())
    }

    async fn close_run(&self, completion: &RunCompletion) -> ClientResult<()> {
        let body = CloseRunBody {
            status: RunStatus::Completed,
            end_time: completion.end_time,
        };

        self.send_json(self.close_method(), self.close_url(&completion.run_id), &body)
            .await?;
        info!(run_id = %completion.run_id, "completed test run");
        Ok(())
    }

    fn service_name(&self) -> &'static str {
        "http"
    }
}
