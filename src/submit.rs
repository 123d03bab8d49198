//! Submission client for the remote pipeline-execution engine.
//!
//! Hands serialized workflow references off to the engine's HTTP API and
//! returns the opaque run identifier the engine issues. Also covers the
//! engine's remote function builder. Run tracking beyond the identifier is
//! out of scope; callers query status through the engine's own tooling.

use async_trait::async_trait;
use indexmap::IndexMap;
use reqwest::RequestBuilder;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::EngineConfig;
use crate::error::SubmissionError;
use crate::project::function::{BuildStatus, Function};

/// Timeout for the lightweight health probe.
const HEALTHZ_TIMEOUT: Duration = Duration::from_secs(3);

/// A workflow submission handed to the engine.
#[derive(Debug, Clone, Serialize)]
pub struct SubmitRequest {
    /// Owning project name.
    pub project: String,
    /// Workflow name being invoked.
    pub workflow: String,
    /// Pipeline definition file reference.
    pub code: String,
    /// Runtime arguments (string keys, scalar values).
    pub arguments: IndexMap<String, serde_json::Value>,
    /// Target path for run artifacts.
    pub artifact_path: String,
}

/// Wire form of a submission, tagged with a client-generated uid.
#[derive(Debug, Serialize)]
struct SubmitBody<'a> {
    uid: String,
    #[serde(flatten)]
    request: &'a SubmitRequest,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    #[serde(default)]
    id: String,
}

#[derive(Debug, Serialize)]
struct BuildRequest<'a> {
    function: &'a Function,
}

/// Boundary to the external pipeline-execution engine.
///
/// The registry only ever calls through this trait, so tests can substitute
/// an in-memory backend.
#[async_trait]
pub trait PipelineBackend: Send + Sync {
    /// Submit a workflow for execution, returning the engine's run
    /// identifier. Fire-and-forget: the call returns on acceptance, not
    /// completion.
    async fn submit(&self, request: SubmitRequest) -> Result<String, SubmissionError>;

    /// Submit a function spec to the engine's remote image builder.
    async fn build_function(&self, function: &Function) -> Result<BuildStatus, SubmissionError>;

    /// Probe engine reachability.
    async fn healthz(&self) -> Result<(), SubmissionError>;
}

/// HTTP client for the engine API.
pub struct EngineClient {
    client: reqwest::Client,
    config: EngineConfig,
}

impl EngineClient {
    pub fn new(config: EngineConfig) -> Result<Self, SubmissionError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { client, config })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api/{}", self.config.base_url, path)
    }

    /// Apply configured credentials. Basic auth wins over a bearer token.
    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        if let Some(user) = &self.config.user {
            builder.basic_auth(user, self.config.password.as_deref())
        } else if let Some(token) = &self.config.token {
            builder.bearer_auth(token)
        } else {
            builder
        }
    }

    /// Read the body of a rejected response into a verbatim error.
    async fn rejection(resp: reqwest::Response) -> SubmissionError {
        let status = resp.status().as_u16();
        let message = resp.text().await.unwrap_or_default();
        SubmissionError::Rejected { status, message }
    }
}

#[async_trait]
impl PipelineBackend for EngineClient {
    async fn submit(&self, request: SubmitRequest) -> Result<String, SubmissionError> {
        let uid = uuid::Uuid::new_v4().simple().to_string();
        let body = SubmitBody {
            uid: uid.clone(),
            request: &request,
        };

        tracing::info!(
            workflow = %request.workflow,
            uid = %uid,
            "submitting pipeline to engine"
        );

        let resp = self
            .authed(self.client.post(self.api_url("submit_pipeline")))
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(Self::rejection(resp).await);
        }

        let parsed: SubmitResponse = resp
            .json()
            .await
            .map_err(|e| SubmissionError::ParseError(e.to_string()))?;
        if parsed.id.is_empty() {
            return Err(SubmissionError::MissingRunId);
        }
        Ok(parsed.id)
    }

    async fn build_function(&self, function: &Function) -> Result<BuildStatus, SubmissionError> {
        tracing::info!(command = %function.command, "submitting remote build");

        let resp = self
            .authed(self.client.post(self.api_url("build/function")))
            .json(&BuildRequest { function })
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(Self::rejection(resp).await);
        }

        resp.json()
            .await
            .map_err(|e| SubmissionError::ParseError(e.to_string()))
    }

    async fn healthz(&self) -> Result<(), SubmissionError> {
        let resp = self
            .authed(self.client.get(self.api_url("healthz")))
            .timeout(HEALTHZ_TIMEOUT)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(Self::rejection(resp).await);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::function::FunctionKind;

    #[test]
    fn test_api_url_join() {
        let client = EngineClient::new(EngineConfig::default().with_base_url("http://engine:8080/"))
            .expect("client should build");
        assert_eq!(
            client.api_url("submit_pipeline"),
            "http://engine:8080/api/submit_pipeline"
        );
    }

    #[test]
    fn test_submit_body_shape() {
        let request = SubmitRequest {
            project: "new-project".to_string(),
            workflow: "main".to_string(),
            code: "workflow.py".to_string(),
            arguments: IndexMap::from([("p1".to_string(), serde_json::json!(3))]),
            artifact_path: "output/path".to_string(),
        };
        let body = SubmitBody {
            uid: "abc123".to_string(),
            request: &request,
        };

        let json = serde_json::to_value(&body).expect("serialization should succeed");
        assert_eq!(json["uid"], "abc123");
        assert_eq!(json["workflow"], "main");
        assert_eq!(json["code"], "workflow.py");
        assert_eq!(json["arguments"]["p1"], 3);
        assert_eq!(json["artifact_path"], "output/path");
    }

    #[test]
    fn test_build_request_wraps_function() {
        let function = Function::new(FunctionKind::Job, "handler.py");
        let json = serde_json::to_value(BuildRequest {
            function: &function,
        })
        .expect("serialization should succeed");
        assert_eq!(json["function"]["command"], "handler.py");
        assert_eq!(json["function"]["kind"], "job");
    }
}
