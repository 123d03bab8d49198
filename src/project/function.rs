//! Function records registered under a project.
//!
//! A function is a unit of executable work (a batch job, a serving endpoint)
//! described by a command or handler reference, an optional container image,
//! and a build specification consumed by an external image builder. Functions
//! can be constructed inline or fetched from a remote YAML descriptor.

use base64::Engine as _;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::FetchError;

/// The kind of work a function performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FunctionKind {
    /// A batch job executed to completion.
    #[default]
    Job,
    /// A long-lived serving endpoint.
    Serving,
    /// Any other runtime the engine understands.
    Other,
}

/// Build instructions consumed by the external image builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BuildSpec {
    /// Source location (git URL, archive, or local path).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Base image to build on top of.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_image: Option<String>,
    /// Shell commands run during the build (e.g. dependency installs).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<String>,
    /// Inline function source, base64-encoded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_source_code: Option<String>,
}

/// Reported state of a remote function build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildStatus {
    /// Builder state (e.g. "pending", "running", "ready", "failed").
    pub state: String,
    /// Resulting image reference, once the build completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// A function definition registered under a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Function {
    /// What kind of runtime the function targets.
    #[serde(default)]
    pub kind: FunctionKind,
    /// Command or handler reference executed by the runtime.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub command: String,
    /// Container image to run. Empty until a build materializes one.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,
    /// Build specification for the external image builder.
    #[serde(default, skip_serializing_if = "BuildSpec::is_empty")]
    pub build: BuildSpec,
    /// Environment variable overrides applied at execution time.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub env: IndexMap<String, String>,
    /// Last known remote build state, if a build was submitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_state: Option<String>,
}

impl BuildSpec {
    /// True when no build instruction has been set.
    pub fn is_empty(&self) -> bool {
        self.source.is_none()
            && self.base_image.is_none()
            && self.commands.is_empty()
            && self.function_source_code.is_none()
    }
}

impl Function {
    /// Create a function of the given kind with a command reference.
    pub fn new(kind: FunctionKind, command: &str) -> Self {
        Self {
            kind,
            command: command.to_string(),
            image: String::new(),
            build: BuildSpec::default(),
            env: IndexMap::new(),
            build_state: None,
        }
    }

    /// Attach inline source code, base64-encoded into the build spec.
    pub fn with_code_body(mut self, body: &str) -> Self {
        let encoded = base64::engine::general_purpose::STANDARD.encode(body.as_bytes());
        self.build.function_source_code = Some(encoded);
        self
    }

    /// Read a source file and attach it as inline base64 code.
    pub fn with_code_file(self, path: &Path) -> std::io::Result<Self> {
        let body = std::fs::read_to_string(path)?;
        Ok(self.with_code_body(&body))
    }

    /// Extend the build configuration.
    ///
    /// Commands are appended to any already present; images replace only
    /// when provided.
    pub fn build_config(
        &mut self,
        image: Option<&str>,
        base_image: Option<&str>,
        commands: &[String],
    ) {
        if let Some(image) = image {
            self.image = image.to_string();
        }
        if let Some(base) = base_image {
            self.build.base_image = Some(base.to_string());
        }
        self.build.commands.extend(commands.iter().cloned());
    }

    /// Set an environment variable override.
    pub fn set_env(&mut self, key: &str, value: &str) {
        self.env.insert(key.to_string(), value.to_string());
    }

    /// Whether the function is backed by a usable image.
    ///
    /// True when an image reference is recorded or the last remote build
    /// reported "ready".
    pub fn is_deployed(&self) -> bool {
        if !self.image.is_empty() {
            return true;
        }
        matches!(self.build_state.as_deref(), Some("ready"))
    }

    /// Fetch a function descriptor from a remote URL.
    ///
    /// The descriptor is expected to be a YAML document deserializable into
    /// a [`Function`].
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Http` on network failure, `FetchError::Status`
    /// on a non-success response, and `FetchError::Malformed` when the body
    /// does not parse as a function descriptor.
    pub async fn from_url(url: &str, timeout: Duration) -> Result<Self, FetchError> {
        tracing::debug!(url, "fetching function descriptor");

        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let resp = client.get(url).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                code: status.as_u16(),
                message,
            });
        }

        let body = resp.text().await?;
        serde_yaml::from_str(&body).map_err(|e| FetchError::Malformed {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;

    #[test]
    fn test_kind_serialization() {
        let json = serde_json::to_string(&FunctionKind::Job).expect("serialization should succeed");
        assert_eq!(json, "\"job\"");

        let json =
            serde_json::to_string(&FunctionKind::Serving).expect("serialization should succeed");
        assert_eq!(json, "\"serving\"");
    }

    #[test]
    fn test_new_function_is_not_deployed() {
        let func = Function::new(FunctionKind::Job, "handler.py");
        assert_eq!(func.command, "handler.py");
        assert!(func.image.is_empty());
        assert!(!func.is_deployed());
    }

    #[test]
    fn test_deployed_by_image_or_build_state() {
        let mut func = Function::new(FunctionKind::Job, "handler.py");
        func.image = "registry/app:v1".to_string();
        assert!(func.is_deployed());

        let mut func = Function::new(FunctionKind::Job, "handler.py");
        func.build_state = Some("ready".to_string());
        assert!(func.is_deployed());

        func.build_state = Some("running".to_string());
        assert!(!func.is_deployed());
    }

    #[test]
    fn test_with_code_body_encodes_base64() {
        let func = Function::new(FunctionKind::Job, "handler.py").with_code_body("print('hi')\n");
        let encoded = func
            .build
            .function_source_code
            .expect("inline code should be set");
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .expect("stored code should be valid base64");
        assert_eq!(decoded, b"print('hi')\n");
    }

    #[test]
    fn test_build_config_appends_commands() {
        let mut func = Function::new(FunctionKind::Job, "handler.py");
        func.build_config(None, Some("python:3.11"), &["pip install pandas".to_string()]);
        func.build_config(None, None, &["pip install scikit-learn".to_string()]);

        assert_eq!(func.build.base_image.as_deref(), Some("python:3.11"));
        assert_eq!(
            func.build.commands,
            vec!["pip install pandas", "pip install scikit-learn"]
        );
    }

    #[test]
    fn test_descriptor_roundtrip() {
        let mut func = Function::new(FunctionKind::Serving, "serve:app");
        func.set_env("LOG_LEVEL", "debug");

        let yaml = serde_yaml::to_string(&func).expect("serialization should succeed");
        let parsed: Function = serde_yaml::from_str(&yaml).expect("parse should succeed");
        assert_eq!(parsed, func);
    }
}
