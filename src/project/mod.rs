//! Project registry: named functions and workflows with YAML persistence.
//!
//! This module provides functionality for:
//! - Registering function and workflow definitions under a project
//! - Serializing the registry to a canonical, deterministic document
//! - Delegating workflow execution to the remote engine

pub mod function;
pub mod workflow;

pub use function::{BuildSpec, BuildStatus, Function, FunctionKind};
pub use workflow::Workflow;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{FetchError, RegistryError, RunError, SyncError};
use crate::git::GitRepo;
use crate::submit::{PipelineBackend, SubmitRequest};

/// Name of the serialized project document.
const PROJECT_FILENAME: &str = "project.yaml";

/// A named function entry in the serialized document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionEntry {
    pub name: String,
    pub spec: Function,
}

/// A named workflow entry in the serialized document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowEntry {
    pub name: String,
    pub code: String,
}

/// Canonical on-disk form of a project.
///
/// Top-level field order (name, functions, workflows) is fixed; entry order
/// within the sequences is registration order. Serializing the same registry
/// state twice yields byte-identical documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectDocument {
    pub name: String,
    /// ISO 8601 timestamp of project creation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<String>,
    // Always emitted, even when empty, so readers can rely on the shape.
    #[serde(default)]
    pub functions: Vec<FunctionEntry>,
    #[serde(default)]
    pub workflows: Vec<WorkflowEntry>,
}

/// A project: a named registry of functions and workflows rooted at a
/// working directory.
///
/// Function and workflow names are unique within their mapping; registering
/// a duplicate name replaces the previous definition (last-write-wins).
pub struct Project {
    /// Project name, immutable after creation.
    name: String,
    /// Local working directory holding the document and source files.
    working_dir: PathBuf,
    /// ISO 8601 timestamp of project creation.
    created: Option<String>,
    /// Source reference this project was loaded from (git URL or path).
    source: Option<String>,
    /// Configured remote repository URL, if any.
    remote: Option<String>,
    /// Registered functions, in registration order.
    functions: IndexMap<String, Function>,
    /// Registered workflows, in registration order.
    workflows: IndexMap<String, Workflow>,
}

impl Project {
    /// Create a new empty project rooted at `working_dir`.
    ///
    /// The directory is created if missing. With `init_git` set, a git
    /// working tree is also initialized there.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::Initialization` if the directory cannot be
    /// created or written, or if git initialization fails.
    pub async fn create(
        name: &str,
        working_dir: &Path,
        init_git: bool,
    ) -> Result<Self, RegistryError> {
        fs::create_dir_all(working_dir).map_err(|e| RegistryError::Initialization {
            path: working_dir.display().to_string(),
            reason: e.to_string(),
        })?;

        // Probe writability up front rather than failing on the first save.
        let probe = working_dir.join(".mlforge_write_probe");
        fs::write(&probe, b"").map_err(|e| RegistryError::Initialization {
            path: working_dir.display().to_string(),
            reason: format!("directory not writable: {}", e),
        })?;
        let _ = fs::remove_file(&probe);

        if init_git {
            GitRepo::new(working_dir)
                .init()
                .await
                .map_err(|e| RegistryError::Initialization {
                    path: working_dir.display().to_string(),
                    reason: e.to_string(),
                })?;
        }

        tracing::info!(name, dir = %working_dir.display(), "created project");

        Ok(Self {
            name: name.to_string(),
            working_dir: working_dir.to_path_buf(),
            created: Some(chrono::Utc::now().to_rfc3339()),
            source: None,
            remote: None,
            functions: IndexMap::new(),
            workflows: IndexMap::new(),
        })
    }

    /// Load a project from the document stored in `working_dir`.
    pub fn load(working_dir: &Path) -> Result<Self, RegistryError> {
        let file_path = working_dir.join(PROJECT_FILENAME);
        if !file_path.exists() {
            return Err(RegistryError::DocumentNotFound(
                file_path.display().to_string(),
            ));
        }

        let contents = fs::read_to_string(&file_path)?;
        let doc: ProjectDocument = serde_yaml::from_str(&contents)?;

        Ok(Self::from_document(doc, working_dir))
    }

    /// Reconstruct a project from a parsed document.
    pub fn from_document(doc: ProjectDocument, working_dir: &Path) -> Self {
        Self {
            name: doc.name,
            working_dir: working_dir.to_path_buf(),
            created: doc.created,
            source: doc.source,
            remote: doc.remote,
            functions: doc
                .functions
                .into_iter()
                .map(|e| (e.name, e.spec))
                .collect(),
            workflows: doc
                .workflows
                .into_iter()
                .map(|e| (e.name, Workflow::new(&e.code)))
                .collect(),
        }
    }

    /// Save the project document to the working directory.
    pub fn save(&self) -> Result<(), RegistryError> {
        let contents = self.serialize()?;
        fs::write(self.working_dir.join(PROJECT_FILENAME), contents)?;
        Ok(())
    }

    /// Project name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Local working directory.
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Configured remote repository URL, if any.
    pub fn remote(&self) -> Option<&str> {
        self.remote.as_deref()
    }

    /// Source reference this project was loaded from, if any.
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Record the source reference (git URL + ref, or local path).
    pub fn set_source(&mut self, source: &str) {
        self.source = Some(source.to_string());
    }

    /// Register a function under `name`, replacing any existing definition.
    pub fn set_function(&mut self, name: &str, function: Function) {
        if self.functions.insert(name.to_string(), function).is_some() {
            tracing::debug!(name, "replaced function definition");
        } else {
            tracing::debug!(name, "registered function");
        }
    }

    /// Fetch a function descriptor from a URL and register it under `name`.
    ///
    /// The mapping is only touched after the fetch and parse succeed.
    pub async fn set_function_from_url(
        &mut self,
        name: &str,
        url: &str,
        timeout: Duration,
    ) -> Result<(), FetchError> {
        let function = Function::from_url(url, timeout).await?;
        self.set_function(name, function);
        Ok(())
    }

    /// Register a workflow under `name` referencing a pipeline definition
    /// file, replacing any existing entry.
    ///
    /// The file contents are not validated here; the external compiler
    /// validates the pipeline graph at submission time.
    pub fn set_workflow(&mut self, name: &str, code_path: &str) {
        self.workflows
            .insert(name.to_string(), Workflow::new(code_path));
        tracing::debug!(name, code = code_path, "registered workflow");
    }

    /// Look up a registered function.
    pub fn function(&self, name: &str) -> Result<&Function, RegistryError> {
        self.functions
            .get(name)
            .ok_or_else(|| RegistryError::FunctionNotFound(name.to_string()))
    }

    /// Look up a registered workflow.
    pub fn workflow(&self, name: &str) -> Result<&Workflow, RegistryError> {
        self.workflows
            .get(name)
            .ok_or_else(|| RegistryError::WorkflowNotFound(name.to_string()))
    }

    /// Number of registered functions.
    pub fn function_count(&self) -> usize {
        self.functions.len()
    }

    /// Number of registered workflows.
    pub fn workflow_count(&self) -> usize {
        self.workflows.len()
    }

    /// Produce the canonical document for the current registry state.
    pub fn document(&self) -> ProjectDocument {
        ProjectDocument {
            name: self.name.clone(),
            created: self.created.clone(),
            source: self.source.clone(),
            remote: self.remote.clone(),
            functions: self
                .functions
                .iter()
                .map(|(name, spec)| FunctionEntry {
                    name: name.clone(),
                    spec: spec.clone(),
                })
                .collect(),
            workflows: self
                .workflows
                .iter()
                .map(|(name, wf)| WorkflowEntry {
                    name: name.clone(),
                    code: wf.code.clone(),
                })
                .collect(),
        }
    }

    /// Serialize the registry to its canonical YAML form.
    ///
    /// Deterministic: identical registry contents yield byte-identical
    /// output.
    pub fn serialize(&self) -> Result<String, RegistryError> {
        Ok(serde_yaml::to_string(&self.document())?)
    }

    /// Submit the named workflow to the execution engine.
    ///
    /// Looks up the workflow, then delegates to the submission client. Local
    /// state is not touched; the returned identifier is the caller's only
    /// handle on the run.
    ///
    /// # Errors
    ///
    /// Fails with `RegistryError::WorkflowNotFound` (without contacting the
    /// engine) when the workflow is not registered, or with a
    /// `SubmissionError` from the engine call.
    pub async fn run(
        &self,
        workflow_name: &str,
        arguments: IndexMap<String, serde_json::Value>,
        artifact_path: &str,
        backend: &dyn PipelineBackend,
    ) -> Result<String, RunError> {
        let workflow = self.workflow(workflow_name)?;

        let request = SubmitRequest {
            project: self.name.clone(),
            workflow: workflow_name.to_string(),
            code: workflow.code.clone(),
            arguments,
            artifact_path: artifact_path.to_string(),
        };

        let run_id = backend.submit(request).await?;
        tracing::info!(workflow = workflow_name, run_id = %run_id, "workflow submitted");
        Ok(run_id)
    }

    /// Submit the named function's spec to the engine's remote builder and
    /// record the reported state and image.
    ///
    /// The local function entry is only updated after the remote call
    /// succeeds.
    pub async fn deploy_function(
        &mut self,
        name: &str,
        backend: &dyn PipelineBackend,
    ) -> Result<BuildStatus, RunError> {
        let function = self.function(name)?.clone();
        let status = backend.build_function(&function).await?;

        let entry = self
            .functions
            .get_mut(name)
            .ok_or_else(|| RegistryError::FunctionNotFound(name.to_string()))?;
        entry.build_state = Some(status.state.clone());
        if let Some(image) = &status.image {
            entry.image = image.clone();
        }

        tracing::info!(function = name, state = %status.state, "remote build submitted");
        Ok(status)
    }

    /// Associate a remote repository URL with the project.
    ///
    /// Policy: a differing existing remote is rejected with
    /// `SyncError::RemoteConflict`; re-setting the same URL is a no-op.
    pub async fn create_remote(&mut self, url: &str) -> Result<(), SyncError> {
        GitRepo::new(&self.working_dir).set_remote(url).await?;
        self.remote = Some(url.to_string());
        Ok(())
    }

    /// Fetch and merge remote content into the working directory.
    pub async fn pull(&self, branch: &str) -> Result<(), SyncError> {
        self.require_remote()?;
        GitRepo::new(&self.working_dir).pull(branch).await
    }

    /// Commit and push the project document plus `extra_files` to `branch`.
    ///
    /// The document is re-serialized first so the pushed state always
    /// matches the in-memory registry. In-memory mappings are never mutated
    /// here, so a failed push leaves the registry unchanged.
    pub async fn push(
        &self,
        branch: &str,
        message: &str,
        extra_files: &[String],
    ) -> Result<(), SyncError> {
        self.require_remote()?;
        self.save().map_err(|e| SyncError::Persist(e.to_string()))?;

        let mut files = vec![PROJECT_FILENAME.to_string()];
        files.extend(extra_files.iter().cloned());

        GitRepo::new(&self.working_dir)
            .push(branch, message, &files)
            .await
    }

    fn require_remote(&self) -> Result<(), SyncError> {
        if self.remote.is_none() {
            return Err(SyncError::NoRemote);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_project(name: &str) -> Project {
        Project {
            name: name.to_string(),
            working_dir: PathBuf::from("/tmp/mlforge-test"),
            created: None,
            source: None,
            remote: None,
            functions: IndexMap::new(),
            workflows: IndexMap::new(),
        }
    }

    #[test]
    fn test_set_function_last_write_wins() {
        let mut project = test_project("new-project");
        project.set_function("tstfunc", Function::new(FunctionKind::Job, "old.py"));
        project.set_function("tstfunc", Function::new(FunctionKind::Job, "handler.py"));

        assert_eq!(project.function_count(), 1);
        let func = project.function("tstfunc").expect("function should exist");
        assert_eq!(func.command, "handler.py");
    }

    #[test]
    fn test_set_workflow_last_write_wins() {
        let mut project = test_project("new-project");
        project.set_workflow("main", "old.py");
        project.set_workflow("main", "workflow.py");

        assert_eq!(project.workflow_count(), 1);
        let wf = project.workflow("main").expect("workflow should exist");
        assert_eq!(wf.code, "workflow.py");
    }

    #[test]
    fn test_lookup_missing_entries() {
        let project = test_project("new-project");
        assert!(matches!(
            project.function("nope"),
            Err(RegistryError::FunctionNotFound(_))
        ));
        assert!(matches!(
            project.workflow("nope"),
            Err(RegistryError::WorkflowNotFound(_))
        ));
    }

    #[test]
    fn test_serialize_shape() {
        let mut project = test_project("new-project");
        project.set_function("tstfunc", Function::new(FunctionKind::Job, "handler.py"));
        project.set_workflow("main", "workflow.py");

        let yaml = project.serialize().expect("serialization should succeed");
        let doc: ProjectDocument = serde_yaml::from_str(&yaml).expect("parse should succeed");

        assert_eq!(doc.name, "new-project");
        assert_eq!(doc.functions.len(), 1);
        assert_eq!(doc.functions[0].name, "tstfunc");
        assert_eq!(doc.functions[0].spec.kind, FunctionKind::Job);
        assert_eq!(doc.workflows.len(), 1);
        assert_eq!(doc.workflows[0].name, "main");
        assert_eq!(doc.workflows[0].code, "workflow.py");

        // Top-level key order is fixed by the document struct.
        let name_pos = yaml.find("name:").expect("name key");
        let fn_pos = yaml.find("functions:").expect("functions key");
        let wf_pos = yaml.find("workflows:").expect("workflows key");
        assert!(name_pos < fn_pos && fn_pos < wf_pos);
    }

    #[test]
    fn test_serialize_deterministic() {
        let mut project = test_project("new-project");
        project.set_function("b", Function::new(FunctionKind::Job, "b.py"));
        project.set_function("a", Function::new(FunctionKind::Serving, "a.py"));
        project.set_workflow("main", "workflow.py");

        let first = project.serialize().expect("serialization should succeed");
        let second = project.serialize().expect("serialization should succeed");
        assert_eq!(first, second);

        // Registration order is preserved, not sorted.
        let b_pos = first.find("name: b").expect("function b");
        let a_pos = first.find("name: a").expect("function a");
        assert!(b_pos < a_pos);
    }

    #[test]
    fn test_document_roundtrip() {
        let mut project = test_project("new-project");
        project.set_function("tstfunc", Function::new(FunctionKind::Job, "handler.py"));
        project.set_workflow("main", "workflow.py");

        let yaml = project.serialize().expect("serialization should succeed");
        let doc: ProjectDocument = serde_yaml::from_str(&yaml).expect("parse should succeed");
        let restored = Project::from_document(doc, Path::new("/tmp/mlforge-test"));

        assert_eq!(restored.name(), "new-project");
        assert_eq!(restored.serialize().unwrap(), yaml);
    }

    #[tokio::test]
    async fn test_pull_without_remote() {
        let project = test_project("new-project");
        let result = project.pull("main").await;
        assert!(matches!(result, Err(SyncError::NoRemote)));
    }
}
