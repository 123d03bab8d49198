//! Workflow references registered under a project.

use serde::{Deserialize, Serialize};

/// A named reference to a pipeline definition file.
///
/// The file contains a directed graph of function invocations expressed in
/// the external compiler's format; the registry never parses it. Validation
/// happens engine-side at submission time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workflow {
    /// Path to the pipeline definition file, relative to the project root.
    pub code: String,
}

impl Workflow {
    pub fn new(code: &str) -> Self {
        Self {
            code: code.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workflow_serialization() {
        let wf = Workflow::new("workflow.py");
        let yaml = serde_yaml::to_string(&wf).expect("serialization should succeed");
        assert_eq!(yaml, "code: workflow.py\n");
    }
}
