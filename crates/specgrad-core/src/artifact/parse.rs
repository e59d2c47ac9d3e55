//! Artifact document parsing.
//!
//! The compiled artifact is a JSON object mapping function names to
//! expression trees. The bridge only consumes the document; invoking the
//! compiler that produces it is an external concern.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::artifact::ExprNode;
use crate::error::{BridgeError, BridgeResult};

/// A parsed specification artifact: named functions, each a tree.
///
/// Parsing happens once; the artifact is immutable afterwards and the trees
/// are handed out as `Arc<ExprNode>` so several closures can share one
/// parse. Loading the file is the only I/O in the crate.
#[derive(Debug, Clone)]
pub struct Artifact {
    functions: BTreeMap<String, Arc<ExprNode>>,
}

impl Artifact {
    /// Parses an artifact from its JSON text.
    pub fn from_json_str(raw: &str) -> BridgeResult<Self> {
        let functions: BTreeMap<String, ExprNode> =
            serde_json::from_str(raw).map_err(|e| BridgeError::MalformedArtifact {
                detail: e.to_string(),
            })?;
        Ok(Self::from_functions(functions))
    }

    /// Parses an artifact from an already-deserialized JSON value.
    pub fn from_value(value: serde_json::Value) -> BridgeResult<Self> {
        let functions: BTreeMap<String, ExprNode> =
            serde_json::from_value(value).map_err(|e| BridgeError::MalformedArtifact {
                detail: e.to_string(),
            })?;
        Ok(Self::from_functions(functions))
    }

    /// Reads and parses an artifact file.
    pub fn from_path(path: impl AsRef<Path>) -> BridgeResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| BridgeError::MalformedArtifact {
            detail: format!("cannot read {}: {e}", path.display()),
        })?;
        let artifact = Self::from_json_str(&raw)?;
        debug!(
            path = %path.display(),
            functions = artifact.functions.len(),
            "loaded specification artifact"
        );
        Ok(artifact)
    }

    fn from_functions(functions: BTreeMap<String, ExprNode>) -> Self {
        Self {
            functions: functions
                .into_iter()
                .map(|(name, node)| (name, Arc::new(node)))
                .collect(),
        }
    }

    /// Looks up a named function's tree.
    ///
    /// # Errors
    ///
    /// `UnknownFunction` listing the names the artifact does define.
    pub fn function(&self, name: &str) -> BridgeResult<&Arc<ExprNode>> {
        self.functions
            .get(name)
            .ok_or_else(|| BridgeError::UnknownFunction {
                name: name.to_string(),
                available: self.function_names().map(str::to_string).collect(),
            })
    }

    /// Names of all functions the artifact defines, in sorted order.
    pub fn function_names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    /// Number of functions in the artifact.
    #[must_use]
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// True when the artifact defines no functions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}
