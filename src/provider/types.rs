//! Domain types shared by the capability contracts.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Reserved version label for the mutable, unpublished head of a function.
///
/// The version ledger skips this label when computing the next version.
pub const UNPUBLISHED_VERSION_LABEL: &str = "$LATEST";

/// Tag key marking a stack as protected from recreate.
pub const PROTECTED_TAG_KEY: &str = "stagehand:protected";

/// Tag value marking a stack as protected from recreate.
pub const PROTECTED_TAG_VALUE: &str = "true";

/// Tag key recording the orchestrator version that created a stack.
pub const CREATED_WITH_TAG_KEY: &str = "stagehand:created-with-version";

/// Environment variable set on released functions to point at the
/// version-qualified configuration namespace path.
pub const CONFIG_POINTER_ENV_VAR: &str = "SSM_CONFIG_VERSION";

/// Sentinel value the routing control plane reports for an empty base path.
pub const EMPTY_BASE_PATH_SENTINEL: &str = "(none)";

/// Remote lifecycle status of an infrastructure stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackStatus {
    /// Create is in progress.
    CreateInProgress,
    /// Create finished successfully.
    CreateComplete,
    /// Create failed.
    CreateFailed,
    /// Update is in progress.
    UpdateInProgress,
    /// Update finished successfully.
    UpdateComplete,
    /// Update failed and was rolled back.
    UpdateRollbackComplete,
    /// Delete is in progress.
    DeleteInProgress,
    /// Delete finished successfully.
    DeleteComplete,
    /// Delete failed.
    DeleteFailed,
    /// Create failed and was rolled back.
    RollbackComplete,
    /// Rollback is in progress.
    RollbackInProgress,
    /// Any other status reported by the control plane.
    Other(String),
}

impl StackStatus {
    /// Parses a status from the control plane's wire representation.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw {
            "CREATE_IN_PROGRESS" => Self::CreateInProgress,
            "CREATE_COMPLETE" => Self::CreateComplete,
            "CREATE_FAILED" => Self::CreateFailed,
            "UPDATE_IN_PROGRESS" => Self::UpdateInProgress,
            "UPDATE_COMPLETE" => Self::UpdateComplete,
            "UPDATE_ROLLBACK_COMPLETE" => Self::UpdateRollbackComplete,
            "DELETE_IN_PROGRESS" => Self::DeleteInProgress,
            "DELETE_COMPLETE" => Self::DeleteComplete,
            "DELETE_FAILED" => Self::DeleteFailed,
            "ROLLBACK_COMPLETE" => Self::RollbackComplete,
            "ROLLBACK_IN_PROGRESS" => Self::RollbackInProgress,
            other => Self::Other(other.to_string()),
        }
    }

    /// Returns true if no further transition will happen without operator
    /// intervention.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(
            self,
            Self::CreateInProgress
                | Self::UpdateInProgress
                | Self::DeleteInProgress
                | Self::RollbackInProgress
        )
    }
}

impl std::fmt::Display for StackStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::CreateInProgress => "CREATE_IN_PROGRESS",
            Self::CreateComplete => "CREATE_COMPLETE",
            Self::CreateFailed => "CREATE_FAILED",
            Self::UpdateInProgress => "UPDATE_IN_PROGRESS",
            Self::UpdateComplete => "UPDATE_COMPLETE",
            Self::UpdateRollbackComplete => "UPDATE_ROLLBACK_COMPLETE",
            Self::DeleteInProgress => "DELETE_IN_PROGRESS",
            Self::DeleteComplete => "DELETE_COMPLETE",
            Self::DeleteFailed => "DELETE_FAILED",
            Self::RollbackComplete => "ROLLBACK_COMPLETE",
            Self::RollbackInProgress => "ROLLBACK_IN_PROGRESS",
            Self::Other(other) => other.as_str(),
        };
        write!(f, "{s}")
    }
}

/// A single key/value stack parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackParameter {
    /// Parameter key.
    pub key: String,
    /// Parameter value.
    pub value: String,
}

impl StackParameter {
    /// Creates a parameter.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A single key/value stack tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackTag {
    /// Tag key.
    pub key: String,
    /// Tag value.
    pub value: String,
}

impl StackTag {
    /// Creates a tag.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// The tag marking a stack as protected.
    #[must_use]
    pub fn protected() -> Self {
        Self::new(PROTECTED_TAG_KEY, PROTECTED_TAG_VALUE)
    }
}

/// Flattens a parameter list into a sorted key/value map.
#[must_use]
pub fn parameters_to_map(parameters: &[StackParameter]) -> BTreeMap<String, String> {
    parameters
        .iter()
        .map(|p| (p.key.clone(), p.value.clone()))
        .collect()
}

/// Flattens a tag list into a sorted key/value map.
#[must_use]
pub fn tags_to_map(tags: &[StackTag]) -> BTreeMap<String, String> {
    tags.iter().map(|t| (t.key.clone(), t.value.clone())).collect()
}

/// Location of a stack template document.
///
/// Templates are always referenced by location, never embedded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateRef {
    /// URL of the template document in object storage.
    pub url: String,
}

impl TemplateRef {
    /// Creates a template reference from a URL.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

/// Description of an existing remote stack.
#[derive(Debug, Clone)]
pub struct StackDescription {
    /// Stack identifier assigned by the control plane.
    pub stack_id: String,
    /// Stack name.
    pub name: String,
    /// Current lifecycle status.
    pub status: StackStatus,
    /// Current parameters.
    pub parameters: Vec<StackParameter>,
    /// Current tags.
    pub tags: Vec<StackTag>,
    /// Output key/value pairs.
    pub outputs: BTreeMap<String, String>,
}

impl StackDescription {
    /// Returns true if the stack carries the protected tag.
    #[must_use]
    pub fn is_protected(&self) -> bool {
        self.tags
            .iter()
            .any(|t| t.key == PROTECTED_TAG_KEY && t.value == PROTECTED_TAG_VALUE)
    }
}

/// Outcome of an update request, classified at the adapter seam.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackUpdate {
    /// The update was accepted and is in progress.
    Updated {
        /// Stack identifier assigned by the control plane.
        stack_id: String,
    },
    /// The control plane reported that there is nothing to change.
    NoChanges,
}

/// Lifecycle status of a change set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeSetStatus {
    /// Still being computed.
    CreateInProgress,
    /// Ready for review.
    CreateComplete,
    /// Computation failed.
    Failed,
    /// Any other status.
    Other(String),
}

impl ChangeSetStatus {
    /// Parses a status from the wire representation.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw {
            "CREATE_IN_PROGRESS" | "CREATE_PENDING" => Self::CreateInProgress,
            "CREATE_COMPLETE" => Self::CreateComplete,
            "FAILED" => Self::Failed,
            other => Self::Other(other.to_string()),
        }
    }

    /// Returns true if the change set will not transition further.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::CreateInProgress)
    }
}

/// One resource-level change proposed by a change set, reported verbatim.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceChange {
    /// Action the control plane would take (Add, Modify, Remove).
    pub action: String,
    /// Logical identifier of the resource within the template.
    pub logical_id: String,
    /// Physical identifier, when the resource already exists.
    pub physical_id: Option<String>,
    /// Resource type.
    pub resource_type: String,
    /// Whether the change would replace the resource.
    pub replacement: Option<String>,
}

/// Description of an ephemeral change set.
#[derive(Debug, Clone)]
pub struct ChangeSetDescription {
    /// Change set identifier.
    pub id: String,
    /// Change set name.
    pub name: String,
    /// Current status.
    pub status: ChangeSetStatus,
    /// Reason attached to the status, if any.
    pub status_reason: Option<String>,
    /// Proposed resource-level changes.
    pub resource_changes: Vec<ResourceChange>,
    /// Parameters the change set would apply.
    pub parameters: Vec<StackParameter>,
    /// Tags the change set would apply.
    pub tags: Vec<StackTag>,
}

/// One page of published function version labels.
#[derive(Debug, Clone, Default)]
pub struct VersionPage {
    /// Version labels on this page, as reported by the control plane.
    pub versions: Vec<String>,
    /// Continuation marker for the next page, if any.
    pub next_marker: Option<String>,
}

/// Code reference for a function release.
#[derive(Debug, Clone)]
pub enum FunctionCode {
    /// Inline archive contents.
    Zip(Vec<u8>),
    /// Pointer to an archive staged in object storage.
    ObjectRef {
        /// Bucket holding the archive.
        bucket: String,
        /// Key of the archive.
        key: String,
    },
}

/// Runtime configuration for a compute function.
#[derive(Debug, Clone)]
pub struct FunctionSpec {
    /// Unique function name.
    pub name: String,
    /// Runtime identifier.
    pub runtime: String,
    /// Handler entry point.
    pub handler: String,
    /// Execution role reference.
    pub role: String,
    /// Memory limit in megabytes.
    pub memory_mb: Option<i32>,
    /// Timeout in seconds.
    pub timeout_secs: Option<i32>,
    /// Environment variables.
    pub environment: BTreeMap<String, String>,
    /// Human-readable description.
    pub description: Option<String>,
}

/// Description of an existing remote function (optionally alias-qualified).
#[derive(Debug, Clone)]
pub struct FunctionDescription {
    /// Function name.
    pub name: String,
    /// Version label of the described configuration.
    pub version: Option<String>,
    /// Runtime identifier.
    pub runtime: Option<String>,
    /// Memory limit in megabytes.
    pub memory_mb: Option<i32>,
    /// Timeout in seconds.
    pub timeout_secs: Option<i32>,
    /// Human-readable description.
    pub description: Option<String>,
    /// Environment variables.
    pub environment: BTreeMap<String, String>,
}

/// Secret/plaintext classification of a stored parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterKind {
    /// Stored in plaintext.
    Plain,
    /// Stored encrypted.
    Secret,
}

/// A parameter as stored in the hierarchical namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredParameter {
    /// Fully qualified parameter path.
    pub name: String,
    /// Parameter value.
    pub value: String,
    /// Classification.
    pub kind: ParameterKind,
}

/// One page of parameters listed under a path.
#[derive(Debug, Clone, Default)]
pub struct ParameterPage {
    /// Parameters on this page.
    pub parameters: Vec<StoredParameter>,
    /// Continuation token for the next page, if any.
    pub next_token: Option<String>,
}

/// A (base-path → backend, stage) mapping under a custom domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMapping {
    /// Base path, with the empty string denoting the root.
    pub base_path: String,
    /// Backend identifier the path routes to.
    pub backend_id: String,
    /// Backend stage the path routes to.
    pub stage: String,
}

/// Optional secrets-encryption capability for the parameter store.
///
/// Injected where needed; `NotConfigured` uses the store's default key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SecretsEncryption {
    /// No customer-managed key configured.
    #[default]
    NotConfigured,
    /// Encrypt secret parameters with this customer-managed key.
    CustomerKey(String),
}

impl SecretsEncryption {
    /// Returns the configured key identifier, if any.
    #[must_use]
    pub fn key_id(&self) -> Option<&str> {
        match self {
            Self::NotConfigured => None,
            Self::CustomerKey(key) => Some(key.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_status_parse_round_trip() {
        let status = StackStatus::parse("UPDATE_COMPLETE");
        assert_eq!(status, StackStatus::UpdateComplete);
        assert_eq!(status.to_string(), "UPDATE_COMPLETE");
    }

    #[test]
    fn test_in_progress_statuses_are_not_terminal() {
        assert!(!StackStatus::CreateInProgress.is_terminal());
        assert!(!StackStatus::DeleteInProgress.is_terminal());
        assert!(StackStatus::CreateComplete.is_terminal());
        assert!(StackStatus::Other(String::from("IMPORT_COMPLETE")).is_terminal());
    }

    #[test]
    fn test_protected_detection_requires_exact_tag() {
        let mut stack = StackDescription {
            stack_id: String::from("id"),
            name: String::from("app-dev"),
            status: StackStatus::CreateComplete,
            parameters: vec![],
            tags: vec![StackTag::new(PROTECTED_TAG_KEY, "false")],
            outputs: BTreeMap::new(),
        };
        assert!(!stack.is_protected());

        stack.tags.push(StackTag::protected());
        assert!(stack.is_protected());
    }
}
