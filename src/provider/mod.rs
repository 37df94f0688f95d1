//! Capability contracts for the remote control planes.
//!
//! Stagehand never talks to a vendor SDK directly from its core logic. Each
//! collaborator (infrastructure stacks, compute functions, the parameter
//! namespace, API routing, object storage) is an async trait defined here,
//! with AWS-backed implementations in [`crate::aws`] and in-memory
//! implementations for tests in [`memory`].

pub mod contracts;
pub mod memory;
pub mod types;

pub use contracts::{FunctionOps, ObjectOps, ParameterOps, RouteOps, StackOps};
pub use types::{
    ChangeSetDescription, ChangeSetStatus, FunctionCode, FunctionDescription, FunctionSpec,
    ParameterKind, ParameterPage, ResourceChange, RouteMapping, SecretsEncryption,
    StackDescription, StackParameter, StackStatus, StackTag, StackUpdate, StoredParameter,
    TemplateRef, VersionPage, CONFIG_POINTER_ENV_VAR, CREATED_WITH_TAG_KEY,
    EMPTY_BASE_PATH_SENTINEL, PROTECTED_TAG_KEY, PROTECTED_TAG_VALUE,
    UNPUBLISHED_VERSION_LABEL,
};
