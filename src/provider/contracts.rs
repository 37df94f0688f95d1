//! Async trait contracts for the remote control planes.
//!
//! Pagination is deliberately exposed one page at a time: the callers that
//! must fully drain a listing (the version ledger, the parameter copier) own
//! their drain loops, so that correctness lives in testable core code rather
//! than inside an adapter.

use async_trait::async_trait;

use crate::error::Result;

use super::types::{
    ChangeSetDescription, FunctionCode, FunctionDescription, FunctionSpec, ParameterKind,
    ParameterPage, RouteMapping, StackDescription, StackParameter, StackTag, StackUpdate,
    TemplateRef, VersionPage,
};

/// Infrastructure stack control plane.
#[async_trait]
pub trait StackOps: Send + Sync {
    /// Describes a stack, returning `None` if it does not exist.
    async fn describe_stack(&self, stack_name: &str) -> Result<Option<StackDescription>>;

    /// Issues a stack create and returns the assigned stack identifier.
    async fn create_stack(
        &self,
        stack_name: &str,
        template: &TemplateRef,
        parameters: &[StackParameter],
        tags: &[StackTag],
    ) -> Result<String>;

    /// Issues a stack update.
    ///
    /// A remote "no updates to perform" reply is classified here as
    /// [`StackUpdate::NoChanges`] rather than an error.
    async fn update_stack(
        &self,
        stack_name: &str,
        template: &TemplateRef,
        parameters: &[StackParameter],
    ) -> Result<StackUpdate>;

    /// Issues a stack delete.
    async fn delete_stack(&self, stack_name: &str) -> Result<()>;

    /// Creates a change set against an existing stack and returns its id.
    async fn create_change_set(
        &self,
        stack_name: &str,
        change_set_name: &str,
        template: &TemplateRef,
        parameters: &[StackParameter],
        tags: &[StackTag],
    ) -> Result<String>;

    /// Describes a change set.
    async fn describe_change_set(
        &self,
        stack_name: &str,
        change_set_id: &str,
    ) -> Result<ChangeSetDescription>;

    /// Deletes a change set.
    async fn delete_change_set(&self, stack_name: &str, change_set_id: &str) -> Result<()>;

    /// Fetches the raw template body of a stack or, when a change set id is
    /// given, of the proposal held by that change set.
    async fn get_template_body(
        &self,
        stack_name: &str,
        change_set_id: Option<&str>,
    ) -> Result<String>;
}

/// Compute function control plane.
#[async_trait]
pub trait FunctionOps: Send + Sync {
    /// Gets a function description, returning `None` if it does not exist.
    ///
    /// When `qualifier` is given, the description is resolved through that
    /// alias or version.
    async fn get_function(
        &self,
        function_name: &str,
        qualifier: Option<&str>,
    ) -> Result<Option<FunctionDescription>>;

    /// Lists one page of published version labels.
    ///
    /// An unknown function yields an empty page, not an error.
    async fn list_versions(
        &self,
        function_name: &str,
        marker: Option<&str>,
    ) -> Result<VersionPage>;

    /// Creates the function with code and configuration, publishing the
    /// first immutable version, and returns the assigned version label.
    async fn create_function(&self, spec: &FunctionSpec, code: &FunctionCode) -> Result<String>;

    /// Updates the mutable head's code.
    async fn update_function_code(&self, function_name: &str, code: &FunctionCode) -> Result<()>;

    /// Updates the mutable head's runtime configuration.
    async fn update_function_configuration(&self, spec: &FunctionSpec) -> Result<()>;

    /// Publishes the mutable head as a new immutable version and returns the
    /// assigned version label.
    async fn publish_version(&self, function_name: &str) -> Result<String>;

    /// Gets the version an alias points at, or `None` if the alias does not
    /// exist.
    async fn get_alias(&self, function_name: &str, alias: &str) -> Result<Option<String>>;

    /// Creates an alias pointing at the given version.
    async fn create_alias(&self, function_name: &str, alias: &str, version: &str) -> Result<()>;

    /// Repoints an existing alias at the given version.
    async fn update_alias(&self, function_name: &str, alias: &str, version: &str) -> Result<()>;
}

/// Hierarchical key/value parameter store.
#[async_trait]
pub trait ParameterOps: Send + Sync {
    /// Lists one page of parameters stored directly under a path.
    async fn list_parameters(&self, path: &str, next_token: Option<&str>)
        -> Result<ParameterPage>;

    /// Writes a parameter, optionally overwriting an existing value.
    async fn put_parameter(
        &self,
        name: &str,
        value: &str,
        kind: ParameterKind,
        overwrite: bool,
    ) -> Result<()>;
}

/// API routing control plane.
///
/// There is deliberately no update primitive: the underlying provider does
/// not support one, which is what forces the manual-intervention branch in
/// the reconciler.
#[async_trait]
pub trait RouteOps: Send + Sync {
    /// Lists all base-path mappings configured under a domain.
    async fn list_mappings(&self, domain: &str) -> Result<Vec<RouteMapping>>;

    /// Creates a new base-path mapping under a domain.
    async fn create_mapping(&self, domain: &str, mapping: &RouteMapping) -> Result<()>;
}

/// Object store used to stage artifacts.
#[async_trait]
pub trait ObjectOps: Send + Sync {
    /// Uploads an object.
    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()>;

    /// Downloads an object.
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>>;

    /// Creates the bucket if it does not already exist.
    async fn ensure_bucket(&self, bucket: &str, region: &str) -> Result<()>;
}
