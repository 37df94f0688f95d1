//! Deployment context resolved once per command invocation.
//!
//! A [`DeploymentContext`] is built explicitly at the start of a command and
//! passed by reference into every subsequent call. It is immutable, and its
//! scope is exactly one of account-level or stage-level; the two can never be
//! mixed because the scope is an enum.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::provider::StackOps;

/// Immutable context for one command invocation.
#[derive(Debug, Clone)]
pub struct DeploymentContext {
    /// Moment the context was built.
    timestamp: DateTime<Utc>,
    /// The one scope this invocation operates in.
    scope: ContextScope,
}

/// The scope of a deployment context.
#[derive(Debug, Clone)]
pub enum ContextScope {
    /// Account-level (baseline) scope.
    Account(AccountScope),
    /// Stage-level scope.
    Stage(StageScope),
}

/// Account-level scope data.
#[derive(Debug, Clone)]
pub struct AccountScope {
    /// Account name as defined in the configuration.
    pub name: String,
    /// Resolved account number.
    pub account_number: String,
    /// Default region for the account.
    pub region: String,
    /// Output key/value pairs from the baseline stack.
    pub outputs: BTreeMap<String, String>,
}

/// Stage-level scope data.
#[derive(Debug, Clone)]
pub struct StageScope {
    /// Stage name.
    pub name: String,
    /// Account number the stage deploys into.
    pub account_number: String,
    /// Region the stage deploys into.
    pub region: String,
    /// Output key/value pairs from the stage's stack.
    pub outputs: BTreeMap<String, String>,
}

impl DeploymentContext {
    /// Builds an account-scoped context.
    #[must_use]
    pub fn account_scoped(scope: AccountScope) -> Self {
        Self {
            timestamp: Utc::now(),
            scope: ContextScope::Account(scope),
        }
    }

    /// Builds a stage-scoped context.
    #[must_use]
    pub fn stage_scoped(scope: StageScope) -> Self {
        Self {
            timestamp: Utc::now(),
            scope: ContextScope::Stage(scope),
        }
    }

    /// The moment the context was built.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Compact timestamp suitable for resource name suffixes.
    #[must_use]
    pub fn timestamp_compact(&self) -> String {
        self.timestamp.format("%Y%m%d%H%M%S").to_string()
    }

    /// The scope of this invocation.
    #[must_use]
    pub const fn scope(&self) -> &ContextScope {
        &self.scope
    }

    /// Resolved account number.
    #[must_use]
    pub fn account_number(&self) -> &str {
        match &self.scope {
            ContextScope::Account(a) => &a.account_number,
            ContextScope::Stage(s) => &s.account_number,
        }
    }

    /// Region this invocation operates in.
    #[must_use]
    pub fn region(&self) -> &str {
        match &self.scope {
            ContextScope::Account(a) => &a.region,
            ContextScope::Stage(s) => &s.region,
        }
    }

    /// Stage name, when stage-scoped.
    #[must_use]
    pub fn stage_name(&self) -> Option<&str> {
        match &self.scope {
            ContextScope::Account(_) => None,
            ContextScope::Stage(s) => Some(&s.name),
        }
    }

    /// Prior-stack output key/value pairs for this scope.
    #[must_use]
    pub fn outputs(&self) -> &BTreeMap<String, String> {
        match &self.scope {
            ContextScope::Account(a) => &a.outputs,
            ContextScope::Stage(s) => &s.outputs,
        }
    }
}

/// Fetches the output key/value pairs of a prior stack.
///
/// A stack that does not exist yet contributes no outputs; that is normal on
/// first deployment, not an error.
///
/// # Errors
///
/// Returns an error if the control plane call fails.
pub async fn gather_stack_outputs(
    stacks: &dyn StackOps,
    stack_name: &str,
) -> Result<BTreeMap<String, String>> {
    Ok(stacks
        .describe_stack(stack_name)
        .await?
        .map(|d| d.outputs)
        .unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::memory::InMemoryStacks;
    use crate::provider::{StackDescription, StackStatus};

    #[test]
    fn test_stage_scope_accessors() {
        let ctx = DeploymentContext::stage_scoped(StageScope {
            name: String::from("dev"),
            account_number: String::from("123456789012"),
            region: String::from("us-west-2"),
            outputs: BTreeMap::from([(String::from("BucketName"), String::from("builds"))]),
        });

        assert_eq!(ctx.stage_name(), Some("dev"));
        assert_eq!(ctx.account_number(), "123456789012");
        assert_eq!(ctx.region(), "us-west-2");
        assert_eq!(ctx.outputs().get("BucketName").map(String::as_str), Some("builds"));
    }

    #[test]
    fn test_account_scope_has_no_stage_name() {
        let ctx = DeploymentContext::account_scoped(AccountScope {
            name: String::from("main"),
            account_number: String::from("123456789012"),
            region: String::from("us-east-1"),
            outputs: BTreeMap::new(),
        });

        assert!(ctx.stage_name().is_none());
        assert_eq!(ctx.region(), "us-east-1");
    }

    #[tokio::test]
    async fn test_gather_outputs_from_missing_stack_is_empty() {
        let stacks = InMemoryStacks::new();
        let outputs = gather_stack_outputs(&stacks, "app-dev").await.unwrap();
        assert!(outputs.is_empty());
    }

    #[tokio::test]
    async fn test_gather_outputs_from_existing_stack() {
        let stacks = InMemoryStacks::new();
        stacks.insert_stack(StackDescription {
            stack_id: String::from("id"),
            name: String::from("app-dev"),
            status: StackStatus::CreateComplete,
            parameters: vec![],
            tags: vec![],
            outputs: BTreeMap::from([(String::from("ApiUrl"), String::from("https://x"))]),
        });

        let outputs = gather_stack_outputs(&stacks, "app-dev").await.unwrap();
        assert_eq!(outputs.get("ApiUrl").map(String::as_str), Some("https://x"));
    }
}
