//! Stack lifecycle decisions: create, update, recreate, dry run.

use tracing::{info, warn};

use crate::error::{Result, StackError};
use crate::provider::{
    StackOps, StackParameter, StackStatus, StackTag, StackUpdate, TemplateRef,
};

use super::preview::{self, ChangeSetPreview};
use super::waiter::{CancelFlag, StackWaiter};

/// Desired stack state for one reconcile call.
#[derive(Debug, Clone)]
pub struct StackSpec {
    /// Stack name (unique per account and region).
    pub name: String,
    /// Template location.
    pub template: TemplateRef,
    /// Parameters to apply.
    pub parameters: Vec<StackParameter>,
    /// Tags to apply.
    pub tags: Vec<StackTag>,
}

/// How the reconcile call should treat an existing stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyMode {
    /// Create the stack if absent, otherwise update it in place.
    CreateOrUpdate,
    /// Destroy and recreate the stack.
    Recreate {
        /// Override the protected-stack check.
        force: bool,
    },
    /// Preview the proposed changes without applying anything.
    DryRun,
}

/// Whether the stack is account-level (baseline) or stage-level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackLevel {
    /// Baseline infrastructure shared by all stages of the account.
    Account,
    /// Infrastructure owned by a single stage.
    Stage,
}

/// What a reconcile call did.
#[derive(Debug)]
pub enum StackOutcome {
    /// The stack was created.
    Created,
    /// The stack was updated in place.
    Updated,
    /// The control plane reported nothing to change.
    NoChanges,
    /// The stack was deleted and created again.
    Recreated,
    /// A dry-run preview was produced; nothing was applied.
    Preview(ChangeSetPreview),
}

/// Drives create/update/recreate/dry-run against the stack control plane.
pub struct StackLifecycleManager<'a> {
    /// Stack control plane.
    stacks: &'a dyn StackOps,
    /// Waiter used for the long-running transitions.
    waiter: StackWaiter<'a>,
}

impl<'a> StackLifecycleManager<'a> {
    /// Creates a lifecycle manager.
    #[must_use]
    pub fn new(stacks: &'a dyn StackOps) -> Self {
        Self {
            stacks,
            waiter: StackWaiter::new(stacks),
        }
    }

    /// Replaces the waiter (used to shorten intervals in tests).
    #[must_use]
    pub fn with_waiter(mut self, waiter: StackWaiter<'a>) -> Self {
        self.waiter = waiter;
        self
    }

    /// Reconciles the stack toward `spec` according to `mode`.
    ///
    /// With `asynchronous` set, create/update/delete calls are issued but not
    /// waited on; the caller polls externally.
    ///
    /// # Errors
    ///
    /// Protected-stack violations, baseline recreates, and dry runs against a
    /// missing stack are user input errors raised before any remote mutation.
    /// Remote failures propagate with the underlying cause attached.
    pub async fn reconcile(
        &self,
        spec: &StackSpec,
        mode: ApplyMode,
        level: StackLevel,
        asynchronous: bool,
        cancel: &CancelFlag,
    ) -> Result<StackOutcome> {
        // Account-level teardown is operator-only, no matter what flags were
        // passed.
        if level == StackLevel::Account && matches!(mode, ApplyMode::Recreate { .. }) {
            return Err(StackError::BaselineRecreate.into());
        }

        if mode == ApplyMode::DryRun {
            let preview =
                preview::dry_run(self.stacks, spec, self.waiter.poll_interval(), cancel).await?;
            return Ok(StackOutcome::Preview(preview));
        }

        let existing = self.stacks.describe_stack(&spec.name).await?;

        match (existing, mode) {
            (None, _) => {
                self.create(spec, asynchronous, cancel).await?;
                Ok(StackOutcome::Created)
            }
            (Some(current), ApplyMode::Recreate { force }) => {
                if current.is_protected() && !force {
                    return Err(StackError::Protected {
                        stack_name: spec.name.clone(),
                    }
                    .into());
                }
                self.recreate(spec, asynchronous, cancel).await?;
                Ok(StackOutcome::Recreated)
            }
            (Some(_), _) => self.update(spec, asynchronous, cancel).await,
        }
    }

    async fn create(&self, spec: &StackSpec, asynchronous: bool, cancel: &CancelFlag) -> Result<()> {
        let stack_id = self
            .stacks
            .create_stack(&spec.name, &spec.template, &spec.parameters, &spec.tags)
            .await?;
        info!("creating stack \"{stack_id}\"...");

        if asynchronous {
            return Ok(());
        }

        let status = self.await_terminal(&spec.name, "create", cancel).await?;
        if status == StackStatus::CreateComplete {
            info!("stack \"{}\" created", spec.name);
            Ok(())
        } else {
            Err(StackError::UnexpectedTerminalState {
                stack_name: spec.name.clone(),
                status: status.to_string(),
            }
            .into())
        }
    }

    async fn update(
        &self,
        spec: &StackSpec,
        asynchronous: bool,
        cancel: &CancelFlag,
    ) -> Result<StackOutcome> {
        match self
            .stacks
            .update_stack(&spec.name, &spec.template, &spec.parameters)
            .await?
        {
            StackUpdate::NoChanges => {
                info!("no changes to apply to stack \"{}\"", spec.name);
                Ok(StackOutcome::NoChanges)
            }
            StackUpdate::Updated { stack_id } => {
                info!("updating stack \"{stack_id}\"...");
                if !asynchronous {
                    let status = self.await_terminal(&spec.name, "update", cancel).await?;
                    if status != StackStatus::UpdateComplete {
                        return Err(StackError::UnexpectedTerminalState {
                            stack_name: spec.name.clone(),
                            status: status.to_string(),
                        }
                        .into());
                    }
                    info!("stack \"{}\" updated", spec.name);
                }
                Ok(StackOutcome::Updated)
            }
        }
    }

    async fn recreate(
        &self,
        spec: &StackSpec,
        asynchronous: bool,
        cancel: &CancelFlag,
    ) -> Result<()> {
        warn!("recreating stack \"{}\"", spec.name);
        info!("deleting stack \"{}\"... (this may take a while)", spec.name);
        self.stacks.delete_stack(&spec.name).await?;

        // The delete must finish before the name can be reused, even when the
        // create itself is asynchronous.
        let status = self
            .waiter
            .wait_until(
                &spec.name,
                "delete",
                |s| s.is_none() || s.is_some_and(|s| *s == StackStatus::DeleteFailed),
                cancel,
            )
            .await?;
        if status == Some(StackStatus::DeleteFailed) {
            return Err(StackError::UnexpectedTerminalState {
                stack_name: spec.name.clone(),
                status: StackStatus::DeleteFailed.to_string(),
            }
            .into());
        }
        info!("stack \"{}\" has been deleted", spec.name);

        self.create(spec, asynchronous, cancel).await
    }

    async fn await_terminal(
        &self,
        stack_name: &str,
        operation: &str,
        cancel: &CancelFlag,
    ) -> Result<StackStatus> {
        let status = self
            .waiter
            .wait_until(
                stack_name,
                operation,
                |s| s.is_some_and(StackStatus::is_terminal),
                cancel,
            )
            .await?;
        status.ok_or_else(|| {
            StackError::operation(stack_name, format!("stack disappeared during {operation}"))
                .into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StagehandError;
    use crate::provider::memory::InMemoryStacks;
    use crate::provider::StackDescription;
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn spec(name: &str) -> StackSpec {
        StackSpec {
            name: name.to_string(),
            template: TemplateRef::new("https://objects/templates/master.yaml"),
            parameters: vec![StackParameter::new("Env", "dev")],
            tags: vec![],
        }
    }

    fn existing(name: &str, protected: bool) -> StackDescription {
        let mut tags = vec![];
        if protected {
            tags.push(StackTag::protected());
        }
        StackDescription {
            stack_id: format!("arn:stack/{name}"),
            name: name.to_string(),
            status: StackStatus::CreateComplete,
            parameters: vec![],
            tags,
            outputs: BTreeMap::new(),
        }
    }

    fn manager(stacks: &InMemoryStacks) -> StackLifecycleManager<'_> {
        let waiter = StackWaiter::new(stacks)
            .with_intervals(Duration::from_millis(1), Duration::from_secs(60));
        StackLifecycleManager::new(stacks).with_waiter(waiter)
    }

    #[tokio::test]
    async fn test_absent_stack_is_created_and_waited_on() {
        let stacks = InMemoryStacks::new();
        let outcome = manager(&stacks)
            .reconcile(
                &spec("app-dev"),
                ApplyMode::CreateOrUpdate,
                StackLevel::Stage,
                false,
                &CancelFlag::new(),
            )
            .await
            .unwrap();

        assert!(matches!(outcome, StackOutcome::Created));
        assert_eq!(stacks.create_calls(), 1);
        assert_eq!(stacks.status_of("app-dev"), Some(StackStatus::CreateComplete));
    }

    #[tokio::test]
    async fn test_rerun_with_identical_parameters_is_no_op() {
        let stacks = InMemoryStacks::new();
        let mgr = manager(&stacks);
        let cancel = CancelFlag::new();

        mgr.reconcile(
            &spec("app-dev"),
            ApplyMode::CreateOrUpdate,
            StackLevel::Stage,
            false,
            &cancel,
        )
        .await
        .unwrap();

        // The remote reports "no updates to perform" on the identical rerun.
        stacks.report_no_changes_on_update();
        let outcome = mgr
            .reconcile(
                &spec("app-dev"),
                ApplyMode::CreateOrUpdate,
                StackLevel::Stage,
                false,
                &cancel,
            )
            .await
            .unwrap();

        assert!(matches!(outcome, StackOutcome::NoChanges));
        assert_eq!(stacks.create_calls(), 1);
        assert_eq!(stacks.update_calls(), 1);
    }

    #[tokio::test]
    async fn test_recreate_protected_stack_requires_force() {
        let stacks = InMemoryStacks::new();
        stacks.insert_stack(existing("app-prod", true));

        let err = manager(&stacks)
            .reconcile(
                &spec("app-prod"),
                ApplyMode::Recreate { force: false },
                StackLevel::Stage,
                false,
                &CancelFlag::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            StagehandError::Stack(StackError::Protected { .. })
        ));
        assert_eq!(stacks.delete_calls(), 0);
    }

    #[tokio::test]
    async fn test_recreate_protected_stack_with_force_proceeds() {
        let stacks = InMemoryStacks::new();
        stacks.insert_stack(existing("app-prod", true));

        let outcome = manager(&stacks)
            .reconcile(
                &spec("app-prod"),
                ApplyMode::Recreate { force: true },
                StackLevel::Stage,
                false,
                &CancelFlag::new(),
            )
            .await
            .unwrap();

        assert!(matches!(outcome, StackOutcome::Recreated));
        assert_eq!(stacks.delete_calls(), 1);
        assert_eq!(stacks.create_calls(), 1);
    }

    #[tokio::test]
    async fn test_account_level_recreate_is_always_refused() {
        let stacks = InMemoryStacks::new();
        stacks.insert_stack(existing("app-baseline", false));

        // Even with force, and even though the stack carries no protected tag.
        let err = manager(&stacks)
            .reconcile(
                &spec("app-baseline"),
                ApplyMode::Recreate { force: true },
                StackLevel::Account,
                false,
                &CancelFlag::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            StagehandError::Stack(StackError::BaselineRecreate)
        ));
        assert_eq!(stacks.delete_calls(), 0);
    }
}
