//! Dry-run previews via ephemeral change sets.
//!
//! A change set is created against the current stack, described, diffed, and
//! always deleted afterward — never left behind, whatever happened in
//! between.

use std::time::Duration;

use chrono::Utc;
use tracing::{debug, warn};

use crate::diff::{unified_kv_diff, unified_text_diff};
use crate::error::{Result, StackError, StagehandError};
use crate::provider::types::{parameters_to_map, tags_to_map};
use crate::provider::{ChangeSetStatus, StackDescription, StackOps};

use super::lifecycle::StackSpec;
use super::waiter::CancelFlag;

/// Human-reviewable output of a dry run.
#[derive(Debug, Clone)]
pub struct ChangeSetPreview {
    /// Resource-level changes, verbatim, pretty-printed.
    pub resource_changes: String,
    /// Unified diff of the flattened parameter lists.
    pub parameter_diff: String,
    /// Unified diff of the flattened tag lists.
    pub tag_diff: String,
    /// Unified diff of the raw template bodies.
    pub template_diff: String,
}

/// Runs a dry-run preview of `spec` against the existing stack.
///
/// # Errors
///
/// Returns [`StackError::NoStackForDryRun`] when the stack does not exist
/// (no change set is created in that case), a cancellation error if the
/// signal is raised while waiting, or any control plane failure. The change
/// set is deleted in all of these cases once it has been created.
pub(crate) async fn dry_run(
    stacks: &dyn StackOps,
    spec: &StackSpec,
    poll_interval: Duration,
    cancel: &CancelFlag,
) -> Result<ChangeSetPreview> {
    let Some(current) = stacks.describe_stack(&spec.name).await? else {
        return Err(StackError::NoStackForDryRun {
            stack_name: spec.name.clone(),
        }
        .into());
    };

    // Change set names must be unique per stack and may not contain
    // underscores.
    let change_set_name = format!("{}-{}", spec.name, Utc::now().format("%Y%m%d%H%M%S"))
        .replace('_', "-");

    let change_set_id = stacks
        .create_change_set(
            &spec.name,
            &change_set_name,
            &spec.template,
            &spec.parameters,
            &spec.tags,
        )
        .await?;
    debug!("created change set {change_set_id}");

    let outcome = build_preview(stacks, spec, &current, &change_set_id, poll_interval, cancel)
        .await;

    // Clean up after ourselves regardless of how the preview went; a stale
    // change set left behind blocks nothing but confuses everyone.
    if let Err(err) = stacks.delete_change_set(&spec.name, &change_set_id).await {
        warn!("failed to delete change set {change_set_id}: {err}");
    } else {
        debug!("deleted change set {change_set_id}");
    }

    outcome
}

async fn build_preview(
    stacks: &dyn StackOps,
    spec: &StackSpec,
    current: &StackDescription,
    change_set_id: &str,
    poll_interval: Duration,
    cancel: &CancelFlag,
) -> Result<ChangeSetPreview> {
    let proposal = loop {
        if cancel.is_cancelled() {
            return Err(StackError::Cancelled {
                stack_name: spec.name.clone(),
            }
            .into());
        }

        let description = stacks.describe_change_set(&spec.name, change_set_id).await?;
        if description.status.is_terminal() {
            if description.status == ChangeSetStatus::Failed {
                return Err(StackError::operation(
                    &spec.name,
                    format!(
                        "change set failed: {}",
                        description.status_reason.unwrap_or_default()
                    ),
                )
                .into());
            }
            break description;
        }
        tokio::time::sleep(poll_interval).await;
    };

    let resource_changes = serde_json::to_string_pretty(&proposal.resource_changes)
        .map_err(|e| StagehandError::internal(format!("failed to render changes: {e}")))?;

    let to_label = format!("{}-dry-run", spec.name);
    let parameter_diff = unified_kv_diff(
        &parameters_to_map(&current.parameters),
        &parameters_to_map(&proposal.parameters),
        &current.name,
        &to_label,
    );
    let tag_diff = unified_kv_diff(
        &tags_to_map(&current.tags),
        &tags_to_map(&proposal.tags),
        &current.name,
        &to_label,
    );

    let current_template = stacks.get_template_body(&spec.name, None).await?;
    let proposed_template = stacks
        .get_template_body(&spec.name, Some(change_set_id))
        .await?;
    let template_diff =
        unified_text_diff(&current_template, &proposed_template, &current.name, &to_label);

    Ok(ChangeSetPreview {
        resource_changes,
        parameter_diff,
        tag_diff,
        template_diff,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::memory::InMemoryStacks;
    use crate::provider::{
        ResourceChange, StackParameter, StackStatus, StackTag, TemplateRef,
    };
    use std::collections::BTreeMap;

    fn spec(name: &str) -> StackSpec {
        StackSpec {
            name: name.to_string(),
            template: TemplateRef::new("https://objects/templates/master.yaml"),
            parameters: vec![StackParameter::new("Size", "large")],
            tags: vec![StackTag::new("team", "platform")],
        }
    }

    fn existing(name: &str) -> StackDescription {
        StackDescription {
            stack_id: format!("arn:stack/{name}"),
            name: name.to_string(),
            status: StackStatus::CreateComplete,
            parameters: vec![StackParameter::new("Size", "small")],
            tags: vec![StackTag::new("team", "platform")],
            outputs: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn test_dry_run_without_stack_creates_no_change_set() {
        let stacks = InMemoryStacks::new();

        let err = dry_run(
            &stacks,
            &spec("app-dev"),
            Duration::from_millis(1),
            &CancelFlag::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            crate::error::StagehandError::Stack(StackError::NoStackForDryRun { .. })
        ));
        assert_eq!(stacks.change_sets_created(), 0);
    }

    #[tokio::test]
    async fn test_dry_run_diffs_and_cleans_up() {
        let stacks = InMemoryStacks::new();
        stacks.insert_stack(existing("app-dev"));
        stacks.set_templates("Resources: {}\n", "Resources:\n  Queue: {}\n");
        stacks.set_proposed_changes(vec![ResourceChange {
            action: String::from("Add"),
            logical_id: String::from("Queue"),
            physical_id: None,
            resource_type: String::from("AWS::SQS::Queue"),
            replacement: None,
        }]);

        let preview = dry_run(
            &stacks,
            &spec("app-dev"),
            Duration::from_millis(1),
            &CancelFlag::new(),
        )
        .await
        .unwrap();

        assert!(preview.resource_changes.contains("\"Queue\""));
        assert!(preview.parameter_diff.contains("-Size = small"));
        assert!(preview.parameter_diff.contains("+Size = large"));
        assert_eq!(preview.tag_diff, "");
        assert!(preview.template_diff.contains("+  Queue: {}"));

        // The ephemeral change set is gone even though everything succeeded.
        assert_eq!(stacks.change_sets_created(), 1);
        assert_eq!(stacks.change_sets_deleted(), 1);
    }

    #[tokio::test]
    async fn test_dry_run_cleans_up_when_cancelled() {
        let stacks = InMemoryStacks::new();
        stacks.insert_stack(existing("app-dev"));

        let cancel = CancelFlag::new();
        cancel.cancel();

        let err = dry_run(&stacks, &spec("app-dev"), Duration::from_millis(1), &cancel)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            crate::error::StagehandError::Stack(StackError::Cancelled { .. })
        ));
        assert_eq!(stacks.change_sets_created(), 1);
        assert_eq!(stacks.change_sets_deleted(), 1);
    }
}
