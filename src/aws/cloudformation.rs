//! CloudFormation-backed stack control plane.

use async_trait::async_trait;
use aws_sdk_cloudformation::error::ProvideErrorMetadata;
use aws_sdk_cloudformation::types::{Capability, ChangeSetType, Parameter, Tag};
use aws_sdk_cloudformation::Client;
use tracing::debug;

use crate::error::{Result, StackError, StagehandError};
use crate::provider::{
    ChangeSetDescription, ChangeSetStatus, ResourceChange, StackDescription, StackOps,
    StackParameter, StackStatus, StackTag, StackUpdate, TemplateRef,
};

/// Stack control plane backed by CloudFormation.
#[derive(Debug, Clone)]
pub struct CloudFormationStacks {
    /// SDK client.
    client: Client,
}

impl CloudFormationStacks {
    /// Creates an adapter from a resolved session.
    #[must_use]
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }

    fn wire_parameters(parameters: &[StackParameter]) -> Vec<Parameter> {
        parameters
            .iter()
            .map(|p| {
                Parameter::builder()
                    .parameter_key(&p.key)
                    .parameter_value(&p.value)
                    .build()
            })
            .collect()
    }

    fn wire_tags(tags: &[StackTag]) -> Vec<Tag> {
        // Key and value are always set, so the builder cannot actually fail.
        tags.iter()
            .map(|t| Tag::builder().key(&t.key).value(&t.value).build())
            .collect()
    }
}

fn domain_parameters(parameters: &[Parameter]) -> Vec<StackParameter> {
    parameters
        .iter()
        .map(|p| {
            StackParameter::new(
                p.parameter_key().unwrap_or_default(),
                p.parameter_value().unwrap_or_default(),
            )
        })
        .collect()
}

fn domain_tags(tags: &[Tag]) -> Vec<StackTag> {
    tags.iter()
        .map(|t| StackTag::new(t.key().unwrap_or_default(), t.value().unwrap_or_default()))
        .collect()
}

#[async_trait]
impl StackOps for CloudFormationStacks {
    async fn describe_stack(&self, stack_name: &str) -> Result<Option<StackDescription>> {
        let result = self
            .client
            .describe_stacks()
            .stack_name(stack_name)
            .send()
            .await;

        let output = match result {
            Ok(output) => output,
            Err(sdk_err) => {
                let service_err = sdk_err.into_service_error();
                // The control plane reports a missing stack as a validation
                // error whose message names the stack.
                if service_err
                    .message()
                    .unwrap_or_default()
                    .contains("does not exist")
                {
                    debug!("stack \"{stack_name}\" does not exist");
                    return Ok(None);
                }
                return Err(StackError::operation(stack_name, service_err.to_string()).into());
            }
        };

        let Some(stack) = output.stacks().first() else {
            return Ok(None);
        };

        let status =
            StackStatus::parse(stack.stack_status().map(|s| s.as_str()).unwrap_or_default());

        let outputs = stack
            .outputs()
            .iter()
            .filter_map(|o| {
                Some((o.output_key()?.to_string(), o.output_value()?.to_string()))
            })
            .collect();

        Ok(Some(StackDescription {
            stack_id: stack.stack_id().unwrap_or_default().to_string(),
            name: stack.stack_name().unwrap_or_default().to_string(),
            status,
            parameters: domain_parameters(stack.parameters()),
            tags: domain_tags(stack.tags()),
            outputs,
        }))
    }

    async fn create_stack(
        &self,
        stack_name: &str,
        template: &TemplateRef,
        parameters: &[StackParameter],
        tags: &[StackTag],
    ) -> Result<String> {
        let output = self
            .client
            .create_stack()
            .stack_name(stack_name)
            .template_url(&template.url)
            .set_parameters(Some(Self::wire_parameters(parameters)))
            .set_tags(Some(Self::wire_tags(tags)))
            .capabilities(Capability::CapabilityIam)
            .capabilities(Capability::CapabilityNamedIam)
            .send()
            .await
            .map_err(|e| classify_mutation_error(stack_name, e.into_service_error()))?;

        Ok(output.stack_id().unwrap_or_default().to_string())
    }

    async fn update_stack(
        &self,
        stack_name: &str,
        template: &TemplateRef,
        parameters: &[StackParameter],
    ) -> Result<StackUpdate> {
        let result = self
            .client
            .update_stack()
            .stack_name(stack_name)
            .template_url(&template.url)
            .set_parameters(Some(Self::wire_parameters(parameters)))
            .capabilities(Capability::CapabilityIam)
            .capabilities(Capability::CapabilityNamedIam)
            .send()
            .await;

        match result {
            Ok(output) => Ok(StackUpdate::Updated {
                stack_id: output.stack_id().unwrap_or_default().to_string(),
            }),
            Err(sdk_err) => {
                let service_err = sdk_err.into_service_error();
                // "Nothing changed" arrives dressed up as a validation
                // error; it is a success from the caller's point of view.
                if service_err
                    .message()
                    .unwrap_or_default()
                    .contains("No updates are to be performed")
                {
                    return Ok(StackUpdate::NoChanges);
                }
                Err(classify_mutation_error(stack_name, service_err))
            }
        }
    }

    async fn delete_stack(&self, stack_name: &str) -> Result<()> {
        self.client
            .delete_stack()
            .stack_name(stack_name)
            .send()
            .await
            .map_err(|e| {
                StackError::operation(stack_name, e.into_service_error().to_string())
            })?;
        Ok(())
    }

    async fn create_change_set(
        &self,
        stack_name: &str,
        change_set_name: &str,
        template: &TemplateRef,
        parameters: &[StackParameter],
        tags: &[StackTag],
    ) -> Result<String> {
        let output = self
            .client
            .create_change_set()
            .stack_name(stack_name)
            .change_set_name(change_set_name)
            .change_set_type(ChangeSetType::Update)
            .template_url(&template.url)
            .set_parameters(Some(Self::wire_parameters(parameters)))
            .set_tags(Some(Self::wire_tags(tags)))
            .capabilities(Capability::CapabilityIam)
            .capabilities(Capability::CapabilityNamedIam)
            .send()
            .await
            .map_err(|e| classify_mutation_error(stack_name, e.into_service_error()))?;

        Ok(output.id().unwrap_or_default().to_string())
    }

    async fn describe_change_set(
        &self,
        stack_name: &str,
        change_set_id: &str,
    ) -> Result<ChangeSetDescription> {
        let output = self
            .client
            .describe_change_set()
            .stack_name(stack_name)
            .change_set_name(change_set_id)
            .send()
            .await
            .map_err(|e| {
                StackError::operation(stack_name, e.into_service_error().to_string())
            })?;

        let resource_changes = output
            .changes()
            .iter()
            .filter_map(|c| c.resource_change())
            .map(|rc| ResourceChange {
                action: rc
                    .action()
                    .map(|a| a.as_str().to_string())
                    .unwrap_or_default(),
                logical_id: rc.logical_resource_id().unwrap_or_default().to_string(),
                physical_id: rc.physical_resource_id().map(String::from),
                resource_type: rc.resource_type().unwrap_or_default().to_string(),
                replacement: rc.replacement().map(|r| r.as_str().to_string()),
            })
            .collect();

        Ok(ChangeSetDescription {
            id: output.change_set_id().unwrap_or(change_set_id).to_string(),
            name: output.change_set_name().unwrap_or_default().to_string(),
            status: output
                .status()
                .map(|s| ChangeSetStatus::parse(s.as_str()))
                .unwrap_or_else(|| ChangeSetStatus::Other(String::from("UNKNOWN"))),
            status_reason: output.status_reason().map(String::from),
            resource_changes,
            parameters: domain_parameters(output.parameters()),
            tags: domain_tags(output.tags()),
        })
    }

    async fn delete_change_set(&self, stack_name: &str, change_set_id: &str) -> Result<()> {
        self.client
            .delete_change_set()
            .stack_name(stack_name)
            .change_set_name(change_set_id)
            .send()
            .await
            .map_err(|e| {
                StackError::operation(stack_name, e.into_service_error().to_string())
            })?;
        Ok(())
    }

    async fn get_template_body(
        &self,
        stack_name: &str,
        change_set_id: Option<&str>,
    ) -> Result<String> {
        let mut request = self.client.get_template().stack_name(stack_name);
        if let Some(id) = change_set_id {
            request = request.change_set_name(id);
        }

        let output = request.send().await.map_err(|e| {
            StackError::operation(stack_name, e.into_service_error().to_string())
        })?;

        Ok(output.template_body().unwrap_or_default().to_string())
    }
}

/// Maps a stack mutation failure onto the error taxonomy: request-validation
/// rejections are user errors and are never retried; everything else is a
/// remote operation failure carrying its cause.
fn classify_mutation_error<E>(stack_name: &str, service_err: E) -> StagehandError
where
    E: ProvideErrorMetadata + std::fmt::Display,
{
    if service_err.code() == Some("ValidationError") {
        return StackError::ValidationRejected {
            message: service_err
                .message()
                .map_or_else(|| service_err.to_string(), String::from),
        }
        .into();
    }
    StackError::operation(stack_name, service_err.to_string()).into()
}
