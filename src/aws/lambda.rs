//! Lambda-backed compute function control plane.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_lambda::primitives::Blob;
use aws_sdk_lambda::types::{Environment, FunctionCode as WireFunctionCode, Runtime};
use aws_sdk_lambda::Client;
use tracing::debug;

use crate::error::{ReleaseError, Result};
use crate::provider::{
    FunctionCode, FunctionDescription, FunctionOps, FunctionSpec, VersionPage,
};

/// Maximum version entries requested per listing page.
const LIST_VERSIONS_MAX_ITEMS: i32 = 1000;

/// Compute function control plane backed by Lambda.
#[derive(Debug, Clone)]
pub struct LambdaFunctions {
    /// SDK client.
    client: Client,
}

impl LambdaFunctions {
    /// Creates an adapter from a resolved session.
    #[must_use]
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }

    fn wire_code(code: &FunctionCode) -> WireFunctionCode {
        match code {
            FunctionCode::Zip(bytes) => WireFunctionCode::builder()
                .zip_file(Blob::new(bytes.clone()))
                .build(),
            FunctionCode::ObjectRef { bucket, key } => WireFunctionCode::builder()
                .s3_bucket(bucket)
                .s3_key(key)
                .build(),
        }
    }

    fn wire_environment(spec: &FunctionSpec) -> Environment {
        let variables: HashMap<String, String> = spec
            .environment
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Environment::builder().set_variables(Some(variables)).build()
    }
}

#[async_trait]
impl FunctionOps for LambdaFunctions {
    async fn get_function(
        &self,
        function_name: &str,
        qualifier: Option<&str>,
    ) -> Result<Option<FunctionDescription>> {
        let result = self
            .client
            .get_function()
            .function_name(function_name)
            .set_qualifier(qualifier.map(String::from))
            .send()
            .await;

        let output = match result {
            Ok(output) => output,
            Err(sdk_err) => {
                let service_err = sdk_err.into_service_error();
                if service_err.is_resource_not_found_exception() {
                    debug!("function \"{function_name}\" does not exist");
                    return Ok(None);
                }
                return Err(
                    ReleaseError::control_plane(function_name, service_err.to_string()).into(),
                );
            }
        };

        let Some(configuration) = output.configuration() else {
            return Ok(None);
        };

        let environment = configuration
            .environment()
            .and_then(|e| e.variables())
            .map(|vars| {
                vars.iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default();

        Ok(Some(FunctionDescription {
            name: configuration
                .function_name()
                .unwrap_or(function_name)
                .to_string(),
            version: configuration.version().map(String::from),
            runtime: configuration.runtime().map(|r| r.as_str().to_string()),
            memory_mb: configuration.memory_size(),
            timeout_secs: configuration.timeout(),
            description: configuration.description().map(String::from),
            environment,
        }))
    }

    async fn list_versions(
        &self,
        function_name: &str,
        marker: Option<&str>,
    ) -> Result<VersionPage> {
        let result = self
            .client
            .list_versions_by_function()
            .function_name(function_name)
            .set_marker(marker.map(String::from))
            .max_items(LIST_VERSIONS_MAX_ITEMS)
            .send()
            .await;

        let output = match result {
            Ok(output) => output,
            Err(sdk_err) => {
                let service_err = sdk_err.into_service_error();
                // A function with no versions at all simply has no listing.
                if service_err.is_resource_not_found_exception() {
                    debug!("no existing versions found for \"{function_name}\"");
                    return Ok(VersionPage::default());
                }
                return Err(
                    ReleaseError::control_plane(function_name, service_err.to_string()).into(),
                );
            }
        };

        let versions = output
            .versions()
            .iter()
            .filter_map(|v| v.version().map(String::from))
            .collect();

        Ok(VersionPage {
            versions,
            next_marker: output.next_marker().map(String::from),
        })
    }

    async fn create_function(&self, spec: &FunctionSpec, code: &FunctionCode) -> Result<String> {
        let output = self
            .client
            .create_function()
            .function_name(&spec.name)
            .runtime(Runtime::from(spec.runtime.as_str()))
            .handler(&spec.handler)
            .role(&spec.role)
            .set_memory_size(spec.memory_mb)
            .set_timeout(spec.timeout_secs)
            .set_description(spec.description.clone())
            .environment(Self::wire_environment(spec))
            .code(Self::wire_code(code))
            .publish(true)
            .send()
            .await
            .map_err(|e| {
                ReleaseError::control_plane(&spec.name, e.into_service_error().to_string())
            })?;

        Ok(output.version().unwrap_or_default().to_string())
    }

    async fn update_function_code(&self, function_name: &str, code: &FunctionCode) -> Result<()> {
        let mut request = self
            .client
            .update_function_code()
            .function_name(function_name);

        request = match code {
            FunctionCode::Zip(bytes) => request.zip_file(Blob::new(bytes.clone())),
            FunctionCode::ObjectRef { bucket, key } => request.s3_bucket(bucket).s3_key(key),
        };

        request.send().await.map_err(|e| {
            ReleaseError::control_plane(function_name, e.into_service_error().to_string())
        })?;
        Ok(())
    }

    async fn update_function_configuration(&self, spec: &FunctionSpec) -> Result<()> {
        self.client
            .update_function_configuration()
            .function_name(&spec.name)
            .runtime(Runtime::from(spec.runtime.as_str()))
            .handler(&spec.handler)
            .role(&spec.role)
            .set_memory_size(spec.memory_mb)
            .set_timeout(spec.timeout_secs)
            .set_description(spec.description.clone())
            .environment(Self::wire_environment(spec))
            .send()
            .await
            .map_err(|e| {
                ReleaseError::control_plane(&spec.name, e.into_service_error().to_string())
            })?;
        Ok(())
    }

    async fn publish_version(&self, function_name: &str) -> Result<String> {
        let output = self
            .client
            .publish_version()
            .function_name(function_name)
            .send()
            .await
            .map_err(|e| {
                ReleaseError::control_plane(function_name, e.into_service_error().to_string())
            })?;

        Ok(output.version().unwrap_or_default().to_string())
    }

    async fn get_alias(&self, function_name: &str, alias: &str) -> Result<Option<String>> {
        let result = self
            .client
            .get_alias()
            .function_name(function_name)
            .name(alias)
            .send()
            .await;

        match result {
            Ok(output) => Ok(output.function_version().map(String::from)),
            Err(sdk_err) => {
                let service_err = sdk_err.into_service_error();
                if service_err.is_resource_not_found_exception() {
                    return Ok(None);
                }
                Err(ReleaseError::control_plane(function_name, service_err.to_string()).into())
            }
        }
    }

    async fn create_alias(&self, function_name: &str, alias: &str, version: &str) -> Result<()> {
        self.client
            .create_alias()
            .function_name(function_name)
            .name(alias)
            .function_version(version)
            .send()
            .await
            .map_err(|e| {
                ReleaseError::control_plane(function_name, e.into_service_error().to_string())
            })?;
        Ok(())
    }

    async fn update_alias(&self, function_name: &str, alias: &str, version: &str) -> Result<()> {
        self.client
            .update_alias()
            .function_name(function_name)
            .name(alias)
            .function_version(version)
            .send()
            .await
            .map_err(|e| {
                ReleaseError::control_plane(function_name, e.into_service_error().to_string())
            })?;
        Ok(())
    }
}
