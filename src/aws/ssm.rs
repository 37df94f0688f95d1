//! SSM Parameter Store-backed parameter namespace.

use async_trait::async_trait;
use aws_sdk_ssm::types::ParameterType;
use aws_sdk_ssm::Client;

use crate::error::{ReleaseError, Result};
use crate::provider::{
    ParameterKind, ParameterOps, ParameterPage, SecretsEncryption, StoredParameter,
};

/// Parameter entries requested per listing page.
const LIST_PAGE_SIZE: i32 = 10;

/// Parameter namespace backed by SSM Parameter Store.
#[derive(Debug, Clone)]
pub struct SsmParameters {
    /// SDK client.
    client: Client,
    /// Optional customer-managed encryption key for secret parameters.
    encryption: SecretsEncryption,
}

impl SsmParameters {
    /// Creates an adapter from a resolved session.
    #[must_use]
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: Client::new(config),
            encryption: SecretsEncryption::NotConfigured,
        }
    }

    /// Injects the secrets-encryption capability.
    #[must_use]
    pub fn with_encryption(mut self, encryption: SecretsEncryption) -> Self {
        self.encryption = encryption;
        self
    }
}

#[async_trait]
impl ParameterOps for SsmParameters {
    async fn list_parameters(
        &self,
        path: &str,
        next_token: Option<&str>,
    ) -> Result<ParameterPage> {
        let output = self
            .client
            .get_parameters_by_path()
            .path(path)
            .with_decryption(true)
            .recursive(false)
            .max_results(LIST_PAGE_SIZE)
            .set_next_token(next_token.map(String::from))
            .send()
            .await
            .map_err(|e| {
                ReleaseError::parameter_store(path, e.into_service_error().to_string())
            })?;

        let parameters = output
            .parameters()
            .iter()
            .filter_map(|p| {
                let kind = match p.r#type() {
                    Some(ParameterType::SecureString) => ParameterKind::Secret,
                    _ => ParameterKind::Plain,
                };
                Some(StoredParameter {
                    name: p.name()?.to_string(),
                    value: p.value()?.to_string(),
                    kind,
                })
            })
            .collect();

        Ok(ParameterPage {
            parameters,
            next_token: output.next_token().map(String::from),
        })
    }

    async fn put_parameter(
        &self,
        name: &str,
        value: &str,
        kind: ParameterKind,
        overwrite: bool,
    ) -> Result<()> {
        let mut request = self
            .client
            .put_parameter()
            .name(name)
            .value(value)
            .overwrite(overwrite);

        request = match kind {
            ParameterKind::Plain => request.r#type(ParameterType::String),
            ParameterKind::Secret => {
                let request = request.r#type(ParameterType::SecureString);
                match self.encryption.key_id() {
                    Some(key_id) => request.key_id(key_id),
                    None => request,
                }
            }
        };

        request.send().await.map_err(|e| {
            ReleaseError::parameter_store(name, e.into_service_error().to_string())
        })?;
        Ok(())
    }
}
