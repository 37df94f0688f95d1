//! API Gateway-backed routing control plane.
//!
//! Only list and create are exposed: the provider has no working update
//! primitive for base path mappings, which is why drift surfaces as a
//! manual-intervention outcome upstream.

use async_trait::async_trait;
use aws_sdk_apigateway::Client;

use crate::error::{Result, RouteError};
use crate::provider::{RouteMapping, RouteOps};

/// Mapping entries requested per listing call.
const LIST_MAPPINGS_LIMIT: i32 = 500;

/// Routing control plane backed by API Gateway.
#[derive(Debug, Clone)]
pub struct ApiGatewayRoutes {
    /// SDK client.
    client: Client,
}

impl ApiGatewayRoutes {
    /// Creates an adapter from a resolved session.
    #[must_use]
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }
}

#[async_trait]
impl RouteOps for ApiGatewayRoutes {
    async fn list_mappings(&self, domain: &str) -> Result<Vec<RouteMapping>> {
        let output = self
            .client
            .get_base_path_mappings()
            .domain_name(domain)
            .limit(LIST_MAPPINGS_LIMIT)
            .send()
            .await
            .map_err(|e| RouteError::ControlPlane {
                domain: domain.to_string(),
                cause: e.into_service_error().to_string(),
            })?;

        Ok(output
            .items()
            .iter()
            .map(|item| RouteMapping {
                base_path: item.base_path().unwrap_or_default().to_string(),
                backend_id: item.rest_api_id().unwrap_or_default().to_string(),
                stage: item.stage().unwrap_or_default().to_string(),
            })
            .collect())
    }

    async fn create_mapping(&self, domain: &str, mapping: &RouteMapping) -> Result<()> {
        self.client
            .create_base_path_mapping()
            .domain_name(domain)
            .base_path(&mapping.base_path)
            .rest_api_id(&mapping.backend_id)
            .stage(&mapping.stage)
            .send()
            .await
            .map_err(|e| RouteError::ControlPlane {
                domain: domain.to_string(),
                cause: e.into_service_error().to_string(),
            })?;
        Ok(())
    }
}
