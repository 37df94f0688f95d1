//! End-to-end release sequencing.
//!
//! One release unit is: allocate a version, snapshot configuration at that
//! version, publish code and configuration, verify the assigned version,
//! promote the stage alias, and reconcile API routing. There is no
//! distributed lock around this sequence; concurrent releases are detected
//! at the version consistency check and reported, never papered over.

use std::collections::BTreeSet;

use tracing::info;

use crate::error::{ReleaseError, Result};
use crate::provider::{
    FunctionCode, FunctionOps, FunctionSpec, ParameterOps, RouteOps, CONFIG_POINTER_ENV_VAR,
};

use super::ledger::VersionLedger;
use super::params::{version_path, ParameterPromoter};
use super::routes::{RouteOutcome, RouteReconciler};

/// Desired API routing for a released function.
#[derive(Debug, Clone)]
pub struct RouteTarget {
    /// Custom domain; empty when none is configured for the stage.
    pub domain: String,
    /// Base path under the domain.
    pub base_path: String,
    /// Backend identifier to route to.
    pub backend_id: String,
    /// Backend stage to route to.
    pub stage: String,
}

/// Everything needed to release one service to one stage.
#[derive(Debug, Clone)]
pub struct ReleaseRequest {
    /// Service name the configuration namespace is keyed by.
    pub service: String,
    /// Stage being released to; doubles as the alias name.
    pub stage: String,
    /// Function runtime configuration to apply.
    pub function: FunctionSpec,
    /// Code to publish.
    pub code: FunctionCode,
    /// Parameter names that must exist under `latest` for this release.
    pub required_parameters: BTreeSet<String>,
    /// API routing to reconcile, for API-routed functions.
    pub route: Option<RouteTarget>,
}

/// Summary of a completed release.
#[derive(Debug)]
pub struct ReleaseReport {
    /// Function that was released.
    pub function_name: String,
    /// Version that was published.
    pub version: u32,
    /// Alias that now points at the version.
    pub alias: String,
    /// Number of configuration parameters snapshotted.
    pub parameters_copied: usize,
    /// Routing outcome, when the function is API-routed.
    pub route: Option<RouteOutcome>,
}

/// Sequences version ledger → parameter copy → publish → alias promotion →
/// route reconciliation as one release unit.
pub struct ReleaseOrchestrator<'a> {
    /// Function control plane.
    functions: &'a dyn FunctionOps,
    /// Parameter store.
    parameters: &'a dyn ParameterOps,
    /// Routing control plane.
    routes: &'a dyn RouteOps,
}

impl<'a> ReleaseOrchestrator<'a> {
    /// Creates an orchestrator.
    #[must_use]
    pub const fn new(
        functions: &'a dyn FunctionOps,
        parameters: &'a dyn ParameterOps,
        routes: &'a dyn RouteOps,
    ) -> Self {
        Self {
            functions,
            parameters,
            routes,
        }
    }

    /// Releases `request.service` to `request.stage`.
    ///
    /// # Errors
    ///
    /// Missing configuration aborts the release before any publish call. A
    /// version mismatch at the publish step is a race with a concurrent
    /// release: it is fatal, the alias is left untouched, and the error tells
    /// the operator the whole release is safe to retry.
    pub async fn release(&self, request: &ReleaseRequest) -> Result<ReleaseReport> {
        let function_name = request.function.name.clone();
        info!(
            "releasing {service} to stage \"{stage}\"...",
            service = request.service,
            stage = request.stage
        );

        let target_version = VersionLedger::new(self.functions)
            .next_version(&function_name)
            .await?;

        let parameters_copied = ParameterPromoter::new(self.parameters)
            .promote(
                &request.service,
                &request.stage,
                target_version,
                &request.required_parameters,
            )
            .await?;

        // Deployed code finds its configuration snapshot through this
        // pointer.
        let mut spec = request.function.clone();
        spec.environment.insert(
            CONFIG_POINTER_ENV_VAR.to_string(),
            version_path(&request.service, &request.stage, target_version),
        );

        let assigned = self.publish(&spec, &request.code).await?;
        if assigned.parse::<u32>() != Ok(target_version) {
            return Err(ReleaseError::VersionRace {
                expected: target_version,
                actual: assigned,
            }
            .into());
        }

        self.promote_alias(&function_name, &request.stage, &assigned)
            .await?;

        let route = match &request.route {
            Some(target) => Some(
                RouteReconciler::new(self.routes)
                    .reconcile(
                        &target.domain,
                        &target.base_path,
                        &target.backend_id,
                        &target.stage,
                    )
                    .await?,
            ),
            None => None,
        };

        info!("released {function_name} version {target_version} to \"{}\"", request.stage);
        Ok(ReleaseReport {
            function_name,
            version: target_version,
            alias: request.stage.clone(),
            parameters_copied,
            route,
        })
    }

    /// Publishes code and configuration, returning the version label the
    /// control plane assigned.
    async fn publish(&self, spec: &FunctionSpec, code: &FunctionCode) -> Result<String> {
        match self.functions.get_function(&spec.name, None).await? {
            None => {
                info!("function \"{}\" does not exist, creating...", spec.name);
                let version = self.functions.create_function(spec, code).await?;
                info!("function \"{}\" created (version \"{version}\")", spec.name);
                Ok(version)
            }
            Some(_) => {
                info!("function \"{}\" already exists, updating...", spec.name);
                self.functions.update_function_code(&spec.name, code).await?;
                self.functions.update_function_configuration(spec).await?;
                // Code and configuration are in place on the mutable head;
                // publish pins them as an immutable numbered version.
                let version = self.functions.publish_version(&spec.name).await?;
                info!("function \"{}\" updated (version \"{version}\")", spec.name);
                Ok(version)
            }
        }
    }

    /// Points the stage alias at the published version, creating it on the
    /// first release to the stage and repointing it afterwards.
    async fn promote_alias(&self, function_name: &str, stage: &str, version: &str) -> Result<()> {
        match self.functions.get_alias(function_name, stage).await? {
            None => {
                info!("alias for stage \"{stage}\" does not exist, creating...");
                self.functions
                    .create_alias(function_name, stage, version)
                    .await?;
                info!("alias for stage \"{stage}\" created");
            }
            Some(_) => {
                info!("alias for stage \"{stage}\" already exists, updating...");
                self.functions
                    .update_alias(function_name, stage, version)
                    .await?;
                info!("alias for stage \"{stage}\" updated");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StagehandError;
    use crate::provider::memory::{InMemoryFunctions, InMemoryParameters, InMemoryRoutes};
    use crate::provider::ParameterKind;
    use std::collections::BTreeMap;

    struct Fixture {
        functions: InMemoryFunctions,
        parameters: InMemoryParameters,
        routes: InMemoryRoutes,
    }

    impl Fixture {
        fn new() -> Self {
            let parameters = InMemoryParameters::new();
            parameters.insert("/billing/dev/latest/DB_HOST", "db.internal", ParameterKind::Plain);
            parameters.insert("/billing/dev/latest/DB_PASS", "hunter2", ParameterKind::Secret);
            Self {
                functions: InMemoryFunctions::new(),
                parameters,
                routes: InMemoryRoutes::new(),
            }
        }

        fn orchestrator(&self) -> ReleaseOrchestrator<'_> {
            ReleaseOrchestrator::new(&self.functions, &self.parameters, &self.routes)
        }
    }

    fn request(route: Option<RouteTarget>) -> ReleaseRequest {
        ReleaseRequest {
            service: String::from("billing"),
            stage: String::from("dev"),
            function: FunctionSpec {
                name: String::from("billing-api"),
                runtime: String::from("python3.12"),
                handler: String::from("app.handler"),
                role: String::from("arn:role/billing"),
                memory_mb: Some(256),
                timeout_secs: Some(30),
                environment: BTreeMap::new(),
                description: None,
            },
            code: FunctionCode::Zip(vec![0x50, 0x4b]),
            required_parameters: ["DB_HOST", "DB_PASS"]
                .into_iter()
                .map(String::from)
                .collect(),
            route,
        }
    }

    #[tokio::test]
    async fn test_first_release_creates_function_at_version_one() {
        let fx = Fixture::new();
        let report = fx.orchestrator().release(&request(None)).await.unwrap();

        assert_eq!(report.version, 1);
        assert_eq!(report.parameters_copied, 2);
        assert_eq!(fx.functions.alias_target("dev"), Some(String::from("1")));
        assert_eq!(
            fx.functions.environment().get(CONFIG_POINTER_ENV_VAR).map(String::as_str),
            Some("/billing/dev/1/")
        );
        assert!(fx.parameters.get("/billing/dev/1/DB_PASS").is_some());
    }

    #[tokio::test]
    async fn test_subsequent_release_updates_then_publishes() {
        let fx = Fixture::new();
        fx.functions.seed_versions(&[1, 2]);
        fx.functions.insert_alias("dev", "2");

        let report = fx.orchestrator().release(&request(None)).await.unwrap();

        assert_eq!(report.version, 3);
        assert_eq!(fx.functions.code_updates(), 1);
        assert_eq!(fx.functions.config_updates(), 1);
        assert_eq!(fx.functions.alias_target("dev"), Some(String::from("3")));
    }

    #[tokio::test]
    async fn test_version_race_is_fatal_and_alias_is_untouched() {
        let fx = Fixture::new();
        fx.functions.seed_versions(&[1, 2]);
        fx.functions.insert_alias("dev", "2");
        // A competing release publishes version 3 first; our publish lands
        // on 4 while the ledger expected 3.
        fx.functions.force_publish_version("4");

        let err = fx.orchestrator().release(&request(None)).await.unwrap_err();

        match err {
            StagehandError::Release(ReleaseError::VersionRace { expected, actual }) => {
                assert_eq!(expected, 3);
                assert_eq!(actual, "4");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(fx.functions.alias_target("dev"), Some(String::from("2")));
    }

    #[tokio::test]
    async fn test_missing_configuration_aborts_before_any_publish_call() {
        let fx = Fixture::new();
        fx.functions.seed_versions(&[1]);

        let mut req = request(None);
        req.required_parameters.insert(String::from("API_TOKEN"));

        let err = fx.orchestrator().release(&req).await.unwrap_err();

        assert!(matches!(
            err,
            StagehandError::Release(ReleaseError::MissingParameters { .. })
        ));
        assert_eq!(fx.functions.code_updates(), 0);
        assert_eq!(fx.functions.config_updates(), 0);
    }

    #[tokio::test]
    async fn test_api_routed_release_reconciles_mapping() {
        let fx = Fixture::new();
        let report = fx
            .orchestrator()
            .release(&request(Some(RouteTarget {
                domain: String::from("api.example.com"),
                base_path: String::from("billing"),
                backend_id: String::from("api123"),
                stage: String::from("dev"),
            })))
            .await
            .unwrap();

        assert_eq!(report.route, Some(RouteOutcome::Created));
        assert_eq!(fx.routes.mappings("api.example.com").len(), 1);
    }
}
