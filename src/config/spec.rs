//! Configuration schema for `stagehand.deploy.yaml`.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use serde::Deserialize;

use crate::error::{ConfigError, Result};

/// Root of the deployment configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeployConfig {
    /// Project identity.
    pub project: ProjectConfig,
    /// Infrastructure template locations.
    #[serde(default)]
    pub templates: TemplatesConfig,
    /// Known accounts by name.
    #[serde(default)]
    pub accounts: BTreeMap<String, AccountConfig>,
    /// Known stages by name.
    #[serde(default)]
    pub stages: BTreeMap<String, StageConfig>,
    /// Services by name.
    #[serde(default)]
    pub services: BTreeMap<String, ServiceConfig>,
    /// Build artifact settings.
    #[serde(default)]
    pub build: BuildConfig,
    /// Customer-managed key for encrypting secret parameters.
    #[serde(default)]
    pub secrets_key: Option<String>,
}

/// Project identity.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectConfig {
    /// Application name; prefixes stack and bucket names.
    pub name: String,
}

/// Infrastructure template locations: either a URL used as-is or a local
/// path staged through the build bucket first.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TemplatesConfig {
    /// Account-level (baseline) template.
    #[serde(default)]
    pub account: Option<String>,
    /// Stage-level template.
    #[serde(default)]
    pub stage: Option<String>,
}

/// One account definition.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountConfig {
    /// Account number.
    pub account_number: String,
    /// Default region for baseline infrastructure.
    pub default_region: String,
}

/// One stage definition.
#[derive(Debug, Clone, Deserialize)]
pub struct StageConfig {
    /// Account (by name) the stage deploys into.
    pub account: String,
    /// Region the stage deploys into.
    pub region: String,
    /// Protect this stage's stack from recreate.
    #[serde(default)]
    pub protected: bool,
    /// Stack parameters applied when deploying this stage's infrastructure.
    #[serde(default)]
    pub stack_parameters: BTreeMap<String, String>,
}

/// Kind of a service. Closed set, matched exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceKind {
    /// A plain compute function.
    Function,
    /// A compute function routed through the API layer.
    ApiFunction,
}

/// One service definition.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// What kind of service this is.
    #[serde(rename = "type")]
    pub kind: ServiceKind,
    /// Function runtime settings.
    pub function: FunctionSettings,
    /// Declared configuration parameters per stage.
    #[serde(default)]
    pub parameters: ParametersConfig,
    /// API routing settings; required for [`ServiceKind::ApiFunction`].
    #[serde(default)]
    pub api: Option<ApiConfig>,
}

/// Function runtime settings.
#[derive(Debug, Clone, Deserialize)]
pub struct FunctionSettings {
    /// Unique function name.
    pub name: String,
    /// Runtime identifier.
    pub runtime: String,
    /// Handler entry point.
    pub handler: String,
    /// Execution role reference.
    pub role: String,
    /// Memory limit in megabytes.
    #[serde(default)]
    pub memory_mb: Option<i32>,
    /// Timeout in seconds.
    #[serde(default)]
    pub timeout_secs: Option<i32>,
    /// Static environment variables.
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
    /// Local path of the code archive to release.
    #[serde(default)]
    pub artifact: Option<PathBuf>,
}

/// Declared configuration parameters, keyed by stage with a `default`
/// fallback for ad-hoc stages.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ParametersConfig {
    /// Parameter lists by stage name.
    #[serde(default)]
    pub stages: BTreeMap<String, Vec<ParameterSpec>>,
}

/// One declared parameter.
#[derive(Debug, Clone, Deserialize)]
pub struct ParameterSpec {
    /// Parameter name (the leaf under the namespace path).
    pub name: String,
    /// Store the parameter encrypted.
    #[serde(default)]
    pub secret: bool,
}

/// API routing settings for a service.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Custom domain; empty means none is configured and mapping is skipped.
    #[serde(default)]
    pub custom_domain: String,
    /// Base path under the domain.
    #[serde(default = "default_base_path")]
    pub base_path: String,
    /// Backend identifier the path routes to.
    pub backend_id: String,
    /// Backend stage name, when it differs from the deployment stage.
    #[serde(default)]
    pub api_stage: Option<String>,
}

fn default_base_path() -> String {
    String::from("/")
}

/// Build artifact settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuildConfig {
    /// Bucket used to stage artifacts and templates. Derived from the
    /// project name and account number when absent.
    #[serde(default)]
    pub bucket: Option<String>,
}

impl DeployConfig {
    /// Looks up a stage by name.
    ///
    /// # Errors
    ///
    /// Returns a user input error naming the stage when it is not defined.
    pub fn stage(&self, name: &str) -> Result<&StageConfig> {
        self.stages.get(name).ok_or_else(|| {
            ConfigError::UnknownName {
                kind: "stage",
                name: name.to_string(),
            }
            .into()
        })
    }

    /// Looks up an account by name.
    ///
    /// # Errors
    ///
    /// Returns a user input error naming the account when it is not defined.
    pub fn account(&self, name: &str) -> Result<&AccountConfig> {
        self.accounts.get(name).ok_or_else(|| {
            ConfigError::UnknownName {
                kind: "account",
                name: name.to_string(),
            }
            .into()
        })
    }

    /// Looks up a service by name.
    ///
    /// # Errors
    ///
    /// Returns a user input error naming the service when it is not defined.
    pub fn service(&self, name: &str) -> Result<&ServiceConfig> {
        self.services.get(name).ok_or_else(|| {
            ConfigError::UnknownName {
                kind: "service",
                name: name.to_string(),
            }
            .into()
        })
    }

    /// Name of the stack owning a stage's infrastructure.
    #[must_use]
    pub fn stage_stack_name(&self, stage: &str) -> String {
        format!("{}-{stage}", self.project.name)
    }

    /// Name of the baseline stack for an account.
    #[must_use]
    pub fn account_stack_name(&self, account: &str) -> String {
        format!("{}-baseline-{account}", self.project.name)
    }

    /// Bucket used to stage artifacts for an account.
    #[must_use]
    pub fn build_bucket(&self, account_number: &str) -> String {
        self.build.bucket.clone().unwrap_or_else(|| {
            format!("{}-builds-{account_number}", self.project.name)
        })
    }

    /// Validates cross-references and per-kind requirements.
    ///
    /// # Errors
    ///
    /// Returns a validation error describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        for (stage_name, stage) in &self.stages {
            if !self.accounts.contains_key(&stage.account) {
                return Err(ConfigError::ValidationError {
                    message: format!(
                        "stage \"{stage_name}\" references unknown account \
                         \"{}\"",
                        stage.account
                    ),
                }
                .into());
            }
        }

        for (service_name, service) in &self.services {
            match service.kind {
                ServiceKind::Function => {}
                ServiceKind::ApiFunction => {
                    if service.api.is_none() {
                        return Err(ConfigError::ValidationError {
                            message: format!(
                                "service \"{service_name}\" is api-function \
                                 but has no api section"
                            ),
                        }
                        .into());
                    }
                }
            }
        }

        Ok(())
    }
}

impl ServiceConfig {
    /// Declared parameters for a stage, falling back to `default`.
    #[must_use]
    pub fn parameters_for_stage(&self, stage: &str) -> &[ParameterSpec] {
        self.parameters
            .stages
            .get(stage)
            .or_else(|| self.parameters.stages.get("default"))
            .map_or(&[], Vec::as_slice)
    }

    /// Names of the parameters a release to `stage` requires.
    #[must_use]
    pub fn required_parameter_names(&self, stage: &str) -> BTreeSet<String> {
        self.parameters_for_stage(stage)
            .iter()
            .map(|p| p.name.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_yaml() -> &'static str {
        r"
project:
  name: billing
accounts:
  main:
    account_number: '123456789012'
    default_region: us-east-1
stages:
  dev:
    account: main
    region: us-west-2
services:
  billing:
    type: api-function
    function:
      name: billing-api
      runtime: python3.12
      handler: app.handler
      role: arn:role/billing
    parameters:
      stages:
        default:
          - name: DB_HOST
          - name: DB_PASS
            secret: true
    api:
      custom_domain: api.example.com
      base_path: /
      backend_id: abc123
"
    }

    #[test]
    fn test_parse_and_validate_minimal_config() {
        let config: DeployConfig = serde_yaml::from_str(minimal_yaml()).unwrap();
        config.validate().unwrap();

        assert_eq!(config.stage_stack_name("dev"), "billing-dev");
        assert_eq!(config.account_stack_name("main"), "billing-baseline-main");
        assert_eq!(config.build_bucket("123456789012"), "billing-builds-123456789012");
    }

    #[test]
    fn test_unknown_service_kind_is_rejected_at_parse_time() {
        let yaml = minimal_yaml().replace("api-function", "cron-job");
        assert!(serde_yaml::from_str::<DeployConfig>(&yaml).is_err());
    }

    #[test]
    fn test_required_parameters_fall_back_to_default_stage() {
        let config: DeployConfig = serde_yaml::from_str(minimal_yaml()).unwrap();
        let service = config.service("billing").unwrap();

        let names = service.required_parameter_names("some-adhoc-stage");
        assert!(names.contains("DB_HOST"));
        assert!(names.contains("DB_PASS"));
    }

    #[test]
    fn test_api_function_without_api_section_fails_validation() {
        let yaml = r"
project:
  name: billing
services:
  billing:
    type: api-function
    function:
      name: billing-api
      runtime: python3.12
      handler: app.handler
      role: arn:role/billing
";
        let config: DeployConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_stage_referencing_unknown_account_fails_validation() {
        let yaml = r"
project:
  name: billing
stages:
  dev:
    account: nowhere
    region: us-west-2
";
        let config: DeployConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_err());
    }
}
