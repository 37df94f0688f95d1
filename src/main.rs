//! Stagehand CLI entrypoint.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use stagehand_deploy::aws::{
    ApiGatewayRoutes, CloudFormationStacks, LambdaFunctions, S3Objects, SessionFactory,
    SsmParameters,
};
use stagehand_deploy::cli::{Cli, Commands, OutputFormatter};
use stagehand_deploy::config::{find_config_file, ConfigParser, DeployConfig, ServiceKind};
use stagehand_deploy::context::{
    gather_stack_outputs, AccountScope, DeploymentContext, StageScope,
};
use stagehand_deploy::error::{ConfigError, Result, StagehandError};
use stagehand_deploy::provider::{
    FunctionCode, FunctionOps, FunctionSpec, ObjectOps, ParameterKind, ParameterOps,
    SecretsEncryption, StackParameter, StackTag, TemplateRef, CREATED_WITH_TAG_KEY,
};
use stagehand_deploy::release::{latest_path, ReleaseOrchestrator, ReleaseRequest, RouteTarget};
use stagehand_deploy::stack::{
    ApplyMode, CancelFlag, StackLevel, StackLifecycleManager, StackSpec,
};

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<()> {
    let formatter = OutputFormatter::new(cli.output);
    let profile = cli.profile.as_deref();

    match cli.command {
        Commands::DeployInfra {
            stage,
            account,
            dry_run,
            recreate,
            force,
            asynchronous,
        } => {
            cmd_deploy_infra(
                cli.config.as_ref(),
                profile,
                InfraTarget { stage, account },
                InfraFlags {
                    dry_run,
                    recreate,
                    force,
                    asynchronous,
                },
                &formatter,
            )
            .await
        }
        Commands::Release {
            service,
            stage,
            zip,
            via_bucket,
        } => {
            cmd_release(
                cli.config.as_ref(),
                profile,
                &service,
                &stage,
                zip,
                via_bucket,
                &formatter,
            )
            .await
        }
        Commands::PutParameters {
            service,
            stage,
            parameters,
        } => cmd_put_parameters(cli.config.as_ref(), profile, &service, &stage, &parameters).await,
        Commands::ShowService { service, stage } => {
            cmd_show_service(cli.config.as_ref(), profile, &service, &stage, &formatter).await
        }
    }
}

/// Deployment target of an infra command: a stage or an account.
struct InfraTarget {
    stage: Option<String>,
    account: Option<String>,
}

/// Behavior flags of an infra command.
struct InfraFlags {
    dry_run: bool,
    recreate: bool,
    force: bool,
    asynchronous: bool,
}

/// Provision or update infrastructure.
async fn cmd_deploy_infra(
    config_path: Option<&PathBuf>,
    profile: Option<&str>,
    target: InfraTarget,
    flags: InfraFlags,
    formatter: &OutputFormatter,
) -> Result<()> {
    let config = load_config(config_path)?;

    // A deployment is scoped to exactly one of stage or account.
    if target.stage.is_some() == target.account.is_some() {
        return Err(ConfigError::MutuallyExclusiveOptions {
            first: "stage",
            second: "account",
        }
        .into());
    }

    let mode = if flags.dry_run {
        ApplyMode::DryRun
    } else if flags.recreate {
        ApplyMode::Recreate { force: flags.force }
    } else {
        ApplyMode::CreateOrUpdate
    };

    let sessions = SessionFactory::new(profile);
    let resolved = resolve_infra_target(&config, &sessions, target).await?;

    let objects = S3Objects::new(&resolved.session);
    let key_prefix = match resolved.context.stage_name() {
        Some(stage) => format!(
            "templates/stages/{stage}/{}",
            resolved.context.timestamp_compact()
        ),
        None => format!("templates/account/{}", resolved.context.timestamp_compact()),
    };
    let bucket = config.build_bucket(resolved.context.account_number());
    let template = resolve_template(
        &objects,
        &resolved.template_source,
        &bucket,
        &key_prefix,
        resolved.context.region(),
    )
    .await?;

    let spec = StackSpec {
        name: resolved.stack_name.clone(),
        template,
        parameters: resolved.parameters,
        tags: resolved.tags,
    };

    let stacks = CloudFormationStacks::new(&resolved.session);
    let manager = StackLifecycleManager::new(&stacks);
    let cancel = cancel_on_ctrl_c();
    let outcome = manager
        .reconcile(&spec, mode, resolved.level, flags.asynchronous, &cancel)
        .await?;

    eprintln!(
        "{}",
        formatter.format_stack_outcome(&resolved.stack_name, &outcome)
    );
    Ok(())
}

/// Everything an infra deployment needs once its target is resolved.
struct ResolvedInfraTarget {
    session: aws_config::SdkConfig,
    context: DeploymentContext,
    level: StackLevel,
    stack_name: String,
    template_source: String,
    parameters: Vec<StackParameter>,
    tags: Vec<StackTag>,
}

/// Resolves `--stage` or `--account` into a concrete deployment target.
async fn resolve_infra_target(
    config: &DeployConfig,
    sessions: &SessionFactory,
    target: InfraTarget,
) -> Result<ResolvedInfraTarget> {
    if let Some(stage_name) = target.stage {
        let stage_cfg = config.stage(&stage_name)?;
        let account_cfg = config.account(&stage_cfg.account)?;
        let session = sessions.session(&stage_cfg.region).await?;

        let stack_name = config.stage_stack_name(&stage_name);
        let stacks = CloudFormationStacks::new(&session);
        let outputs = gather_stack_outputs(&stacks, &stack_name).await?;
        let context = DeploymentContext::stage_scoped(StageScope {
            name: stage_name.clone(),
            account_number: account_cfg.account_number.clone(),
            region: stage_cfg.region.clone(),
            outputs,
        });

        let template_source =
            config
                .templates
                .stage
                .clone()
                .ok_or_else(|| ConfigError::ValidationError {
                    message: String::from("no \"stage\" templates are defined"),
                })?;

        let parameters = stage_cfg
            .stack_parameters
            .iter()
            .map(|(k, v)| StackParameter::new(k, v))
            .collect();
        let mut tags = vec![StackTag::new(CREATED_WITH_TAG_KEY, env!("CARGO_PKG_VERSION"))];
        if stage_cfg.protected {
            tags.push(StackTag::protected());
        }

        Ok(ResolvedInfraTarget {
            session,
            context,
            level: StackLevel::Stage,
            stack_name,
            template_source,
            parameters,
            tags,
        })
    } else {
        let account_name = target.account.unwrap_or_default();
        let account_cfg = config.account(&account_name)?;
        let session = sessions.session(&account_cfg.default_region).await?;

        let stack_name = config.account_stack_name(&account_name);
        let stacks = CloudFormationStacks::new(&session);
        let outputs = gather_stack_outputs(&stacks, &stack_name).await?;
        let context = DeploymentContext::account_scoped(AccountScope {
            name: account_name,
            account_number: account_cfg.account_number.clone(),
            region: account_cfg.default_region.clone(),
            outputs,
        });

        let template_source =
            config
                .templates
                .account
                .clone()
                .ok_or_else(|| ConfigError::ValidationError {
                    message: String::from("no \"account\" templates are defined"),
                })?;

        Ok(ResolvedInfraTarget {
            session,
            context,
            level: StackLevel::Account,
            stack_name,
            template_source,
            parameters: vec![],
            // Baseline stacks are always protected from teardown.
            tags: vec![
                StackTag::new(CREATED_WITH_TAG_KEY, env!("CARGO_PKG_VERSION")),
                StackTag::protected(),
            ],
        })
    }
}

/// Release a service to a stage.
async fn cmd_release(
    config_path: Option<&PathBuf>,
    profile: Option<&str>,
    service_name: &str,
    stage_name: &str,
    zip: Option<PathBuf>,
    via_bucket: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let config = load_config(config_path)?;
    let service = config.service(service_name)?;
    let stage_cfg = config.stage(stage_name)?;
    let account_cfg = config.account(&stage_cfg.account)?;

    let session = SessionFactory::new(profile)
        .session(&stage_cfg.region)
        .await?;
    let stacks = CloudFormationStacks::new(&session);
    let functions = LambdaFunctions::new(&session);
    let parameters = SsmParameters::new(&session).with_encryption(secrets_encryption(&config));
    let routes = ApiGatewayRoutes::new(&session);
    let objects = S3Objects::new(&session);

    let outputs = gather_stack_outputs(&stacks, &config.stage_stack_name(stage_name)).await?;
    let context = DeploymentContext::stage_scoped(StageScope {
        name: stage_name.to_string(),
        account_number: account_cfg.account_number.clone(),
        region: stage_cfg.region.clone(),
        outputs,
    });

    let artifact = zip
        .or_else(|| service.function.artifact.clone())
        .ok_or_else(|| ConfigError::ValidationError {
            message: format!(
                "service \"{service_name}\" has no artifact configured; pass --zip"
            ),
        })?;
    let archive = std::fs::read(&artifact)?;
    info!(
        "releasing archive {} ({} bytes)",
        artifact.display(),
        archive.len()
    );

    let code = if via_bucket {
        let bucket = config.build_bucket(context.account_number());
        objects.ensure_bucket(&bucket, context.region()).await?;
        let key = format!(
            "builds/stages/{stage_name}/services/{service_name}/{}/function.zip",
            context.timestamp_compact()
        );
        objects.put_object(&bucket, &key, archive).await?;
        FunctionCode::ObjectRef { bucket, key }
    } else {
        FunctionCode::Zip(archive)
    };

    let function = FunctionSpec {
        name: service.function.name.clone(),
        runtime: service.function.runtime.clone(),
        handler: service.function.handler.clone(),
        role: service.function.role.clone(),
        memory_mb: service.function.memory_mb,
        timeout_secs: service.function.timeout_secs,
        environment: service.function.environment.clone(),
        description: None,
    };

    // Closed dispatch on the service kind; each variant handled explicitly.
    let route = match service.kind {
        ServiceKind::Function => None,
        ServiceKind::ApiFunction => {
            let api = service.api.as_ref().ok_or_else(|| ConfigError::ValidationError {
                message: format!("service \"{service_name}\" has no api section"),
            })?;
            Some(RouteTarget {
                domain: api.custom_domain.clone(),
                base_path: api.base_path.clone(),
                backend_id: api.backend_id.clone(),
                stage: api
                    .api_stage
                    .clone()
                    .unwrap_or_else(|| stage_name.to_string()),
            })
        }
    };

    let request = ReleaseRequest {
        service: service_name.to_string(),
        stage: stage_name.to_string(),
        function,
        code,
        required_parameters: service.required_parameter_names(stage_name),
        route,
    };

    let orchestrator = ReleaseOrchestrator::new(&functions, &parameters, &routes);
    let report = orchestrator.release(&request).await?;

    eprintln!("{}", formatter.format_release(&report));
    Ok(())
}

/// Write parameters under a stage's `latest` namespace.
async fn cmd_put_parameters(
    config_path: Option<&PathBuf>,
    profile: Option<&str>,
    service_name: &str,
    stage_name: &str,
    pairs: &[(String, String)],
) -> Result<()> {
    let config = load_config(config_path)?;
    let service = config.service(service_name)?;
    let stage_cfg = config.stage(stage_name)?;

    let session = SessionFactory::new(profile)
        .session(&stage_cfg.region)
        .await?;
    let parameters = SsmParameters::new(&session).with_encryption(secrets_encryption(&config));

    let declared = service.parameters_for_stage(stage_name);
    let namespace = latest_path(service_name, stage_name);

    for (key, value) in pairs {
        let kind = if declared.iter().any(|p| p.name == *key && p.secret) {
            ParameterKind::Secret
        } else {
            ParameterKind::Plain
        };
        let name = format!("{namespace}{key}");
        parameters.put_parameter(&name, value, kind, true).await?;
        info!("wrote parameter {name}");
    }

    eprintln!("Wrote {} parameter(s) under {namespace}", pairs.len());
    Ok(())
}

/// Show the live configuration of a service for a stage.
async fn cmd_show_service(
    config_path: Option<&PathBuf>,
    profile: Option<&str>,
    service_name: &str,
    stage_name: &str,
    formatter: &OutputFormatter,
) -> Result<()> {
    let config = load_config(config_path)?;
    let service = config.service(service_name)?;
    let stage_cfg = config.stage(stage_name)?;

    let session = SessionFactory::new(profile)
        .session(&stage_cfg.region)
        .await?;
    let functions = LambdaFunctions::new(&session);

    let description = functions
        .get_function(&service.function.name, Some(stage_name))
        .await?
        .ok_or_else(|| {
            StagehandError::internal(format!(
                "service \"{service_name}\" has not been deployed to stage \
                 \"{stage_name}\""
            ))
        })?;

    eprintln!("{}", formatter.format_function(&description));
    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Loads and validates the configuration file.
fn load_config(config_path: Option<&PathBuf>) -> Result<DeployConfig> {
    let parser = ConfigParser::new();
    parser.load_dotenv();

    let path = match config_path {
        Some(path) => path.clone(),
        None => find_config_file(".")?,
    };
    parser.load_file(&path)
}

/// Resolves a template source into a remote template reference, staging local
/// files through the build bucket.
async fn resolve_template(
    objects: &dyn ObjectOps,
    source: &str,
    bucket: &str,
    key_prefix: &str,
    region: &str,
) -> Result<TemplateRef> {
    if source.starts_with("https://") || source.starts_with("http://") {
        return Ok(TemplateRef::new(source));
    }

    let body = std::fs::read(source)?;
    objects.ensure_bucket(bucket, region).await?;
    let file_name = Path::new(source)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("template.yaml");
    let key = format!("{key_prefix}/{file_name}");
    objects.put_object(bucket, &key, body).await?;

    Ok(TemplateRef::new(format!(
        "https://{bucket}.s3.{region}.amazonaws.com/{key}"
    )))
}

/// Maps the configured secrets key onto the encryption capability.
fn secrets_encryption(config: &DeployConfig) -> SecretsEncryption {
    config
        .secrets_key
        .clone()
        .map_or(SecretsEncryption::NotConfigured, SecretsEncryption::CustomerKey)
}

/// Returns a cancellation flag that trips on Ctrl-C.
fn cancel_on_ctrl_c() -> CancelFlag {
    let cancel = CancelFlag::new();
    let flag = cancel.clone();
    let _watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("cancellation requested, finishing up...");
            flag.cancel();
        }
    });
    cancel
}

#[cfg(test)]
mod tests {
    use super::*;
    use stagehand_deploy::provider::memory::InMemoryObjects;
    use std::io::Write;

    #[tokio::test]
    async fn test_resolve_template_passes_urls_through() {
        let objects = InMemoryObjects::new();
        let template = resolve_template(
            &objects,
            "https://objects/templates/master.yaml",
            "builds",
            "templates/stages/dev/20240101000000",
            "us-west-2",
        )
        .await
        .unwrap();

        assert_eq!(template.url, "https://objects/templates/master.yaml");
        assert!(objects.object("builds", "templates").is_none());
    }

    #[tokio::test]
    async fn test_resolve_template_stages_local_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("master.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(b"Resources: {}\n").unwrap();

        let objects = InMemoryObjects::new();
        let template = resolve_template(
            &objects,
            path.to_str().unwrap(),
            "builds",
            "templates/stages/dev/20240101000000",
            "us-west-2",
        )
        .await
        .unwrap();

        let key = "templates/stages/dev/20240101000000/master.yaml";
        assert_eq!(
            template.url,
            format!("https://builds.s3.us-west-2.amazonaws.com/{key}")
        );
        assert_eq!(objects.object("builds", key), Some(b"Resources: {}\n".to_vec()));
    }
}
