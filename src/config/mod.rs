//! Declarative deployment configuration.
//!
//! - [`spec`]: the configuration schema (`stagehand.deploy.yaml`)
//! - [`parser`]: file loading, environment substitution, validation

pub mod parser;
pub mod spec;

pub use parser::{find_config_file, ConfigParser};
pub use spec::{
    AccountConfig, ApiConfig, DeployConfig, FunctionSettings, ParameterSpec, ServiceConfig,
    ServiceKind, StageConfig,
};
