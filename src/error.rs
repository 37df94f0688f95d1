//! Error types for the Stagehand deployment orchestrator.
//!
//! The hierarchy mirrors the subsystems of the deployment lifecycle:
//! configuration, credentials, stack lifecycle, release orchestration, and
//! API route reconciliation. Every error is reported; nothing is swallowed.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for Stagehand operations.
#[derive(Debug, Error)]
pub enum StagehandError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Credential resolution errors.
    #[error("Credentials error: {0}")]
    Credentials(#[from] CredentialsError),

    /// Infrastructure stack lifecycle errors.
    #[error("Stack error: {0}")]
    Stack(#[from] StackError),

    /// Release orchestration errors.
    #[error("Release error: {0}")]
    Release(#[from] ReleaseError),

    /// API routing errors.
    #[error("Route error: {0}")]
    Route(#[from] RouteError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
    },

    /// Environment variable is missing.
    #[error("Missing environment variable: {name}")]
    MissingEnvVar {
        /// Name of the missing variable.
        name: String,
    },

    /// Two mutually exclusive options were both (or neither) supplied.
    #[error("You must specify either --{first} or --{second} (but not both)")]
    MutuallyExclusiveOptions {
        /// First option name.
        first: &'static str,
        /// Second option name.
        second: &'static str,
    },

    /// A name referenced on the command line is not defined in the config.
    #[error("Unknown {kind}: {name}")]
    UnknownName {
        /// What kind of thing was looked up (stage, account, service).
        kind: &'static str,
        /// The unresolved name.
        name: String,
    },
}

/// Credential resolution errors.
#[derive(Debug, Error)]
pub enum CredentialsError {
    /// No credentials could be resolved from any source.
    #[error(
        "Unable to resolve credentials: nothing found in the environment or \
         the profile \"{profile}\""
    )]
    NotResolvable {
        /// Profile name that was tried.
        profile: String,
    },
}

/// Infrastructure stack lifecycle errors.
#[derive(Debug, Error)]
pub enum StackError {
    /// A remote stack operation failed.
    #[error("Stack operation failed for \"{stack_name}\": {cause}")]
    OperationFailed {
        /// Name of the stack.
        stack_name: String,
        /// Underlying cause reported by the control plane.
        cause: String,
    },

    /// The control plane rejected the request as invalid.
    ///
    /// Validation errors are not transient and are never retried.
    #[error("Invalid stack request: {message}")]
    ValidationRejected {
        /// Validation message from the control plane.
        message: String,
    },

    /// Recreate was requested for a protected stack without an override.
    #[error(
        "Unable to re-create stack \"{stack_name}\": stack is protected and \
         probably for a good reason. Use --force (with caution) to override."
    )]
    Protected {
        /// Name of the protected stack.
        stack_name: String,
    },

    /// Recreate was requested for an account-level (baseline) stack.
    #[error(
        "Re-creating account-level stacks is not allowed (for safety \
         purposes). Tear the stack down manually if you really mean it."
    )]
    BaselineRecreate,

    /// Dry run was requested against a stack that does not exist.
    #[error("Unable to perform dry run: stack \"{stack_name}\" does not exist yet")]
    NoStackForDryRun {
        /// Name of the missing stack.
        stack_name: String,
    },

    /// The stack reached a terminal state that is not the expected one.
    #[error("Stack \"{stack_name}\" ended in unexpected state {status}")]
    UnexpectedTerminalState {
        /// Name of the stack.
        stack_name: String,
        /// The terminal status that was observed.
        status: String,
    },

    /// The wait was cancelled before a terminal state was reached.
    #[error("Wait for stack \"{stack_name}\" was cancelled")]
    Cancelled {
        /// Name of the stack being waited on.
        stack_name: String,
    },
}

/// Release orchestration errors.
#[derive(Debug, Error)]
pub enum ReleaseError {
    /// Required configuration parameters are missing from the namespace.
    #[error(
        "The following parameters were not available for deployment: \
         {missing}. To fix this, try running `stagehand put-parameters \
         --service {service} --stage {stage}`."
    )]
    MissingParameters {
        /// Comma-separated sorted list of missing parameter names.
        missing: String,
        /// Service being released.
        service: String,
        /// Stage being released to.
        stage: String,
    },

    /// The version assigned by the publish step differs from the target.
    #[error(
        "Invalid deployed function version! Expected: {expected}. Got: \
         {actual}. Probable cause: another deployment of this service on \
         this exact stage ran concurrently and clobbered something. It is \
         safe to retry the whole release."
    )]
    VersionRace {
        /// Version the ledger allocated.
        expected: u32,
        /// Version the control plane actually assigned.
        actual: String,
    },

    /// A function control plane call failed.
    #[error("Function control plane error for \"{function_name}\": {cause}")]
    ControlPlane {
        /// Name of the function involved.
        function_name: String,
        /// Underlying cause.
        cause: String,
    },

    /// A parameter store call failed.
    #[error("Parameter store error at \"{path}\": {cause}")]
    ParameterStore {
        /// Namespace path involved.
        path: String,
        /// Underlying cause.
        cause: String,
    },

    /// An object store call failed while staging an artifact.
    #[error("Object store error for \"{bucket}\": {cause}")]
    ObjectStore {
        /// Bucket involved.
        bucket: String,
        /// Underlying cause.
        cause: String,
    },
}

/// API routing errors.
#[derive(Debug, Error)]
pub enum RouteError {
    /// A routing control plane call failed.
    #[error("Routing control plane error for domain \"{domain}\": {cause}")]
    ControlPlane {
        /// Custom domain involved.
        domain: String,
        /// Underlying cause.
        cause: String,
    },
}

/// Result type alias for Stagehand operations.
pub type Result<T> = std::result::Result<T, StagehandError>;

impl StagehandError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if this error was caused by user input and implies that
    /// no remote mutation has occurred.
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::Stack(
                    StackError::Protected { .. }
                        | StackError::BaselineRecreate
                        | StackError::NoStackForDryRun { .. }
                        | StackError::ValidationRejected { .. }
                )
        )
    }

    /// Returns true if re-running the whole command is known to be safe.
    ///
    /// Release races leave only idempotent or version-advancing steps behind,
    /// so the operator can simply retry.
    #[must_use]
    pub const fn is_safe_to_retry(&self) -> bool {
        matches!(
            self,
            Self::Release(
                ReleaseError::VersionRace { .. } | ReleaseError::MissingParameters { .. }
            )
        )
    }
}

impl StackError {
    /// Creates an operation-failed error.
    #[must_use]
    pub fn operation(stack_name: impl Into<String>, cause: impl Into<String>) -> Self {
        Self::OperationFailed {
            stack_name: stack_name.into(),
            cause: cause.into(),
        }
    }
}

impl ReleaseError {
    /// Creates a function control plane error.
    #[must_use]
    pub fn control_plane(function_name: impl Into<String>, cause: impl Into<String>) -> Self {
        Self::ControlPlane {
            function_name: function_name.into(),
            cause: cause.into(),
        }
    }

    /// Creates a parameter store error.
    #[must_use]
    pub fn parameter_store(path: impl Into<String>, cause: impl Into<String>) -> Self {
        Self::ParameterStore {
            path: path.into(),
            cause: cause.into(),
        }
    }

    /// Creates a missing-parameters error from the set of absent names.
    #[must_use]
    pub fn missing_parameters(
        missing: &[String],
        service: impl Into<String>,
        stage: impl Into<String>,
    ) -> Self {
        Self::MissingParameters {
            missing: missing.join(", "),
            service: service.into(),
            stage: stage.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protected_stack_is_user_error() {
        let err = StagehandError::Stack(StackError::Protected {
            stack_name: String::from("app-prod"),
        });
        assert!(err.is_user_error());
        assert!(!err.is_safe_to_retry());
    }

    #[test]
    fn test_version_race_is_safe_to_retry() {
        let err = StagehandError::Release(ReleaseError::VersionRace {
            expected: 7,
            actual: String::from("8"),
        });
        assert!(err.is_safe_to_retry());
        assert!(!err.is_user_error());
    }

    #[test]
    fn test_missing_parameters_names_remediation_command() {
        let err =
            ReleaseError::missing_parameters(&[String::from("DB_PASS")], "billing", "dev");
        let message = err.to_string();
        assert!(message.contains("DB_PASS"));
        assert!(message.contains("put-parameters"));
        assert!(message.contains("--service billing"));
    }
}
