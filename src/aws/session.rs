//! Credential and session resolution.
//!
//! Credentials are looked up in the environment first, then in a named
//! shared-config profile. When neither source can possibly yield
//! credentials, a distinguished credentials error is raised before any
//! control plane is contacted.

use std::path::PathBuf;

use tracing::debug;

use crate::error::{CredentialsError, Result};

/// Environment variable holding the access key id.
const ENV_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";

/// Environment variable holding the secret access key.
const ENV_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";

/// Builds SDK sessions for a resolved account and region.
#[derive(Debug, Clone)]
pub struct SessionFactory {
    /// Shared-config profile to fall back to.
    profile: String,
}

impl SessionFactory {
    /// Creates a factory falling back to the given profile, or `default`.
    #[must_use]
    pub fn new(profile: Option<&str>) -> Self {
        Self {
            profile: profile.unwrap_or("default").to_string(),
        }
    }

    /// Resolves a session for the given region.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialsError::NotResolvable`] when neither the
    /// environment nor the shared-config files can provide credentials.
    pub async fn session(&self, region: &str) -> Result<aws_config::SdkConfig> {
        if Self::has_env_credentials() {
            debug!("using credentials from the environment");
            let config = aws_config::from_env()
                .region(aws_config::Region::new(region.to_string()))
                .load()
                .await;
            return Ok(config);
        }

        if !Self::has_shared_config_files() {
            return Err(CredentialsError::NotResolvable {
                profile: self.profile.clone(),
            }
            .into());
        }

        debug!("using credentials from profile \"{}\"", self.profile);
        let config = aws_config::from_env()
            .profile_name(&self.profile)
            .region(aws_config::Region::new(region.to_string()))
            .load()
            .await;
        Ok(config)
    }

    fn has_env_credentials() -> bool {
        std::env::var_os(ENV_ACCESS_KEY_ID).is_some()
            && std::env::var_os(ENV_SECRET_ACCESS_KEY).is_some()
    }

    fn has_shared_config_files() -> bool {
        let Some(home) = std::env::var_os("HOME") else {
            return false;
        };
        let aws_dir = PathBuf::from(home).join(".aws");
        aws_dir.join("credentials").exists() || aws_dir.join("config").exists()
    }
}
