//! Configuration loading and environment substitution.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{ConfigError, Result};

use super::spec::DeployConfig;

/// File names probed when no explicit config path is given.
const DEFAULT_FILENAMES: [&str; 2] = ["stagehand.deploy.yaml", "stagehand.deploy.yml"];

/// Locates the configuration file in a directory.
///
/// # Errors
///
/// Returns a file-not-found error when none of the default names exist.
pub fn find_config_file(dir: impl AsRef<Path>) -> Result<PathBuf> {
    let dir = dir.as_ref();
    for name in DEFAULT_FILENAMES {
        let candidate = dir.join(name);
        if candidate.exists() {
            return Ok(candidate);
        }
    }
    Err(ConfigError::FileNotFound {
        path: dir.join(DEFAULT_FILENAMES[0]),
    }
    .into())
}

/// Loads and validates deployment configuration files.
#[derive(Debug, Default)]
pub struct ConfigParser;

impl ConfigParser {
    /// Creates a parser.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Loads `.env` into the process environment, if present.
    pub fn load_dotenv(&self) {
        if dotenvy::dotenv().is_ok() {
            debug!("loaded environment from .env");
        }
    }

    /// Loads, substitutes, parses, and validates a configuration file.
    ///
    /// `${NAME}` references in the file are replaced with the value of the
    /// corresponding environment variable before parsing.
    ///
    /// # Errors
    ///
    /// Returns a config error if the file is missing, a referenced
    /// environment variable is unset, the YAML does not parse, or validation
    /// fails.
    pub fn load_file(&self, path: &Path) -> Result<DeployConfig> {
        let raw = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.to_path_buf(),
        })?;

        let substituted = substitute_env(&raw)?;

        let config: DeployConfig =
            serde_yaml::from_str(&substituted).map_err(|e| ConfigError::ParseError {
                message: e.to_string(),
            })?;

        config.validate()?;
        Ok(config)
    }
}

/// Replaces `${NAME}` references with environment variable values.
fn substitute_env(content: &str) -> Result<String> {
    let mut out = String::with_capacity(content.len());
    let mut rest = content;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            // An unterminated reference is left as-is.
            out.push_str(&rest[start..]);
            return Ok(out);
        };
        let name = &after[..end];
        let value = std::env::var(name).map_err(|_| ConfigError::MissingEnvVar {
            name: name.to_string(),
        })?;
        out.push_str(&value);
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_file_parses_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            dir.path(),
            "stagehand.deploy.yaml",
            "project:\n  name: billing\n",
        );

        let config = ConfigParser::new().load_file(&path).unwrap();
        assert_eq!(config.project.name, "billing");
    }

    #[test]
    fn test_find_config_file_probes_default_names() {
        let dir = tempfile::tempdir().unwrap();
        write_config(dir.path(), "stagehand.deploy.yml", "project:\n  name: x\n");

        let found = find_config_file(dir.path()).unwrap();
        assert!(found.ends_with("stagehand.deploy.yml"));
    }

    #[test]
    fn test_missing_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(find_config_file(dir.path()).is_err());
    }

    #[test]
    fn test_env_substitution() {
        std::env::set_var("STAGEHAND_TEST_PROJECT", "billing");
        let out = substitute_env("project:\n  name: ${STAGEHAND_TEST_PROJECT}\n").unwrap();
        assert!(out.contains("name: billing"));
    }

    #[test]
    fn test_missing_env_var_is_reported_by_name() {
        let err = substitute_env("name: ${STAGEHAND_TEST_DEFINITELY_UNSET}\n").unwrap_err();
        assert!(err.to_string().contains("STAGEHAND_TEST_DEFINITELY_UNSET"));
    }
}
