/*
 *  Copyright 2025 Eventpass Developers
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

use crate::config::ConfigError;
use eventpass::IssuerConfig;
use regex::Regex;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit configuration file.
pub const CONFIG_ENV_VAR: &str = "EVENTPASS_CONFIG";

pub struct ConfigLoader {
    search_paths: Vec<PathBuf>,
}

impl ConfigLoader {
    /// Create a new config loader with default search paths
    pub fn new() -> Self {
        let mut search_paths = Vec::new();

        // 1. Current directory
        search_paths.push(PathBuf::from("./eventpass.toml"));

        // 2. User config directory
        if let Some(config_dir) = dirs::config_dir() {
            search_paths.push(config_dir.join("eventpass").join("config.toml"));
        }

        // 3. System config directory
        search_paths.push(PathBuf::from("/etc/eventpass/config.toml"));

        Self { search_paths }
    }

    /// Create a config loader with custom search paths
    pub fn with_search_paths(search_paths: Vec<PathBuf>) -> Self {
        Self { search_paths }
    }

    /// Load configuration from the specified file or auto-discover
    pub fn load_config(&self, config_file: Option<&Path>) -> Result<IssuerConfig, ConfigError> {
        let config_path = if let Some(path) = config_file {
            path.to_path_buf()
        } else if let Ok(env_config) = env::var(CONFIG_ENV_VAR) {
            PathBuf::from(env_config)
        } else {
            self.find_config_file().ok_or(ConfigError::ConfigNotFound)?
        };

        self.load_config_from_file(&config_path)
    }

    /// Like [`ConfigLoader::load_config`], but falls back to the built-in
    /// defaults when no file is named and none is discovered.
    pub fn load_or_default(&self, config_file: Option<&Path>) -> Result<IssuerConfig, ConfigError> {
        match self.load_config(config_file) {
            Err(ConfigError::ConfigNotFound) => {
                tracing::debug!("No configuration file found, using defaults");
                Ok(IssuerConfig::default())
            }
            other => other,
        }
    }

    /// Load configuration from a specific file
    pub fn load_config_from_file(&self, path: &Path) -> Result<IssuerConfig, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;

        let substituted_content = self.substitute_env_vars(&content)?;

        let config = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") | None => toml::from_str::<IssuerConfig>(&substituted_content)?,
            Some(ext) => {
                return Err(ConfigError::UnsupportedFormat {
                    extension: ext.to_string(),
                })
            }
        };
        config.validate()?;

        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Find the first existing configuration file in search paths
    pub fn find_config_file(&self) -> Option<PathBuf> {
        self.search_paths
            .iter()
            .find(|path| path.is_file())
            .cloned()
    }

    /// Substitute environment variables in configuration content
    fn substitute_env_vars(&self, content: &str) -> Result<String, ConfigError> {
        // ${VAR}, ${VAR:-default}, ${VAR:?error}
        let re = Regex::new(r"\$\{([^}]+)\}")
            .map_err(|e| ConfigError::EnvSubstitutionError(e.to_string()))?;
        let mut result = content.to_string();

        for cap in re.captures_iter(content) {
            let full_match = &cap[0];
            let var_expr = &cap[1];

            let replacement = self.process_var_expression(var_expr)?;
            result = result.replace(full_match, &replacement);
        }

        Ok(result)
    }

    /// Process a variable expression like "VAR", "VAR:-default", or "VAR:?error"
    fn process_var_expression(&self, expr: &str) -> Result<String, ConfigError> {
        if let Some((var_name, default_value)) = expr.split_once(":-") {
            Ok(env::var(var_name).unwrap_or_else(|_| default_value.to_string()))
        } else if let Some((var_name, error_msg)) = expr.split_once(":?") {
            env::var(var_name).map_err(|_| {
                ConfigError::EnvSubstitutionError(format!(
                    "Required environment variable '{}' is not set: {}",
                    var_name, error_msg
                ))
            })
        } else {
            env::var(expr).map_err(|_| {
                ConfigError::EnvSubstitutionError(format!(
                    "Required environment variable '{}' is not set",
                    expr
                ))
            })
        }
    }

    /// Get all search paths for debugging
    pub fn get_search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eventpass::{DigestAlgorithm, IdentityMode};
    use serial_test::serial;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    #[serial]
    fn test_env_substitution_with_default() {
        let loader = ConfigLoader::new();
        env::remove_var("EVENTPASS_TEST_ORG");

        let content = "organization_name = \"${EVENTPASS_TEST_ORG:-Kai Events}\"";
        let result = loader.substitute_env_vars(content).unwrap();
        assert_eq!(result, "organization_name = \"Kai Events\"");
    }

    #[test]
    #[serial]
    fn test_env_substitution_with_existing_var() {
        let loader = ConfigLoader::new();
        env::set_var("EVENTPASS_TEST_ORG", "Rust Events");

        let content = "organization_name = \"${EVENTPASS_TEST_ORG:-Kai Events}\"";
        let result = loader.substitute_env_vars(content).unwrap();
        assert_eq!(result, "organization_name = \"Rust Events\"");

        env::remove_var("EVENTPASS_TEST_ORG");
    }

    #[test]
    #[serial]
    fn test_env_substitution_required_var_missing() {
        let loader = ConfigLoader::new();
        env::remove_var("EVENTPASS_TEST_REQUIRED");

        let result = loader.substitute_env_vars("store_dir = \"${EVENTPASS_TEST_REQUIRED}\"");
        assert!(matches!(result, Err(ConfigError::EnvSubstitutionError(_))));
    }

    #[test]
    #[serial]
    fn test_env_substitution_custom_error() {
        let loader = ConfigLoader::new();
        env::remove_var("EVENTPASS_TEST_REQUIRED");

        let content = "store_dir = \"${EVENTPASS_TEST_REQUIRED:?identity store must be set}\"";
        let result = loader.substitute_env_vars(content);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("identity store must be set"));
    }

    #[test]
    #[serial]
    fn test_load_config_from_file() {
        env::set_var("EVENTPASS_TEST_STORE", "/var/lib/eventpass");
        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        write!(
            file,
            r#"
max_concurrent_issuances = 8

[pass]
organization_name = "Rust Events"

[identity]
mode = "persistent"
store_dir = "${{EVENTPASS_TEST_STORE}}"

[archive]
digest = "sha256"
"#
        )
        .unwrap();

        let config = ConfigLoader::with_search_paths(Vec::new())
            .load_config(Some(file.path()))
            .unwrap();

        assert_eq!(config.template().organization_name, "Rust Events");
        assert_eq!(config.template().team_identifier, "ABCDE12345");
        assert_eq!(config.identity().mode, IdentityMode::Persistent);
        assert_eq!(
            config.identity().store_dir,
            Some(PathBuf::from("/var/lib/eventpass"))
        );
        assert_eq!(config.archive().digest, DigestAlgorithm::Sha256);
        assert_eq!(config.max_concurrent_issuances(), 8);

        env::remove_var("EVENTPASS_TEST_STORE");
    }

    #[test]
    fn test_invalid_values_fail_validation() {
        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(file, "max_concurrent_issuances = 0").unwrap();

        let result = ConfigLoader::with_search_paths(Vec::new()).load_config(Some(file.path()));
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_unsupported_extension() {
        let file = NamedTempFile::with_suffix(".yaml").unwrap();

        let result = ConfigLoader::with_search_paths(Vec::new()).load_config(Some(file.path()));
        assert!(matches!(
            result,
            Err(ConfigError::UnsupportedFormat { extension }) if extension == "yaml"
        ));
    }

    #[test]
    #[serial]
    fn test_search_path_discovery_and_default() {
        env::remove_var(CONFIG_ENV_VAR);
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.toml");
        let present = dir.path().join("config.toml");

        let loader = ConfigLoader::with_search_paths(vec![missing.clone(), present.clone()]);
        assert!(loader.find_config_file().is_none());
        assert!(matches!(
            loader.load_config(None),
            Err(ConfigError::ConfigNotFound)
        ));
        assert_eq!(loader.load_or_default(None).unwrap(), IssuerConfig::default());

        fs::write(&present, "[pass]\ndescription = \"Found\"\n").unwrap();
        assert_eq!(loader.find_config_file(), Some(present));
        assert_eq!(
            loader.load_or_default(None).unwrap().template().description,
            "Found"
        );
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let loader = ConfigLoader::with_search_paths(Vec::new());
        let result = loader.load_or_default(Some(Path::new("/nonexistent/eventpass.toml")));
        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }
}
