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

//! Configuration types for pass issuance.
//!
//! [`IssuerConfig`] carries the issuer template shared by every pass, the
//! identity mode and the archive options. It deserializes from TOML with every
//! field optional, and can be assembled in code through
//! [`IssuerConfig::builder()`]:
//!
//! ```rust,ignore
//! let config = IssuerConfig::builder()
//!     .organization_name("Kai Events")
//!     .identity_mode(IdentityMode::Persistent)
//!     .store_dir("/var/lib/eventpass")
//!     .build()?;
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::content::PassTemplate;
use crate::crypto::parse_key_encryption_key;
use crate::packaging::{ArchiveCompression, DigestAlgorithm};
use crate::security::{
    EphemeralIdentityProvider, FileIdentityStore, IdentityProvider, DEFAULT_KEYGEN_TIMEOUT,
};

/// Errors from configuration validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Environment variable '{0}' is not set")]
    MissingEnv(String),

    #[error("Invalid key-encryption key in '{var}': {reason}")]
    InvalidEncryptionKey { var: String, reason: String },

    #[error("No store directory configured and no platform data directory available")]
    NoStoreDir,
}

/// How the pipeline obtains its signing identity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityMode {
    /// A new key pair and certificate for every issuance.
    #[default]
    Ephemeral,
    /// One identity loaded from (or created in) a store directory.
    Persistent,
}

/// Identity section of the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    pub mode: IdentityMode,
    /// Certificate subject common name.
    pub common_name: String,
    /// Store directory for persistent mode; defaults to the platform data dir.
    pub store_dir: Option<PathBuf>,
    /// Name of the environment variable holding a 64-hex-char AES-256 key.
    pub encryption_key_env: Option<String>,
    pub keygen_timeout_secs: u64,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            mode: IdentityMode::default(),
            common_name: "Test Certificate".to_string(),
            store_dir: None,
            encryption_key_env: None,
            keygen_timeout_secs: DEFAULT_KEYGEN_TIMEOUT.as_secs(),
        }
    }
}

impl IdentityConfig {
    pub fn keygen_timeout(&self) -> Duration {
        Duration::from_secs(self.keygen_timeout_secs)
    }

    /// Store directory, falling back to `<data dir>/eventpass/identity`.
    pub fn resolved_store_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.store_dir {
            Some(dir) => Ok(dir.clone()),
            None => dirs::data_dir()
                .map(|d| d.join("eventpass").join("identity"))
                .ok_or(ConfigError::NoStoreDir),
        }
    }

    /// Read the key-encryption key from the configured environment variable.
    ///
    /// Returns `Ok(None)` when no variable is configured.
    pub fn encryption_key(&self) -> Result<Option<[u8; 32]>, ConfigError> {
        let Some(var) = &self.encryption_key_env else {
            return Ok(None);
        };
        let value = std::env::var(var).map_err(|_| ConfigError::MissingEnv(var.clone()))?;
        parse_key_encryption_key(&value)
            .map(Some)
            .map_err(|e| ConfigError::InvalidEncryptionKey {
                var: var.clone(),
                reason: e.to_string(),
            })
    }

    /// Persistent store described by this section.
    pub fn file_store(&self) -> Result<FileIdentityStore, ConfigError> {
        let mut store = FileIdentityStore::new(self.resolved_store_dir()?, &self.common_name)
            .with_keygen_timeout(self.keygen_timeout());
        if let Some(key) = self.encryption_key()? {
            store = store.with_encryption_key(key);
        }
        Ok(store)
    }

    /// Provider for the configured mode.
    pub fn provider(&self) -> Result<Arc<dyn IdentityProvider>, ConfigError> {
        match self.mode {
            IdentityMode::Ephemeral => Ok(Arc::new(
                EphemeralIdentityProvider::new(&self.common_name)
                    .with_keygen_timeout(self.keygen_timeout()),
            )),
            IdentityMode::Persistent => Ok(Arc::new(self.file_store()?)),
        }
    }
}

/// Archive section of the configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    pub compression: ArchiveCompression,
    /// Digest for manifest entries. The signature digest is always SHA-1.
    pub digest: DigestAlgorithm,
    /// Replace existing files at the output path.
    pub overwrite: bool,
}

/// Configuration for a [`crate::PassIssuer`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IssuerConfig {
    #[serde(rename = "pass")]
    template: PassTemplate,
    identity: IdentityConfig,
    archive: ArchiveConfig,
    max_concurrent_issuances: usize,
}

impl Default for IssuerConfig {
    fn default() -> Self {
        Self {
            template: PassTemplate::default(),
            identity: IdentityConfig::default(),
            archive: ArchiveConfig::default(),
            max_concurrent_issuances: 4,
        }
    }
}

impl IssuerConfig {
    /// Creates a new configuration builder with default values.
    pub fn builder() -> IssuerConfigBuilder {
        IssuerConfigBuilder::default()
    }

    /// Builder seeded with this configuration, for applying overrides.
    pub fn into_builder(self) -> IssuerConfigBuilder {
        IssuerConfigBuilder { config: self }
    }

    /// Issuer values copied into every pass definition.
    pub fn template(&self) -> &PassTemplate {
        &self.template
    }

    pub fn identity(&self) -> &IdentityConfig {
        &self.identity
    }

    pub fn archive(&self) -> &ArchiveConfig {
        &self.archive
    }

    /// Upper bound on issuances running at once in a batch.
    pub fn max_concurrent_issuances(&self) -> usize {
        self.max_concurrent_issuances
    }

    /// Check values that deserialization alone cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("pass.pass_type_identifier", &self.template.pass_type_identifier),
            ("pass.team_identifier", &self.template.team_identifier),
            ("pass.organization_name", &self.template.organization_name),
            ("pass.message_encoding", &self.template.message_encoding),
            ("identity.common_name", &self.identity.common_name),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{field} must not be empty")));
            }
        }
        if self.identity.keygen_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "identity.keygen_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.max_concurrent_issuances == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrent_issuances must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`IssuerConfig`].
#[derive(Debug, Clone, Default)]
pub struct IssuerConfigBuilder {
    config: IssuerConfig,
}

impl IssuerConfigBuilder {
    /// Sets the whole issuer template.
    pub fn template(mut self, value: PassTemplate) -> Self {
        self.config.template = value;
        self
    }

    pub fn pass_type_identifier(mut self, value: impl Into<String>) -> Self {
        self.config.template.pass_type_identifier = value.into();
        self
    }

    pub fn team_identifier(mut self, value: impl Into<String>) -> Self {
        self.config.template.team_identifier = value.into();
        self
    }

    pub fn organization_name(mut self, value: impl Into<String>) -> Self {
        self.config.template.organization_name = value.into();
        self
    }

    pub fn description(mut self, value: impl Into<String>) -> Self {
        self.config.template.description = value.into();
        self
    }

    /// Sets the identity mode.
    pub fn identity_mode(mut self, value: IdentityMode) -> Self {
        self.config.identity.mode = value;
        self
    }

    /// Sets the certificate common name.
    pub fn common_name(mut self, value: impl Into<String>) -> Self {
        self.config.identity.common_name = value.into();
        self
    }

    /// Sets the persistent store directory.
    pub fn store_dir(mut self, value: impl Into<PathBuf>) -> Self {
        self.config.identity.store_dir = Some(value.into());
        self
    }

    /// Sets the environment variable holding the key-encryption key.
    pub fn encryption_key_env(mut self, value: impl Into<String>) -> Self {
        self.config.identity.encryption_key_env = Some(value.into());
        self
    }

    /// Sets the key generation timeout.
    pub fn keygen_timeout(mut self, value: Duration) -> Self {
        self.config.identity.keygen_timeout_secs = value.as_secs();
        self
    }

    pub fn compression(mut self, value: ArchiveCompression) -> Self {
        self.config.archive.compression = value;
        self
    }

    /// Sets the manifest entry digest.
    pub fn digest(mut self, value: DigestAlgorithm) -> Self {
        self.config.archive.digest = value;
        self
    }

    pub fn overwrite(mut self, value: bool) -> Self {
        self.config.archive.overwrite = value;
        self
    }

    pub fn max_concurrent_issuances(mut self, value: usize) -> Self {
        self.config.max_concurrent_issuances = value;
        self
    }

    /// Validates and builds the configuration.
    pub fn build(self) -> Result<IssuerConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
