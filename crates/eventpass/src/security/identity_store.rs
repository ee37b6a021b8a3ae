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

//! Signing identity providers.
//!
//! This module provides:
//! - [`IdentityProvider`] trait through which the pipeline obtains an identity
//! - [`EphemeralIdentityProvider`] generating a fresh identity per issuance
//! - [`StaticIdentityProvider`] wrapping an injected identity
//! - [`FileIdentityStore`] persisting one identity under a directory
//!
//! A store directory holds `certificate.pem` and either `signing_key.pem`
//! (PKCS#8) or `signing_key.enc` (PKCS#8 DER sealed with AES-256-GCM, PEM
//! armoured). Passes signed by an ephemeral identity can only be verified with
//! the certificate that was returned alongside them.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tokio::sync::Mutex;

use super::audit;
use crate::crypto::{decrypt_private_key, encrypt_private_key, IdentityError, SigningIdentity};

/// Default bound on RSA key generation.
pub const DEFAULT_KEYGEN_TIMEOUT: Duration = Duration::from_secs(30);

/// Certificate file name inside a store directory.
pub const CERTIFICATE_FILE: &str = "certificate.pem";
/// Plaintext private key file name inside a store directory.
pub const PRIVATE_KEY_FILE: &str = "signing_key.pem";
/// Encrypted private key file name inside a store directory.
pub const ENCRYPTED_KEY_FILE: &str = "signing_key.enc";

const ENCRYPTED_KEY_PEM_TAG: &str = "EVENTPASS ENCRYPTED PRIVATE KEY";

/// Generate an identity on the blocking pool, bounded by `timeout`.
///
/// The timeout bounds how long the caller waits, not the work itself: RSA
/// generation cannot be interrupted, so a timed-out worker runs to completion
/// on the blocking pool and its result is dropped.
///
/// # Errors
///
/// Returns `IdentityError::Timeout` when generation does not finish in time
/// and `IdentityError::KeyGeneration` when the worker fails.
pub async fn generate_identity(
    common_name: &str,
    timeout: Duration,
) -> Result<SigningIdentity, IdentityError> {
    let common_name = common_name.to_string();
    let task = tokio::task::spawn_blocking(move || SigningIdentity::generate(&common_name));

    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) => Err(IdentityError::KeyGeneration(format!(
            "key generation worker failed: {join_error}"
        ))),
        Err(_) => Err(IdentityError::Timeout(timeout)),
    }
}

/// Source of the identity used to sign manifests.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Obtain the identity for the next signature.
    async fn signing_identity(&self) -> Result<Arc<SigningIdentity>, IdentityError>;

    /// Short label for logs.
    fn kind(&self) -> &'static str;
}

/// Generates a brand-new identity for every call.
#[derive(Debug, Clone)]
pub struct EphemeralIdentityProvider {
    common_name: String,
    keygen_timeout: Duration,
}

impl EphemeralIdentityProvider {
    pub fn new(common_name: impl Into<String>) -> Self {
        Self {
            common_name: common_name.into(),
            keygen_timeout: DEFAULT_KEYGEN_TIMEOUT,
        }
    }

    pub fn with_keygen_timeout(mut self, timeout: Duration) -> Self {
        self.keygen_timeout = timeout;
        self
    }
}

#[async_trait]
impl IdentityProvider for EphemeralIdentityProvider {
    async fn signing_identity(&self) -> Result<Arc<SigningIdentity>, IdentityError> {
        let identity = generate_identity(&self.common_name, self.keygen_timeout).await?;
        audit::log_identity_generated(identity.fingerprint(), &identity.subject(), false);
        Ok(Arc::new(identity))
    }

    fn kind(&self) -> &'static str {
        "ephemeral"
    }
}

/// Always returns the same, externally supplied identity.
#[derive(Debug, Clone)]
pub struct StaticIdentityProvider {
    identity: Arc<SigningIdentity>,
}

impl StaticIdentityProvider {
    pub fn new(identity: SigningIdentity) -> Self {
        Self {
            identity: Arc::new(identity),
        }
    }

    pub fn from_arc(identity: Arc<SigningIdentity>) -> Self {
        Self { identity }
    }

    pub fn identity(&self) -> &Arc<SigningIdentity> {
        &self.identity
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn signing_identity(&self) -> Result<Arc<SigningIdentity>, IdentityError> {
        Ok(self.identity.clone())
    }

    fn kind(&self) -> &'static str {
        "static"
    }
}

/// Persistent identity kept under a directory.
///
/// The first call to [`IdentityProvider::signing_identity`] loads the stored
/// identity or generates and saves one; later calls reuse the cached value.
/// All access to the directory is serialized through an async mutex.
pub struct FileIdentityStore {
    dir: PathBuf,
    common_name: String,
    keygen_timeout: Duration,
    encryption_key: Option<[u8; 32]>,
    cached: Mutex<Option<Arc<SigningIdentity>>>,
}

impl std::fmt::Debug for FileIdentityStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileIdentityStore")
            .field("dir", &self.dir)
            .field("common_name", &self.common_name)
            .field("encrypted", &self.encryption_key.is_some())
            .finish_non_exhaustive()
    }
}

impl FileIdentityStore {
    pub fn new(dir: impl Into<PathBuf>, common_name: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            common_name: common_name.into(),
            keygen_timeout: DEFAULT_KEYGEN_TIMEOUT,
            encryption_key: None,
            cached: Mutex::new(None),
        }
    }

    /// Encrypt the private key at rest with this AES-256 key.
    pub fn with_encryption_key(mut self, key: [u8; 32]) -> Self {
        self.encryption_key = Some(key);
        self
    }

    pub fn with_keygen_timeout(mut self, timeout: Duration) -> Self {
        self.keygen_timeout = timeout;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn certificate_path(&self) -> PathBuf {
        self.dir.join(CERTIFICATE_FILE)
    }

    fn key_path(&self) -> PathBuf {
        if self.encryption_key.is_some() {
            self.dir.join(ENCRYPTED_KEY_FILE)
        } else {
            self.dir.join(PRIVATE_KEY_FILE)
        }
    }

    /// Key file written by the other mode; must not survive a new identity.
    fn stale_key_path(&self) -> PathBuf {
        if self.encryption_key.is_some() {
            self.dir.join(PRIVATE_KEY_FILE)
        } else {
            self.dir.join(ENCRYPTED_KEY_FILE)
        }
    }

    /// Whether the directory already holds a certificate.
    pub fn exists(&self) -> bool {
        self.certificate_path().is_file()
    }

    /// Load the stored identity, if any.
    ///
    /// # Errors
    ///
    /// Fails if the files exist but cannot be read, decrypted or matched, or
    /// if only an encrypted key is present and no key-encryption key is set.
    pub async fn load(&self) -> Result<Option<Arc<SigningIdentity>>, IdentityError> {
        let mut cached = self.cached.lock().await;
        if let Some(identity) = cached.as_ref() {
            return Ok(Some(identity.clone()));
        }
        let loaded = self.read_from_disk().await?.map(Arc::new);
        if let Some(identity) = &loaded {
            *cached = Some(identity.clone());
        }
        Ok(loaded)
    }

    /// Generate and store a new identity.
    ///
    /// Refuses to replace an existing identity unless `force` is set.
    pub async fn init(&self, force: bool) -> Result<Arc<SigningIdentity>, IdentityError> {
        let mut cached = self.cached.lock().await;
        if !force && self.exists() {
            return Err(IdentityError::Store(format!(
                "identity already exists in {}",
                self.dir.display()
            )));
        }
        let identity = Arc::new(self.generate_and_save().await?);
        *cached = Some(identity.clone());
        Ok(identity)
    }

    /// PEM of the stored certificate.
    pub async fn certificate_pem(&self) -> Result<String, IdentityError> {
        tokio::fs::read_to_string(self.certificate_path())
            .await
            .map_err(|e| IdentityError::Store(format!("reading certificate: {e}")))
    }

    /// Write the stored certificate to `output` for out-of-band distribution.
    pub async fn export_certificate(&self, output: &Path) -> Result<(), IdentityError> {
        let identity = self
            .load()
            .await?
            .ok_or_else(|| IdentityError::Store(format!("no identity in {}", self.dir.display())))?;
        let pem = identity.certificate_pem()?;
        tokio::fs::write(output, pem)
            .await
            .map_err(|e| IdentityError::Store(format!("writing {}: {e}", output.display())))?;
        audit::log_certificate_exported(identity.fingerprint(), &output.display().to_string());
        Ok(())
    }

    async fn read_from_disk(&self) -> Result<Option<SigningIdentity>, IdentityError> {
        if !self.exists() {
            return Ok(None);
        }
        let certificate_pem = self.certificate_pem().await?;

        let encrypted_path = self.dir.join(ENCRYPTED_KEY_FILE);
        let plain_path = self.dir.join(PRIVATE_KEY_FILE);

        let (identity, encrypted) = if encrypted_path.is_file() {
            let kek = self.encryption_key.ok_or_else(|| {
                IdentityError::Store(format!(
                    "{} is encrypted but no key-encryption key is configured",
                    encrypted_path.display()
                ))
            })?;
            let armoured = read_store_file(&encrypted_path).await?;
            let block = pem::parse(armoured.as_bytes())
                .map_err(|e| IdentityError::InvalidPem(e.to_string()))?;
            if block.tag() != ENCRYPTED_KEY_PEM_TAG {
                return Err(IdentityError::InvalidPem(format!(
                    "unexpected PEM tag '{}'",
                    block.tag()
                )));
            }
            let der = decrypt_private_key(block.contents(), &kek)
                .map_err(|e| IdentityError::Store(e.to_string()))?;
            (SigningIdentity::from_der_key(&der, &certificate_pem)?, true)
        } else if plain_path.is_file() {
            if self.encryption_key.is_some() {
                tracing::warn!(
                    path = %plain_path.display(),
                    "Key-encryption key configured but stored private key is plaintext"
                );
            }
            let key_pem = read_store_file(&plain_path).await?;
            (SigningIdentity::from_pem(&key_pem, &certificate_pem)?, false)
        } else {
            return Err(IdentityError::Store(format!(
                "certificate present but no private key in {}",
                self.dir.display()
            )));
        };

        audit::log_identity_loaded(
            identity.fingerprint(),
            &self.dir.display().to_string(),
            encrypted,
        );
        Ok(Some(identity))
    }

    async fn generate_and_save(&self) -> Result<SigningIdentity, IdentityError> {
        let identity = generate_identity(&self.common_name, self.keygen_timeout).await?;

        let key_contents = match &self.encryption_key {
            Some(kek) => {
                let sealed = encrypt_private_key(&identity.private_key_der()?, kek)
                    .map_err(|e| IdentityError::Store(e.to_string()))?;
                pem::encode(&pem::Pem::new(ENCRYPTED_KEY_PEM_TAG, sealed))
            }
            None => identity.private_key_pem()?,
        };
        let certificate_pem = identity.certificate_pem()?;

        let dir = self.dir.clone();
        let key_path = self.key_path();
        let stale_key_path = self.stale_key_path();
        tokio::task::spawn_blocking(move || -> Result<(), IdentityError> {
            std::fs::create_dir_all(&dir)
                .map_err(|e| IdentityError::Store(format!("creating {}: {e}", dir.display())))?;
            // Stage both files before replacing either so a failed write
            // leaves the previous pair untouched.
            let staged_key = stage_file(&dir, &key_path, key_contents.as_bytes(), true)?;
            let certificate_path = dir.join(CERTIFICATE_FILE);
            let staged_certificate =
                stage_file(&dir, &certificate_path, certificate_pem.as_bytes(), false)?;
            persist_staged(staged_key, &key_path)?;
            persist_staged(staged_certificate, &certificate_path)?;
            match std::fs::remove_file(&stale_key_path) {
                Ok(()) => {
                    tracing::debug!(path = %stale_key_path.display(), "Removed stale private key");
                    Ok(())
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(IdentityError::Store(format!(
                    "removing {}: {e}",
                    stale_key_path.display()
                ))),
            }
        })
        .await
        .map_err(|e| IdentityError::Store(format!("store worker failed: {e}")))??;

        audit::log_identity_generated(identity.fingerprint(), &identity.subject(), true);
        Ok(identity)
    }
}

#[async_trait]
impl IdentityProvider for FileIdentityStore {
    async fn signing_identity(&self) -> Result<Arc<SigningIdentity>, IdentityError> {
        let mut cached = self.cached.lock().await;
        if let Some(identity) = cached.as_ref() {
            return Ok(identity.clone());
        }

        let identity = match self.read_from_disk().await? {
            Some(identity) => identity,
            None => self.generate_and_save().await?,
        };
        let identity = Arc::new(identity);
        *cached = Some(identity.clone());
        Ok(identity)
    }

    fn kind(&self) -> &'static str {
        "persistent"
    }
}

async fn read_store_file(path: &Path) -> Result<String, IdentityError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| IdentityError::Store(format!("reading {}: {e}", path.display())))
}

/// Write `contents` to a synced temp file in `dir`, ready to replace `path`.
fn stage_file(
    dir: &Path,
    path: &Path,
    contents: &[u8],
    private: bool,
) -> Result<NamedTempFile, IdentityError> {
    let store_err = |e: std::io::Error| IdentityError::Store(format!("writing {}: {e}", path.display()));

    let mut temp = NamedTempFile::new_in(dir).map_err(store_err)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = if private { 0o600 } else { 0o644 };
        temp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(mode))
            .map_err(store_err)?;
    }
    #[cfg(not(unix))]
    let _ = private;

    temp.write_all(contents).map_err(store_err)?;
    temp.as_file().sync_all().map_err(store_err)?;
    Ok(temp)
}

fn persist_staged(temp: NamedTempFile, path: &Path) -> Result<(), IdentityError> {
    temp.persist(path)
        .map_err(|e| IdentityError::Store(format!("writing {}: {}", path.display(), e.error)))?;
    Ok(())
}
