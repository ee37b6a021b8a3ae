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

//! Detached manifest signatures.
//!
//! Provides functions for:
//! - Signing serialized manifest bytes with RSASSA-PKCS1-v1_5 over SHA-1
//! - Verifying such signatures against an RSA public key
//! - Computing SHA256 fingerprints
//!
//! The signature digest is pinned to SHA-1 by the pass verifier format and is
//! independent of the digest used for manifest entries.

use rsa::pkcs1v15::{Signature as RsaSignature, SigningKey, VerifyingKey};
use rsa::RsaPublicKey;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use signature::{SignatureEncoding, Signer, Verifier};
use thiserror::Error;

use super::identity::SigningIdentity;

/// Entry name of the detached signature inside the archive.
pub const SIGNATURE_FILENAME: &str = "signature";

/// Algorithm identifier of the manifest signature.
pub const SIGNATURE_ALGORITHM: &str = "rsassa-pkcs1-v1_5-sha1";

/// Errors that can occur during signing operations.
#[derive(Debug, Error)]
pub enum SigningError {
    #[error("Failed to create signature: {0}")]
    SignatureFailed(String),

    #[error("Invalid signature encoding: {0}")]
    InvalidSignature(String),

    #[error("Signature verification failed")]
    VerificationFailed,
}

/// Raw detached signature bytes over a serialized manifest.
#[derive(Clone, PartialEq, Eq)]
pub struct Signature(Vec<u8>);

impl Signature {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Signature({} bytes)", self.0.len())
    }
}

impl AsRef<[u8]> for Signature {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Signs the exact serialized manifest bytes with the identity's private key.
///
/// # Arguments
///
/// * `identity` - The signing identity
/// * `manifest_bytes` - The canonical manifest serialization
///
/// # Returns
///
/// The PKCS#1 v1.5 signature (256 bytes for a 2048-bit key).
///
/// # Errors
///
/// Returns `SigningError::SignatureFailed` if the key is structurally invalid.
/// This is fatal and retrying will not help.
pub fn sign_manifest(
    identity: &SigningIdentity,
    manifest_bytes: &[u8],
) -> Result<Signature, SigningError> {
    let signing_key = SigningKey::<Sha1>::new(identity.private_key().clone());
    let signature: RsaSignature = signing_key
        .try_sign(manifest_bytes)
        .map_err(|e| SigningError::SignatureFailed(e.to_string()))?;

    Ok(Signature(signature.to_vec()))
}

/// Verifies a manifest signature using an RSA public key.
///
/// # Returns
///
/// `Ok(())` if the signature is valid.
///
/// # Errors
///
/// Returns `SigningError` if the signature is malformed or verification fails.
pub fn verify_manifest_signature(
    public_key: &RsaPublicKey,
    manifest_bytes: &[u8],
    signature: &[u8],
) -> Result<(), SigningError> {
    let verifying_key = VerifyingKey::<Sha1>::new(public_key.clone());
    let signature = RsaSignature::try_from(signature)
        .map_err(|e| SigningError::InvalidSignature(e.to_string()))?;

    verifying_key
        .verify(manifest_bytes, &signature)
        .map_err(|_| SigningError::VerificationFailed)
}

/// Computes the SHA256 hex fingerprint of arbitrary bytes.
///
/// Used for certificate fingerprints and archive checksums.
pub fn compute_fingerprint(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
