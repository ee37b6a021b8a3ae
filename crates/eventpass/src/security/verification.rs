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

//! Pass archive verification.
//!
//! This module provides:
//! - [`VerificationError`] for specific failure types
//! - [`VerificationResult`] describing a verified archive
//! - [`verify_pass_archive`] and [`verify_pass_archive_bytes`]
//!
//! Verification checks, in order: the entry set is exactly the five expected
//! names, the manifest parses and covers exactly the three resources, every
//! recomputed digest matches, and the signature over the manifest bytes
//! verifies under the certificate's public key.

use std::path::Path;

use thiserror::Error;
use x509_cert::der::Encode;

use super::audit;
use crate::content::{PassDefinition, ResourceName};
use crate::crypto::{
    compute_fingerprint, public_key_from_certificate, verify_manifest_signature, Certificate,
    SIGNATURE_FILENAME,
};
use crate::packaging::{
    read_archive, read_archive_bytes, ArchiveError, DigestAlgorithm, Manifest, UnpackedArchive,
    MANIFEST_FILENAME,
};

/// Errors that occur during archive verification.
///
/// These are hard failures - there are no "warnings" for security.
#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("Archive is missing entry '{entry}'")]
    MissingEntry { entry: String },

    #[error("Archive contains unexpected entry '{entry}'")]
    UnexpectedEntry { entry: String },

    #[error("Manifest is malformed: {reason}")]
    MalformedManifest { reason: String },

    #[error("Resource '{resource}' has been tampered with: digest mismatch (expected {expected}, got {actual})")]
    TamperedResource {
        resource: String,
        /// Digest recorded in the manifest
        expected: String,
        /// Digest of the archived bytes
        actual: String,
    },

    #[error("Invalid signature: cryptographic verification failed")]
    InvalidSignature,

    #[error("Certificate is unusable: {reason}")]
    Certificate { reason: String },

    #[error("Failed to read archive: {error}")]
    Archive { error: String },
}

impl VerificationError {
    /// Stable reason code for audit records.
    pub fn reason_code(&self) -> &'static str {
        match self {
            VerificationError::MissingEntry { .. } => "missing_entry",
            VerificationError::UnexpectedEntry { .. } => "unexpected_entry",
            VerificationError::MalformedManifest { .. } => "malformed_manifest",
            VerificationError::TamperedResource { .. } => "tampered_resource",
            VerificationError::InvalidSignature => "invalid_signature",
            VerificationError::Certificate { .. } => "certificate",
            VerificationError::Archive { .. } => "archive",
        }
    }
}

impl From<ArchiveError> for VerificationError {
    fn from(err: ArchiveError) -> Self {
        match err {
            ArchiveError::MissingEntry(entry) => VerificationError::MissingEntry { entry },
            ArchiveError::UnexpectedEntry(entry) => VerificationError::UnexpectedEntry { entry },
            other => VerificationError::Archive {
                error: other.to_string(),
            },
        }
    }
}

/// Result of successful verification.
#[derive(Debug, Clone)]
pub struct VerificationResult {
    /// Serial number from `pass.json`, when it parses
    pub serial_number: Option<String>,
    /// Digest algorithm used by the manifest entries
    pub digest_algorithm: DigestAlgorithm,
    /// SHA256 fingerprint of the certificate that verified the signature
    pub signer_fingerprint: String,
    /// SHA256 of the manifest bytes
    pub manifest_hash: String,
}

/// Verify a pass archive on disk against an issuer certificate.
///
/// # Arguments
///
/// * `archive_path` - Path to the `.pkpass` archive
/// * `certificate` - The issuer certificate, obtained out-of-band
///
/// # Returns
///
/// `Ok(VerificationResult)` if verification succeeds, `Err(VerificationError)` otherwise.
pub fn verify_pass_archive<P: AsRef<Path>>(
    archive_path: P,
    certificate: &Certificate,
) -> Result<VerificationResult, VerificationError> {
    let archive_path = archive_path.as_ref();
    let label = archive_path.display().to_string();
    let outcome = read_archive(archive_path)
        .map_err(VerificationError::from)
        .and_then(|archive| verify_unpacked(&archive, certificate));
    record(&label, certificate, outcome)
}

/// Verify a pass archive held in memory.
pub fn verify_pass_archive_bytes(
    bytes: &[u8],
    certificate: &Certificate,
) -> Result<VerificationResult, VerificationError> {
    let outcome = read_archive_bytes(bytes)
        .map_err(VerificationError::from)
        .and_then(|archive| verify_unpacked(&archive, certificate));
    record("<memory>", certificate, outcome)
}

fn record(
    label: &str,
    certificate: &Certificate,
    outcome: Result<VerificationResult, VerificationError>,
) -> Result<VerificationResult, VerificationError> {
    match &outcome {
        Ok(result) => audit::log_archive_verified(
            label,
            result.serial_number.as_deref(),
            &result.signer_fingerprint,
        ),
        Err(e) => {
            audit::log_archive_verify_failed(label, e.reason_code(), &certificate_fingerprint(certificate))
        }
    }
    outcome
}

fn certificate_fingerprint(certificate: &Certificate) -> String {
    certificate
        .to_der()
        .map(|der| compute_fingerprint(&der))
        .unwrap_or_else(|_| "<unencodable>".to_string())
}

fn verify_unpacked(
    archive: &UnpackedArchive,
    certificate: &Certificate,
) -> Result<VerificationResult, VerificationError> {
    archive.ensure_layout()?;

    let manifest_bytes = archive
        .manifest_bytes()
        .ok_or_else(|| VerificationError::MissingEntry {
            entry: MANIFEST_FILENAME.to_string(),
        })?;
    let signature = archive
        .signature_bytes()
        .ok_or_else(|| VerificationError::MissingEntry {
            entry: SIGNATURE_FILENAME.to_string(),
        })?;

    let manifest =
        Manifest::from_bytes(manifest_bytes).map_err(|e| VerificationError::MalformedManifest {
            reason: e.to_string(),
        })?;

    if manifest.len() != ResourceName::ALL.len() {
        return Err(VerificationError::MalformedManifest {
            reason: format!(
                "expected {} entries, found {}",
                ResourceName::ALL.len(),
                manifest.len()
            ),
        });
    }

    for name in ResourceName::ALL {
        let expected = manifest
            .digest_for(name)
            .ok_or_else(|| VerificationError::MalformedManifest {
                reason: format!("no digest for '{name}'"),
            })?;
        let bytes = archive
            .resource(name)
            .ok_or_else(|| VerificationError::MissingEntry {
                entry: name.as_str().to_string(),
            })?;
        let actual = manifest.algorithm().hex_digest(bytes);
        if actual != expected {
            return Err(VerificationError::TamperedResource {
                resource: name.as_str().to_string(),
                expected: expected.to_string(),
                actual,
            });
        }
    }

    let public_key =
        public_key_from_certificate(certificate).map_err(|e| VerificationError::Certificate {
            reason: e.to_string(),
        })?;
    verify_manifest_signature(&public_key, manifest_bytes, signature)
        .map_err(|_| VerificationError::InvalidSignature)?;

    let serial_number = archive
        .resource(ResourceName::PassDefinition)
        .and_then(|bytes| serde_json::from_slice::<PassDefinition>(bytes).ok())
        .map(|definition| definition.serial_number);

    Ok(VerificationResult {
        serial_number,
        digest_algorithm: manifest.algorithm(),
        signer_fingerprint: certificate_fingerprint(certificate),
        manifest_hash: compute_fingerprint(manifest_bytes),
    })
}
