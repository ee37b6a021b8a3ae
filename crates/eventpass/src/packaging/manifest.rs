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

//! Resource manifest: `resource name -> hex(digest(bytes))`.
//!
//! The manifest is the object that gets signed, so its serialization is
//! canonical: keys sorted lexicographically, lowercase hex values, four-space
//! indentation and no trailing newline. Two builds over identical resource
//! bytes produce byte-identical manifests.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::content::{ContentError, ContentStore, ResourceName, SealedContent};

/// Entry name of the serialized manifest inside the archive.
pub const MANIFEST_FILENAME: &str = "manifest.json";

/// Errors from manifest construction and parsing.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error(transparent)]
    Content(#[from] ContentError),

    #[error("Malformed manifest: {0}")]
    Malformed(String),

    #[error("Failed to serialize manifest: {0}")]
    Serialization(String),
}

/// Digest used for per-resource manifest entries.
///
/// `Sha1` is what the reference verifier ecosystem expects. `Sha256` is an
/// explicit opt-in for verifiers that accept it. The signature digest is
/// pinned separately in [`crate::crypto::sign_manifest`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    #[default]
    Sha1,
    Sha256,
}

impl DigestAlgorithm {
    /// Hex digest of `data`.
    pub fn hex_digest(&self, data: &[u8]) -> String {
        match self {
            DigestAlgorithm::Sha1 => hex::encode(Sha1::digest(data)),
            DigestAlgorithm::Sha256 => hex::encode(Sha256::digest(data)),
        }
    }

    /// Length of a hex digest produced by this algorithm.
    pub fn hex_len(&self) -> usize {
        match self {
            DigestAlgorithm::Sha1 => 40,
            DigestAlgorithm::Sha256 => 64,
        }
    }

    /// Infer the algorithm from a hex digest's length.
    pub fn from_hex_len(len: usize) -> Option<Self> {
        match len {
            40 => Some(DigestAlgorithm::Sha1),
            64 => Some(DigestAlgorithm::Sha256),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DigestAlgorithm::Sha1 => "sha1",
            DigestAlgorithm::Sha256 => "sha256",
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DigestAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sha1" | "sha-1" => Ok(DigestAlgorithm::Sha1),
            "sha256" | "sha-256" => Ok(DigestAlgorithm::Sha256),
            other => Err(format!("unsupported digest algorithm: {other}")),
        }
    }
}

/// Mapping of resource name to hex digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    algorithm: DigestAlgorithm,
    entries: BTreeMap<String, String>,
}

impl Manifest {
    /// Digest every resource of `content`.
    pub fn from_sealed(content: &SealedContent, algorithm: DigestAlgorithm) -> Self {
        let entries = content
            .iter()
            .map(|(name, bytes)| (name.as_str().to_string(), algorithm.hex_digest(bytes)))
            .collect();
        Self { algorithm, entries }
    }

    /// Parse a serialized manifest.
    ///
    /// Every value must be lowercase hex of one consistent digest length.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ManifestError> {
        let entries: BTreeMap<String, String> =
            serde_json::from_slice(bytes).map_err(|e| ManifestError::Malformed(e.to_string()))?;

        let mut algorithm = None;
        for (name, digest) in &entries {
            if !digest
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
            {
                return Err(ManifestError::Malformed(format!(
                    "digest for '{name}' is not lowercase hex"
                )));
            }
            let this = DigestAlgorithm::from_hex_len(digest.len()).ok_or_else(|| {
                ManifestError::Malformed(format!(
                    "digest for '{name}' has unexpected length {}",
                    digest.len()
                ))
            })?;
            match algorithm {
                None => algorithm = Some(this),
                Some(existing) if existing != this => {
                    return Err(ManifestError::Malformed(
                        "manifest mixes digest algorithms".to_string(),
                    ))
                }
                Some(_) => {}
            }
        }

        Ok(Self {
            algorithm: algorithm.unwrap_or_default(),
            entries,
        })
    }

    /// Canonical serialization; these exact bytes are signed.
    pub fn to_canonical_bytes(&self) -> Result<Vec<u8>, ManifestError> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.entries
            .serialize(&mut serializer)
            .map_err(|e| ManifestError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    pub fn digest_for(&self, name: ResourceName) -> Option<&str> {
        self.entries.get(name.as_str()).map(String::as_str)
    }

    /// Entries in canonical (lexicographic) order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Output of a manifest build: the frozen content and its manifest.
///
/// Keeping both together guarantees the packager archives exactly the bytes
/// that were digested.
#[derive(Debug, Clone)]
pub struct ManifestOutput {
    pub content: SealedContent,
    pub manifest: Manifest,
}

/// Builds manifests over a [`ContentStore`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ManifestBuilder {
    algorithm: DigestAlgorithm,
}

impl ManifestBuilder {
    pub fn new(algorithm: DigestAlgorithm) -> Self {
        Self { algorithm }
    }

    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    /// Seal the store and digest every resource.
    ///
    /// Fails with a `ResourceUnavailable` content error if a resource is
    /// missing or unreadable.
    pub fn build(&self, store: &ContentStore) -> Result<ManifestOutput, ManifestError> {
        let content = store.seal()?;
        let manifest = Manifest::from_sealed(&content, self.algorithm);

        tracing::debug!(
            algorithm = %self.algorithm,
            entries = manifest.len(),
            "Built resource manifest"
        );

        Ok(ManifestOutput { content, manifest })
    }
}
