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

//! Issuance failures.

use thiserror::Error;

use super::state::{InvalidTransition, PipelineStage};
use crate::content::{ContentError, DefinitionError};
use crate::crypto::{IdentityError, SigningError};
use crate::packaging::{ArchiveError, ManifestError};

/// What went wrong during an issuance.
#[derive(Debug, Error)]
pub enum IssuanceErrorKind {
    #[error("resource unavailable: {0}")]
    ResourceUnavailable(String),

    #[error("invalid pass definition: {0}")]
    InvalidDefinition(#[from] DefinitionError),

    #[error("key generation failed: {0}")]
    KeyGenerationFailure(IdentityError),

    /// A stored identity could not be read, decrypted or matched.
    #[error("identity unavailable: {0}")]
    IdentityUnavailable(IdentityError),

    #[error("signing failed: {0}")]
    SigningFailure(#[from] SigningError),

    #[error("packaging failed: {0}")]
    PackagingFailure(#[from] ArchiveError),

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
}

impl IssuanceErrorKind {
    /// Short stable label for metrics and audit records.
    pub fn as_str(&self) -> &'static str {
        match self {
            IssuanceErrorKind::ResourceUnavailable(_) => "resource_unavailable",
            IssuanceErrorKind::InvalidDefinition(_) => "invalid_definition",
            IssuanceErrorKind::KeyGenerationFailure(_) => "key_generation_failure",
            IssuanceErrorKind::IdentityUnavailable(_) => "identity_unavailable",
            IssuanceErrorKind::SigningFailure(_) => "signing_failure",
            IssuanceErrorKind::PackagingFailure(_) => "packaging_failure",
            IssuanceErrorKind::InvalidTransition(_) => "invalid_transition",
        }
    }
}

impl From<ContentError> for IssuanceErrorKind {
    fn from(err: ContentError) -> Self {
        match err {
            ContentError::InvalidDefinition(e) => IssuanceErrorKind::InvalidDefinition(e),
            unavailable @ ContentError::ResourceUnavailable { .. } => {
                IssuanceErrorKind::ResourceUnavailable(unavailable.to_string())
            }
        }
    }
}

impl From<IdentityError> for IssuanceErrorKind {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::InvalidPem(_) | IdentityError::KeyMismatch | IdentityError::Store(_) => {
                IssuanceErrorKind::IdentityUnavailable(err)
            }
            IdentityError::KeyGeneration(_)
            | IdentityError::Timeout(_)
            | IdentityError::Certificate(_)
            | IdentityError::InvalidSubject(_) => IssuanceErrorKind::KeyGenerationFailure(err),
        }
    }
}

impl From<ManifestError> for IssuanceErrorKind {
    fn from(err: ManifestError) -> Self {
        match err {
            ManifestError::Content(e) => e.into(),
            other => IssuanceErrorKind::ResourceUnavailable(other.to_string()),
        }
    }
}

/// A failed issuance: the stage that failed and why.
///
/// When this is returned no archive from the issuance exists at the output
/// path.
#[derive(Debug, Error)]
#[error("Issuance failed during {stage}: {kind}")]
pub struct IssuanceError {
    pub stage: PipelineStage,
    #[source]
    pub kind: IssuanceErrorKind,
}

impl IssuanceError {
    pub fn new(stage: PipelineStage, kind: impl Into<IssuanceErrorKind>) -> Self {
        Self {
            stage,
            kind: kind.into(),
        }
    }

    pub fn is_resource_unavailable(&self) -> bool {
        matches!(self.kind, IssuanceErrorKind::ResourceUnavailable(_))
    }
}
