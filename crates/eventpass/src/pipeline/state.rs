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

//! Issuance lifecycle states.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stage of the pipeline, used to report where an issuance failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// Building the pass definition and collecting resources
    ContentAssembly,
    /// Sealing resources and digesting them
    ManifestConstruction,
    /// Obtaining the signing identity
    IdentityAcquisition,
    /// Signing the manifest bytes
    Signing,
    /// Writing the archive
    Packaging,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::ContentAssembly => "content_assembly",
            PipelineStage::ManifestConstruction => "manifest_construction",
            PipelineStage::IdentityAcquisition => "identity_acquisition",
            PipelineStage::Signing => "signing",
            PipelineStage::Packaging => "packaging",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of a single issuance.
///
/// Progress is strictly `Idle -> ContentAssembled -> ManifestBuilt -> Signed
/// -> Packaged`. Any non-terminal state may move to `Failed`; `Packaged` and
/// `Failed` are terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssuanceState {
    #[default]
    Idle,
    ContentAssembled,
    ManifestBuilt,
    Signed,
    Packaged,
    Failed(PipelineStage),
}

impl IssuanceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssuanceState::Idle => "idle",
            IssuanceState::ContentAssembled => "content_assembled",
            IssuanceState::ManifestBuilt => "manifest_built",
            IssuanceState::Signed => "signed",
            IssuanceState::Packaged => "packaged",
            IssuanceState::Failed(_) => "failed",
        }
    }

    /// The only successful state reachable from this one.
    pub fn successor(&self) -> Option<IssuanceState> {
        match self {
            IssuanceState::Idle => Some(IssuanceState::ContentAssembled),
            IssuanceState::ContentAssembled => Some(IssuanceState::ManifestBuilt),
            IssuanceState::ManifestBuilt => Some(IssuanceState::Signed),
            IssuanceState::Signed => Some(IssuanceState::Packaged),
            IssuanceState::Packaged | IssuanceState::Failed(_) => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, IssuanceState::Packaged | IssuanceState::Failed(_))
    }

    pub fn can_transition_to(&self, next: IssuanceState) -> bool {
        match next {
            IssuanceState::Failed(_) => !self.is_terminal(),
            other => self.successor() == Some(other),
        }
    }

    /// Move to `next`, rejecting skipped or backward transitions.
    pub fn advance(&mut self, next: IssuanceState) -> Result<(), InvalidTransition> {
        if !self.can_transition_to(next) {
            return Err(InvalidTransition {
                from: *self,
                to: next,
            });
        }
        tracing::trace!(from = self.as_str(), to = next.as_str(), "Issuance state transition");
        *self = next;
        Ok(())
    }
}

impl fmt::Display for IssuanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssuanceState::Failed(stage) => write!(f, "failed({stage})"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Attempted transition that the lifecycle does not allow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Invalid issuance transition from {from} to {to}")]
pub struct InvalidTransition {
    pub from: IssuanceState,
    pub to: IssuanceState,
}
