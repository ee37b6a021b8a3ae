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

//! The issuance stages as standalone functions.
//!
//! Each stage consumes the previous stage's output, so a caller can stop
//! early, inspect intermediate values, or re-sign an unchanged manifest with a
//! different identity.

use std::path::Path;

use crate::content::{
    ContentStore, PassDefinition, PassTemplate, ResourceName, ResourceSource, SealedContent,
    TicketHolder,
};
use crate::crypto::{compute_fingerprint, sign_manifest, Signature, SigningError, SigningIdentity};
use crate::packaging::{ArchivePackager, Manifest, ManifestBuilder, ManifestOutput, PackagedArchive};

use super::error::IssuanceError;
use super::state::PipelineStage;

/// Output of content assembly.
#[derive(Debug, Clone)]
pub struct AssembledContent {
    pub definition: PassDefinition,
    pub store: ContentStore,
}

/// A manifest together with the signature over its canonical bytes.
#[derive(Debug, Clone)]
pub struct SignedManifest {
    pub content: SealedContent,
    pub manifest: Manifest,
    pub manifest_bytes: Vec<u8>,
    pub signature: Signature,
    pub certificate_fingerprint: String,
}

/// Build the pass definition for `holder` and collect the three resources.
pub fn assemble_content(
    template: &PassTemplate,
    holder: &TicketHolder,
    icon: ResourceSource,
    logo: ResourceSource,
) -> Result<AssembledContent, IssuanceError> {
    let definition = PassDefinition::event_ticket(template, holder);

    let mut store = ContentStore::new();
    store
        .insert_definition(&definition)
        .map_err(|e| IssuanceError::new(PipelineStage::ContentAssembly, e))?;
    store.insert(ResourceName::Icon, icon);
    store.insert(ResourceName::Logo, logo);

    Ok(AssembledContent { definition, store })
}

/// Seal the store and digest every resource.
pub fn build_manifest(
    builder: &ManifestBuilder,
    store: &ContentStore,
) -> Result<ManifestOutput, IssuanceError> {
    builder
        .build(store)
        .map_err(|e| IssuanceError::new(PipelineStage::ManifestConstruction, e))
}

/// Serialize the manifest canonically and sign those exact bytes.
pub fn sign(
    output: ManifestOutput,
    identity: &SigningIdentity,
) -> Result<SignedManifest, IssuanceError> {
    let manifest_bytes = output.manifest.to_canonical_bytes().map_err(|e| {
        IssuanceError::new(
            PipelineStage::Signing,
            SigningError::SignatureFailed(e.to_string()),
        )
    })?;
    let signature = sign_manifest(identity, &manifest_bytes)
        .map_err(|e| IssuanceError::new(PipelineStage::Signing, e))?;

    Ok(SignedManifest {
        content: output.content,
        manifest: output.manifest,
        manifest_bytes,
        signature,
        certificate_fingerprint: identity.fingerprint().to_string(),
    })
}

/// Write the archive atomically to `output`.
pub fn package(
    packager: &ArchivePackager,
    signed: &SignedManifest,
    output: &Path,
) -> Result<PackagedArchive, IssuanceError> {
    packager
        .package(&signed.content, &signed.manifest, &signed.signature, output)
        .map_err(|e| IssuanceError::new(PipelineStage::Packaging, e))
}

/// Assemble the archive in memory.
pub fn package_to_bytes(
    packager: &ArchivePackager,
    signed: &SignedManifest,
) -> Result<Vec<u8>, IssuanceError> {
    packager
        .package_to_bytes(&signed.content, &signed.manifest, &signed.signature)
        .map_err(|e| IssuanceError::new(PipelineStage::Packaging, e))
}

impl SignedManifest {
    /// SHA256 of the signed manifest bytes.
    pub fn manifest_hash(&self) -> String {
        compute_fingerprint(&self.manifest_bytes)
    }
}
