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

//! Per-issuance resource storage.
//!
//! The [`ContentStore`] owns the named blobs of one pass. Sources may be
//! in-memory bytes or files; [`ContentStore::seal`] reads every source exactly
//! once and freezes the result into [`SealedContent`], which is what gets
//! digested and archived.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::definition::PassDefinition;

/// Errors raised while assembling or sealing pass content.
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("Resource '{resource}' is unavailable: {reason}")]
    ResourceUnavailable {
        resource: ResourceName,
        reason: String,
    },

    #[error("Invalid pass definition: {0}")]
    InvalidDefinition(#[from] super::definition::DefinitionError),
}

/// Canonical resource names of the pass format.
///
/// The set is fixed; ordering follows declaration order and is the order
/// resources are written to the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceName {
    #[serde(rename = "pass.json")]
    PassDefinition,
    #[serde(rename = "icon.png")]
    Icon,
    #[serde(rename = "logo.png")]
    Logo,
}

impl ResourceName {
    /// Every resource a complete pass carries.
    pub const ALL: [ResourceName; 3] = [
        ResourceName::PassDefinition,
        ResourceName::Icon,
        ResourceName::Logo,
    ];

    /// Entry name inside the archive and key inside the manifest.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceName::PassDefinition => "pass.json",
            ResourceName::Icon => "icon.png",
            ResourceName::Logo => "logo.png",
        }
    }

    /// Look a resource up by its archive entry name.
    pub fn from_entry_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.as_str() == name)
    }
}

impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a resource's bytes come from.
#[derive(Debug, Clone)]
pub enum ResourceSource {
    Bytes(Vec<u8>),
    File(PathBuf),
}

/// Mutable, per-issuance collection of resources.
#[derive(Debug, Clone, Default)]
pub struct ContentStore {
    resources: BTreeMap<ResourceName, ResourceSource>,
}

impl ContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize `definition` and store it as `pass.json`.
    ///
    /// The definition is validated first; a definition whose serial number and
    /// barcode disagree never reaches the store.
    pub fn insert_definition(&mut self, definition: &PassDefinition) -> Result<(), ContentError> {
        let bytes = definition.to_bytes()?;
        self.insert_bytes(ResourceName::PassDefinition, bytes);
        Ok(())
    }

    pub fn insert(&mut self, name: ResourceName, source: ResourceSource) {
        self.resources.insert(name, source);
    }

    pub fn insert_bytes(&mut self, name: ResourceName, bytes: impl Into<Vec<u8>>) {
        self.resources
            .insert(name, ResourceSource::Bytes(bytes.into()));
    }

    pub fn insert_file(&mut self, name: ResourceName, path: impl Into<PathBuf>) {
        self.resources.insert(name, ResourceSource::File(path.into()));
    }

    pub fn remove(&mut self, name: ResourceName) -> Option<ResourceSource> {
        self.resources.remove(&name)
    }

    pub fn contains(&self, name: ResourceName) -> bool {
        self.resources.contains_key(&name)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Read every resource and freeze the content.
    ///
    /// Fails with [`ContentError::ResourceUnavailable`] if any canonical
    /// resource is missing, unreadable, or empty.
    pub fn seal(&self) -> Result<SealedContent, ContentError> {
        let mut sealed = BTreeMap::new();

        for name in ResourceName::ALL {
            let source =
                self.resources
                    .get(&name)
                    .ok_or_else(|| ContentError::ResourceUnavailable {
                        resource: name,
                        reason: "resource missing from content store".to_string(),
                    })?;

            let bytes = match source {
                ResourceSource::Bytes(bytes) => bytes.clone(),
                ResourceSource::File(path) => {
                    std::fs::read(path).map_err(|e| ContentError::ResourceUnavailable {
                        resource: name,
                        reason: format!("failed to read {}: {e}", path.display()),
                    })?
                }
            };

            if bytes.is_empty() {
                return Err(ContentError::ResourceUnavailable {
                    resource: name,
                    reason: "resource is empty".to_string(),
                });
            }

            sealed.insert(name, bytes);
        }

        Ok(SealedContent { resources: sealed })
    }
}

/// Immutable snapshot of finalized resource bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedContent {
    resources: BTreeMap<ResourceName, Vec<u8>>,
}

impl SealedContent {
    pub fn get(&self, name: ResourceName) -> Option<&[u8]> {
        self.resources.get(&name).map(Vec::as_slice)
    }

    /// Resources in archive order.
    pub fn iter(&self) -> impl Iterator<Item = (ResourceName, &[u8])> {
        self.resources.iter().map(|(name, bytes)| (*name, bytes.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}
