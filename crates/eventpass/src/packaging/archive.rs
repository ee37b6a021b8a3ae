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

//! Pass archive assembly and unpacking.
//!
//! A pass archive is a ZIP container with exactly five entries, always written
//! in this order:
//!
//! | entry           | content                          |
//! |-----------------|----------------------------------|
//! | `pass.json`     | serialized pass definition       |
//! | `icon.png`      | icon image                       |
//! | `logo.png`      | logo image                       |
//! | `manifest.json` | canonical manifest               |
//! | `signature`     | raw PKCS#1 v1.5 signature bytes  |
//!
//! Entries carry a fixed 1980-01-01 timestamp and 0644 permissions, so equal
//! inputs give byte-identical archives. Writing to disk goes through a
//! temporary file in the destination directory that is renamed into place
//! only after every entry has been written and synced.

use std::collections::BTreeMap;
use std::fs;
use std::io::{Cursor, Read, Seek, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

use super::manifest::{Manifest, MANIFEST_FILENAME};
use crate::content::{ResourceName, SealedContent};
use crate::crypto::{compute_fingerprint, Signature, SIGNATURE_FILENAME};

/// Number of entries in a well-formed pass archive.
pub const ARCHIVE_ENTRY_COUNT: usize = 5;

/// Conventional file extension of pass archives.
pub const ARCHIVE_EXTENSION: &str = "pkpass";

/// Media type used when handing archives to delivery collaborators.
pub const ARCHIVE_MEDIA_TYPE: &str = "application/vnd.apple.pkpass";

/// Upper bound on a single entry's uncompressed size when unpacking.
const MAX_ENTRY_SIZE: u64 = 16 * 1024 * 1024;

/// Errors from archive writing and reading.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive format error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Output already exists: {0}")]
    OutputExists(PathBuf),

    #[error("Output path has no file name: {0}")]
    InvalidOutputPath(PathBuf),

    #[error("Failed to move archive into place at {path}: {error}")]
    Persist { path: PathBuf, error: String },

    #[error("Archive is missing entry '{0}'")]
    MissingEntry(String),

    #[error("Archive contains unexpected entry '{0}'")]
    UnexpectedEntry(String),

    #[error("Archive entry '{name}' exceeds {limit} bytes")]
    EntryTooLarge { name: String, limit: u64 },

    #[error("Failed to serialize manifest: {0}")]
    Manifest(String),
}

/// Compression applied to archive entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveCompression {
    #[default]
    Stored,
    Deflated,
}

impl ArchiveCompression {
    fn method(&self) -> CompressionMethod {
        match self {
            ArchiveCompression::Stored => CompressionMethod::Stored,
            ArchiveCompression::Deflated => CompressionMethod::Deflated,
        }
    }
}

/// Entry names in archive order.
pub fn entry_names() -> [&'static str; ARCHIVE_ENTRY_COUNT] {
    [
        ResourceName::PassDefinition.as_str(),
        ResourceName::Icon.as_str(),
        ResourceName::Logo.as_str(),
        MANIFEST_FILENAME,
        SIGNATURE_FILENAME,
    ]
}

/// A finished archive on disk.
#[derive(Debug, Clone)]
pub struct PackagedArchive {
    pub path: PathBuf,
    /// SHA256 hex of the archive bytes.
    pub checksum: String,
    pub size: u64,
}

/// Writes pass archives.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArchivePackager {
    compression: ArchiveCompression,
    overwrite: bool,
}

impl ArchivePackager {
    pub fn new(compression: ArchiveCompression) -> Self {
        Self {
            compression,
            overwrite: false,
        }
    }

    /// Allow replacing an existing file at the output path.
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn compression(&self) -> ArchiveCompression {
        self.compression
    }

    pub fn overwrite(&self) -> bool {
        self.overwrite
    }

    /// Assemble the archive in memory.
    pub fn package_to_bytes(
        &self,
        content: &SealedContent,
        manifest: &Manifest,
        signature: &Signature,
    ) -> Result<Vec<u8>, ArchiveError> {
        let manifest_bytes = manifest
            .to_canonical_bytes()
            .map_err(|e| ArchiveError::Manifest(e.to_string()))?;
        let mut cursor = Cursor::new(Vec::new());
        self.write_entries(&mut cursor, content, &manifest_bytes, signature)?;
        Ok(cursor.into_inner())
    }

    /// Write the archive to `output` atomically.
    ///
    /// Nothing appears at `output` unless every entry was written. If
    /// `overwrite` is off and `output` exists, fails with
    /// [`ArchiveError::OutputExists`] before touching the filesystem.
    pub fn package(
        &self,
        content: &SealedContent,
        manifest: &Manifest,
        signature: &Signature,
        output: &Path,
    ) -> Result<PackagedArchive, ArchiveError> {
        self.check_output(output)?;
        let manifest_bytes = manifest
            .to_canonical_bytes()
            .map_err(|e| ArchiveError::Manifest(e.to_string()))?;

        let parent = match output.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent)?;

        let mut temp = NamedTempFile::new_in(&parent)?;
        self.write_entries(temp.as_file_mut(), content, &manifest_bytes, signature)?;
        temp.as_file().sync_all()?;

        let size = temp.as_file().metadata()?.len();
        let mut bytes = Vec::with_capacity(size as usize);
        let mut reader = temp.reopen()?;
        reader.read_to_end(&mut bytes)?;
        let checksum = compute_fingerprint(&bytes);

        let persisted = if self.overwrite {
            temp.persist(output)
        } else {
            temp.persist_noclobber(output)
        };
        persisted.map_err(|e| {
            if e.error.kind() == std::io::ErrorKind::AlreadyExists {
                ArchiveError::OutputExists(output.to_path_buf())
            } else {
                ArchiveError::Persist {
                    path: output.to_path_buf(),
                    error: e.error.to_string(),
                }
            }
        })?;

        tracing::debug!(
            path = %output.display(),
            size,
            checksum = %checksum,
            "Pass archive written"
        );

        Ok(PackagedArchive {
            path: output.to_path_buf(),
            checksum,
            size,
        })
    }

    /// Fail early when the output cannot be used.
    pub fn check_output(&self, output: &Path) -> Result<(), ArchiveError> {
        if output.file_name().is_none() {
            return Err(ArchiveError::InvalidOutputPath(output.to_path_buf()));
        }
        if !self.overwrite && output.exists() {
            return Err(ArchiveError::OutputExists(output.to_path_buf()));
        }
        Ok(())
    }

    fn write_entries<W: Write + Seek>(
        &self,
        writer: W,
        content: &SealedContent,
        manifest_bytes: &[u8],
        signature: &Signature,
    ) -> Result<(), ArchiveError> {
        let options = SimpleFileOptions::default()
            .compression_method(self.compression.method())
            .last_modified_time(DateTime::default())
            .unix_permissions(0o644);

        let mut zip = ZipWriter::new(writer);

        for name in ResourceName::ALL {
            let bytes = content
                .get(name)
                .ok_or_else(|| ArchiveError::MissingEntry(name.as_str().to_string()))?;
            zip.start_file(name.as_str(), options)?;
            zip.write_all(bytes)?;
        }

        zip.start_file(MANIFEST_FILENAME, options)?;
        zip.write_all(manifest_bytes)?;

        zip.start_file(SIGNATURE_FILENAME, options)?;
        zip.write_all(signature.as_bytes())?;

        zip.finish()?;
        Ok(())
    }
}

/// Entries recovered from a pass archive.
#[derive(Debug, Clone)]
pub struct UnpackedArchive {
    entries: BTreeMap<String, Vec<u8>>,
    order: Vec<String>,
}

impl UnpackedArchive {
    pub fn entry(&self, name: &str) -> Option<&[u8]> {
        self.entries.get(name).map(Vec::as_slice)
    }

    pub fn resource(&self, name: ResourceName) -> Option<&[u8]> {
        self.entry(name.as_str())
    }

    pub fn manifest_bytes(&self) -> Option<&[u8]> {
        self.entry(MANIFEST_FILENAME)
    }

    pub fn signature_bytes(&self) -> Option<&[u8]> {
        self.entry(SIGNATURE_FILENAME)
    }

    /// Entry names in the order they appear in the archive.
    pub fn entry_names(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Check that exactly the five expected entries are present.
    pub fn ensure_layout(&self) -> Result<(), ArchiveError> {
        let expected = entry_names();
        if let Some(extra) = self.order.iter().find(|n| !expected.contains(&n.as_str())) {
            return Err(ArchiveError::UnexpectedEntry(extra.clone()));
        }
        for name in expected {
            if !self.entries.contains_key(name) {
                return Err(ArchiveError::MissingEntry(name.to_string()));
            }
        }
        Ok(())
    }
}

/// Unpack an archive from disk.
pub fn read_archive(path: &Path) -> Result<UnpackedArchive, ArchiveError> {
    let file = fs::File::open(path)?;
    unpack(file)
}

/// Unpack an archive held in memory.
pub fn read_archive_bytes(bytes: &[u8]) -> Result<UnpackedArchive, ArchiveError> {
    unpack(Cursor::new(bytes))
}

fn unpack<R: Read + Seek>(reader: R) -> Result<UnpackedArchive, ArchiveError> {
    let mut archive = ZipArchive::new(reader)?;
    let mut entries = BTreeMap::new();
    let mut order = Vec::with_capacity(archive.len());

    for index in 0..archive.len() {
        let file = archive.by_index(index)?;
        let name = file.name().to_string();
        if file.is_dir() {
            return Err(ArchiveError::UnexpectedEntry(name));
        }
        if file.size() > MAX_ENTRY_SIZE {
            return Err(ArchiveError::EntryTooLarge {
                name,
                limit: MAX_ENTRY_SIZE,
            });
        }

        let mut data = Vec::with_capacity(file.size() as usize);
        file.take(MAX_ENTRY_SIZE + 1).read_to_end(&mut data)?;
        if data.len() as u64 > MAX_ENTRY_SIZE {
            return Err(ArchiveError::EntryTooLarge {
                name,
                limit: MAX_ENTRY_SIZE,
            });
        }

        if entries.insert(name.clone(), data).is_some() {
            return Err(ArchiveError::UnexpectedEntry(name));
        }
        order.push(name);
    }

    Ok(UnpackedArchive { entries, order })
}
