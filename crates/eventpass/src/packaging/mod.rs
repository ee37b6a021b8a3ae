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

//! Manifest construction and archive assembly.

mod archive;
mod manifest;

pub use archive::{
    entry_names, read_archive, read_archive_bytes, ArchiveCompression, ArchiveError,
    ArchivePackager, PackagedArchive, UnpackedArchive, ARCHIVE_ENTRY_COUNT, ARCHIVE_EXTENSION,
    ARCHIVE_MEDIA_TYPE,
};
pub use manifest::{
    DigestAlgorithm, Manifest, ManifestBuilder, ManifestError, ManifestOutput, MANIFEST_FILENAME,
};
