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

//! Archive layout, reproducibility and tamper detection.

use std::io::{Cursor, Write};

use eventpass::packaging::{read_archive_bytes, ArchiveCompression, ArchivePackager};
use eventpass::pipeline::stages;
use eventpass::security::{verify_pass_archive, verify_pass_archive_bytes, VerificationError};
use eventpass::{ManifestBuilder, PassTemplate, ResourceName, ResourceSource};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::fixtures::{kai_holder, placeholder_image, IDENTITY};

fn signed() -> stages::SignedManifest {
    let content = stages::assemble_content(
        &PassTemplate::default(),
        &kai_holder(),
        ResourceSource::Bytes(placeholder_image(0xAA)),
        ResourceSource::Bytes(placeholder_image(0x55)),
    )
    .unwrap();
    let output = stages::build_manifest(&ManifestBuilder::default(), &content.store).unwrap();
    stages::sign(output, &IDENTITY).unwrap()
}

#[test]
fn test_packaging_twice_is_byte_identical() {
    let signed = signed();
    let dir = TempDir::new().unwrap();
    let packager = ArchivePackager::default();

    let first = stages::package(&packager, &signed, &dir.path().join("one.pkpass")).unwrap();
    let second = stages::package(&packager, &signed, &dir.path().join("two.pkpass")).unwrap();

    assert_eq!(first.checksum, second.checksum);
    assert_eq!(
        std::fs::read(&first.path).unwrap(),
        std::fs::read(&second.path).unwrap()
    );
}

#[test]
fn test_roundtrip_recovers_resources_and_digests() {
    let signed = signed();
    let bytes = stages::package_to_bytes(&ArchivePackager::default(), &signed).unwrap();
    let archive = read_archive_bytes(&bytes).unwrap();

    for (name, original) in signed.content.iter() {
        assert_eq!(archive.resource(name).unwrap(), original);
        let digest = signed.manifest.algorithm().hex_digest(archive.resource(name).unwrap());
        assert_eq!(signed.manifest.digest_for(name), Some(digest.as_str()));
    }
    assert_eq!(archive.len(), 5);
}

#[test]
fn test_deflated_archive_verifies() {
    let signed = signed();
    let bytes = stages::package_to_bytes(
        &ArchivePackager::new(ArchiveCompression::Deflated),
        &signed,
    )
    .unwrap();

    let result = verify_pass_archive_bytes(&bytes, IDENTITY.certificate()).unwrap();
    assert_eq!(result.serial_number.as_deref(), Some("KAI2025-CCON"));
}

#[test]
fn test_extra_entry_rejected_by_verifier() {
    let signed = signed();
    let bytes = stages::package_to_bytes(&ArchivePackager::default(), &signed).unwrap();
    let archive = read_archive_bytes(&bytes).unwrap();

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut zip = ZipWriter::new(&mut cursor);
        for name in archive.entry_names() {
            zip.start_file(name.as_str(), SimpleFileOptions::default())
                .unwrap();
            zip.write_all(archive.entry(name).unwrap()).unwrap();
        }
        zip.start_file("certificate.pem", SimpleFileOptions::default())
            .unwrap();
        zip.write_all(IDENTITY.certificate_pem().unwrap().as_bytes())
            .unwrap();
        zip.finish().unwrap();
    }

    let result = verify_pass_archive_bytes(cursor.get_ref(), IDENTITY.certificate());
    assert!(matches!(
        result,
        Err(VerificationError::UnexpectedEntry { entry }) if entry == "certificate.pem"
    ));
}

#[test]
fn test_tampered_archive_on_disk_rejected() {
    let signed = signed();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ticket.pkpass");
    stages::package(&ArchivePackager::default(), &signed, &path).unwrap();

    let archive = read_archive_bytes(&std::fs::read(&path).unwrap()).unwrap();
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut zip = ZipWriter::new(&mut cursor);
        for name in archive.entry_names() {
            zip.start_file(name.as_str(), SimpleFileOptions::default())
                .unwrap();
            let mut bytes = archive.entry(name).unwrap().to_vec();
            if name == ResourceName::Icon.as_str() {
                bytes[20] ^= 0xFF;
            }
            zip.write_all(&bytes).unwrap();
        }
        zip.finish().unwrap();
    }
    std::fs::write(&path, cursor.into_inner()).unwrap();

    let result = verify_pass_archive(&path, IDENTITY.certificate());
    assert!(matches!(
        result,
        Err(VerificationError::TamperedResource { resource, .. }) if resource == "icon.png"
    ));
}
