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

//! Implementation of the `verify` command.

use std::path::Path;

use anyhow::{Context, Result};
use eventpass::crypto::certificate_from_pem;
use eventpass::verify_pass_archive;

pub fn run(archive: &Path, certificate: &Path) -> Result<()> {
    let pem = std::fs::read_to_string(certificate)
        .with_context(|| format!("Failed to read certificate {}", certificate.display()))?;
    let certificate = certificate_from_pem(&pem).context("Invalid certificate")?;

    let result = verify_pass_archive(archive, &certificate)
        .with_context(|| format!("Verification failed for {}", archive.display()))?;

    println!("Verified: {}", archive.display());
    if let Some(serial) = &result.serial_number {
        println!("  Serial: {serial}");
    }
    println!("  Digest: {}", result.digest_algorithm);
    println!("  Signer: {}", result.signer_fingerprint);
    println!("  Manifest SHA256: {}", result.manifest_hash);

    Ok(())
}
