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

//! Implementation of the `identity` commands.
//!
//! These always act on the persistent store described by the `[identity]`
//! section, whatever `identity.mode` is set to.

use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use eventpass::security::ENCRYPTED_KEY_FILE;
use eventpass::{FileIdentityStore, SigningIdentity};

use super::load_config;

fn open_store(config_file: Option<&Path>) -> Result<FileIdentityStore> {
    let config = load_config(config_file)?;
    config
        .identity()
        .file_store()
        .context("Failed to open identity store")
}

pub async fn init(config_file: Option<&Path>, force: bool) -> Result<()> {
    let store = open_store(config_file)?;
    if store.exists() && !force {
        bail!(
            "An identity already exists in {}; pass --force to replace it",
            store.dir().display()
        );
    }

    let identity = store.init(force).await?;
    println!("Created identity in {}", store.dir().display());
    print_identity(&identity);
    println!("  Certificate: {}", store.certificate_path().display());
    Ok(())
}

pub async fn show(config_file: Option<&Path>) -> Result<()> {
    let store = open_store(config_file)?;
    let Some(identity) = store.load().await? else {
        bail!(
            "No identity in {}; run `eventpassctl identity init`",
            store.dir().display()
        );
    };

    println!("Identity in {}", store.dir().display());
    print_identity(&identity);
    println!(
        "  Key at rest: {}",
        if store.dir().join(ENCRYPTED_KEY_FILE).is_file() {
            "encrypted"
        } else {
            "plaintext"
        }
    );
    Ok(())
}

pub async fn export_certificate(config_file: Option<&Path>, output: &Path) -> Result<()> {
    let store = open_store(config_file)?;
    store.export_certificate(output).await?;
    println!("Wrote certificate to {}", output.display());
    Ok(())
}

fn print_identity(identity: &SigningIdentity) {
    let not_before: DateTime<Utc> = identity.not_before().into();
    let not_after: DateTime<Utc> = identity.not_after().into();

    println!("  Subject: {}", identity.subject());
    println!("  Fingerprint: {}", identity.fingerprint());
    println!("  Valid: {} to {}", not_before.to_rfc3339(), not_after.to_rfc3339());
}
