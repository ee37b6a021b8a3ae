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

//! Implementation of the `inspect` command.
//!
//! Inspection does not check the signature; use `verify` for that.

use std::path::Path;

use anyhow::{bail, Context, Result};
use eventpass::packaging::{read_archive, UnpackedArchive};
use eventpass::{Manifest, PassDefinition};
use serde_json::json;

use crate::OutputFormat;

pub fn run(archive_path: &Path, format: OutputFormat) -> Result<()> {
    if !archive_path.is_file() {
        bail!("Archive does not exist: {}", archive_path.display());
    }

    let archive = read_archive(archive_path)
        .with_context(|| format!("Failed to read {}", archive_path.display()))?;
    let report = ArchiveReport::new(&archive);

    match format {
        OutputFormat::Json => {
            let output = serde_json::to_string_pretty(&report.to_json())
                .context("Failed to serialize report to JSON")?;
            println!("{output}");
        }
        OutputFormat::Human => report.print(archive_path),
    }

    Ok(())
}

struct ArchiveReport<'a> {
    archive: &'a UnpackedArchive,
    definition: Option<PassDefinition>,
    manifest: Option<Manifest>,
    layout_error: Option<String>,
}

impl<'a> ArchiveReport<'a> {
    fn new(archive: &'a UnpackedArchive) -> Self {
        let definition = archive
            .entry("pass.json")
            .and_then(|bytes| serde_json::from_slice::<PassDefinition>(bytes).ok());
        let manifest = archive
            .manifest_bytes()
            .and_then(|bytes| Manifest::from_bytes(bytes).ok());
        let layout_error = archive.ensure_layout().err().map(|e| e.to_string());

        Self {
            archive,
            definition,
            manifest,
            layout_error,
        }
    }

    fn to_json(&self) -> serde_json::Value {
        let entries: Vec<_> = self
            .archive
            .entry_names()
            .iter()
            .map(|name| {
                json!({
                    "name": name,
                    "size": self.archive.entry(name).map_or(0, <[u8]>::len),
                })
            })
            .collect();

        json!({
            "entries": entries,
            "layout_error": self.layout_error,
            "pass": self.definition,
            "manifest": self.manifest.as_ref().map(|m| {
                json!({
                    "algorithm": m.algorithm().as_str(),
                    "entries": m.entries().collect::<std::collections::BTreeMap<_, _>>(),
                })
            }),
            "signature_size": self.archive.signature_bytes().map(<[u8]>::len),
        })
    }

    fn print(&self, archive_path: &Path) {
        println!("Archive: {}", archive_path.display());
        match &self.layout_error {
            Some(reason) => println!("  Layout: invalid ({reason})"),
            None => println!("  Layout: ok"),
        }
        println!();

        println!("Entries ({}):", self.archive.len());
        for name in self.archive.entry_names() {
            let size = self.archive.entry(name).map_or(0, <[u8]>::len);
            println!("  {name} ({size} bytes)");
        }
        println!();

        match &self.definition {
            Some(pass) => {
                println!("Pass:");
                println!("  Serial: {}", pass.serial_number);
                println!("  Barcode: {}", pass.barcode_message());
                println!("  Organization: {}", pass.organization_name);
                println!("  Type: {}", pass.pass_type_identifier);
                println!("  Team: {}", pass.team_identifier);
                for field in &pass.event_ticket.primary_fields {
                    println!("  {}: {}", field.label, field.value);
                }
                for field in &pass.event_ticket.secondary_fields {
                    println!("  {}: {}", field.label, field.value);
                }
            }
            None => println!("Pass: unreadable"),
        }
        println!();

        match &self.manifest {
            Some(manifest) => {
                println!("Manifest ({}):", manifest.algorithm());
                for (name, digest) in manifest.entries() {
                    println!("  {name}: {digest}");
                }
            }
            None => println!("Manifest: unreadable"),
        }

        match self.archive.signature_bytes() {
            Some(signature) => println!("Signature: {} bytes", signature.len()),
            None => println!("Signature: missing"),
        }
    }
}
