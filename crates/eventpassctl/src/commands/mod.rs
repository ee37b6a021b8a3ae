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

//! Subcommand implementations.

pub mod batch;
pub mod identity;
pub mod inspect;
pub mod issue;
pub mod verify;

use std::path::Path;

use anyhow::{Context, Result};
use eventpass::{IssuedPass, IssuerConfig};

use crate::config::ConfigLoader;

/// Load the issuer configuration named on the command line, or discover one.
pub(crate) fn load_config(config_file: Option<&Path>) -> Result<IssuerConfig> {
    ConfigLoader::new()
        .load_or_default(config_file)
        .context("Failed to load configuration")
}

/// Write the certificate that verifies `issued` as PEM.
pub(crate) fn write_certificate(issued: &IssuedPass, path: &Path) -> Result<()> {
    let pem = issued
        .certificate_pem()
        .context("Failed to encode certificate")?;
    std::fs::write(path, pem)
        .with_context(|| format!("Failed to write certificate to {}", path.display()))
}
