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

//! Implementation of the `issue` command.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use eventpass::{
    derive_serial_number, IdentityMode, IssuanceRequest, PassIssuer, ResourceSource, TicketHolder,
};
use tracing::warn;

use super::{load_config, write_certificate};

pub struct IssueArgs {
    pub name: String,
    pub event: String,
    pub ticket_type: String,
    pub serial: Option<String>,
    pub event_id: Option<u64>,
    pub attendee_id: Option<u64>,
    pub icon: PathBuf,
    pub logo: PathBuf,
    pub output: Option<PathBuf>,
    pub overwrite: bool,
    pub certificate_out: Option<PathBuf>,
}

impl IssueArgs {
    /// Serial number given directly or derived from the identifiers.
    fn serial_number(&self) -> Result<String> {
        match (&self.serial, self.event_id, self.attendee_id) {
            (Some(serial), _, _) => Ok(serial.clone()),
            (None, Some(event_id), Some(attendee_id)) => {
                Ok(derive_serial_number(&self.name, event_id, attendee_id))
            }
            _ => bail!("Either --serial or both --event-id and --attendee-id are required"),
        }
    }

    fn into_request(self) -> Result<IssuanceRequest> {
        let serial_number = self.serial_number()?;
        let output = self
            .output
            .unwrap_or_else(|| default_output(Path::new("."), &serial_number));

        Ok(IssuanceRequest::new(
            TicketHolder {
                name: self.name,
                event: self.event,
                ticket_type: self.ticket_type,
                serial_number,
            },
            ResourceSource::File(self.icon),
            ResourceSource::File(self.logo),
            output,
        ))
    }
}

/// `<dir>/<serial>.pkpass`
pub(crate) fn default_output(dir: &Path, serial_number: &str) -> PathBuf {
    dir.join(format!("{serial_number}.{}", eventpass::packaging::ARCHIVE_EXTENSION))
}

pub async fn run(config_file: Option<&Path>, args: IssueArgs) -> Result<()> {
    let config = load_config(config_file)?;
    let overwrite = args.overwrite || config.archive().overwrite;
    let config = config.into_builder().overwrite(overwrite).build()?;

    if config.identity().mode == IdentityMode::Ephemeral && args.certificate_out.is_none() {
        warn!("Ephemeral identity: pass --certificate-out to keep the certificate that verifies this pass");
    }

    let certificate_out = args.certificate_out.clone();
    let request = args.into_request()?;
    let issuer = PassIssuer::from_config(config).context("Failed to set up issuer")?;
    let issued = issuer.issue(request).await?;

    if let Some(path) = certificate_out {
        write_certificate(&issued, &path)?;
    }

    println!("Issued pass:");
    println!("  Serial: {}", issued.serial_number);
    println!("  Barcode: {}", issued.barcode_message());
    println!("  Archive: {}", issued.output.display());
    println!("  SHA256: {}", issued.archive_checksum);
    println!("  Certificate: {}", issued.certificate_fingerprint);

    Ok(())
}
