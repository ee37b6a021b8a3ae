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

//! Implementation of the `batch` command.
//!
//! A batch file lists attendees in TOML; shared images and event values can
//! be given once at the top level:
//!
//! ```toml
//! event = "Comic Con 2025"
//! event_id = 2025
//! icon = "assets/icon.png"
//! logo = "assets/logo.png"
//! output_dir = "passes"
//!
//! [[attendee]]
//! name = "Kai"
//! ticket_type = "VIP"
//! serial_number = "KAI2025-CCON"
//!
//! [[attendee]]
//! name = "Robin"
//! attendee_id = 42
//! ```
//!
//! Relative paths are resolved against the batch file's directory.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use eventpass::{
    derive_serial_number, IdentityMode, IssuanceRequest, PassIssuer, ResourceSource, TicketHolder,
};
use serde::Deserialize;
use tracing::{error, info};

use super::issue::default_output;
use super::{load_config, write_certificate};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatchFile {
    pub event: Option<String>,
    pub event_id: Option<u64>,
    #[serde(default = "default_ticket_type")]
    pub ticket_type: String,
    pub icon: Option<PathBuf>,
    pub logo: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    #[serde(default, rename = "attendee")]
    pub attendees: Vec<BatchAttendee>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatchAttendee {
    pub name: String,
    pub event: Option<String>,
    pub ticket_type: Option<String>,
    pub serial_number: Option<String>,
    pub attendee_id: Option<u64>,
    pub icon: Option<PathBuf>,
    pub logo: Option<PathBuf>,
}

fn default_ticket_type() -> String {
    "General Admission".to_string()
}

impl BatchFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read batch file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse batch file {}", path.display()))
    }

    /// Resolve every attendee into an issuance request.
    ///
    /// `base_dir` anchors relative paths; `output_dir` overrides the file's.
    pub fn requests(
        &self,
        base_dir: &Path,
        output_dir: Option<&Path>,
    ) -> Result<Vec<IssuanceRequest>> {
        if self.attendees.is_empty() {
            bail!("Batch file lists no attendees");
        }

        let output_dir = match (output_dir, &self.output_dir) {
            (Some(dir), _) => dir.to_path_buf(),
            (None, Some(dir)) => base_dir.join(dir),
            (None, None) => base_dir.to_path_buf(),
        };

        self.attendees
            .iter()
            .enumerate()
            .map(|(index, attendee)| -> Result<IssuanceRequest> {
                let entry = index + 1;
                let event = attendee
                    .event
                    .as_ref()
                    .or(self.event.as_ref())
                    .with_context(|| format!("Attendee {entry} ({}) has no event", attendee.name))?;
                let serial_number = match (&attendee.serial_number, self.event_id, attendee.attendee_id)
                {
                    (Some(serial), _, _) => serial.clone(),
                    (None, Some(event_id), Some(attendee_id)) => {
                        derive_serial_number(&attendee.name, event_id, attendee_id)
                    }
                    _ => bail!(
                        "Attendee {entry} ({}) needs serial_number, or attendee_id with a top-level event_id",
                        attendee.name
                    ),
                };
                let icon = attendee
                    .icon
                    .as_ref()
                    .or(self.icon.as_ref())
                    .with_context(|| format!("Attendee {entry} ({}) has no icon", attendee.name))?;
                let logo = attendee
                    .logo
                    .as_ref()
                    .or(self.logo.as_ref())
                    .with_context(|| format!("Attendee {entry} ({}) has no logo", attendee.name))?;

                let output = default_output(&output_dir, &serial_number);
                Ok(IssuanceRequest::new(
                    TicketHolder {
                        name: attendee.name.clone(),
                        event: event.clone(),
                        ticket_type: attendee
                            .ticket_type
                            .clone()
                            .unwrap_or_else(|| self.ticket_type.clone()),
                        serial_number,
                    },
                    ResourceSource::File(base_dir.join(icon)),
                    ResourceSource::File(base_dir.join(logo)),
                    output,
                ))
            })
            .collect()
    }
}

pub async fn run(
    config_file: Option<&Path>,
    file: &Path,
    output_dir: Option<PathBuf>,
    overwrite: bool,
) -> Result<()> {
    let config = load_config(config_file)?;
    let overwrite = overwrite || config.archive().overwrite;
    let config = config.into_builder().overwrite(overwrite).build()?;
    let ephemeral = config.identity().mode == IdentityMode::Ephemeral;

    let batch = BatchFile::load(file)?;
    let base_dir = file.parent().unwrap_or_else(|| Path::new("."));
    let requests = batch.requests(base_dir, output_dir.as_deref())?;

    if let Some(dir) = requests.first().and_then(|r| r.output.parent()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
    }

    let issuer = PassIssuer::from_config(config).context("Failed to set up issuer")?;
    let results = issuer.issue_batch(requests).await;

    let mut failed = 0usize;
    for result in &results {
        match result {
            Ok(issued) => {
                // Ephemeral passes each carry their own certificate.
                if ephemeral {
                    write_certificate(issued, &issued.output.with_extension("pem"))?;
                }
                println!("{}  {}", issued.serial_number, issued.output.display());
            }
            Err(err) => {
                failed += 1;
                error!(stage = %err.stage, error = %err, "Issuance failed");
            }
        }
    }

    info!(issued = results.len() - failed, failed, "Batch complete");
    if failed > 0 {
        bail!("{failed} of {} passes failed", results.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const BATCH: &str = r#"
event = "Comic Con 2025"
event_id = 2025
icon = "assets/icon.png"
logo = "assets/logo.png"
output_dir = "passes"

[[attendee]]
name = "Kai"
ticket_type = "VIP"
serial_number = "KAI2025-CCON"

[[attendee]]
name = "Robin"
attendee_id = 42
logo = "assets/robin.png"
"#;

    #[test]
    fn test_requests_resolve_shared_values() {
        let batch: BatchFile = toml::from_str(BATCH).unwrap();
        let requests = batch.requests(Path::new("/srv/batch"), None).unwrap();

        assert_eq!(requests.len(), 2);

        let kai = &requests[0];
        assert_eq!(kai.holder.serial_number, "KAI2025-CCON");
        assert_eq!(kai.holder.ticket_type, "VIP");
        assert_eq!(kai.holder.event, "Comic Con 2025");
        assert_eq!(
            kai.output,
            PathBuf::from("/srv/batch/passes/KAI2025-CCON.pkpass")
        );
        assert!(
            matches!(&kai.icon, ResourceSource::File(p) if p == Path::new("/srv/batch/assets/icon.png"))
        );

        let robin = &requests[1];
        assert_eq!(robin.holder.serial_number, "ROB-2025-42");
        assert_eq!(robin.holder.ticket_type, "General Admission");
        assert!(
            matches!(&robin.logo, ResourceSource::File(p) if p == Path::new("/srv/batch/assets/robin.png"))
        );
    }

    #[test]
    fn test_output_dir_override() {
        let batch: BatchFile = toml::from_str(BATCH).unwrap();
        let requests = batch
            .requests(Path::new("/srv/batch"), Some(Path::new("/tmp/out")))
            .unwrap();

        assert_eq!(requests[1].output, PathBuf::from("/tmp/out/ROB-2025-42.pkpass"));
    }

    #[test]
    fn test_attendee_without_serial_source_is_rejected() {
        let batch: BatchFile = toml::from_str(
            r#"
event = "Comic Con 2025"
icon = "icon.png"
logo = "logo.png"

[[attendee]]
name = "Kai"
attendee_id = 1
"#,
        )
        .unwrap();

        let err = batch.requests(Path::new("."), None).unwrap_err();
        assert!(err.to_string().contains("Attendee 1 (Kai)"));
    }

    #[test]
    fn test_empty_batch_is_rejected() {
        let batch: BatchFile = toml::from_str("event = \"Comic Con 2025\"").unwrap();
        assert!(batch.requests(Path::new("."), None).is_err());
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        assert!(toml::from_str::<BatchFile>("evnet = \"typo\"").is_err());
    }
}
