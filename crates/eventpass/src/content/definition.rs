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

//! Pass definition document (`pass.json`).
//!
//! A [`PassDefinition`] is built once per issuance request, validated, and
//! serialized exactly once. The serialized bytes are what the manifest
//! digests and what the archive stores.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Pass format version understood by pass-verification clients.
pub const FORMAT_VERSION: u32 = 1;

/// Errors raised when a pass definition breaks its invariants.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DefinitionError {
    #[error("Serial number must not be empty")]
    EmptySerialNumber,

    #[error("Serial number '{serial}' does not match barcode message '{message}'")]
    SerialMismatch { serial: String, message: String },

    #[error("Unsupported format version: {0}")]
    UnsupportedFormatVersion(u32),

    #[error("Pass definition has no fields")]
    NoFields,

    #[error("Failed to serialize pass definition: {0}")]
    Serialization(String),
}

/// Barcode symbologies. Only QR is issued by this format version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BarcodeFormat {
    #[serde(rename = "PKBarcodeFormatQR")]
    Qr,
}

/// Barcode printed on the pass face and scanned at redemption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Barcode {
    pub message: String,
    pub format: BarcodeFormat,
    pub message_encoding: String,
}

/// A single `{key, label, value}` field shown on the pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassField {
    pub key: String,
    pub label: String,
    pub value: String,
}

impl PassField {
    pub fn new(key: impl Into<String>, label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            value: value.into(),
        }
    }
}

/// Ordered field groups of an event ticket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTicketFields {
    #[serde(default)]
    pub primary_fields: Vec<PassField>,
    #[serde(default)]
    pub secondary_fields: Vec<PassField>,
}

/// Issuer-wide values shared by every pass issued under one identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PassTemplate {
    pub pass_type_identifier: String,
    pub team_identifier: String,
    pub organization_name: String,
    pub description: String,
    pub message_encoding: String,
}

impl Default for PassTemplate {
    fn default() -> Self {
        Self {
            pass_type_identifier: "pass.com.example.event".to_string(),
            team_identifier: "ABCDE12345".to_string(),
            organization_name: "Kai Events".to_string(),
            description: "Event Ticket".to_string(),
            message_encoding: "iso-8859-1".to_string(),
        }
    }
}

/// Per-attendee values of a single ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketHolder {
    pub name: String,
    pub event: String,
    pub ticket_type: String,
    /// Unique per issuing identity; doubles as the barcode payload.
    pub serial_number: String,
}

/// The structured pass record serialized as `pass.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassDefinition {
    pub format_version: u32,
    pub pass_type_identifier: String,
    pub serial_number: String,
    pub team_identifier: String,
    pub organization_name: String,
    pub description: String,
    pub barcode: Barcode,
    pub event_ticket: EventTicketFields,
}

impl PassDefinition {
    /// Build an event ticket definition for `holder`.
    ///
    /// The barcode message is taken from the serial number, so the
    /// serial/barcode invariant holds by construction.
    pub fn event_ticket(template: &PassTemplate, holder: &TicketHolder) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            pass_type_identifier: template.pass_type_identifier.clone(),
            serial_number: holder.serial_number.clone(),
            team_identifier: template.team_identifier.clone(),
            organization_name: template.organization_name.clone(),
            description: template.description.clone(),
            barcode: Barcode {
                message: holder.serial_number.clone(),
                format: BarcodeFormat::Qr,
                message_encoding: template.message_encoding.clone(),
            },
            event_ticket: EventTicketFields {
                primary_fields: vec![PassField::new("event", "Event", &holder.event)],
                secondary_fields: vec![
                    PassField::new("name", "Name", &holder.name),
                    PassField::new("type", "Ticket Type", &holder.ticket_type),
                ],
            },
        }
    }

    /// Check the definition's invariants.
    pub fn validate(&self) -> Result<(), DefinitionError> {
        if self.format_version != FORMAT_VERSION {
            return Err(DefinitionError::UnsupportedFormatVersion(self.format_version));
        }
        if self.serial_number.is_empty() {
            return Err(DefinitionError::EmptySerialNumber);
        }
        if self.serial_number != self.barcode.message {
            return Err(DefinitionError::SerialMismatch {
                serial: self.serial_number.clone(),
                message: self.barcode.message.clone(),
            });
        }
        if self.event_ticket.primary_fields.is_empty()
            && self.event_ticket.secondary_fields.is_empty()
        {
            return Err(DefinitionError::NoFields);
        }
        Ok(())
    }

    /// Validate and serialize to the bytes stored as `pass.json`.
    pub fn to_bytes(&self) -> Result<Vec<u8>, DefinitionError> {
        self.validate()?;
        serde_json::to_vec(self).map_err(|e| DefinitionError::Serialization(e.to_string()))
    }

    /// The payload a scanner reads from the pass barcode.
    pub fn barcode_message(&self) -> &str {
        &self.barcode.message
    }
}

/// Derive a ticket serial number from attendee and event identifiers.
///
/// Format: first three characters of the attendee name upper-cased, then
/// `-{event_id}-{attendee_id}`. Uniqueness comes from `attendee_id`, which the
/// ticket store assigns.
pub fn derive_serial_number(name: &str, event_id: u64, attendee_id: u64) -> String {
    let prefix: String = name.trim().chars().take(3).collect::<String>().to_uppercase();
    format!("{prefix}-{event_id}-{attendee_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template() -> PassTemplate {
        PassTemplate {
            pass_type_identifier: "pass.com.example.event".to_string(),
            team_identifier: "ABCDE12345".to_string(),
            organization_name: "Kai Events".to_string(),
            description: "Event Ticket".to_string(),
            message_encoding: "iso-8859-1".to_string(),
        }
    }

    fn holder() -> TicketHolder {
        TicketHolder {
            name: "Kai".to_string(),
            event: "Comic Con 2025".to_string(),
            ticket_type: "VIP".to_string(),
            serial_number: "KAI2025-CCON".to_string(),
        }
    }

    #[test]
    fn test_event_ticket_binds_serial_to_barcode() {
        let definition = PassDefinition::event_ticket(&template(), &holder());

        assert_eq!(definition.serial_number, "KAI2025-CCON");
        assert_eq!(definition.barcode_message(), "KAI2025-CCON");
        assert_eq!(definition.format_version, FORMAT_VERSION);
        assert!(definition.validate().is_ok());
    }

    #[test]
    fn test_wire_field_names() {
        let definition = PassDefinition::event_ticket(&template(), &holder());
        let value: serde_json::Value =
            serde_json::from_slice(&definition.to_bytes().unwrap()).unwrap();

        assert_eq!(value["formatVersion"], 1);
        assert_eq!(value["passTypeIdentifier"], "pass.com.example.event");
        assert_eq!(value["serialNumber"], "KAI2025-CCON");
        assert_eq!(value["barcode"]["format"], "PKBarcodeFormatQR");
        assert_eq!(value["barcode"]["messageEncoding"], "iso-8859-1");
        assert_eq!(
            value["eventTicket"]["primaryFields"][0]["value"],
            "Comic Con 2025"
        );
        assert_eq!(value["eventTicket"]["secondaryFields"][1]["label"], "Ticket Type");
        assert_eq!(value["eventTicket"]["secondaryFields"][1]["value"], "VIP");
    }

    #[test]
    fn test_serial_mismatch_rejected() {
        let mut definition = PassDefinition::event_ticket(&template(), &holder());
        definition.barcode.message = "SOMETHING-ELSE".to_string();

        assert_eq!(
            definition.validate(),
            Err(DefinitionError::SerialMismatch {
                serial: "KAI2025-CCON".to_string(),
                message: "SOMETHING-ELSE".to_string(),
            })
        );
        assert!(definition.to_bytes().is_err());
    }

    #[test]
    fn test_empty_serial_rejected() {
        let mut h = holder();
        h.serial_number = String::new();
        let definition = PassDefinition::event_ticket(&template(), &h);

        assert_eq!(definition.validate(), Err(DefinitionError::EmptySerialNumber));
    }

    #[test]
    fn test_serialization_is_stable() {
        let definition = PassDefinition::event_ticket(&template(), &holder());
        assert_eq!(definition.to_bytes().unwrap(), definition.to_bytes().unwrap());
    }

    #[test]
    fn test_derive_serial_number() {
        assert_eq!(derive_serial_number("Kai", 3, 17), "KAI-3-17");
        assert_eq!(derive_serial_number("  maria lopez", 1, 2), "MAR-1-2");
        assert_eq!(derive_serial_number("Li", 9, 40), "LI-9-40");
    }
}
