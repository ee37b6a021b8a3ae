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

//! Shared test inputs.

use std::path::PathBuf;
use std::sync::Arc;

use eventpass::{IssuanceRequest, ResourceSource, SigningIdentity, TicketHolder};
use once_cell::sync::Lazy;

/// One generated identity shared by every test in the binary.
pub static IDENTITY: Lazy<Arc<SigningIdentity>> =
    Lazy::new(|| Arc::new(SigningIdentity::generate("Test Certificate").unwrap()));

/// A fixed stand-in for a 100x100 image: PNG signature plus constant pixels.
pub fn placeholder_image(fill: u8) -> Vec<u8> {
    let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    bytes.extend(std::iter::repeat(fill).take(100 * 100));
    bytes
}

pub fn kai_holder() -> TicketHolder {
    TicketHolder {
        name: "Kai".to_string(),
        event: "Comic Con 2025".to_string(),
        ticket_type: "VIP".to_string(),
        serial_number: "KAI2025-CCON".to_string(),
    }
}

pub fn kai_request(output: PathBuf) -> IssuanceRequest {
    IssuanceRequest::new(
        kai_holder(),
        ResourceSource::Bytes(placeholder_image(0xAA)),
        ResourceSource::Bytes(placeholder_image(0x55)),
        output,
    )
}
