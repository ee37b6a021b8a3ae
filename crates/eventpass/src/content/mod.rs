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

//! Pass content: the definition document and the per-issuance resource store.
//!
//! This module provides:
//! - [`PassDefinition`] and its field types, serialized as `pass.json`
//! - [`ContentStore`] holding the named blobs of one pass
//! - [`SealedContent`], the frozen bytes that are digested and archived

mod definition;
mod store;

pub use definition::{
    derive_serial_number, Barcode, BarcodeFormat, DefinitionError, EventTicketFields,
    PassDefinition, PassField, PassTemplate, TicketHolder, FORMAT_VERSION,
};
pub use store::{ContentError, ContentStore, ResourceName, ResourceSource, SealedContent};
