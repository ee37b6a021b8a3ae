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

//! # Eventpass
//!
//! Eventpass issues signed, tamper-evident event passes: ZIP archives holding
//! a pass definition, two images, a manifest of their digests and a detached
//! signature over that manifest.
//!
//! ## Key Features
//!
//! - Deterministic manifests (SHA-1 entries by default, SHA-256 on request)
//! - RSA-2048 identities with self-signed X.509 certificates
//! - RSASSA-PKCS1-v1_5 / SHA-1 manifest signatures
//! - Byte-reproducible archives written atomically
//! - Ephemeral or persistent identities, optionally encrypted at rest
//! - Archive verification against an issuer certificate
//!
//! ## Example
//!
//! ```rust,ignore
//! use eventpass::{IssuanceRequest, IssuerConfig, PassIssuer, ResourceSource, TicketHolder};
//!
//! let issuer = PassIssuer::from_config(IssuerConfig::default())?;
//! let issued = issuer
//!     .issue(IssuanceRequest::new(
//!         TicketHolder {
//!             name: "Kai".into(),
//!             event: "Comic Con 2025".into(),
//!             ticket_type: "VIP".into(),
//!             serial_number: "KAI2025-CCON".into(),
//!         },
//!         ResourceSource::File("icon.png".into()),
//!         ResourceSource::File("logo.png".into()),
//!         "KAI2025-CCON.pkpass",
//!     ))
//!     .await?;
//! println!("{}", issued.certificate_pem()?);
//! ```
//!
//! The certificate is not part of the archive. With the default ephemeral
//! identity every pass has its own certificate, returned in [`IssuedPass`];
//! production issuers should use [`IdentityMode::Persistent`] so one
//! certificate verifies every pass.

pub mod config;
pub mod content;
pub mod crypto;
pub mod packaging;
pub mod pipeline;
pub mod security;

pub use config::{ArchiveConfig, ConfigError, IdentityConfig, IdentityMode, IssuerConfig};
pub use content::{
    derive_serial_number, ContentError, ContentStore, PassDefinition, PassTemplate, ResourceName,
    ResourceSource, SealedContent, TicketHolder,
};
pub use crypto::{sign_manifest, verify_manifest_signature, Signature, SigningIdentity};
pub use packaging::{
    read_archive, ArchiveCompression, ArchivePackager, DigestAlgorithm, Manifest, ManifestBuilder,
};
pub use pipeline::{
    IssuanceError, IssuanceErrorKind, IssuanceRequest, IssuanceState, IssuedPass, PassIssuer,
    PipelineStage,
};
pub use security::{
    verify_pass_archive, EphemeralIdentityProvider, FileIdentityStore, IdentityProvider,
    StaticIdentityProvider, VerificationError,
};
