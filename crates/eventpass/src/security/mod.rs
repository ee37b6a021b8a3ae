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

//! Identity persistence, archive verification and audit logging.
//!
//! This module provides:
//! - [`IdentityProvider`] trait and its ephemeral, static and file-backed
//!   implementations
//! - [`verify_pass_archive`] for checking an archive against an issuer certificate
//! - Security audit logging

pub mod audit;
mod identity_store;
mod verification;

pub use identity_store::{
    generate_identity, EphemeralIdentityProvider, FileIdentityStore, IdentityProvider,
    StaticIdentityProvider, CERTIFICATE_FILE, DEFAULT_KEYGEN_TIMEOUT, ENCRYPTED_KEY_FILE,
    PRIVATE_KEY_FILE,
};
pub use verification::{
    verify_pass_archive, verify_pass_archive_bytes, VerificationError, VerificationResult,
};
