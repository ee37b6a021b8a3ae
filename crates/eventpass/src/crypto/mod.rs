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

//! Cryptographic primitives for pass signing.
//!
//! This module provides:
//! - RSA-2048 signing identities with self-signed X.509 certificates
//! - RSASSA-PKCS1-v1_5 / SHA-1 detached manifest signatures
//! - AES-256-GCM encryption for private keys at rest
//! - SHA256 fingerprint computation

mod identity;
mod key_encryption;
mod signing;

pub use identity::{
    certificate_from_der, certificate_from_pem, public_key_from_certificate, IdentityError,
    SigningIdentity, CERTIFICATE_VALIDITY, RSA_KEY_BITS,
};
pub use key_encryption::{
    decrypt_private_key, encrypt_private_key, parse_key_encryption_key, KeyEncryptionError,
};
pub use signing::{
    compute_fingerprint, sign_manifest, verify_manifest_signature, Signature, SigningError,
    SIGNATURE_ALGORITHM, SIGNATURE_FILENAME,
};

pub use rsa::RsaPublicKey;
pub use x509_cert::Certificate;
