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

//! Identity and signature tests through the public API.

use eventpass::crypto::{
    certificate_from_pem, public_key_from_certificate, sign_manifest, verify_manifest_signature,
    SigningError,
};
use eventpass::SigningIdentity;

use crate::fixtures::IDENTITY;

const MANIFEST: &[u8] = b"{\n    \"icon.png\": \"2aae6c35c94fcfb415dbe95f408b9ce91ee846ed\"\n}";

#[test]
fn test_signature_verifies_with_certificate_from_pem() {
    let signature = sign_manifest(&IDENTITY, MANIFEST).unwrap();

    let certificate = certificate_from_pem(&IDENTITY.certificate_pem().unwrap()).unwrap();
    let public_key = public_key_from_certificate(&certificate).unwrap();

    assert!(verify_manifest_signature(&public_key, MANIFEST, signature.as_bytes()).is_ok());
}

#[test]
fn test_single_byte_change_breaks_signature() {
    let signature = sign_manifest(&IDENTITY, MANIFEST).unwrap();

    for index in [0, MANIFEST.len() / 2, MANIFEST.len() - 1] {
        let mut altered = MANIFEST.to_vec();
        altered[index] ^= 0x20;
        let result = verify_manifest_signature(IDENTITY.public_key(), &altered, signature.as_bytes());
        assert!(matches!(result, Err(SigningError::VerificationFailed)));
    }
}

#[test]
fn test_other_identity_rejects_signature() {
    let other = SigningIdentity::generate("Another Issuer").unwrap();
    let signature = sign_manifest(&IDENTITY, MANIFEST).unwrap();

    let result = verify_manifest_signature(other.public_key(), MANIFEST, signature.as_bytes());
    assert!(result.is_err());
}

#[test]
fn test_public_key_pem_cannot_stand_in_for_private_key() {
    let key_pem = IDENTITY.public_key_pem().unwrap();
    assert!(key_pem.starts_with("-----BEGIN PUBLIC KEY-----"));

    let cert_pem = IDENTITY.certificate_pem().unwrap();
    assert!(SigningIdentity::from_pem(&key_pem, &cert_pem).is_err());
}
