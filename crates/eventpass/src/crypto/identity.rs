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

//! RSA signing identities with self-signed X.509 certificates.
//!
//! A [`SigningIdentity`] pairs a 2048-bit RSA private key (public exponent
//! 65537) with a self-signed certificate whose subject and issuer are both
//! `CN=<common name>`. The certificate is valid for 3650 days from generation
//! and is signed with sha256WithRSAEncryption.
//!
//! The private key is only reachable from inside the crate; the signature
//! engine is its sole consumer.

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, SystemTime};

use rand::RngCore;
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use thiserror::Error;
use x509_cert::builder::{Builder, CertificateBuilder, Profile};
use x509_cert::der::{Decode, DecodePem, Encode, EncodePem};
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::spki::SubjectPublicKeyInfoOwned;
use x509_cert::time::{Time, Validity};
use x509_cert::Certificate;

use super::signing::compute_fingerprint;

/// RSA modulus size in bits.
pub const RSA_KEY_BITS: usize = 2048;

/// Certificate lifetime: 3650 days.
pub const CERTIFICATE_VALIDITY: Duration = Duration::from_secs(3650 * 24 * 60 * 60);

/// Length in bytes of generated certificate serial numbers.
const SERIAL_NUMBER_LEN: usize = 20;

/// Errors from identity generation, import and export.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    #[error("Key generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Certificate generation failed: {0}")]
    Certificate(String),

    #[error("Invalid subject common name: {0}")]
    InvalidSubject(String),

    #[error("Invalid PEM: {0}")]
    InvalidPem(String),

    #[error("Certificate public key does not match the private key")]
    KeyMismatch,

    #[error("Identity store error: {0}")]
    Store(String),
}

/// A private key and the self-signed certificate binding it to a subject.
#[derive(Clone)]
pub struct SigningIdentity {
    private_key: RsaPrivateKey,
    public_key: RsaPublicKey,
    certificate: Certificate,
    certificate_der: Vec<u8>,
    fingerprint: String,
}

impl fmt::Debug for SigningIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningIdentity")
            .field("subject", &self.subject())
            .field("fingerprint", &self.fingerprint)
            .finish_non_exhaustive()
    }
}

impl SigningIdentity {
    /// Generate a fresh key pair and self-signed certificate.
    ///
    /// CPU bound; run it on a blocking worker (see
    /// [`crate::security::generate_identity`]).
    pub fn generate(common_name: &str) -> Result<Self, IdentityError> {
        let mut rng = rand::rngs::OsRng;
        let private_key = RsaPrivateKey::new(&mut rng, RSA_KEY_BITS)
            .map_err(|e| IdentityError::KeyGeneration(e.to_string()))?;

        let certificate = self_signed_certificate(&private_key, common_name, SystemTime::now())?;
        Self::from_parts(private_key, certificate)
    }

    /// Assemble an identity from an existing key and certificate.
    ///
    /// Rejects a certificate whose subject public key is not the key's.
    pub fn from_parts(
        private_key: RsaPrivateKey,
        certificate: Certificate,
    ) -> Result<Self, IdentityError> {
        let public_key = RsaPublicKey::from(&private_key);
        let cert_key = public_key_from_certificate(&certificate)?;
        if cert_key != public_key {
            return Err(IdentityError::KeyMismatch);
        }

        let certificate_der = certificate
            .to_der()
            .map_err(|e| IdentityError::Certificate(e.to_string()))?;
        let fingerprint = compute_fingerprint(&certificate_der);

        Ok(Self {
            private_key,
            public_key,
            certificate,
            certificate_der,
            fingerprint,
        })
    }

    /// Load an identity from a PKCS#8 PEM private key and a PEM certificate.
    pub fn from_pem(private_key_pem: &str, certificate_pem: &str) -> Result<Self, IdentityError> {
        let private_key = RsaPrivateKey::from_pkcs8_pem(private_key_pem)
            .map_err(|e| IdentityError::InvalidPem(format!("private key: {e}")))?;
        let certificate = Certificate::from_pem(certificate_pem.as_bytes())
            .map_err(|e| IdentityError::InvalidPem(format!("certificate: {e}")))?;
        Self::from_parts(private_key, certificate)
    }

    /// Load an identity from a PKCS#8 DER private key and a PEM certificate.
    pub fn from_der_key(private_key_der: &[u8], certificate_pem: &str) -> Result<Self, IdentityError> {
        let private_key = RsaPrivateKey::from_pkcs8_der(private_key_der)
            .map_err(|e| IdentityError::InvalidPem(format!("private key: {e}")))?;
        let certificate = Certificate::from_pem(certificate_pem.as_bytes())
            .map_err(|e| IdentityError::InvalidPem(format!("certificate: {e}")))?;
        Self::from_parts(private_key, certificate)
    }

    pub(crate) fn private_key(&self) -> &RsaPrivateKey {
        &self.private_key
    }

    /// PKCS#8 PEM of the private key, for the persistent store only.
    pub(crate) fn private_key_pem(&self) -> Result<String, IdentityError> {
        self.private_key
            .to_pkcs8_pem(LineEnding::LF)
            .map(|pem| pem.to_string())
            .map_err(|e| IdentityError::InvalidPem(e.to_string()))
    }

    /// PKCS#8 DER of the private key, for encrypted storage only.
    pub(crate) fn private_key_der(&self) -> Result<Vec<u8>, IdentityError> {
        self.private_key
            .to_pkcs8_der()
            .map(|doc| doc.as_bytes().to_vec())
            .map_err(|e| IdentityError::InvalidPem(e.to_string()))
    }

    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public_key
    }

    /// SubjectPublicKeyInfo PEM of the public key.
    pub fn public_key_pem(&self) -> Result<String, IdentityError> {
        self.public_key
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| IdentityError::InvalidPem(e.to_string()))
    }

    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    pub fn certificate_der(&self) -> &[u8] {
        &self.certificate_der
    }

    pub fn certificate_pem(&self) -> Result<String, IdentityError> {
        self.certificate
            .to_pem(LineEnding::LF)
            .map_err(|e| IdentityError::Certificate(e.to_string()))
    }

    /// SHA-256 hex fingerprint of the DER certificate.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Subject distinguished name, e.g. `CN=Test Certificate`.
    pub fn subject(&self) -> String {
        self.certificate.tbs_certificate.subject.to_string()
    }

    pub fn not_before(&self) -> SystemTime {
        self.certificate
            .tbs_certificate
            .validity
            .not_before
            .to_system_time()
    }

    pub fn not_after(&self) -> SystemTime {
        self.certificate
            .tbs_certificate
            .validity
            .not_after
            .to_system_time()
    }

    /// Whether `at` falls inside the certificate's validity window.
    pub fn is_valid_at(&self, at: SystemTime) -> bool {
        at >= self.not_before() && at <= self.not_after()
    }
}

/// Extract the RSA public key from a certificate.
pub fn public_key_from_certificate(certificate: &Certificate) -> Result<RsaPublicKey, IdentityError> {
    let spki_der = certificate
        .tbs_certificate
        .subject_public_key_info
        .to_der()
        .map_err(|e| IdentityError::Certificate(e.to_string()))?;
    RsaPublicKey::from_public_key_der(&spki_der)
        .map_err(|e| IdentityError::Certificate(format!("not an RSA public key: {e}")))
}

/// Parse a PEM certificate.
pub fn certificate_from_pem(pem: &str) -> Result<Certificate, IdentityError> {
    Certificate::from_pem(pem.as_bytes()).map_err(|e| IdentityError::InvalidPem(e.to_string()))
}

/// Parse a DER certificate.
pub fn certificate_from_der(der: &[u8]) -> Result<Certificate, IdentityError> {
    Certificate::from_der(der).map_err(|e| IdentityError::Certificate(e.to_string()))
}

fn self_signed_certificate(
    private_key: &RsaPrivateKey,
    common_name: &str,
    now: SystemTime,
) -> Result<Certificate, IdentityError> {
    if common_name.is_empty() || common_name.contains(['=', ',', '+']) {
        return Err(IdentityError::InvalidSubject(common_name.to_string()));
    }
    let subject = Name::from_str(&format!("CN={common_name}"))
        .map_err(|e| IdentityError::InvalidSubject(e.to_string()))?;

    let validity = Validity {
        not_before: Time::try_from(now).map_err(|e| IdentityError::Certificate(e.to_string()))?,
        not_after: Time::try_from(now + CERTIFICATE_VALIDITY)
            .map_err(|e| IdentityError::Certificate(e.to_string()))?,
    };

    let spki = SubjectPublicKeyInfoOwned::from_key(RsaPublicKey::from(private_key))
        .map_err(|e| IdentityError::Certificate(e.to_string()))?;

    let signer = SigningKey::<Sha256>::new(private_key.clone());
    let builder = CertificateBuilder::new(
        Profile::Root,
        random_serial_number()?,
        validity,
        subject,
        spki,
        &signer,
    )
    .map_err(|e| IdentityError::Certificate(e.to_string()))?;

    builder
        .build::<rsa::pkcs1v15::Signature>()
        .map_err(|e| IdentityError::Certificate(e.to_string()))
}

/// Random positive serial of at most 159 bits.
fn random_serial_number() -> Result<SerialNumber, IdentityError> {
    let mut bytes = [0u8; SERIAL_NUMBER_LEN];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    // Positive, and no leading zero octet.
    bytes[0] = (bytes[0] & 0x7f) | 0x01;
    SerialNumber::new(&bytes).map_err(|e| IdentityError::Certificate(e.to_string()))
}
