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

//! AES-256-GCM encryption for signing keys at rest.
//!
//! The persistent identity store can keep the PKCS#8 private key encrypted.
//! The encrypted format is: `nonce (12 bytes) || ciphertext || tag (16 bytes)`.
//!
//! The key-encryption key is supplied from outside the store, typically a
//! 64-character hex string in an environment variable.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::RngCore;
use thiserror::Error;

/// Errors that can occur during key encryption/decryption.
#[derive(Debug, Error)]
pub enum KeyEncryptionError {
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Invalid key length: expected 32 bytes, got {0}")]
    InvalidKeyLength(usize),

    #[error("Invalid encrypted data: too short")]
    InvalidEncryptedData,

    #[error("Invalid hex key-encryption key: {0}")]
    InvalidHex(String),
}

/// Size of the AES-256-GCM nonce in bytes.
const NONCE_SIZE: usize = 12;

/// Size of the AES-256-GCM authentication tag in bytes.
const TAG_SIZE: usize = 16;

/// Parses a 64-character hex string into a 32-byte key-encryption key.
pub fn parse_key_encryption_key(hex_key: &str) -> Result<[u8; 32], KeyEncryptionError> {
    let bytes =
        hex::decode(hex_key.trim()).map_err(|e| KeyEncryptionError::InvalidHex(e.to_string()))?;
    bytes
        .as_slice()
        .try_into()
        .map_err(|_| KeyEncryptionError::InvalidKeyLength(bytes.len()))
}

/// Encrypts a PKCS#8 DER private key using AES-256-GCM.
///
/// # Arguments
///
/// * `private_key` - The DER-encoded private key to encrypt
/// * `encryption_key` - The 32-byte AES-256 encryption key
///
/// # Returns
///
/// The encrypted data in format: `nonce (12 bytes) || ciphertext || tag (16 bytes)`
pub fn encrypt_private_key(
    private_key: &[u8],
    encryption_key: &[u8],
) -> Result<Vec<u8>, KeyEncryptionError> {
    if encryption_key.len() != 32 {
        return Err(KeyEncryptionError::InvalidKeyLength(encryption_key.len()));
    }

    let cipher = Aes256Gcm::new_from_slice(encryption_key)
        .map_err(|e| KeyEncryptionError::EncryptionFailed(e.to_string()))?;

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, private_key)
        .map_err(|e| KeyEncryptionError::EncryptionFailed(e.to_string()))?;

    let mut encrypted = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    encrypted.extend_from_slice(&nonce_bytes);
    encrypted.extend_from_slice(&ciphertext);

    Ok(encrypted)
}

/// Decrypts a private key that was encrypted with [`encrypt_private_key`].
pub fn decrypt_private_key(
    encrypted_data: &[u8],
    encryption_key: &[u8],
) -> Result<Vec<u8>, KeyEncryptionError> {
    if encryption_key.len() != 32 {
        return Err(KeyEncryptionError::InvalidKeyLength(encryption_key.len()));
    }

    // nonce + tag + at least one byte of ciphertext
    if encrypted_data.len() < NONCE_SIZE + TAG_SIZE + 1 {
        return Err(KeyEncryptionError::InvalidEncryptedData);
    }

    let cipher = Aes256Gcm::new_from_slice(encryption_key)
        .map_err(|e| KeyEncryptionError::DecryptionFailed(e.to_string()))?;

    let (nonce, ciphertext) = encrypted_data.split_at(NONCE_SIZE);

    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|e| KeyEncryptionError::DecryptionFailed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let private_key = vec![0x30u8; 1218];
        let encryption_key = [0x01u8; 32];

        let encrypted = encrypt_private_key(&private_key, &encryption_key).unwrap();
        assert_eq!(encrypted.len(), NONCE_SIZE + private_key.len() + TAG_SIZE);

        let decrypted = decrypt_private_key(&encrypted, &encryption_key).unwrap();
        assert_eq!(decrypted, private_key);
    }

    #[test]
    fn test_wrong_key_fails() {
        let encrypted = encrypt_private_key(&[0x42u8; 64], &[0x01u8; 32]).unwrap();
        let result = decrypt_private_key(&encrypted, &[0x02u8; 32]);

        assert!(matches!(result, Err(KeyEncryptionError::DecryptionFailed(_))));
    }

    #[test]
    fn test_invalid_key_length() {
        let result = encrypt_private_key(&[0x42u8; 64], &[0x01u8; 16]);
        assert!(matches!(
            result,
            Err(KeyEncryptionError::InvalidKeyLength(16))
        ));
    }

    #[test]
    fn test_invalid_encrypted_data() {
        let result = decrypt_private_key(&[0u8; 20], &[0x01u8; 32]);
        assert!(matches!(
            result,
            Err(KeyEncryptionError::InvalidEncryptedData)
        ));
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let encryption_key = [0x01u8; 32];
        let mut encrypted = encrypt_private_key(&[0x42u8; 64], &encryption_key).unwrap();

        encrypted[NONCE_SIZE + 5] ^= 0xFF;

        assert!(decrypt_private_key(&encrypted, &encryption_key).is_err());
    }

    #[test]
    fn test_parse_key_encryption_key() {
        let hex_key = "00".repeat(31) + "ff";
        let key = parse_key_encryption_key(&hex_key).unwrap();
        assert_eq!(key[31], 0xff);

        assert!(matches!(
            parse_key_encryption_key("abcd"),
            Err(KeyEncryptionError::InvalidKeyLength(2))
        ));
        assert!(matches!(
            parse_key_encryption_key("zz"),
            Err(KeyEncryptionError::InvalidHex(_))
        ));
    }
}
