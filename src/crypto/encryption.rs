// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! XChaCha20-Poly1305 Encryption/Decryption
//!
//! Implements authenticated encryption using XChaCha20-Poly1305 AEAD
//! (Authenticated Encryption with Additional Data). This is the symmetric
//! half of the cipher adapter: every post-handshake payload travels as
//! `nonce (24 bytes) | ciphertext+tag` under the session key.

use super::CryptoError;
use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    XChaCha20Poly1305, XNonce,
};
use rand::{rngs::OsRng, RngCore};
use std::fmt;

/// XChaCha20 nonce size in bytes
pub const NONCE_SIZE: usize = 24;

/// Symmetric key size in bytes
pub const KEY_SIZE: usize = 32;

/// Symmetric session key issued by the trusted intermediary
///
/// Generated once per successful handshake. The raw bytes only leave this
/// type through [`SessionKey::to_bytes`], which is used to wrap the key for
/// its owner during the handshake.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionKey([u8; KEY_SIZE]);

impl SessionKey {
    /// Generate a fresh random session key
    pub fn generate() -> Self {
        let mut key = [0u8; KEY_SIZE];
        OsRng.fill_bytes(&mut key);
        Self(key)
    }

    /// Serialize the key for transport
    pub fn to_bytes(&self) -> [u8; KEY_SIZE] {
        self.0
    }

    /// Deserialize a key received during the handshake
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let key: [u8; KEY_SIZE] = bytes.try_into().map_err(|_| CryptoError::InvalidKey {
            key_type: "session_key".to_string(),
            reason: format!("expected {} bytes, got {}", KEY_SIZE, bytes.len()),
        })?;
        Ok(Self(key))
    }

    pub(crate) fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionKey(<redacted>)")
    }
}

/// Decrypt data using XChaCha20-Poly1305 AEAD
///
/// # Arguments
///
/// * `ciphertext` - Encrypted data (includes authentication tag)
/// * `nonce` - 24-byte nonce (unique per encryption)
/// * `aad` - Additional authenticated data (optional, can be empty)
/// * `key` - 32-byte encryption key
///
/// # Errors
///
/// Returns error if:
/// - Authentication tag verification fails (tampered data)
/// - Nonce size is not 24 bytes
/// - Key size is not 32 bytes
pub fn decrypt_with_aead(
    ciphertext: &[u8],
    nonce: &[u8],
    aad: &[u8],
    key: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = build_cipher(nonce, key)?;
    let xnonce = XNonce::from_slice(nonce);

    let payload = Payload {
        msg: ciphertext,
        aad,
    };

    cipher
        .decrypt(xnonce, payload)
        .map_err(|e| CryptoError::DecryptionFailed {
            operation: "aead_decrypt".to_string(),
            reason: format!("authentication error: {}", e),
        })
}

/// Encrypt data using XChaCha20-Poly1305 AEAD
///
/// Returns the ciphertext with the 16-byte authentication tag appended.
///
/// # Security
///
/// **CRITICAL**: Never reuse the same nonce with the same key!
/// Use [`seal_symmetric`] unless the caller manages nonces itself.
pub fn encrypt_with_aead(
    plaintext: &[u8],
    nonce: &[u8],
    aad: &[u8],
    key: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = build_cipher(nonce, key)?;
    let xnonce = XNonce::from_slice(nonce);

    let payload = Payload {
        msg: plaintext,
        aad,
    };

    cipher
        .encrypt(xnonce, payload)
        .map_err(|e| CryptoError::Other(format!("Encryption failed: {}", e)))
}

fn build_cipher(nonce: &[u8], key: &[u8]) -> Result<XChaCha20Poly1305, CryptoError> {
    if nonce.len() != NONCE_SIZE {
        return Err(CryptoError::InvalidNonce {
            expected_size: NONCE_SIZE,
            actual_size: nonce.len(),
        });
    }

    if key.len() != KEY_SIZE {
        return Err(CryptoError::InvalidKey {
            key_type: "aead_key".to_string(),
            reason: format!("expected {} bytes, got {}", KEY_SIZE, key.len()),
        });
    }

    XChaCha20Poly1305::new_from_slice(key).map_err(|e| CryptoError::InvalidKey {
        key_type: "aead_key".to_string(),
        reason: e.to_string(),
    })
}

/// Encrypt under a session key with a fresh random nonce
///
/// Output layout: `nonce (24 bytes) | ciphertext+tag`
pub fn seal_symmetric(key: &SessionKey, aad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);

    let ciphertext = encrypt_with_aead(plaintext, &nonce, aad, key.as_bytes())?;

    let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    sealed.extend_from_slice(&nonce);
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

/// Inverse of [`seal_symmetric`]
pub fn open_symmetric(key: &SessionKey, aad: &[u8], sealed: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if sealed.len() < NONCE_SIZE {
        return Err(CryptoError::InvalidPayload {
            field: "nonce".to_string(),
            reason: format!(
                "sealed data too short: expected at least {} bytes, got {}",
                NONCE_SIZE,
                sealed.len()
            ),
        });
    }

    let (nonce, ciphertext) = sealed.split_at(NONCE_SIZE);
    decrypt_with_aead(ciphertext, nonce, aad, key.as_bytes())
}
