// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Sealed Boxes (public-key encryption)
//!
//! Encrypts a message so that only the holder of a given private key can
//! read it. Uses ephemeral-static ECDH on secp256k1, HKDF-SHA256 to derive a
//! one-time key, then XChaCha20-Poly1305.
//!
//! **Wire Format**:
//! ```text
//! [ephemeral_pub (33 bytes) | nonce (24 bytes) | ciphertext+tag]
//! ```
//!
//! The ephemeral public key is bound as AAD so a box cannot be re-targeted
//! by swapping the key prefix.

use super::encryption::{decrypt_with_aead, encrypt_with_aead, KEY_SIZE, NONCE_SIZE};
use super::keys::PUBLIC_KEY_SIZE;
use super::{CryptoError, PrivateKey, PublicKey};
use hkdf::Hkdf;
use k256::ecdh::{diffie_hellman, EphemeralSecret, SharedSecret};
use rand::{rngs::OsRng, RngCore};
use sha2::Sha256;

const HKDF_INFO: &[u8] = b"compute-grid sealed-box v1";

/// Encrypt `plaintext` to the owner of `recipient`
pub fn seal_to(recipient: &PublicKey, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let ephemeral = EphemeralSecret::random(&mut OsRng);
    let ephemeral_pub = PublicKey::from(ephemeral.public_key()).to_bytes();

    let shared = ephemeral.diffie_hellman(recipient.inner());
    let key = derive_box_key(&shared)?;

    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);

    let ciphertext = encrypt_with_aead(plaintext, &nonce, &ephemeral_pub, &key)?;

    let mut sealed = Vec::with_capacity(PUBLIC_KEY_SIZE + NONCE_SIZE + ciphertext.len());
    sealed.extend_from_slice(&ephemeral_pub);
    sealed.extend_from_slice(&nonce);
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

/// Decrypt a sealed box with the recipient's private key
///
/// # Errors
///
/// Returns error if:
/// - The box is shorter than its fixed header
/// - The ephemeral public key is not a valid curve point
/// - The box was sealed to a different key or has been tampered with
pub fn open_sealed(private_key: &PrivateKey, sealed: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let header = PUBLIC_KEY_SIZE + NONCE_SIZE;
    if sealed.len() < header {
        return Err(CryptoError::InvalidPayload {
            field: "sealed_box".to_string(),
            reason: format!(
                "too short: expected at least {} bytes, got {}",
                header,
                sealed.len()
            ),
        });
    }

    let (ephemeral_pub, rest) = sealed.split_at(PUBLIC_KEY_SIZE);
    let (nonce, ciphertext) = rest.split_at(NONCE_SIZE);

    let ephemeral = PublicKey::from_sec1_bytes(ephemeral_pub).map_err(|e| {
        CryptoError::KeyDerivationFailed {
            operation: "sealed_box".to_string(),
            reason: format!("invalid ephemeral public key: {}", e),
        }
    })?;

    let shared = diffie_hellman(
        private_key.secret().to_nonzero_scalar(),
        ephemeral.inner().as_affine(),
    );
    let key = derive_box_key(&shared)?;

    decrypt_with_aead(ciphertext, nonce, ephemeral_pub, &key).map_err(|e| {
        CryptoError::DecryptionFailed {
            operation: "sealed_box".to_string(),
            reason: e.to_string(),
        }
    })
}

fn derive_box_key(shared: &SharedSecret) -> Result<[u8; KEY_SIZE], CryptoError> {
    let hkdf = Hkdf::<Sha256>::new(None, shared.raw_secret_bytes());
    let mut derived_key = [0u8; KEY_SIZE];
    hkdf.expand(HKDF_INFO, &mut derived_key)
        .map_err(|e| CryptoError::KeyDerivationFailed {
            operation: "hkdf_expand".to_string(),
            reason: e.to_string(),
        })?;
    Ok(derived_key)
}
