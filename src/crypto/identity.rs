// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Identity Proofs
//!
//! A principal proves it holds the private key behind a claimed name by
//! signing the name with ECDSA (secp256k1, SHA-256). The signature also
//! covers a binding (the handshake's sealed nonce) and only verifies
//! together with it. The proof travels as
//!
//! ```text
//! [signature (64 bytes, r || s) | name (UTF-8)]
//! ```
//!
//! and the signed message is
//!
//! ```text
//! [name length (u32 BE) | name | binding]
//! ```
//!
//! Opening a proof with a public key and the same binding returns the
//! embedded name only when the signature verifies; callers then compare it
//! with the name they expected.

use super::{CryptoError, PrivateKey, PublicKey};
use k256::ecdsa::signature::{Signer, Verifier};
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};

/// Compact ECDSA signature size (r || s)
pub const SIGNATURE_SIZE: usize = 64;

/// Produce an identity proof for `name`, bound to `binding`, with the owner's private key
pub fn prove_identity(
    name: &str,
    binding: &[u8],
    private_key: &PrivateKey,
) -> Result<Vec<u8>, CryptoError> {
    let signing_key = SigningKey::from_bytes(&private_key.secret().to_bytes()).map_err(|e| {
        CryptoError::InvalidKey {
            key_type: "private_key".to_string(),
            reason: format!("cannot build signing key: {}", e),
        }
    })?;

    let signature: Signature = signing_key.sign(&signed_message(name.as_bytes(), binding));

    let mut proof = Vec::with_capacity(SIGNATURE_SIZE + name.len());
    proof.extend_from_slice(&signature.to_bytes());
    proof.extend_from_slice(name.as_bytes());
    Ok(proof)
}

/// Verify an identity proof made for `binding` with the claimed owner's public key
///
/// # Returns
///
/// The name carried by the proof.
///
/// # Errors
///
/// Returns error if:
/// - The proof is shorter than a signature
/// - The name is not valid UTF-8
/// - The signature does not verify under `public_key` for this `binding`
pub fn open_identity(
    proof: &[u8],
    binding: &[u8],
    public_key: &PublicKey,
) -> Result<String, CryptoError> {
    if proof.len() < SIGNATURE_SIZE {
        return Err(CryptoError::InvalidSignature {
            operation: "identity_proof".to_string(),
            reason: format!(
                "proof too short: expected at least {} bytes, got {}",
                SIGNATURE_SIZE,
                proof.len()
            ),
        });
    }

    let (signature_bytes, name_bytes) = proof.split_at(SIGNATURE_SIZE);

    let signature =
        Signature::try_from(signature_bytes).map_err(|e| CryptoError::InvalidSignature {
            operation: "identity_proof".to_string(),
            reason: format!("failed to parse signature: {}", e),
        })?;

    let verifying_key = VerifyingKey::from(*public_key.inner());
    verifying_key
        .verify(&signed_message(name_bytes, binding), &signature)
        .map_err(|e| CryptoError::InvalidSignature {
            operation: "identity_proof".to_string(),
            reason: format!("signature does not verify: {}", e),
        })?;

    String::from_utf8(name_bytes.to_vec()).map_err(|e| CryptoError::InvalidPayload {
        field: "name".to_string(),
        reason: format!("not valid UTF-8: {}", e),
    })
}

fn signed_message(name: &[u8], binding: &[u8]) -> Vec<u8> {
    let mut message = Vec::with_capacity(4 + name.len() + binding.len());
    message.extend_from_slice(&(name.len() as u32).to_be_bytes());
    message.extend_from_slice(name);
    message.extend_from_slice(binding);
    message
}
