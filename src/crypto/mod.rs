// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Cipher Adapter
//!
//! This module implements the cryptographic primitives the handshake and the
//! secure channel are built from:
//!
//! - **Keys**: secp256k1 principal key pairs, hex provisioning
//! - **Identity**: ECDSA identity proofs ("encrypt the name with the private key")
//! - **Sealed Box**: ECDH + HKDF + XChaCha20-Poly1305 public-key encryption
//! - **Encryption**: XChaCha20-Poly1305 AEAD under a session key
//! - **Session Keys**: In-memory, per-principal session key storage
//!
//! ## Security Considerations
//!
//! - Session keys are stored in memory only, never persisted
//! - Nonces are random per encryption operation
//! - Private keys and session keys never appear in logs or `Debug` output

pub mod encryption;
pub mod error;
pub mod identity;
pub mod keys;
pub mod sealed_box;
pub mod session_keys;

pub use encryption::{
    decrypt_with_aead, encrypt_with_aead, open_symmetric, seal_symmetric, SessionKey,
};
pub use error::CryptoError;
pub use identity::{open_identity, prove_identity};
pub use keys::{PrivateKey, PublicKey, PRIVATE_KEY_ENV};
pub use sealed_box::{open_sealed, seal_to};
pub use session_keys::SessionKeyStore;
