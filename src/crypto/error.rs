// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Crypto Error Types
//!
//! Error type shared by every cryptographic operation in the cipher adapter.
//!
//! ## Error Variants
//!
//! - **DecryptionFailed**: AEAD decryption failed (wrong key, corrupted ciphertext, auth tag mismatch)
//! - **InvalidSignature**: identity proof is malformed or does not verify
//! - **InvalidKey**: invalid key material (wrong size, invalid point, malformed hex)
//! - **InvalidNonce**: nonce size validation failed (XChaCha20 requires 24 bytes)
//! - **KeyDerivationFailed**: ECDH or HKDF key derivation failed
//! - **InvalidPayload**: sealed payload is truncated or has the wrong layout
//! - **Other**: generic error for unexpected library failures
//!
//! ## Context Preservation
//!
//! Variants carry the operation that failed (e.g. "sealed_box", "identity_proof")
//! and the specific reason, so protocol layers can log them without
//! re-wrapping.

use std::fmt;

/// Error type for all cryptographic operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// AEAD decryption failed
    ///
    /// This error occurs when:
    /// - Authentication tag verification fails (ciphertext tampered or wrong key)
    /// - Ciphertext is corrupted
    /// - AAD doesn't match
    DecryptionFailed {
        /// Which operation was being performed
        operation: String,
        /// Specific failure reason
        reason: String,
    },

    /// Identity proof verification failed
    InvalidSignature {
        /// Which operation was being performed
        operation: String,
        /// Specific failure reason
        reason: String,
    },

    /// Invalid cryptographic key
    ///
    /// This error occurs when:
    /// - Key has wrong length
    /// - Key represents invalid curve point
    /// - Key text is missing the `0x` prefix or is not hex
    InvalidKey {
        /// Type of key that failed (e.g., "private_key", "public_key", "session_key")
        key_type: String,
        /// Specific failure reason
        reason: String,
    },

    /// Invalid nonce size
    ///
    /// XChaCha20-Poly1305 requires exactly 24-byte nonces.
    InvalidNonce {
        /// Expected nonce size (always 24 for XChaCha20)
        expected_size: usize,
        /// Actual nonce size provided
        actual_size: usize,
    },

    /// Key derivation failed (ECDH or HKDF)
    KeyDerivationFailed {
        /// Which key derivation operation failed
        operation: String,
        /// Specific failure reason
        reason: String,
    },

    /// Encrypted payload validation failed
    InvalidPayload {
        /// Which field failed validation
        field: String,
        /// Specific failure reason
        reason: String,
    },

    /// Generic error for library errors or unexpected failures
    Other(String),
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CryptoError::DecryptionFailed { operation, reason } => {
                write!(f, "Decryption failed during {}: {}", operation, reason)
            }
            CryptoError::InvalidSignature { operation, reason } => {
                write!(f, "Invalid signature during {}: {}", operation, reason)
            }
            CryptoError::InvalidKey { key_type, reason } => {
                write!(f, "Invalid key ({}): {}", key_type, reason)
            }
            CryptoError::InvalidNonce {
                expected_size,
                actual_size,
            } => {
                write!(
                    f,
                    "Invalid nonce size: expected {} bytes, got {} bytes",
                    expected_size, actual_size
                )
            }
            CryptoError::KeyDerivationFailed { operation, reason } => {
                write!(f, "Key derivation failed during {}: {}", operation, reason)
            }
            CryptoError::InvalidPayload { field, reason } => {
                write!(f, "Invalid payload field '{}': {}", field, reason)
            }
            CryptoError::Other(msg) => {
                write!(f, "Crypto error: {}", msg)
            }
        }
    }
}

impl std::error::Error for CryptoError {}

// Conversion from hex decode errors
impl From<hex::FromHexError> for CryptoError {
    fn from(err: hex::FromHexError) -> Self {
        CryptoError::InvalidKey {
            key_type: "hex_field".to_string(),
            reason: format!("hex decode error: {}", err),
        }
    }
}

// Conversion from k256 errors (elliptic curve operations)
impl From<k256::elliptic_curve::Error> for CryptoError {
    fn from(err: k256::elliptic_curve::Error) -> Self {
        CryptoError::InvalidKey {
            key_type: "unknown".to_string(),
            reason: format!("k256 error: {}", err),
        }
    }
}
