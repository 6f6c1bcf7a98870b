// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Principal Key Material
//!
//! secp256k1 key pairs held by principals. Private keys are parsed from
//! `0x`-prefixed hex text, either from a keyring file or from the
//! `COMPUTE_PRIVATE_KEY` environment variable.
//!
//! ## Security Considerations
//!
//! - Private keys are NEVER logged; `Debug` output is redacted
//! - Keys must be exactly 32 bytes (64 hex characters + "0x" prefix)
//! - Public keys use the 33-byte compressed SEC1 encoding

use super::CryptoError;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::SecretKey;
use rand::rngs::OsRng;
use std::env;
use std::fmt;
use tracing::info;

/// Environment variable holding the local principal's private key
pub const PRIVATE_KEY_ENV: &str = "COMPUTE_PRIVATE_KEY";

/// Compressed SEC1 public key size
pub const PUBLIC_KEY_SIZE: usize = 33;

/// A principal's private key. Never transmitted.
#[derive(Clone)]
pub struct PrivateKey(SecretKey);

impl PrivateKey {
    /// Generate a fresh random key (used by `compute-client keygen` and tests)
    pub fn random() -> Self {
        Self(SecretKey::random(&mut OsRng))
    }

    /// Parse a raw 32-byte scalar
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != 32 {
            return Err(CryptoError::InvalidKey {
                key_type: "private_key".to_string(),
                reason: format!("expected 32 bytes, got {}", bytes.len()),
            });
        }

        let secret = SecretKey::from_slice(bytes).map_err(|e| CryptoError::InvalidKey {
            key_type: "private_key".to_string(),
            reason: format!("not a valid secp256k1 scalar: {}", e),
        })?;

        Ok(Self(secret))
    }

    /// Parse a `0x`-prefixed, 64 character hex string
    pub fn from_hex(text: &str) -> Result<Self, CryptoError> {
        let text = text.trim();

        if text.is_empty() {
            return Err(CryptoError::InvalidKey {
                key_type: "private_key".to_string(),
                reason: "key text is empty".to_string(),
            });
        }

        let hex_str = text.strip_prefix("0x").ok_or_else(|| CryptoError::InvalidKey {
            key_type: "private_key".to_string(),
            reason: "must start with '0x' prefix".to_string(),
        })?;

        if hex_str.len() != 64 {
            return Err(CryptoError::InvalidKey {
                key_type: "private_key".to_string(),
                reason: format!(
                    "must be exactly 64 hex characters (32 bytes), got {} characters",
                    hex_str.len()
                ),
            });
        }

        let bytes = hex::decode(hex_str)?;
        Self::from_bytes(&bytes)
    }

    /// Load the private key from an environment variable
    ///
    /// The actual key is NEVER logged; only whether it loaded.
    pub fn from_env(var: &str) -> Result<Self, CryptoError> {
        let text = env::var(var).map_err(|_| CryptoError::InvalidKey {
            key_type: "private_key".to_string(),
            reason: format!("{} environment variable not set", var),
        })?;

        let key = Self::from_hex(&text)?;
        info!("✅ Private key loaded from {} (32 bytes)", var);
        Ok(key)
    }

    /// Hex text form, for provisioning output only
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0.to_bytes()))
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.0.public_key())
    }

    pub(crate) fn secret(&self) -> &SecretKey {
        &self.0
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(<redacted>)")
    }
}

/// A principal's public key, shared through the key store
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKey(k256::PublicKey);

impl PublicKey {
    /// Parse a SEC1 encoded point (33 bytes compressed or 65 bytes uncompressed)
    pub fn from_sec1_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != PUBLIC_KEY_SIZE && bytes.len() != 65 {
            return Err(CryptoError::InvalidKey {
                key_type: "public_key".to_string(),
                reason: format!("expected 33 or 65 bytes, got {}", bytes.len()),
            });
        }

        let key = k256::PublicKey::from_sec1_bytes(bytes).map_err(|e| CryptoError::InvalidKey {
            key_type: "public_key".to_string(),
            reason: format!("invalid curve point: {}", e),
        })?;

        Ok(Self(key))
    }

    /// Parse hex text; the `0x` prefix is optional for public keys
    pub fn from_hex(text: &str) -> Result<Self, CryptoError> {
        let text = text.trim();
        let hex_str = text.strip_prefix("0x").unwrap_or(text);
        let bytes = hex::decode(hex_str)?;
        Self::from_sec1_bytes(&bytes)
    }

    /// Compressed SEC1 encoding
    pub fn to_bytes(&self) -> Vec<u8> {
        self.0.to_encoded_point(true).as_bytes().to_vec()
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.to_bytes()))
    }

    pub(crate) fn inner(&self) -> &k256::PublicKey {
        &self.0
    }
}

impl From<k256::PublicKey> for PublicKey {
    fn from(key: k256::PublicKey) -> Self {
        Self(key)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_hex())
    }
}
