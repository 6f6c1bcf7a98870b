// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Key Store
//!
//! Resolves principal names to public keys and loads the local principal's
//! own private key. Both roles (client principals and the trusted
//! intermediary) provision their keys through a TOML keyring:
//!
//! ```toml
//! [principal]
//! name = "Stephen Smith"
//! # optional; falls back to the COMPUTE_PRIVATE_KEY environment variable
//! private_key = "0x..."
//!
//! [public_keys]
//! CENTRE = "0x02..."
//! ```
//!
//! The public key map is read-only once loaded.

use crate::crypto::{CryptoError, PrivateKey, PublicKey, PRIVATE_KEY_ENV};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Default name of the trusted intermediary principal
pub const TRUSTED_INTERMEDIARY: &str = "CENTRE";

#[derive(Error, Debug)]
pub enum KeyStoreError {
    #[error("No public key known for principal '{0}'")]
    UnknownPrincipal(String),

    #[error("Failed to read keyring {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse keyring: {0}")]
    Parse(String),

    #[error("Invalid key for principal '{principal}': {source}")]
    InvalidKey {
        principal: String,
        source: CryptoError,
    },

    #[error("Keyring lists a public key for '{0}' that does not match its private key")]
    KeyMismatch(String),
}

/// Read-only map of principal name to public key
#[derive(Debug, Clone, Default)]
pub struct KeyStore {
    public_keys: HashMap<String, PublicKey>,
}

impl KeyStore {
    pub fn new(public_keys: HashMap<String, PublicKey>) -> Self {
        Self { public_keys }
    }

    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, PublicKey)>,
        S: Into<String>,
    {
        Self {
            public_keys: entries
                .into_iter()
                .map(|(name, key)| (name.into(), key))
                .collect(),
        }
    }

    /// Look up a principal's public key
    pub fn resolve(&self, name: &str) -> Result<&PublicKey, KeyStoreError> {
        self.public_keys
            .get(name)
            .ok_or_else(|| KeyStoreError::UnknownPrincipal(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.public_keys.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.public_keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.public_keys.is_empty()
    }
}

/// An identity holding its own private key and the public keys it trusts
#[derive(Debug, Clone)]
pub struct Principal {
    name: String,
    private_key: PrivateKey,
    keys: Arc<KeyStore>,
}

impl Principal {
    pub fn new(name: impl Into<String>, private_key: PrivateKey, keys: Arc<KeyStore>) -> Self {
        Self {
            name: name.into(),
            private_key,
            keys,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn private_key(&self) -> &PrivateKey {
        &self.private_key
    }

    pub fn public_key(&self) -> PublicKey {
        self.private_key.public_key()
    }

    pub fn keys(&self) -> &KeyStore {
        &self.keys
    }

    /// Resolve another principal's public key through this principal's key store
    pub fn resolve(&self, name: &str) -> Result<&PublicKey, KeyStoreError> {
        self.keys.resolve(name)
    }
}

/// `[principal]` table of a keyring file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeyringPrincipal {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
}

/// On-disk key provisioning format
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Keyring {
    pub principal: KeyringPrincipal,
    #[serde(default)]
    pub public_keys: BTreeMap<String, String>,
}

impl Keyring {
    pub fn parse(content: &str) -> Result<Self, KeyStoreError> {
        toml::from_str(content).map_err(|e| KeyStoreError::Parse(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, KeyStoreError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| KeyStoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn to_toml(&self) -> Result<String, KeyStoreError> {
        toml::to_string_pretty(self).map_err(|e| KeyStoreError::Parse(e.to_string()))
    }

    /// Load a keyring file and build the local principal from it
    pub fn load_principal(path: impl AsRef<Path>) -> Result<Principal, KeyStoreError> {
        let principal = Self::from_file(path.as_ref())?.into_principal()?;
        info!(
            "🔐 Keyring loaded for {} ({} public keys)",
            principal.name(),
            principal.keys().len()
        );
        Ok(principal)
    }

    /// Resolve the private key (file first, then environment) and the public key map
    pub fn into_principal(self) -> Result<Principal, KeyStoreError> {
        let private_key = match &self.principal.private_key {
            Some(text) => PrivateKey::from_hex(text),
            None => PrivateKey::from_env(PRIVATE_KEY_ENV),
        }
        .map_err(|source| KeyStoreError::InvalidKey {
            principal: self.principal.name.clone(),
            source,
        })?;

        self.into_principal_with(private_key)
    }

    /// Build the principal around an already-loaded private key
    pub fn into_principal_with(self, private_key: PrivateKey) -> Result<Principal, KeyStoreError> {
        let name = self.principal.name;

        let mut public_keys = HashMap::with_capacity(self.public_keys.len() + 1);
        for (principal, text) in self.public_keys {
            let key = PublicKey::from_hex(&text).map_err(|source| KeyStoreError::InvalidKey {
                principal: principal.clone(),
                source,
            })?;
            public_keys.insert(principal, key);
        }

        let own_public = private_key.public_key();
        match public_keys.get(&name) {
            Some(listed) if *listed != own_public => {
                return Err(KeyStoreError::KeyMismatch(name));
            }
            Some(_) => {}
            None => {
                public_keys.insert(name.clone(), own_public);
            }
        }

        Ok(Principal::new(
            name,
            private_key,
            Arc::new(KeyStore::new(public_keys)),
        ))
    }
}
