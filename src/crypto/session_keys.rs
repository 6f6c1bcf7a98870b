// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Session Key Storage
//!
//! Manages in-memory storage of session keys, one per authenticated
//! principal. A second handshake by the same principal replaces (rotates)
//! its key; other principals are never affected.
//!
//! **Security**: Keys are stored in memory only and never persisted to disk.

use super::SessionKey;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

struct StoredKey {
    key: SessionKey,
    issued_at: Instant,
}

/// In-memory storage for session keys
///
/// Provides thread-safe storage and retrieval of session keys using
/// the principal name as the lookup key.
///
/// # Example
///
/// ```ignore
/// let store = SessionKeyStore::with_ttl(Duration::from_secs(3600));
/// store.store_key("Stephen Smith".to_string(), SessionKey::generate()).await;
/// let key = store.get_key("Stephen Smith").await;
/// store.clear_key("Stephen Smith").await;
/// ```
#[derive(Clone)]
pub struct SessionKeyStore {
    keys: Arc<RwLock<HashMap<String, StoredKey>>>,
    ttl: Option<Duration>,
}

impl SessionKeyStore {
    /// Create a store whose keys never expire
    pub fn new() -> Self {
        Self {
            keys: Arc::new(RwLock::new(HashMap::new())),
            ttl: None,
        }
    }

    /// Create a store whose keys expire `ttl` after issue
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            keys: Arc::new(RwLock::new(HashMap::new())),
            ttl: Some(ttl),
        }
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Store a session key, replacing any previous key for the principal
    pub async fn store_key(&self, principal: String, key: SessionKey) {
        let mut keys = self.keys.write().await;
        let replaced = keys
            .insert(
                principal.clone(),
                StoredKey {
                    key,
                    issued_at: Instant::now(),
                },
            )
            .is_some();
        tracing::info!(
            "🔑 Session key {} for principal: {} (total keys: {})",
            if replaced { "rotated" } else { "stored" },
            principal,
            keys.len()
        );
    }

    /// Retrieve a session key
    ///
    /// Expired keys are treated as absent.
    pub async fn get_key(&self, principal: &str) -> Option<SessionKey> {
        let keys = self.keys.read().await;
        let stored = keys.get(principal)?;
        if self.is_expired(stored) {
            return None;
        }
        Some(stored.key.clone())
    }

    /// Clear a session key
    pub async fn clear_key(&self, principal: &str) {
        let mut keys = self.keys.write().await;
        if keys.remove(principal).is_some() {
            tracing::info!(
                "🗑️  Session key cleared for principal: {} (remaining: {})",
                principal,
                keys.len()
            );
        }
    }

    /// Clear a principal's key only if it is still `expected`
    ///
    /// Returns whether the key was removed. A key rotated in by a later
    /// handshake is left in place.
    pub async fn clear_key_if(&self, principal: &str, expected: &SessionKey) -> bool {
        let mut keys = self.keys.write().await;
        match keys.get(principal) {
            Some(stored) if stored.key == *expected => {
                keys.remove(principal);
                tracing::info!(
                    "🗑️  Session key cleared for principal: {} (remaining: {})",
                    principal,
                    keys.len()
                );
                true
            }
            _ => false,
        }
    }

    /// Remove every expired key, returning how many were removed
    pub async fn clear_expired_keys(&self) -> usize {
        if self.ttl.is_none() {
            return 0;
        }

        let mut keys = self.keys.write().await;
        let before = keys.len();
        let ttl = self.ttl;
        keys.retain(|_, stored| !expired(ttl, stored));
        let removed = before - keys.len();
        if removed > 0 {
            tracing::info!("🗑️  Cleared {} expired session keys", removed);
        }
        removed
    }

    /// Get the number of stored session keys (including not-yet-swept expired ones)
    pub async fn count(&self) -> usize {
        let keys = self.keys.read().await;
        keys.len()
    }

    /// Clear all session keys
    ///
    /// Used for testing or shutdown scenarios
    pub async fn clear_all(&self) {
        let mut keys = self.keys.write().await;
        let count = keys.len();
        keys.clear();
        tracing::info!("🗑️  Cleared all session keys (count: {})", count);
    }

    fn is_expired(&self, stored: &StoredKey) -> bool {
        expired(self.ttl, stored)
    }
}

fn expired(ttl: Option<Duration>, stored: &StoredKey) -> bool {
    match ttl {
        Some(ttl) => stored.issued_at.elapsed() >= ttl,
        None => false,
    }
}

impl Default for SessionKeyStore {
    fn default() -> Self {
        Self::new()
    }
}
