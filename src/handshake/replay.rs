// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Replay protection for handshake requests.
//!
//! Remembers a SHA-256 digest of every accepted `cipher_nonce` for a fixed
//! window. The sealed nonce is freshly randomized per handshake, so a
//! repeated ciphertext can only be a recorded request played back.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Default window during which a repeated authenticator is refused
pub const DEFAULT_REPLAY_WINDOW: Duration = Duration::from_secs(3600);

#[derive(Debug)]
pub struct ReplayGuard {
    window: Duration,
    seen: Mutex<HashMap<[u8; 32], Instant>>,
}

impl ReplayGuard {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            seen: Mutex::new(HashMap::new()),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Record `cipher_nonce`, returning `false` if it was already seen
    /// within the window.
    pub fn check_and_record(&self, cipher_nonce: &[u8]) -> bool {
        let digest: [u8; 32] = Sha256::digest(cipher_nonce).into();
        let window = self.window;

        let mut seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());
        seen.retain(|_, at| at.elapsed() < window);

        if seen.contains_key(&digest) {
            tracing::warn!("🚫 Replayed handshake nonce {}", hex::encode(&digest[..8]));
            return false;
        }
        seen.insert(digest, Instant::now());
        true
    }

    /// Number of digests currently remembered
    pub fn len(&self) -> usize {
        self.seen.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ReplayGuard {
    fn default() -> Self {
        Self::new(DEFAULT_REPLAY_WINDOW)
    }
}
