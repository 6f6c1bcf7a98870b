// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Secure Channel
//!
//! Wraps payloads under the session key agreed during the handshake. The
//! principal name travels in clear beside the ciphertext so the intermediary
//! can select that principal's key; it is also bound as associated data, so
//! an envelope cannot be re-labelled for another principal.

use crate::crypto::{open_symmetric, seal_symmetric, SessionKey};
use crate::error::ChannelError;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Instant;

/// Keys agreed for one principal
#[derive(Debug, Clone)]
pub struct Session {
    pub principal: String,
    pub key: SessionKey,
    pub established_at: Instant,
}

impl Session {
    pub fn new(principal: impl Into<String>, key: SessionKey) -> Self {
        Self {
            principal: principal.into(),
            key,
            established_at: Instant::now(),
        }
    }

    pub fn seal<T: Serialize>(&self, value: &T) -> Result<Envelope, ChannelError> {
        let plaintext =
            bincode::serialize(value).map_err(|e| ChannelError::DecryptFailed(e.to_string()))?;
        let ciphertext = seal_symmetric(&self.key, self.principal.as_bytes(), &plaintext)
            .map_err(|e| ChannelError::DecryptFailed(e.to_string()))?;

        Ok(Envelope {
            principal: self.principal.clone(),
            ciphertext,
        })
    }

    pub fn open<T: DeserializeOwned>(&self, envelope: &Envelope) -> Result<T, ChannelError> {
        if envelope.principal != self.principal {
            return Err(ChannelError::DecryptFailed(format!(
                "envelope is addressed to '{}', session belongs to '{}'",
                envelope.principal, self.principal
            )));
        }

        let plaintext = open_symmetric(&self.key, envelope.principal.as_bytes(), &envelope.ciphertext)
            .map_err(|e| ChannelError::DecryptFailed(e.to_string()))?;
        bincode::deserialize(&plaintext).map_err(|e| ChannelError::DecryptFailed(e.to_string()))
    }
}

/// Encrypted wire form of a payload, reply or task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub principal: String,
    pub ciphertext: Vec<u8>,
}

/// Client-side holder of the current session
#[derive(Debug, Clone, Default)]
pub struct SecureChannel {
    session: Option<Session>,
}

impl SecureChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn establish(&mut self, session: Session) {
        self.session = Some(session);
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn is_established(&self) -> bool {
        self.session.is_some()
    }

    pub fn clear(&mut self) {
        self.session = None;
    }

    pub fn seal<T: Serialize>(&self, value: &T) -> Result<Envelope, ChannelError> {
        self.session
            .as_ref()
            .ok_or(ChannelError::NoSessionKey)?
            .seal(value)
    }

    pub fn open<T: DeserializeOwned>(&self, envelope: &Envelope) -> Result<T, ChannelError> {
        self.session
            .as_ref()
            .ok_or(ChannelError::NoSessionKey)?
            .open(envelope)
    }
}
