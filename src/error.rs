// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Error taxonomy seen by callers of the client and the server.
//!
//! - `Transport` / `Timeout`: connection refused, reset, EOF or stalled; the
//!   connection is torn down and nothing is retried automatically
//! - `AuthenticationFailed`: fatal to the handshake attempt; restart from scratch
//! - `Channel`: fatal to the current request only; the session key stays valid
//! - `UnresolvedTask`: recoverable; upload the named artifact and retry

use crate::artifacts::ArtifactError;
use crate::handshake::{AuthFailure, HandshakeError};
use crate::keystore::KeyStoreError;
use crate::protocol::{CodecError, ErrorKind, ErrorSignal};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Secure channel failures
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelError {
    #[error("No session key held; complete a handshake first")]
    NoSessionKey,

    #[error("Envelope could not be opened: {0}")]
    DecryptFailed(String),
}

#[derive(Error, Debug)]
pub enum ComputeError {
    #[error("Transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("Timed out after {after:?} while {during}")]
    Timeout {
        after: Duration,
        during: &'static str,
    },

    #[error("Authentication failed ({reason}): {detail}")]
    AuthenticationFailed { reason: AuthFailure, detail: String },

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error("Task implementation '{0}' has not been uploaded")]
    UnresolvedTask(String),

    #[error("Invalid task: {0}")]
    InvalidTask(String),

    #[error("Server reported {kind}: {detail}")]
    Remote { kind: ErrorKind, detail: String },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error(transparent)]
    KeyStore(#[from] KeyStoreError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

impl ComputeError {
    /// Whether the caller may recover by uploading an artifact and retrying
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ComputeError::UnresolvedTask(_))
    }
}

impl From<HandshakeError> for ComputeError {
    fn from(err: HandshakeError) -> Self {
        match err {
            HandshakeError::AuthenticationFailed { reason, detail } => {
                ComputeError::AuthenticationFailed { reason, detail }
            }
            other => ComputeError::Protocol(other.to_string()),
        }
    }
}

impl From<CodecError> for ComputeError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Io(e) => ComputeError::Transport(e),
            other => ComputeError::Protocol(other.to_string()),
        }
    }
}

impl From<ErrorSignal> for ComputeError {
    fn from(signal: ErrorSignal) -> Self {
        match signal.kind {
            ErrorKind::AuthenticationFailed(reason) => ComputeError::AuthenticationFailed {
                reason,
                detail: signal.detail,
            },
            ErrorKind::NoSessionKey => ComputeError::Channel(ChannelError::NoSessionKey),
            ErrorKind::DecryptFailed => {
                ComputeError::Channel(ChannelError::DecryptFailed(signal.detail))
            }
            ErrorKind::UnresolvedTask { name } => ComputeError::UnresolvedTask(name),
            ErrorKind::InvalidTask => ComputeError::InvalidTask(signal.detail),
            kind => ComputeError::Remote {
                kind,
                detail: signal.detail,
            },
        }
    }
}
