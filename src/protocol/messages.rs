// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use crate::artifacts::Artifact;
use crate::channel::Envelope;
use crate::tasks::Task;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The handshake message, used for both the request and the response.
///
/// The client fills `name`, `cipher_name` and `cipher_nonce`; the
/// intermediary's response additionally carries `session_key_ct`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authenticator {
    /// Claimed principal name, in clear
    pub name: String,
    /// Identity proof over `name`
    pub cipher_name: Vec<u8>,
    /// Request: nonce sealed to the intermediary. Response: the request's
    /// `cipher_nonce` encrypted under the new session key.
    pub cipher_nonce: Vec<u8>,
    /// Session key sealed to the caller (response only)
    pub session_key_ct: Option<Vec<u8>>,
}

/// First (and only) message a client sends on a connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Request {
    Handshake(Authenticator),
    Sealed(Envelope),
}

/// The server's single reply before it closes the connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Response {
    Handshake(Authenticator),
    Sealed(Envelope),
    /// Out-of-band, unencrypted failure report
    Error(ErrorSignal),
}

/// Plaintext of a client envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Payload {
    Artifact(Artifact),
    Task(Task),
}

/// Plaintext of a server envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Reply {
    ArtifactStored { name: String, size: u64 },
    TaskCompleted(Task),
}

/// Why a handshake was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthFailure {
    /// The caller's identity proof does not match its claimed name
    IdentityMismatch,
    /// A nonce or intermediary proof did not verify
    VerificationMismatch,
    /// The request's cipher nonce was already seen
    Replayed,
}

impl fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthFailure::IdentityMismatch => f.write_str("identity mismatch"),
            AuthFailure::VerificationMismatch => f.write_str("verification mismatch"),
            AuthFailure::Replayed => f.write_str("replayed authenticator"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    AuthenticationFailed(AuthFailure),
    NoSessionKey,
    DecryptFailed,
    UnresolvedTask { name: String },
    InvalidTask,
    Protocol,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::AuthenticationFailed(reason) => {
                write!(f, "authentication_failed ({})", reason)
            }
            ErrorKind::NoSessionKey => f.write_str("no_session_key"),
            ErrorKind::DecryptFailed => f.write_str("decrypt_failed"),
            ErrorKind::UnresolvedTask { name } => write!(f, "unresolved_task ({})", name),
            ErrorKind::InvalidTask => f.write_str("invalid_task"),
            ErrorKind::Protocol => f.write_str("protocol_error"),
            ErrorKind::Internal => f.write_str("internal_error"),
        }
    }
}

/// Error value returned in place of a sealed response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorSignal {
    pub kind: ErrorKind,
    pub detail: String,
}

impl ErrorSignal {
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn unresolved_task(name: &str) -> Self {
        Self::new(
            ErrorKind::UnresolvedTask {
                name: name.to_string(),
            },
            format!("Please upload the artifact for task '{}' before invoking it", name),
        )
    }
}

impl fmt::Display for ErrorSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.detail)
    }
}
