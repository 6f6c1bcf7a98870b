// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Handshake Engine
//!
//! Mutual authentication between a principal and the trusted intermediary,
//! ending with both sides holding the same fresh session key.
//!
//! ## Exchange
//!
//! 1. The client generates a 128-character verification nonce and sends
//!    `{name, prove(name, cipher_nonce), cipher_nonce = seal_to(intermediary, nonce)}`.
//! 2. The intermediary resolves `name`, checks the identity proof against the
//!    request's `cipher_nonce`, opens the sealed nonce, generates a session
//!    key and answers with
//!    `{CENTRE, prove(CENTRE, cipher_nonce), sym(cipher_nonce), seal_to(caller, key)}`.
//! 3. The client checks the intermediary's proof against the `cipher_nonce`
//!    it sent, opens the session key and verifies the echo under it.
//!
//! Both proofs are bound to the request's `cipher_nonce`, so a captured
//! `cipher_name` cannot be paired with a freshly sealed nonce.
//!
//! Both sides are pure state machines; transport is handled by the client
//! and server modules.

pub mod replay;

pub use crate::protocol::{AuthFailure, Authenticator};
pub use replay::{ReplayGuard, DEFAULT_REPLAY_WINDOW};

use crate::channel::Session;
use crate::crypto::{
    open_identity, open_sealed, open_symmetric, prove_identity, seal_symmetric, seal_to,
    CryptoError, SessionKey,
};
use crate::keystore::Principal;
use rand::rngs::OsRng;
use rand::Rng;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Length of the verification nonce in characters
pub const NONCE_LENGTH: usize = 128;

const NONCE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789abcdefghijklmnopqrstuvwxyz+/";

#[derive(Error, Debug)]
pub enum HandshakeError {
    #[error("Authentication failed ({reason}): {detail}")]
    AuthenticationFailed { reason: AuthFailure, detail: String },

    #[error("Cannot {action} while handshake is {state}")]
    InvalidState { action: &'static str, state: String },

    #[error("Malformed authenticator: {0}")]
    Malformed(String),

    #[error("Handshake crypto failure: {0}")]
    Crypto(#[from] CryptoError),
}

impl HandshakeError {
    fn auth(reason: AuthFailure, detail: impl Into<String>) -> Self {
        HandshakeError::AuthenticationFailed {
            reason,
            detail: detail.into(),
        }
    }
}

/// Single-use random token proving the intermediary could open the request
#[derive(Clone, PartialEq, Eq)]
pub struct VerificationNonce(String);

impl VerificationNonce {
    pub fn generate() -> Self {
        let mut rng = OsRng;
        let text = (0..NONCE_LENGTH)
            .map(|_| NONCE_ALPHABET[rng.gen_range(0..NONCE_ALPHABET.len())] as char)
            .collect();
        Self(text)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for VerificationNonce {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("VerificationNonce(<redacted>)")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Idle,
    Connected,
    AwaitingResponse,
    Authenticated,
    Failed,
}

/// Client side of the handshake
#[derive(Debug)]
pub struct ClientHandshake {
    principal: Principal,
    intermediary: String,
    state: ClientState,
    sent_cipher_nonce: Option<Vec<u8>>,
}

impl ClientHandshake {
    pub fn new(principal: Principal, intermediary: impl Into<String>) -> Self {
        Self {
            principal,
            intermediary: intermediary.into(),
            state: ClientState::Idle,
            sent_cipher_nonce: None,
        }
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    /// Transport connection established
    pub fn mark_connected(&mut self) -> Result<(), HandshakeError> {
        self.expect_state(ClientState::Idle, "connect")?;
        self.state = ClientState::Connected;
        Ok(())
    }

    /// Build the authenticator request
    pub fn begin(&mut self) -> Result<Authenticator, HandshakeError> {
        self.expect_state(ClientState::Connected, "send an authenticator")?;

        let request = match self.build_request() {
            Ok(request) => request,
            Err(e) => {
                self.fail();
                return Err(e);
            }
        };

        self.sent_cipher_nonce = Some(request.cipher_nonce.clone());
        self.state = ClientState::AwaitingResponse;
        debug!("Authenticator built for {}", self.principal.name());
        Ok(request)
    }

    /// Verify the intermediary's response and extract the session key
    pub fn finish(&mut self, response: Authenticator) -> Result<Session, HandshakeError> {
        self.expect_state(ClientState::AwaitingResponse, "accept a response")?;

        match self.verify_response(response) {
            Ok(session) => {
                self.sent_cipher_nonce = None;
                self.state = ClientState::Authenticated;
                info!(
                    "✅ Authenticated with {} as {}",
                    self.intermediary,
                    self.principal.name()
                );
                Ok(session)
            }
            Err(e) => {
                warn!("❌ Handshake with {} failed: {}", self.intermediary, e);
                self.fail();
                Err(e)
            }
        }
    }

    /// Discard all partial state and return to `Idle`
    pub fn reset(&mut self) {
        self.sent_cipher_nonce = None;
        self.state = ClientState::Idle;
    }

    fn build_request(&self) -> Result<Authenticator, HandshakeError> {
        let intermediary_key = self.principal.resolve(&self.intermediary).map_err(|e| {
            HandshakeError::auth(AuthFailure::VerificationMismatch, e.to_string())
        })?;

        let nonce = VerificationNonce::generate();
        let cipher_nonce = seal_to(intermediary_key, nonce.as_str().as_bytes())?;
        Ok(Authenticator {
            name: self.principal.name().to_string(),
            cipher_name: prove_identity(
                self.principal.name(),
                &cipher_nonce,
                self.principal.private_key(),
            )?,
            cipher_nonce,
            session_key_ct: None,
        })
    }

    fn verify_response(&self, response: Authenticator) -> Result<Session, HandshakeError> {
        let mismatch = |detail: &str| HandshakeError::auth(AuthFailure::VerificationMismatch, detail);

        if response.name != self.intermediary {
            return Err(mismatch("response is not from the trusted intermediary"));
        }

        let sent_cipher_nonce = self
            .sent_cipher_nonce
            .as_deref()
            .ok_or_else(|| mismatch("no request outstanding"))?;
        let intermediary_key = self
            .principal
            .resolve(&self.intermediary)
            .map_err(|e| mismatch(&e.to_string()))?;
        let proven = open_identity(&response.cipher_name, sent_cipher_nonce, intermediary_key)
            .map_err(|_| mismatch("intermediary identity proof does not verify"))?;
        if proven != self.intermediary {
            return Err(mismatch("intermediary identity proof names another principal"));
        }

        let sealed_key = response
            .session_key_ct
            .as_deref()
            .ok_or_else(|| mismatch("response carries no session key"))?;
        let key_bytes = open_sealed(self.principal.private_key(), sealed_key)
            .map_err(|_| mismatch("session key is not sealed to this principal"))?;
        let key = SessionKey::from_slice(&key_bytes)
            .map_err(|_| mismatch("session key has the wrong length"))?;

        let echoed = open_symmetric(&key, self.principal.name().as_bytes(), &response.cipher_nonce)
            .map_err(|_| mismatch("echoed nonce does not open under the session key"))?;
        if sent_cipher_nonce != echoed.as_slice() {
            return Err(mismatch("echoed nonce differs from the one sent"));
        }

        Ok(Session::new(self.principal.name(), key))
    }

    fn expect_state(&self, expected: ClientState, action: &'static str) -> Result<(), HandshakeError> {
        if self.state != expected {
            return Err(HandshakeError::InvalidState {
                action,
                state: format!("{:?}", self.state),
            });
        }
        Ok(())
    }

    fn fail(&mut self) {
        self.sent_cipher_nonce = None;
        self.state = ClientState::Failed;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Listening,
    ReceivedAuthenticator,
    Responded,
    Rejected,
}

/// What an accepted handshake produces
#[derive(Debug, Clone)]
pub struct HandshakeOutcome {
    pub response: Authenticator,
    pub session: Session,
}

/// Intermediary side of the handshake, one per connection
#[derive(Debug)]
pub struct ServerHandshake {
    intermediary: Arc<Principal>,
    replay_guard: Arc<ReplayGuard>,
    state: ServerState,
}

impl ServerHandshake {
    pub fn new(intermediary: Arc<Principal>, replay_guard: Arc<ReplayGuard>) -> Self {
        Self {
            intermediary,
            replay_guard,
            state: ServerState::Listening,
        }
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    /// Authenticate a caller and issue a fresh session key.
    ///
    /// No key is issued unless every check passes.
    pub fn receive(&mut self, request: Authenticator) -> Result<HandshakeOutcome, HandshakeError> {
        if self.state != ServerState::Listening {
            return Err(HandshakeError::InvalidState {
                action: "receive an authenticator",
                state: format!("{:?}", self.state),
            });
        }
        self.state = ServerState::ReceivedAuthenticator;

        match self.authenticate(request) {
            Ok(outcome) => {
                self.state = ServerState::Responded;
                Ok(outcome)
            }
            Err(e) => {
                self.state = ServerState::Rejected;
                Err(e)
            }
        }
    }

    fn authenticate(&self, request: Authenticator) -> Result<HandshakeOutcome, HandshakeError> {
        if request.session_key_ct.is_some() {
            return Err(HandshakeError::Malformed(
                "requests must not carry a session key".to_string(),
            ));
        }

        let caller_key = self.intermediary.resolve(&request.name).map_err(|_| {
            HandshakeError::auth(
                AuthFailure::IdentityMismatch,
                format!("unknown principal '{}'", request.name),
            )
        })?;

        match open_identity(&request.cipher_name, &request.cipher_nonce, caller_key) {
            Ok(proven) if proven == request.name => {}
            Ok(_) => {
                return Err(HandshakeError::auth(
                    AuthFailure::IdentityMismatch,
                    "identity proof names another principal",
                ))
            }
            Err(_) => {
                return Err(HandshakeError::auth(
                    AuthFailure::IdentityMismatch,
                    "identity proof does not verify for this request under the claimed principal's key",
                ))
            }
        }

        let nonce = open_sealed(self.intermediary.private_key(), &request.cipher_nonce).map_err(
            |_| {
                HandshakeError::auth(
                    AuthFailure::VerificationMismatch,
                    "verification nonce is not sealed to the intermediary",
                )
            },
        )?;
        debug!("Opened {}-byte verification nonce from {}", nonce.len(), request.name);

        if !self.replay_guard.check_and_record(&request.cipher_nonce) {
            return Err(HandshakeError::auth(
                AuthFailure::Replayed,
                "authenticator was already used",
            ));
        }

        let key = SessionKey::generate();
        let response = Authenticator {
            name: self.intermediary.name().to_string(),
            cipher_name: prove_identity(
                self.intermediary.name(),
                &request.cipher_nonce,
                self.intermediary.private_key(),
            )?,
            cipher_nonce: seal_symmetric(&key, request.name.as_bytes(), &request.cipher_nonce)?,
            session_key_ct: Some(seal_to(caller_key, &key.to_bytes())?),
        };

        info!("🤝 Handshake accepted for principal: {}", request.name);
        Ok(HandshakeOutcome {
            response,
            session: Session::new(&request.name, key),
        })
    }
}
