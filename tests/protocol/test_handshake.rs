// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Handshake Engine Tests
//!
//! Drive the client and server state machines directly, including forged
//! requests and responses built from the public crypto primitives.

use super::common::principals;
use compute_grid::crypto::{prove_identity, seal_symmetric, seal_to, PrivateKey, SessionKey};
use compute_grid::handshake::{HandshakeError, DEFAULT_REPLAY_WINDOW};
use compute_grid::{
    AuthFailure, Authenticator, ClientHandshake, ClientState, ReplayGuard, ServerHandshake,
    ServerState, TRUSTED_INTERMEDIARY,
};
use std::sync::Arc;

fn server_for(centre: &compute_grid::Principal) -> ServerHandshake {
    ServerHandshake::new(
        Arc::new(centre.clone()),
        Arc::new(ReplayGuard::new(DEFAULT_REPLAY_WINDOW)),
    )
}

fn begin(client: &mut ClientHandshake) -> Authenticator {
    client.mark_connected().unwrap();
    client.begin().unwrap()
}

fn reason_of(err: HandshakeError) -> AuthFailure {
    match err {
        HandshakeError::AuthenticationFailed { reason, .. } => reason,
        other => panic!("expected authentication failure, got {:?}", other),
    }
}

#[test]
fn test_both_sides_hold_the_same_key() {
    let p = principals();
    let mut client = ClientHandshake::new(p.alice.clone(), TRUSTED_INTERMEDIARY);
    let mut server = server_for(&p.centre);

    let request = begin(&mut client);
    assert_eq!(request.name, "Stephen Smith");
    assert!(request.session_key_ct.is_none());

    let outcome = server.receive(request).unwrap();
    assert_eq!(outcome.response.name, TRUSTED_INTERMEDIARY);
    assert!(outcome.response.session_key_ct.is_some());

    let session = client.finish(outcome.response).unwrap();
    assert_eq!(session.key, outcome.session.key);
    assert_eq!(session.principal, outcome.session.principal);
    assert_eq!(client.state(), ClientState::Authenticated);
    assert_eq!(server.state(), ServerState::Responded);
}

#[test]
fn test_every_handshake_issues_a_fresh_key() {
    let p = principals();
    let mut keys = Vec::new();
    for _ in 0..3 {
        let mut client = ClientHandshake::new(p.alice.clone(), TRUSTED_INTERMEDIARY);
        let outcome = server_for(&p.centre).receive(begin(&mut client)).unwrap();
        keys.push(client.finish(outcome.response).unwrap().key);
    }
    assert_ne!(keys[0], keys[1]);
    assert_ne!(keys[1], keys[2]);
}

#[test]
fn test_claiming_another_name_is_identity_mismatch() {
    let p = principals();
    let mut client = ClientHandshake::new(p.alice.clone(), TRUSTED_INTERMEDIARY);
    let mut request = begin(&mut client);
    // alice's proof, bob's name
    request.name = p.bob.name().to_string();

    let mut server = server_for(&p.centre);
    let err = server.receive(request).unwrap_err();
    assert_eq!(reason_of(err), AuthFailure::IdentityMismatch);
    assert_eq!(server.state(), ServerState::Rejected);
}

#[test]
fn test_proof_signed_by_wrong_key_is_identity_mismatch() {
    let p = principals();
    let mallory = PrivateKey::random();
    let centre_pub = p.centre.public_key();

    let cipher_nonce = seal_to(&centre_pub, b"some nonce").unwrap();
    let request = Authenticator {
        name: p.alice.name().to_string(),
        cipher_name: prove_identity(p.alice.name(), &cipher_nonce, &mallory).unwrap(),
        cipher_nonce,
        session_key_ct: None,
    };

    let err = server_for(&p.centre).receive(request).unwrap_err();
    assert_eq!(reason_of(err), AuthFailure::IdentityMismatch);
}

#[test]
fn test_unknown_principal_is_identity_mismatch() {
    let p = principals();
    let stranger = PrivateKey::random();
    let cipher_nonce = seal_to(&p.centre.public_key(), b"nonce").unwrap();
    let request = Authenticator {
        name: "Nobody".to_string(),
        cipher_name: prove_identity("Nobody", &cipher_nonce, &stranger).unwrap(),
        cipher_nonce,
        session_key_ct: None,
    };

    let err = server_for(&p.centre).receive(request).unwrap_err();
    assert_eq!(reason_of(err), AuthFailure::IdentityMismatch);
}

#[test]
fn test_nonce_not_sealed_to_intermediary_is_verification_mismatch() {
    let p = principals();
    // sealed to bob instead of CENTRE
    let cipher_nonce = seal_to(&p.bob.public_key(), b"nonce").unwrap();
    let request = Authenticator {
        name: p.alice.name().to_string(),
        cipher_name: prove_identity(p.alice.name(), &cipher_nonce, p.alice.private_key()).unwrap(),
        cipher_nonce,
        session_key_ct: None,
    };

    let err = server_for(&p.centre).receive(request).unwrap_err();
    assert_eq!(reason_of(err), AuthFailure::VerificationMismatch);
}

#[test]
fn test_replayed_request_issues_no_key() {
    let p = principals();
    let guard = Arc::new(ReplayGuard::default());
    let mut client = ClientHandshake::new(p.alice.clone(), TRUSTED_INTERMEDIARY);
    let request = begin(&mut client);

    let mut first = ServerHandshake::new(Arc::new(p.centre.clone()), guard.clone());
    first.receive(request.clone()).unwrap();

    let mut second = ServerHandshake::new(Arc::new(p.centre.clone()), guard);
    let err = second.receive(request).unwrap_err();
    assert_eq!(reason_of(err), AuthFailure::Replayed);
}

#[test]
fn test_captured_proof_with_fresh_nonce_is_identity_mismatch() {
    let p = principals();
    let guard = Arc::new(ReplayGuard::default());
    let mut client = ClientHandshake::new(p.alice.clone(), TRUSTED_INTERMEDIARY);
    let genuine = begin(&mut client);

    let mut first = ServerHandshake::new(Arc::new(p.centre.clone()), guard.clone());
    first.receive(genuine.clone()).unwrap();

    // an observer reuses alice's cipher_name with a nonce of its own
    let mut forged = genuine;
    forged.cipher_nonce = seal_to(&p.centre.public_key(), b"observer nonce").unwrap();

    let mut second = ServerHandshake::new(Arc::new(p.centre.clone()), guard);
    let err = second.receive(forged).unwrap_err();
    assert_eq!(reason_of(err), AuthFailure::IdentityMismatch);
}

#[test]
fn test_substituted_session_key_is_verification_mismatch() {
    let p = principals();
    let mut client = ClientHandshake::new(p.alice.clone(), TRUSTED_INTERMEDIARY);
    let outcome = server_for(&p.centre).receive(begin(&mut client)).unwrap();

    // An interceptor swaps in a key of its own, sealed to alice
    let mut response = outcome.response;
    let attacker_key = SessionKey::generate();
    response.session_key_ct = Some(seal_to(&p.alice.public_key(), &attacker_key.to_bytes()).unwrap());

    let err = client.finish(response).unwrap_err();
    assert_eq!(reason_of(err), AuthFailure::VerificationMismatch);
    assert_eq!(client.state(), ClientState::Failed);
}

#[test]
fn test_impostor_intermediary_is_verification_mismatch() {
    let p = principals();
    let mut client = ClientHandshake::new(p.alice.clone(), TRUSTED_INTERMEDIARY);
    let request = begin(&mut client);

    // Knows the protocol and alice's public key, but not CENTRE's private key
    let impostor = PrivateKey::random();
    let key = SessionKey::generate();
    let forged = Authenticator {
        name: TRUSTED_INTERMEDIARY.to_string(),
        cipher_name: prove_identity(TRUSTED_INTERMEDIARY, &request.cipher_nonce, &impostor)
            .unwrap(),
        cipher_nonce: seal_symmetric(&key, p.alice.name().as_bytes(), &request.cipher_nonce)
            .unwrap(),
        session_key_ct: Some(seal_to(&p.alice.public_key(), &key.to_bytes()).unwrap()),
    };

    let err = client.finish(forged).unwrap_err();
    assert_eq!(reason_of(err), AuthFailure::VerificationMismatch);
}

#[test]
fn test_response_echoing_another_nonce_is_verification_mismatch() {
    let p = principals();
    let mut client = ClientHandshake::new(p.alice.clone(), TRUSTED_INTERMEDIARY);
    let _request = begin(&mut client);

    // A genuine response, but to a different request
    let mut other = ClientHandshake::new(p.alice.clone(), TRUSTED_INTERMEDIARY);
    let outcome = server_for(&p.centre).receive(begin(&mut other)).unwrap();

    let err = client.finish(outcome.response).unwrap_err();
    assert_eq!(reason_of(err), AuthFailure::VerificationMismatch);
}

#[test]
fn test_response_for_another_principal_is_rejected() {
    let p = principals();
    let mut bob = ClientHandshake::new(p.bob.clone(), TRUSTED_INTERMEDIARY);
    let bob_response = server_for(&p.centre).receive(begin(&mut bob)).unwrap().response;

    let mut alice = ClientHandshake::new(p.alice.clone(), TRUSTED_INTERMEDIARY);
    let _ = begin(&mut alice);

    // the session key inside is sealed to bob
    let err = alice.finish(bob_response).unwrap_err();
    assert_eq!(reason_of(err), AuthFailure::VerificationMismatch);
}

#[test]
fn test_failed_client_resets_to_idle() {
    let p = principals();
    let mut client = ClientHandshake::new(p.alice.clone(), TRUSTED_INTERMEDIARY);
    let mut response = server_for(&p.centre).receive(begin(&mut client)).unwrap().response;
    response.session_key_ct = None;

    assert!(client.finish(response).is_err());
    assert_eq!(client.state(), ClientState::Failed);
    assert!(matches!(
        client.begin(),
        Err(HandshakeError::InvalidState { .. })
    ));

    client.reset();
    let request = begin(&mut client);
    let outcome = server_for(&p.centre).receive(request).unwrap();
    assert!(client.finish(outcome.response).is_ok());
}
