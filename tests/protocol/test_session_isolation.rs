// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Session Isolation Tests
//!
//! Each principal's traffic is sealed under its own key; one principal
//! re-authenticating or misbehaving never affects another.

use super::common::{authenticated_client, principals, send_raw, start_server};
use compute_grid::crypto::seal_to;
use compute_grid::protocol::{ErrorKind, Payload, Reply, Request, Response};
use compute_grid::{
    AuthFailure, ClientHandshake, Task, TaskKind, TaskOutcome, TRUSTED_INTERMEDIARY,
};

#[tokio::test]
async fn test_principals_receive_distinct_keys() {
    let p = principals();
    let (_server, handle) = start_server(p.centre.clone()).await;

    let alice = authenticated_client(&p.alice, handle.local_addr()).await;
    let bob = authenticated_client(&p.bob, handle.local_addr()).await;

    assert_ne!(alice.session().unwrap().key, bob.session().unwrap().key);

    handle.shutdown().await;
}

#[tokio::test]
async fn test_rehandshake_rotates_only_own_key() {
    let p = principals();
    let (server, handle) = start_server(p.centre.clone()).await;
    server.registry().install(TaskKind::Factorization).await;

    let mut alice = authenticated_client(&p.alice, handle.local_addr()).await;
    let bob = authenticated_client(&p.bob, handle.local_addr()).await;
    let old_alice_session = alice.session().unwrap().clone();
    let bob_key_before = server.sessions().get_key(p.bob.name()).await;

    alice.authenticate().await.unwrap();
    assert_ne!(alice.session().unwrap().key, old_alice_session.key);
    assert_eq!(server.sessions().get_key(p.bob.name()).await, bob_key_before);

    // bob keeps working
    let task = bob.submit_task(Task::factorization(28)).await.unwrap();
    assert_eq!(task.result(), Some(TaskOutcome::Factors(vec![2, 2, 7])));

    // alice's old key no longer opens on the server
    let stale = old_alice_session
        .seal(&Payload::Task(Task::factorization(28)))
        .unwrap();
    match send_raw(handle.local_addr(), &Request::Sealed(stale)).await {
        Response::Error(signal) => assert_eq!(signal.kind, ErrorKind::DecryptFailed),
        other => panic!("unexpected response: {:?}", other),
    }

    handle.shutdown().await;
}

#[tokio::test]
async fn test_observed_authenticator_cannot_rotate_victim_key() {
    let p = principals();
    let (server, handle) = start_server(p.centre.clone()).await;
    server.registry().install(TaskKind::Factorization).await;

    // alice authenticates; her authenticator is visible on the wire
    let mut handshake = ClientHandshake::new(p.alice.clone(), TRUSTED_INTERMEDIARY);
    handshake.mark_connected().unwrap();
    let observed = handshake.begin().unwrap();
    let request = Request::Handshake(observed.clone());
    let alice_session = match send_raw(handle.local_addr(), &request).await {
        Response::Handshake(response) => handshake.finish(response).unwrap(),
        other => panic!("unexpected response: {:?}", other),
    };
    let issued = server.sessions().get_key(p.alice.name()).await;

    // same cipher_name, fresh nonce sealed to CENTRE
    let mut forged = observed;
    forged.cipher_nonce = seal_to(&p.centre.public_key(), b"observer nonce").unwrap();
    match send_raw(handle.local_addr(), &Request::Handshake(forged)).await {
        Response::Error(signal) => assert_eq!(
            signal.kind,
            ErrorKind::AuthenticationFailed(AuthFailure::IdentityMismatch)
        ),
        other => panic!("unexpected response: {:?}", other),
    }
    assert_eq!(server.sessions().get_key(p.alice.name()).await, issued);

    // alice's session still works
    let envelope = alice_session
        .seal(&Payload::Task(Task::factorization(28)))
        .unwrap();
    match send_raw(handle.local_addr(), &Request::Sealed(envelope)).await {
        Response::Sealed(reply) => match alice_session.open::<Reply>(&reply).unwrap() {
            Reply::TaskCompleted(task) => {
                assert_eq!(task.result(), Some(TaskOutcome::Factors(vec![2, 2, 7])))
            }
            other => panic!("unexpected reply: {:?}", other),
        },
        other => panic!("unexpected response: {:?}", other),
    }

    handle.shutdown().await;
}

#[tokio::test]
async fn test_envelope_relabelled_as_other_principal_fails() {
    let p = principals();
    let (server, handle) = start_server(p.centre.clone()).await;
    server.registry().install(TaskKind::Factorization).await;

    let alice = authenticated_client(&p.alice, handle.local_addr()).await;
    let bob = authenticated_client(&p.bob, handle.local_addr()).await;

    // bob seals under his key but claims to be alice
    let mut envelope = bob
        .session()
        .unwrap()
        .seal(&Payload::Task(Task::factorization(28)))
        .unwrap();
    envelope.principal = p.alice.name().to_string();

    match send_raw(handle.local_addr(), &Request::Sealed(envelope)).await {
        Response::Error(signal) => assert_eq!(signal.kind, ErrorKind::DecryptFailed),
        other => panic!("unexpected response: {:?}", other),
    }

    // both sessions are still intact
    assert!(alice.submit_task(Task::factorization(12)).await.is_ok());
    assert!(bob.submit_task(Task::factorization(12)).await.is_ok());

    handle.shutdown().await;
}

#[tokio::test]
async fn test_one_principal_cannot_read_anothers_reply() {
    let p = principals();
    let (server, handle) = start_server(p.centre.clone()).await;
    server.registry().install(TaskKind::SequenceGeneration).await;

    let alice = authenticated_client(&p.alice, handle.local_addr()).await;
    let bob = authenticated_client(&p.bob, handle.local_addr()).await;

    let alice_session = alice.session().unwrap();
    let envelope = alice_session
        .seal(&Payload::Task(Task::sequence_generation(10)))
        .unwrap();

    let reply = match send_raw(handle.local_addr(), &Request::Sealed(envelope)).await {
        Response::Sealed(reply) => reply,
        other => panic!("unexpected response: {:?}", other),
    };

    let mut stolen = reply.clone();
    stolen.principal = p.bob.name().to_string();
    assert!(bob
        .session()
        .unwrap()
        .open::<Reply>(&stolen)
        .is_err());
    assert!(alice_session
        .open::<Reply>(&reply)
        .is_ok());

    handle.shutdown().await;
}
