// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Secure Channel Tests
//!
//! Sealed requests over a live server: missing keys, wrong keys and
//! tampered envelopes must all fail without disturbing the session.

use super::common::{authenticated_client, client_for, principals, send_raw, start_server};
use compute_grid::crypto::SessionKey;
use compute_grid::protocol::{ErrorKind, Payload, Request, Response};
use compute_grid::{ChannelError, ComputeError, Session, Task, TaskKind, TaskOutcome};

#[tokio::test]
async fn test_submit_before_handshake_is_no_session_key() {
    let p = principals();
    let (_server, handle) = start_server(p.centre.clone()).await;
    let client = client_for(&p.alice, handle.local_addr());

    let err = client.submit_task(Task::factorization(28)).await.unwrap_err();
    assert!(matches!(err, ComputeError::Channel(ChannelError::NoSessionKey)));

    handle.shutdown().await;
}

#[tokio::test]
async fn test_sealed_round_trip_after_handshake() {
    let p = principals();
    let (server, handle) = start_server(p.centre.clone()).await;
    server.registry().install(TaskKind::Factorization).await;

    let client = authenticated_client(&p.alice, handle.local_addr()).await;
    assert!(client.is_authenticated());

    let task = client.submit_task(Task::factorization(28)).await.unwrap();
    assert_eq!(task.result(), Some(TaskOutcome::Factors(vec![2, 2, 7])));

    handle.shutdown().await;
}

#[tokio::test]
async fn test_server_without_key_reports_no_session_key() {
    let p = principals();
    let (_server, handle) = start_server(p.centre.clone()).await;

    // a session the server never issued
    let session = Session::new(p.alice.name(), SessionKey::generate());
    let envelope = session.seal(&Payload::Task(Task::factorization(6))).unwrap();

    match send_raw(handle.local_addr(), &Request::Sealed(envelope)).await {
        Response::Error(signal) => assert_eq!(signal.kind, ErrorKind::NoSessionKey),
        other => panic!("unexpected response: {:?}", other),
    }

    handle.shutdown().await;
}

#[tokio::test]
async fn test_wrong_key_is_decrypt_failure_and_session_survives() {
    let p = principals();
    let (server, handle) = start_server(p.centre.clone()).await;
    server.registry().install(TaskKind::SequenceGeneration).await;
    let client = authenticated_client(&p.alice, handle.local_addr()).await;

    let forged = Session::new(p.alice.name(), SessionKey::generate());
    let envelope = forged.seal(&Payload::Task(Task::sequence_generation(5))).unwrap();
    match send_raw(handle.local_addr(), &Request::Sealed(envelope)).await {
        Response::Error(signal) => assert_eq!(signal.kind, ErrorKind::DecryptFailed),
        other => panic!("unexpected response: {:?}", other),
    }

    // the real session is unaffected
    let task = client.submit_task(Task::sequence_generation(5)).await.unwrap();
    assert_eq!(task.result(), Some(TaskOutcome::Sequence(vec![0, 1, 1, 2, 3])));

    handle.shutdown().await;
}

#[tokio::test]
async fn test_tampered_envelope_is_decrypt_failure() {
    let p = principals();
    let (_server, handle) = start_server(p.centre.clone()).await;
    let client = authenticated_client(&p.alice, handle.local_addr()).await;

    let session = client.session().unwrap();
    let mut envelope = session.seal(&Payload::Task(Task::factorization(6))).unwrap();
    let middle = envelope.ciphertext.len() / 2;
    envelope.ciphertext[middle] ^= 0x80;

    match send_raw(handle.local_addr(), &Request::Sealed(envelope)).await {
        Response::Error(signal) => assert_eq!(signal.kind, ErrorKind::DecryptFailed),
        other => panic!("unexpected response: {:?}", other),
    }

    handle.shutdown().await;
}

#[tokio::test]
async fn test_replies_are_sealed_for_the_sender() {
    let p = principals();
    let (server, handle) = start_server(p.centre.clone()).await;
    server.registry().install(TaskKind::Factorization).await;
    let client = authenticated_client(&p.alice, handle.local_addr()).await;

    let session = client.session().unwrap().clone();
    let envelope = session.seal(&Payload::Task(Task::factorization(12))).unwrap();

    match send_raw(handle.local_addr(), &Request::Sealed(envelope)).await {
        Response::Sealed(reply) => {
            assert_eq!(reply.principal, p.alice.name());
            // opens only under alice's key
            let other = Session::new(p.alice.name(), SessionKey::generate());
            assert!(other
                .open::<compute_grid::protocol::Reply>(&reply)
                .is_err());
            assert!(session.open::<compute_grid::protocol::Reply>(&reply).is_ok());
        }
        other => panic!("unexpected response: {:?}", other),
    }

    handle.shutdown().await;
}
