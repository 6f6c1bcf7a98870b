// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Session Key Store Tests
//!
//! Keys are scoped per principal, rotate on re-handshake and disappear
//! after their TTL.

use compute_grid::crypto::{SessionKey, SessionKeyStore};
use std::time::Duration;
use tokio::time::sleep;

#[tokio::test]
async fn test_keys_are_scoped_per_principal() {
    let store = SessionKeyStore::new();
    let alice_key = SessionKey::generate();
    let bob_key = SessionKey::generate();

    store.store_key("alice".to_string(), alice_key.clone()).await;
    store.store_key("bob".to_string(), bob_key.clone()).await;

    assert_eq!(store.get_key("alice").await, Some(alice_key));
    assert_eq!(store.get_key("bob").await, Some(bob_key));
}

#[tokio::test]
async fn test_rotation_leaves_other_principals_alone() {
    let store = SessionKeyStore::new();
    let bob_key = SessionKey::generate();
    store.store_key("alice".to_string(), SessionKey::generate()).await;
    store.store_key("bob".to_string(), bob_key.clone()).await;

    let rotated = SessionKey::generate();
    store.store_key("alice".to_string(), rotated.clone()).await;

    assert_eq!(store.get_key("alice").await, Some(rotated));
    assert_eq!(store.get_key("bob").await, Some(bob_key));
    assert_eq!(store.count().await, 2);
}

#[tokio::test]
async fn test_ttl_expiry_and_sweep() {
    let store = SessionKeyStore::with_ttl(Duration::from_millis(200));
    store.store_key("alice".to_string(), SessionKey::generate()).await;
    sleep(Duration::from_millis(120)).await;
    store.store_key("bob".to_string(), SessionKey::generate()).await;

    sleep(Duration::from_millis(120)).await;
    // alice is 240ms old, bob 120ms
    assert!(store.get_key("alice").await.is_none());
    assert!(store.get_key("bob").await.is_some());

    assert_eq!(store.clear_expired_keys().await, 1);
    assert_eq!(store.count().await, 1);
}

#[tokio::test]
async fn test_without_ttl_nothing_expires() {
    let store = SessionKeyStore::new();
    store.store_key("alice".to_string(), SessionKey::generate()).await;
    assert_eq!(store.clear_expired_keys().await, 0);
    assert_eq!(store.ttl(), None);
}
