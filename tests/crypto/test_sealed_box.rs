// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Sealed Box Tests

use compute_grid::crypto::{open_sealed, seal_to, CryptoError, PrivateKey};

#[test]
fn test_only_recipient_can_open() {
    let recipient = PrivateKey::random();
    let sealed = seal_to(&recipient.public_key(), b"verification nonce").unwrap();

    assert_eq!(open_sealed(&recipient, &sealed).unwrap(), b"verification nonce");

    let other = PrivateKey::random();
    assert!(matches!(
        open_sealed(&other, &sealed),
        Err(CryptoError::DecryptionFailed { .. })
    ));
}

#[test]
fn test_sealing_is_randomized() {
    let recipient = PrivateKey::random();
    let a = seal_to(&recipient.public_key(), b"same").unwrap();
    let b = seal_to(&recipient.public_key(), b"same").unwrap();
    assert_ne!(a, b);
}

#[test]
fn test_layout_overhead() {
    let recipient = PrivateKey::random();
    let sealed = seal_to(&recipient.public_key(), &[0u8; 100]).unwrap();
    // ephemeral key 33 + nonce 24 + tag 16
    assert_eq!(sealed.len(), 100 + 33 + 24 + 16);
}

#[test]
fn test_swapped_ephemeral_key_rejected() {
    let recipient = PrivateKey::random();
    let mut sealed = seal_to(&recipient.public_key(), b"payload").unwrap();
    let other = seal_to(&recipient.public_key(), b"payload").unwrap();
    sealed[..33].copy_from_slice(&other[..33]);

    assert!(open_sealed(&recipient, &sealed).is_err());
}

#[test]
fn test_truncated_box_rejected() {
    let recipient = PrivateKey::random();
    assert!(matches!(
        open_sealed(&recipient, &[2u8; 40]),
        Err(CryptoError::InvalidPayload { .. })
    ));
}
