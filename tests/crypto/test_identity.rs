// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Identity Proof Tests

use compute_grid::crypto::{open_identity, prove_identity, CryptoError, PrivateKey};

#[test]
fn test_proof_opens_with_owner_key() {
    let key = PrivateKey::random();
    let proof = prove_identity("Stephen Smith", b"sealed nonce", &key).unwrap();

    let name = open_identity(&proof, b"sealed nonce", &key.public_key()).unwrap();
    assert_eq!(name, "Stephen Smith");
}

#[test]
fn test_proof_rejected_under_other_key() {
    let key = PrivateKey::random();
    let proof = prove_identity("Stephen Smith", b"sealed nonce", &key).unwrap();

    let result = open_identity(&proof, b"sealed nonce", &PrivateKey::random().public_key());
    assert!(matches!(result, Err(CryptoError::InvalidSignature { .. })));
}

#[test]
fn test_edited_name_breaks_proof() {
    let key = PrivateKey::random();
    let mut proof = prove_identity("alice", b"sealed nonce", &key).unwrap();
    // alice -> alicf
    let last = proof.len() - 1;
    proof[last] = b'f';

    assert!(open_identity(&proof, b"sealed nonce", &key.public_key()).is_err());
}

#[test]
fn test_truncated_proof_rejected() {
    let key = PrivateKey::random();
    let result = open_identity(&[0u8; 10], b"sealed nonce", &key.public_key());
    assert!(matches!(result, Err(CryptoError::InvalidSignature { .. })));
}

#[test]
fn test_empty_and_unicode_names() {
    let key = PrivateKey::random();
    for name in ["", "Zoë Ångström", "名前"] {
        let proof = prove_identity(name, b"sealed nonce", &key).unwrap();
        assert_eq!(open_identity(&proof, b"sealed nonce", &key.public_key()).unwrap(), name);
    }
}

#[test]
fn test_proof_does_not_transfer_to_another_nonce() {
    let key = PrivateKey::random();
    let proof = prove_identity("Stephen Smith", b"sealed nonce", &key).unwrap();

    let result = open_identity(&proof, b"attacker nonce", &key.public_key());
    assert!(matches!(result, Err(CryptoError::InvalidSignature { .. })));
}
