// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Version information for the compute grid

/// Full version string with feature description
pub const VERSION: &str = "v1.0.0-mutual-auth-2025-10-20";

/// Semantic version number
pub const VERSION_NUMBER: &str = "1.0.0";

/// Build date
pub const BUILD_DATE: &str = "2025-10-20";

/// Supported features in this version
pub const FEATURES: &[&str] = &[
    "mutual-authentication",
    "secp256k1-identities",
    "ecdsa-identity-proofs",
    "sealed-box-key-transport",
    "xchacha20-poly1305",
    "per-principal-session-keys",
    "session-key-ttl",
    "replay-protection",
    "artifact-bootstrap",
    "persistent-artifacts",
];

/// Task kinds this build can execute
pub const TASK_KINDS: &[&str] = &["sequence-generation", "perfect-number-search", "factorization"];

/// Get formatted version string for logging
pub fn get_version_string() -> String {
    format!("Compute Grid {} ({})", VERSION_NUMBER, BUILD_DATE)
}

/// Get full version info as JSON
pub fn get_version_info() -> serde_json::Value {
    serde_json::json!({
        "version": VERSION_NUMBER,
        "build": VERSION,
        "date": BUILD_DATE,
        "features": FEATURES,
        "task_kinds": TASK_KINDS,
    })
}
