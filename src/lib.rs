// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod artifacts;
pub mod channel;
pub mod cli;
pub mod client;
pub mod config;
pub mod crypto;
pub mod error;
pub mod handshake;
pub mod keystore;
pub mod protocol;
pub mod server;
pub mod tasks;
pub mod version;

// Re-export main types
pub use artifacts::{Artifact, ArtifactStore, FsArtifactStore, MemoryArtifactStore};
pub use channel::{Envelope, SecureChannel, Session};
pub use client::ComputeClient;
pub use config::{ClientConfig, ServerConfig};
pub use error::{ChannelError, ComputeError};
pub use handshake::{
    AuthFailure, Authenticator, ClientHandshake, ClientState, HandshakeError, ReplayGuard,
    ServerHandshake, ServerState,
};
pub use keystore::{KeyStore, Keyring, Principal, TRUSTED_INTERMEDIARY};
pub use server::{ComputeServer, ServerHandle, TaskDispatcher};
pub use tasks::{Task, TaskError, TaskKind, TaskOutcome, TaskRegistry};
