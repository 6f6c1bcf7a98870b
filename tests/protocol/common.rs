// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Shared fixtures: a trusted intermediary, two client principals that all
//! trust each other's public keys, and an in-process server.

#![allow(dead_code)]

use compute_grid::artifacts::{ArtifactStore, MemoryArtifactStore};
use compute_grid::crypto::PrivateKey;
use compute_grid::protocol::{FrameCodec, Request, Response};
use compute_grid::{
    ClientConfig, ComputeClient, ComputeServer, KeyStore, Principal, ServerConfig, ServerHandle,
    TRUSTED_INTERMEDIARY,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;

pub struct Principals {
    pub centre: Principal,
    pub alice: Principal,
    pub bob: Principal,
}

pub fn principals() -> Principals {
    let centre_key = PrivateKey::random();
    let alice_key = PrivateKey::random();
    let bob_key = PrivateKey::random();

    let keys = Arc::new(KeyStore::from_entries([
        (TRUSTED_INTERMEDIARY, centre_key.public_key()),
        ("Stephen Smith", alice_key.public_key()),
        ("Maria Garcia", bob_key.public_key()),
    ]));

    Principals {
        centre: Principal::new(TRUSTED_INTERMEDIARY, centre_key, keys.clone()),
        alice: Principal::new("Stephen Smith", alice_key, keys.clone()),
        bob: Principal::new("Maria Garcia", bob_key, keys),
    }
}

pub fn server_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        io_timeout_secs: 5,
        artifact_dir: None,
        ..ServerConfig::default()
    }
}

pub async fn start_server(centre: Principal) -> (ComputeServer, ServerHandle) {
    start_server_with(server_config(), centre, Arc::new(MemoryArtifactStore::new())).await
}

pub async fn start_server_with(
    config: ServerConfig,
    centre: Principal,
    artifacts: Arc<dyn ArtifactStore>,
) -> (ComputeServer, ServerHandle) {
    let server = ComputeServer::new(config, centre, artifacts);
    let handle = server.start().await.expect("server should start");
    (server, handle)
}

pub fn client_for(principal: &Principal, addr: SocketAddr) -> ComputeClient {
    let config = ClientConfig {
        server_addr: addr.to_string(),
        connect_timeout_secs: 5,
        io_timeout_secs: 5,
        ..ClientConfig::default()
    };
    ComputeClient::new(config, principal.clone())
}

pub async fn authenticated_client(principal: &Principal, addr: SocketAddr) -> ComputeClient {
    let mut client = client_for(principal, addr);
    client.authenticate().await.expect("handshake should succeed");
    client
}

/// Send one request on a fresh connection, bypassing the client
pub async fn send_raw(addr: SocketAddr, request: &Request) -> Response {
    let codec = FrameCodec::default();
    let mut stream = TcpStream::connect(addr).await.unwrap();
    codec.write_request(&mut stream, request).await.unwrap();
    codec.read_response(&mut stream).await.unwrap()
}
