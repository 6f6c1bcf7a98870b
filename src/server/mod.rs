// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Connection Manager
//!
//! Accepts TCP connections and serves exactly one request per connection:
//! either a handshake (issuing a session key) or a sealed payload for the
//! [`TaskDispatcher`]. Every failure other than a broken transport is
//! reported back with an [`ErrorSignal`] before the connection closes.

pub mod dispatcher;

pub use dispatcher::TaskDispatcher;

use crate::artifacts::{ArtifactStore, FsArtifactStore, MemoryArtifactStore};
use crate::config::ServerConfig;
use crate::crypto::SessionKeyStore;
use crate::handshake::{Authenticator, HandshakeError, ReplayGuard, ServerHandshake};
use crate::keystore::{Keyring, Principal};
use crate::protocol::{CodecError, ErrorKind, ErrorSignal, FrameCodec, Request, Response};
use crate::tasks::TaskRegistry;
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// State shared by every connection task
struct ConnectionContext {
    intermediary: Arc<Principal>,
    replay_guard: Arc<ReplayGuard>,
    dispatcher: TaskDispatcher,
    codec: FrameCodec,
    io_timeout: Duration,
}

pub struct ComputeServer {
    config: ServerConfig,
    context: Arc<ConnectionContext>,
}

impl ComputeServer {
    pub fn new(config: ServerConfig, intermediary: Principal, artifacts: Arc<dyn ArtifactStore>) -> Self {
        let sessions = match config.session_ttl() {
            Some(ttl) => SessionKeyStore::with_ttl(ttl),
            None => SessionKeyStore::new(),
        };
        let context = ConnectionContext {
            intermediary: Arc::new(intermediary),
            replay_guard: Arc::new(ReplayGuard::new(config.replay_window())),
            dispatcher: TaskDispatcher::new(sessions, TaskRegistry::new(), artifacts),
            codec: FrameCodec::new(config.max_frame_bytes),
            io_timeout: config.io_timeout(),
        };

        Self {
            config,
            context: Arc::new(context),
        }
    }

    /// Build a server from configuration: keyring file plus artifact storage
    pub fn from_config(config: ServerConfig) -> Result<Self> {
        let intermediary = Keyring::load_principal(&config.keyring)
            .with_context(|| format!("Failed to load intermediary keyring {:?}", config.keyring))?;

        let artifacts: Arc<dyn ArtifactStore> = match &config.artifact_dir {
            Some(dir) => {
                info!("📁 Artifact storage: {:?}", dir);
                Arc::new(FsArtifactStore::new(dir.clone()))
            }
            None => {
                warn!("⚠️  No artifact directory configured; uploads are kept in memory only");
                Arc::new(MemoryArtifactStore::new())
            }
        };

        Ok(Self::new(config, intermediary, artifacts))
    }

    pub fn sessions(&self) -> &SessionKeyStore {
        self.context.dispatcher.sessions()
    }

    pub fn registry(&self) -> &TaskRegistry {
        self.context.dispatcher.registry()
    }

    /// Bind the listener and start serving in the background
    pub async fn start(&self) -> Result<ServerHandle> {
        let restored = self
            .context
            .dispatcher
            .restore_artifacts()
            .await
            .context("Failed to restore stored artifacts")?;
        debug!("{} stored artifacts re-installed", restored);

        let addr = self.config.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        let local_addr = listener.local_addr()?;
        info!(
            "🚀 Compute server listening on {} as {}",
            local_addr,
            self.context.intermediary.name()
        );

        let shutdown = CancellationToken::new();
        let limiter = Arc::new(Semaphore::new(self.config.max_connections.max(1)));

        let accept_handle = tokio::spawn(accept_loop(
            listener,
            self.context.clone(),
            limiter,
            shutdown.clone(),
        ));

        let cleanup_handle = self.config.session_ttl().map(|_| {
            tokio::spawn(cleanup_loop(
                self.sessions().clone(),
                self.config.key_cleanup_interval(),
                shutdown.clone(),
            ))
        });

        Ok(ServerHandle {
            local_addr,
            sessions: self.sessions().clone(),
            shutdown,
            accept_handle: Some(accept_handle),
            cleanup_handle,
        })
    }
}

/// Running server; dropping it leaves the server running
pub struct ServerHandle {
    local_addr: SocketAddr,
    sessions: SessionKeyStore,
    shutdown: CancellationToken,
    accept_handle: Option<JoinHandle<()>>,
    cleanup_handle: Option<JoinHandle<()>>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn sessions(&self) -> &SessionKeyStore {
        &self.sessions
    }

    /// Token that stops the accept loop when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Run until the shutdown token is cancelled
    pub async fn wait(mut self) {
        if let Some(handle) = self.accept_handle.take() {
            if let Err(e) = handle.await {
                error!("Accept loop terminated abnormally: {}", e);
            }
        }
        self.stop_cleanup().await;
    }

    /// Stop accepting connections; in-flight connections finish on their own
    pub async fn shutdown(mut self) {
        self.shutdown.cancel();
        if let Some(handle) = self.accept_handle.take() {
            handle.await.ok();
        }
        self.stop_cleanup().await;
        info!("Compute server shutdown complete");
    }

    async fn stop_cleanup(&mut self) {
        if let Some(handle) = self.cleanup_handle.take() {
            self.shutdown.cancel();
            handle.await.ok();
        }
    }
}

async fn accept_loop(
    listener: TcpListener,
    context: Arc<ConnectionContext>,
    limiter: Arc<Semaphore>,
    shutdown: CancellationToken,
) {
    loop {
        // Wait for a free slot before accepting
        let permit = tokio::select! {
            permit = limiter.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
            _ = shutdown.cancelled() => break,
        };

        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, addr)) => {
                        let context = context.clone();
                        tokio::spawn(async move {
                            handle_connection(stream, addr, context).await;
                            drop(permit);
                        });
                    }
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                    }
                }
            }
            _ = shutdown.cancelled() => break,
        }
    }
    info!("🛑 Accept loop stopped");
}

async fn cleanup_loop(sessions: SessionKeyStore, every: Duration, shutdown: CancellationToken) {
    let mut interval = tokio::time::interval(every);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                sessions.clear_expired_keys().await;
            }
            _ = shutdown.cancelled() => break,
        }
    }
}

async fn handle_connection(mut stream: TcpStream, addr: SocketAddr, context: Arc<ConnectionContext>) {
    let conn_id = format!("conn-{}", uuid::Uuid::new_v4());
    debug!("Connection {} accepted from {}", conn_id, addr);

    let request = match timeout(context.io_timeout, context.codec.read_request(&mut stream)).await {
        Ok(Ok(request)) => request,
        Ok(Err(CodecError::Io(e))) => {
            debug!("Connection {} closed before a request arrived: {}", conn_id, e);
            return;
        }
        Ok(Err(e)) => {
            warn!("Connection {} sent an unreadable request: {}", conn_id, e);
            let signal = ErrorSignal::new(ErrorKind::Protocol, e.to_string());
            send_response(&mut stream, &context, &conn_id, &Response::Error(signal)).await;
            return;
        }
        Err(_) => {
            warn!("⏱️  Connection {} timed out waiting for a request", conn_id);
            return;
        }
    };

    match request {
        Request::Handshake(authenticator) => {
            handle_handshake(&mut stream, &context, &conn_id, authenticator).await
        }
        Request::Sealed(envelope) => {
            let response = context.dispatcher.handle_sealed(envelope).await;
            send_response(&mut stream, &context, &conn_id, &response).await;
        }
    }
    debug!("Connection {} closed", conn_id);
}

async fn handle_handshake(
    stream: &mut TcpStream,
    context: &ConnectionContext,
    conn_id: &str,
    authenticator: Authenticator,
) {
    let claimed = authenticator.name.clone();
    let mut handshake =
        ServerHandshake::new(context.intermediary.clone(), context.replay_guard.clone());

    match handshake.receive(authenticator) {
        Ok(outcome) => {
            let sessions = context.dispatcher.sessions();
            let issued = outcome.session.key.clone();
            sessions
                .store_key(outcome.session.principal.clone(), outcome.session.key)
                .await;

            let delivered =
                send_response(stream, context, conn_id, &Response::Handshake(outcome.response))
                    .await;
            if !delivered {
                // The caller never received the key; a newer handshake's key stays
                sessions.clear_key_if(&claimed, &issued).await;
            }
        }
        Err(e) => {
            warn!("❌ Handshake from {} ({}) rejected: {}", claimed, conn_id, e);
            let response = Response::Error(handshake_signal(&e));
            send_response(stream, context, conn_id, &response).await;
        }
    }
}

/// Returns whether the response was written in full
async fn send_response(
    stream: &mut TcpStream,
    context: &ConnectionContext,
    conn_id: &str,
    response: &Response,
) -> bool {
    match timeout(context.io_timeout, context.codec.write_response(stream, response)).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            warn!("Failed to send response on {}: {}", conn_id, e);
            false
        }
        Err(_) => {
            warn!("⏱️  Timed out sending response on {}", conn_id);
            false
        }
    }
}

fn handshake_signal(err: &HandshakeError) -> ErrorSignal {
    match err {
        HandshakeError::AuthenticationFailed { reason, detail } => {
            ErrorSignal::new(ErrorKind::AuthenticationFailed(*reason), detail.clone())
        }
        HandshakeError::Malformed(_) | HandshakeError::InvalidState { .. } => {
            ErrorSignal::new(ErrorKind::Protocol, err.to_string())
        }
        HandshakeError::Crypto(_) => ErrorSignal::new(ErrorKind::Internal, err.to_string()),
    }
}
