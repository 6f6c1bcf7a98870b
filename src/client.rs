// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Client side of the protocol
//!
//! Every exchange opens its own TCP connection: one handshake, or one sealed
//! request and its reply.

use crate::artifacts::{Artifact, ArtifactStore};
use crate::channel::{SecureChannel, Session};
use crate::config::ClientConfig;
use crate::error::ComputeError;
use crate::handshake::ClientHandshake;
use crate::keystore::{Keyring, Principal};
use crate::protocol::{FrameCodec, Payload, Reply, Request, Response};
use crate::tasks::Task;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info};

pub struct ComputeClient {
    config: ClientConfig,
    principal: Principal,
    channel: SecureChannel,
    codec: FrameCodec,
}

impl ComputeClient {
    pub fn new(config: ClientConfig, principal: Principal) -> Self {
        let codec = FrameCodec::new(config.max_frame_bytes);
        Self {
            config,
            principal,
            channel: SecureChannel::new(),
            codec,
        }
    }

    /// Build a client whose principal comes from the configured keyring
    pub fn from_config(config: ClientConfig) -> Result<Self, ComputeError> {
        let principal = Keyring::load_principal(&config.keyring)?;
        Ok(Self::new(config, principal))
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn session(&self) -> Option<&Session> {
        self.channel.session()
    }

    pub fn is_authenticated(&self) -> bool {
        self.channel.is_established()
    }

    /// Run the handshake against the intermediary and keep the session key
    pub async fn authenticate(&mut self) -> Result<(), ComputeError> {
        let mut handshake =
            ClientHandshake::new(self.principal.clone(), self.config.intermediary.clone());

        let mut stream = self.connect().await?;
        handshake.mark_connected()?;
        let request = Request::Handshake(handshake.begin()?);

        let result = match self.exchange_on(&mut stream, &request).await? {
            Response::Handshake(response) => handshake.finish(response).map_err(ComputeError::from),
            Response::Error(signal) => Err(signal.into()),
            Response::Sealed(_) => Err(ComputeError::Protocol(
                "sealed response to a handshake".to_string(),
            )),
        };

        match result {
            Ok(session) => {
                self.channel.establish(session);
                Ok(())
            }
            Err(e) => {
                self.channel.clear();
                Err(e)
            }
        }
    }

    /// Upload an artifact, returning the stored size
    pub async fn upload_artifact(&self, artifact: Artifact) -> Result<u64, ComputeError> {
        let name = artifact.name.clone();
        match self.send_sealed(&Payload::Artifact(artifact)).await? {
            Reply::ArtifactStored { size, .. } => {
                info!("📤 Artifact {} uploaded ({} bytes)", name, size);
                Ok(size)
            }
            other => Err(unexpected_reply(&other)),
        }
    }

    /// Submit a task and return it with its result filled in
    pub async fn submit_task(&self, task: Task) -> Result<Task, ComputeError> {
        match self.send_sealed(&Payload::Task(task)).await? {
            Reply::TaskCompleted(task) => Ok(task),
            other => Err(unexpected_reply(&other)),
        }
    }

    /// Like [`submit_task`](Self::submit_task), but when the server lacks the
    /// implementation, upload it from `source` and retry once.
    pub async fn submit_task_with_bootstrap(
        &self,
        task: Task,
        source: &dyn ArtifactStore,
    ) -> Result<Task, ComputeError> {
        match self.submit_task(task.clone()).await {
            Err(ComputeError::UnresolvedTask(name)) => {
                info!("📦 Server lacks {}; uploading it", name);
                let artifact = source.load(&name).await?;
                self.upload_artifact(artifact).await?;
                self.submit_task(task).await
            }
            other => other,
        }
    }

    async fn send_sealed(&self, payload: &Payload) -> Result<Reply, ComputeError> {
        let request = Request::Sealed(self.channel.seal(payload)?);
        let mut stream = self.connect().await?;

        match self.exchange_on(&mut stream, &request).await? {
            Response::Sealed(envelope) => Ok(self.channel.open(&envelope)?),
            Response::Error(signal) => Err(signal.into()),
            Response::Handshake(_) => Err(ComputeError::Protocol(
                "handshake response to a sealed request".to_string(),
            )),
        }
    }

    async fn connect(&self) -> Result<TcpStream, ComputeError> {
        let addr = &self.config.server_addr;
        let after = self.config.connect_timeout();
        let stream = timeout(after, TcpStream::connect(addr))
            .await
            .map_err(|_| ComputeError::Timeout {
                after,
                during: "connecting",
            })??;
        debug!("Connected to {}", addr);
        Ok(stream)
    }

    async fn exchange_on(
        &self,
        stream: &mut TcpStream,
        request: &Request,
    ) -> Result<Response, ComputeError> {
        let after = self.config.io_timeout();
        timeout(after, self.codec.write_request(stream, request))
            .await
            .map_err(|_| ComputeError::Timeout {
                after,
                during: "sending a request",
            })??;
        let response = timeout(after, self.codec.read_response(stream))
            .await
            .map_err(|_| ComputeError::Timeout {
                after,
                during: "awaiting a response",
            })??;
        Ok(response)
    }
}

fn unexpected_reply(reply: &Reply) -> ComputeError {
    ComputeError::Protocol(format!("unexpected reply: {:?}", reply))
}
