// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Task Dispatcher
//!
//! Opens sealed requests with the sender's session key, stores uploaded
//! artifacts, runs tasks whose implementation is installed and seals the
//! reply under the same key.

use crate::artifacts::{ArtifactError, ArtifactStore};
use crate::channel::{Envelope, Session};
use crate::crypto::SessionKeyStore;
use crate::protocol::{ErrorKind, ErrorSignal, Payload, Reply, Response};
use crate::tasks::{Task, TaskError, TaskKind, TaskRegistry};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct TaskDispatcher {
    sessions: SessionKeyStore,
    registry: TaskRegistry,
    artifacts: Arc<dyn ArtifactStore>,
}

impl TaskDispatcher {
    pub fn new(
        sessions: SessionKeyStore,
        registry: TaskRegistry,
        artifacts: Arc<dyn ArtifactStore>,
    ) -> Self {
        Self {
            sessions,
            registry,
            artifacts,
        }
    }

    pub fn sessions(&self) -> &SessionKeyStore {
        &self.sessions
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    /// Install every stored artifact that provides a known task kind
    pub async fn restore_artifacts(&self) -> Result<usize, ArtifactError> {
        let mut restored = 0;
        for name in self.artifacts.list().await? {
            match name.parse::<TaskKind>() {
                Ok(kind) => {
                    self.registry.install(kind).await;
                    restored += 1;
                }
                Err(_) => debug!("Stored artifact {} provides no known task kind", name),
            }
        }
        if restored > 0 {
            info!("📦 Restored {} task implementations from storage", restored);
        }
        Ok(restored)
    }

    /// Select the sender's session key and dispatch the sealed payload
    pub async fn handle_sealed(&self, envelope: Envelope) -> Response {
        let Some(key) = self.sessions.get_key(&envelope.principal).await else {
            warn!("🔒 No session key for principal: {}", envelope.principal);
            return Response::Error(ErrorSignal::new(
                ErrorKind::NoSessionKey,
                format!("no session established for '{}'", envelope.principal),
            ));
        };
        let session = Session::new(envelope.principal.clone(), key);

        match session.open::<Payload>(&envelope) {
            Ok(payload) => self.dispatch(&session, payload).await,
            Err(e) => {
                warn!("🔒 Sealed request from {} rejected: {}", session.principal, e);
                Response::Error(ErrorSignal::new(ErrorKind::DecryptFailed, e.to_string()))
            }
        }
    }

    pub async fn dispatch(&self, session: &Session, payload: Payload) -> Response {
        let reply = match payload {
            Payload::Artifact(artifact) => {
                if let Err(e) = self.artifacts.persist(&artifact).await {
                    return Response::Error(artifact_signal(e));
                }
                match artifact.name.parse::<TaskKind>() {
                    Ok(kind) => {
                        self.registry.install(kind).await;
                    }
                    Err(_) => warn!(
                        "Artifact {} stored but provides no known task kind",
                        artifact.name
                    ),
                }
                info!(
                    "📥 Artifact {} uploaded by {} ({} bytes)",
                    artifact.name,
                    session.principal,
                    artifact.size()
                );
                Reply::ArtifactStored {
                    size: artifact.size(),
                    name: artifact.name,
                }
            }
            Payload::Task(task) => match self.run_task(session, task).await {
                Ok(task) => Reply::TaskCompleted(task),
                Err(signal) => return Response::Error(signal),
            },
        };

        match session.seal(&reply) {
            Ok(envelope) => Response::Sealed(envelope),
            Err(e) => Response::Error(ErrorSignal::new(ErrorKind::Internal, e.to_string())),
        }
    }

    async fn run_task(&self, session: &Session, mut task: Task) -> Result<Task, ErrorSignal> {
        let kind = task.kind();
        if let Err(TaskError::Unresolved(name)) = self.registry.resolve(kind).await {
            info!("❓ {} requested unresolved task {}", session.principal, name);
            return Err(ErrorSignal::unresolved_task(&name));
        }
        task.validate()
            .map_err(|e| ErrorSignal::new(ErrorKind::InvalidTask, e.to_string()))?;

        info!("⚙️  Running {} for {}", task, session.principal);
        // Factorization of a large prime is CPU-bound for a while
        let task = tokio::task::spawn_blocking(move || {
            task.execute()?;
            Ok::<_, TaskError>(task)
        })
        .await
        .map_err(|e| ErrorSignal::new(ErrorKind::Internal, format!("task panicked: {}", e)))?
        .map_err(|e| ErrorSignal::new(ErrorKind::InvalidTask, e.to_string()))?;

        debug!("Task {} completed for {}", kind, session.principal);
        Ok(task)
    }
}

fn artifact_signal(err: ArtifactError) -> ErrorSignal {
    match err {
        ArtifactError::InvalidName(_) => ErrorSignal::new(ErrorKind::Protocol, err.to_string()),
        other => ErrorSignal::new(ErrorKind::Internal, other.to_string()),
    }
}
