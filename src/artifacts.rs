// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Artifact persistence
//!
//! An artifact is an uploaded implementation unit. The server persists each
//! upload under its name so it survives restarts; the client uses the same
//! trait as the source it bootstraps missing implementations from.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use uuid::Uuid;

const ARTIFACT_EXTENSION: &str = "artifact";

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("Invalid artifact name '{0}'")]
    InvalidName(String),

    #[error("Artifact '{0}' not found")]
    NotFound(String),

    #[error("Artifact storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for Artifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Artifact")
            .field("name", &self.name)
            .field("size", &self.bytes.len())
            .finish()
    }
}

impl Artifact {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, ArtifactError> {
        let name = name.into();
        validate_name(&name)?;
        Ok(Self { name, bytes })
    }

    /// Read an artifact body from a local file
    pub async fn from_path(name: impl Into<String>, path: impl AsRef<Path>) -> Result<Self, ArtifactError> {
        let bytes = fs::read(path).await?;
        Self::new(name, bytes)
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Names become file names, so only a conservative character set is allowed
pub fn validate_name(name: &str) -> Result<(), ArtifactError> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if valid {
        Ok(())
    } else {
        Err(ArtifactError::InvalidName(name.to_string()))
    }
}

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Store an artifact, replacing any previous one with the same name
    async fn persist(&self, artifact: &Artifact) -> Result<(), ArtifactError>;

    async fn load(&self, name: &str) -> Result<Artifact, ArtifactError>;

    /// Names of every stored artifact, sorted
    async fn list(&self) -> Result<Vec<String>, ArtifactError>;
}

/// Stores each artifact as `<dir>/<name>.artifact`
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    base_path: PathBuf,
}

impl FsArtifactStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn artifact_path(&self, name: &str) -> PathBuf {
        self.base_path.join(format!("{}.{}", name, ARTIFACT_EXTENSION))
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn persist(&self, artifact: &Artifact) -> Result<(), ArtifactError> {
        validate_name(&artifact.name)?;
        fs::create_dir_all(&self.base_path).await?;

        let path = self.artifact_path(&artifact.name);
        // Write atomically through a temp file private to this write
        let temp_path = self
            .base_path
            .join(format!("{}.{}.tmp", artifact.name, Uuid::new_v4()));
        if let Err(e) = write_and_rename(&temp_path, &path, &artifact.bytes).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        tracing::debug!("Artifact {} persisted ({} bytes)", artifact.name, artifact.size());
        Ok(())
    }

    async fn load(&self, name: &str) -> Result<Artifact, ArtifactError> {
        validate_name(name)?;
        match fs::read(self.artifact_path(name)).await {
            Ok(bytes) => Ok(Artifact {
                name: name.to_string(),
                bytes,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ArtifactError::NotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self) -> Result<Vec<String>, ArtifactError> {
        let mut entries = match fs::read_dir(&self.base_path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) == Some(ARTIFACT_EXTENSION) {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

async fn write_and_rename(temp_path: &Path, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(temp_path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    fs::rename(temp_path, path).await
}

/// In-memory store for tests and ephemeral servers
#[derive(Debug, Clone, Default)]
pub struct MemoryArtifactStore {
    artifacts: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn persist(&self, artifact: &Artifact) -> Result<(), ArtifactError> {
        validate_name(&artifact.name)?;
        self.artifacts
            .write()
            .await
            .insert(artifact.name.clone(), artifact.bytes.clone());
        Ok(())
    }

    async fn load(&self, name: &str) -> Result<Artifact, ArtifactError> {
        self.artifacts
            .read()
            .await
            .get(name)
            .map(|bytes| Artifact {
                name: name.to_string(),
                bytes: bytes.clone(),
            })
            .ok_or_else(|| ArtifactError::NotFound(name.to_string()))
    }

    async fn list(&self) -> Result<Vec<String>, ArtifactError> {
        let mut names: Vec<_> = self.artifacts.read().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}
