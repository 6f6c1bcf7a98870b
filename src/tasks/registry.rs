// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use super::{TaskError, TaskKind};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Task kinds whose implementation the server currently holds
#[derive(Debug, Clone, Default)]
pub struct TaskRegistry {
    installed: Arc<RwLock<HashSet<TaskKind>>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every kind already installed
    pub fn with_all() -> Self {
        Self {
            installed: Arc::new(RwLock::new(TaskKind::ALL.into_iter().collect())),
        }
    }

    /// Mark a kind as runnable. Returns `false` if it was already installed.
    pub async fn install(&self, kind: TaskKind) -> bool {
        let mut installed = self.installed.write().await;
        let added = installed.insert(kind);
        if added {
            info!("📦 Task implementation installed: {}", kind);
        }
        added
    }

    pub async fn resolve(&self, kind: TaskKind) -> Result<(), TaskError> {
        if self.installed.read().await.contains(&kind) {
            Ok(())
        } else {
            Err(TaskError::Unresolved(kind.as_str().to_string()))
        }
    }

    pub async fn is_installed(&self, kind: TaskKind) -> bool {
        self.installed.read().await.contains(&kind)
    }

    pub async fn installed(&self) -> Vec<TaskKind> {
        let mut kinds: Vec<_> = self.installed.read().await.iter().copied().collect();
        kinds.sort();
        kinds
    }
}
