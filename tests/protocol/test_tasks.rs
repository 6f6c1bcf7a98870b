// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Task Dispatch Tests
//!
//! Unresolved implementations, on-demand upload and the three task kinds
//! end to end.

use super::common::{authenticated_client, principals, start_server};
use compute_grid::artifacts::{Artifact, ArtifactStore, MemoryArtifactStore};
use compute_grid::{ComputeError, Task, TaskKind, TaskOutcome};
use std::collections::BTreeMap;

async fn artifact_source() -> MemoryArtifactStore {
    let source = MemoryArtifactStore::new();
    for kind in TaskKind::ALL {
        let artifact = Artifact::new(kind.as_str(), format!("impl {}", kind).into_bytes()).unwrap();
        source.persist(&artifact).await.unwrap();
    }
    source
}

#[tokio::test]
async fn test_unresolved_task_names_the_missing_artifact() {
    let p = principals();
    let (_server, handle) = start_server(p.centre.clone()).await;
    let client = authenticated_client(&p.alice, handle.local_addr()).await;

    let err = client.submit_task(Task::factorization(28)).await.unwrap_err();
    assert!(err.is_recoverable());
    assert!(matches!(err, ComputeError::UnresolvedTask(ref name) if name == "factorization"));

    handle.shutdown().await;
}

#[tokio::test]
async fn test_bootstrap_uploads_then_retries() {
    let p = principals();
    let (server, handle) = start_server(p.centre.clone()).await;
    let client = authenticated_client(&p.alice, handle.local_addr()).await;
    let source = artifact_source().await;

    let task = client
        .submit_task_with_bootstrap(Task::factorization(28), &source)
        .await
        .unwrap();
    assert_eq!(task.result(), Some(TaskOutcome::Factors(vec![2, 2, 7])));
    assert_eq!(task.to_string(), "Prime factors of 28 are: 2 2 7");
    assert!(server.registry().is_installed(TaskKind::Factorization).await);

    // the implementation stays installed for later requests
    let again = client.submit_task(Task::factorization(97)).await.unwrap();
    assert_eq!(again.result(), Some(TaskOutcome::Factors(vec![97])));

    handle.shutdown().await;
}

#[tokio::test]
async fn test_bootstrap_fails_when_source_lacks_artifact() {
    let p = principals();
    let (_server, handle) = start_server(p.centre.clone()).await;
    let client = authenticated_client(&p.alice, handle.local_addr()).await;

    let err = client
        .submit_task_with_bootstrap(Task::sequence_generation(5), &MemoryArtifactStore::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ComputeError::Artifact(_)));

    handle.shutdown().await;
}

#[tokio::test]
async fn test_all_task_kinds_end_to_end() {
    let p = principals();
    let (_server, handle) = start_server(p.centre.clone()).await;
    let client = authenticated_client(&p.alice, handle.local_addr()).await;
    let source = artifact_source().await;

    let fib = client
        .submit_task_with_bootstrap(Task::sequence_generation(5), &source)
        .await
        .unwrap();
    assert_eq!(fib.result(), Some(TaskOutcome::Sequence(vec![0, 1, 1, 2, 3])));

    let perfect = client
        .submit_task_with_bootstrap(Task::perfect_number_search(30), &source)
        .await
        .unwrap();
    let expected = BTreeMap::from([(6, vec![1, 2, 3]), (28, vec![1, 2, 4, 7, 14])]);
    assert_eq!(perfect.result(), Some(TaskOutcome::PerfectNumbers(expected)));

    let factors = client
        .submit_task_with_bootstrap(Task::factorization(360), &source)
        .await
        .unwrap();
    assert_eq!(
        factors.result(),
        Some(TaskOutcome::Factors(vec![2, 2, 2, 3, 3, 5]))
    );

    handle.shutdown().await;
}

#[tokio::test]
async fn test_out_of_range_task_is_invalid() {
    let p = principals();
    let (server, handle) = start_server(p.centre.clone()).await;
    server.registry().install(TaskKind::SequenceGeneration).await;
    let client = authenticated_client(&p.alice, handle.local_addr()).await;

    let err = client
        .submit_task(Task::sequence_generation(1_000))
        .await
        .unwrap_err();
    assert!(matches!(err, ComputeError::InvalidTask(_)));

    handle.shutdown().await;
}

#[tokio::test]
async fn test_upload_reports_stored_size() {
    let p = principals();
    let (_server, handle) = start_server(p.centre.clone()).await;
    let client = authenticated_client(&p.alice, handle.local_addr()).await;

    let size = client
        .upload_artifact(Artifact::new("notes", vec![7u8; 1500]).unwrap())
        .await
        .unwrap();
    assert_eq!(size, 1500);

    handle.shutdown().await;
}
