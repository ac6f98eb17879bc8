//! End-to-end indexing and search over SQLite with deterministic providers.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use semdex::progress::NoProgress;
use semdex_core::classify::NoopClassifier;
use semdex_core::search::{search, SearchParams};
use semdex_core::store::VectorStore;

use common::*;

async fn ids(store: &dyn VectorStore) -> Vec<String> {
    store
        .list_all()
        .await
        .unwrap()
        .into_iter()
        .map(|d| d.id)
        .collect()
}

#[tokio::test]
async fn indexes_supported_files_and_finds_them_by_meaning() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("docs");
    write_corpus(&root);

    let store = sqlite_store(&tmp).await;
    let indexer = indexer_with(store.clone(), Arc::new(VocabEmbedder), Arc::new(NoopClassifier), 2);

    let report = indexer
        .index_directory(&root, &NoProgress, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.indexed, 3);
    assert_eq!(report.unsupported, 1);
    assert_eq!(report.failed, 0);
    assert!(!report.cancelled);
    assert_eq!(store.count().await.unwrap(), 3);

    let response = search(
        store.as_ref(),
        &VocabEmbedder,
        "apple",
        10,
        &SearchParams::default(),
    )
    .await
    .unwrap();

    let mut names: Vec<&str> = response.results.iter().map(|h| h.filename.as_str()).collect();
    names.sort();
    assert_eq!(names, vec!["a.txt", "notes/c.md"]);
    assert!(!names.contains(&"b.txt"));
    assert_eq!(response.count, 2);
    assert!(response.results.iter().all(|h| h.similarity > 0.4));
}

#[tokio::test]
async fn reindexing_the_same_tree_is_idempotent() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("docs");
    write_corpus(&root);

    let store = sqlite_store(&tmp).await;
    let indexer = indexer_with(store.clone(), Arc::new(VocabEmbedder), Arc::new(NoopClassifier), 3);
    let cancel = CancellationToken::new();

    indexer.index_directory(&root, &NoProgress, &cancel).await.unwrap();
    let mut first: Vec<String> = ids(store.as_ref()).await;

    indexer.index_directory(&root, &NoProgress, &cancel).await.unwrap();
    let mut second: Vec<String> = ids(store.as_ref()).await;

    assert_eq!(store.count().await.unwrap(), 3);
    first.sort();
    second.sort();
    assert_eq!(first, second);
}

#[tokio::test]
async fn classifier_failure_still_stores_the_document() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("docs");
    std::fs::create_dir_all(&root).unwrap();
    std::fs::write(root.join("a.txt"), "apple banana").unwrap();

    let store = sqlite_store(&tmp).await;
    let indexer = indexer_with(
        store.clone(),
        Arc::new(VocabEmbedder),
        Arc::new(FailingClassifier),
        1,
    );

    let report = indexer
        .index_directory(&root, &NoProgress, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.indexed, 1);

    let docs = store.list_all().await.unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].embedding, vec![1.0, 1.0, 0.0, 0.0, 0.0]);
    assert!(docs[0].category.is_none());
    assert!(docs[0].tags.is_empty());
}

#[tokio::test]
async fn classification_labels_are_stored() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("docs");
    std::fs::create_dir_all(&root).unwrap();
    std::fs::write(root.join("plan.md"), "apple launch plan").unwrap();

    let store = sqlite_store(&tmp).await;
    let indexer = indexer_with(
        store.clone(),
        Arc::new(VocabEmbedder),
        Arc::new(FixedClassifier(marketing_labels())),
        1,
    );
    indexer
        .index_directory(&root, &NoProgress, &CancellationToken::new())
        .await
        .unwrap();

    let doc = &store.list_all().await.unwrap()[0];
    assert_eq!(doc.category.as_deref(), Some("Marketing"));
    assert_eq!(doc.team.as_deref(), Some("Growth"));
    assert_eq!(doc.project.as_deref(), Some("Launch"));
    assert!(doc.tags.contains("campaign"));
}

#[tokio::test]
async fn embedding_failure_skips_only_that_file() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("docs");
    std::fs::create_dir_all(&root).unwrap();
    std::fs::write(root.join("good.txt"), "apple").unwrap();
    std::fs::write(root.join("bad.txt"), "poison apple").unwrap();
    std::fs::write(root.join("blank.md"), "   \n\t ").unwrap();

    let store = sqlite_store(&tmp).await;
    let indexer = indexer_with(store.clone(), Arc::new(VocabEmbedder), Arc::new(NoopClassifier), 2);

    let report = indexer
        .index_directory(&root, &NoProgress, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.indexed, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.skipped_empty, 1);

    let docs = store.list_all().await.unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].filename, "good.txt");
}

#[tokio::test]
async fn concurrency_never_exceeds_the_configured_bound() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("docs");
    std::fs::create_dir_all(&root).unwrap();
    for i in 0..8 {
        std::fs::write(root.join(format!("f{i}.txt")), format!("apple {i}")).unwrap();
    }

    let store = sqlite_store(&tmp).await;
    let probe = Arc::new(ProbeEmbedder::default());
    let indexer = indexer_with(store.clone(), probe.clone(), Arc::new(NoopClassifier), 2);

    let report = indexer
        .index_directory(&root, &NoProgress, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.indexed, 8);
    let peak = probe.peak.load(Ordering::SeqCst);
    assert!(peak >= 1 && peak <= 2, "peak concurrency was {peak}");
}

#[tokio::test]
async fn cancelled_token_stops_the_run() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("docs");
    write_corpus(&root);

    let store = sqlite_store(&tmp).await;
    let indexer = indexer_with(store.clone(), Arc::new(VocabEmbedder), Arc::new(NoopClassifier), 1);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = indexer.index_directory(&root, &NoProgress, &cancel).await.unwrap();
    assert!(report.cancelled);
    assert_eq!(report.indexed, 0);
    assert_eq!(store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn missing_root_is_an_error() {
    let tmp = TempDir::new().unwrap();
    let store = sqlite_store(&tmp).await;
    let indexer = indexer_with(store, Arc::new(VocabEmbedder), Arc::new(NoopClassifier), 1);

    let result = indexer
        .index_directory(&tmp.path().join("nope"), &NoProgress, &CancellationToken::new())
        .await;
    assert!(result.is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn wide_pool_stores_every_file() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("docs");
    std::fs::create_dir_all(&root).unwrap();
    for i in 0..300 {
        let text = if i % 2 == 0 { "apple banana" } else { "car truck" };
        std::fs::write(root.join(format!("doc{i:03}.txt")), text).unwrap();
    }

    let store = sqlite_store(&tmp).await;
    let indexer = indexer_with(
        store.clone(),
        Arc::new(VocabEmbedder),
        Arc::new(NoopClassifier),
        16,
    );

    let report = indexer
        .index_directory(&root, &NoProgress, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.failed, 0, "report: {report:?}");
    assert_eq!(report.indexed, 300);
    assert_eq!(store.count().await.unwrap(), 300);
}

#[tokio::test]
async fn cancelling_mid_run_stops_scheduling_files() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("docs");
    std::fs::create_dir_all(&root).unwrap();
    for i in 0..10 {
        std::fs::write(root.join(format!("f{i}.txt")), "apple").unwrap();
    }

    let store = sqlite_store(&tmp).await;
    let cancel = CancellationToken::new();
    let embedder = Arc::new(CancellingEmbedder::new(cancel.clone(), 2));
    let indexer = indexer_with(store.clone(), embedder, Arc::new(NoopClassifier), 1);

    let report = indexer.index_directory(&root, &NoProgress, &cancel).await.unwrap();
    assert!(report.cancelled);
    assert!(report.indexed >= 1, "report: {report:?}");
    assert!(report.indexed < 10, "report: {report:?}");
    assert!(store.count().await.unwrap() < 10);
}

#[cfg(unix)]
#[tokio::test]
async fn unreadable_subdirectory_does_not_stop_siblings() {
    use std::os::unix::fs::PermissionsExt;

    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("docs");
    let locked = root.join("locked");
    std::fs::create_dir_all(&locked).unwrap();
    std::fs::create_dir_all(root.join("open")).unwrap();
    std::fs::write(locked.join("hidden.txt"), "apple").unwrap();
    std::fs::write(root.join("a.txt"), "apple banana").unwrap();
    std::fs::write(root.join("open/b.txt"), "car truck").unwrap();
    std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000)).unwrap();

    // Permission bits do not stop root.
    if std::fs::read_dir(&locked).is_ok() {
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();
        return;
    }

    let store = sqlite_store(&tmp).await;
    let indexer = indexer_with(store.clone(), Arc::new(VocabEmbedder), Arc::new(NoopClassifier), 2);
    let report = indexer
        .index_directory(&root, &NoProgress, &CancellationToken::new())
        .await;

    std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();

    let report = report.unwrap();
    assert_eq!(report.traversal_errors, 1);
    assert_eq!(report.indexed, 2);
    assert_eq!(report.failed, 0);

    let mut names: Vec<String> = store
        .list_all()
        .await
        .unwrap()
        .into_iter()
        .map(|d| d.filename)
        .collect();
    names.sort();
    assert_eq!(names, vec!["a.txt", "open/b.txt"]);
}
