//! Integration tests for the file-backed store and the state handle
//! layered on top of it.

use hayloft_store::{
    JsonFileStore, PersistenceStore, PlaySession, Session, SessionId, Snapshot, StateHandle,
    StoreError, WalletId,
};

fn sample_snapshot() -> Snapshot {
    let mut snapshot = Snapshot::default();
    let wallet = WalletId::from("wallet-0000000000000000000000000000");
    snapshot.user_or_create(&wallet).saved_points_total = 45;
    snapshot.sessions.insert(
        SessionId::from("nonce-a"),
        Session::Challenge { expires_at: 1_000 },
    );
    snapshot.sessions.insert(
        SessionId::from("play-a"),
        Session::Play(PlaySession::new(wallet, 500)),
    );
    snapshot
}

#[tokio::test]
async fn test_load_missing_file_returns_empty_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::open(dir.path().join("db.json")).await.unwrap();
    let snapshot = store.load().await.unwrap();
    assert_eq!(snapshot, Snapshot::default());
}

#[tokio::test]
async fn test_save_then_load_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::open(dir.path().join("db.json")).await.unwrap();
    let snapshot = sample_snapshot();
    store.save(&snapshot).await.unwrap();
    assert_eq!(store.load().await.unwrap(), snapshot);
}

#[tokio::test]
async fn test_save_replaces_whole_document() {
    // Callers always write the full snapshot back; a record deleted in
    // memory must be gone after the save, not merged with the old file.
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::open(dir.path().join("db.json")).await.unwrap();

    let mut snapshot = sample_snapshot();
    store.save(&snapshot).await.unwrap();

    snapshot.sessions.remove(&SessionId::from("nonce-a"));
    store.save(&snapshot).await.unwrap();

    let restored = store.load().await.unwrap();
    assert!(!restored.sessions.contains_key(&SessionId::from("nonce-a")));
    assert!(restored.sessions.contains_key(&SessionId::from("play-a")));
}

#[tokio::test]
async fn test_save_leaves_no_temp_file_behind() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db.json");
    let store = JsonFileStore::open(path.clone()).await.unwrap();
    store.save(&sample_snapshot()).await.unwrap();

    // The rename consumed the temp file; only the real document remains.
    let entries: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(entries, vec![std::ffi::OsString::from("db.json")]);
}

#[tokio::test]
async fn test_load_corrupt_file_reports_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db.json");
    std::fs::write(&path, b"{ not json").unwrap();
    let store = JsonFileStore::open(path).await.unwrap();
    assert!(matches!(
        store.load().await,
        Err(StoreError::Corrupt(_))
    ));
}

#[tokio::test]
async fn test_state_handle_over_file_store_survives_concurrency() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::open(dir.path().join("db.json")).await.unwrap();
    let state = StateHandle::new(store);
    let wallet = WalletId::from("wallet-contended");

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let state = std::sync::Arc::clone(&state);
        let wallet = wallet.clone();
        tasks.push(tokio::spawn(async move {
            state
                .update::<_, StoreError, _>(|snapshot| {
                    snapshot.user_or_create(&wallet).total_achievements += 1;
                    Ok(())
                })
                .await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let total = state
        .read(|snapshot| snapshot.users[&wallet].total_achievements)
        .await
        .unwrap();
    assert_eq!(total, 8);
}
