//! Integration tests for the offline repository and the reconciler.

use brewcache_core::{CacheConfig, CoreError, OperationType, PendingOperation, SyncStatus};
use brewcache_storage::{InMemoryStore, KeyValueStore};
use brewcache_sync::{
    spawn_periodic_sync, BackoffConfig, LoopbackRemote, OfflineRepository, SyncConfig, SyncError,
    SyncReport, SyncState,
};
use brewcache_testkit::prelude::*;
use proptest::prelude::*;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn concrete_ipa_scenario() {
    let t = TestRepo::new();
    t.remote.queue_create_id("42");

    let created = t.create(Recipe::named(OWNER, "IPA")).await.unwrap();
    assert!(created.id.starts_with("temp_"));
    assert_eq!(created.name, "IPA");
    let envelope = t.get(&created.id).await.unwrap().unwrap();
    assert_eq!(envelope.sync_status, SyncStatus::Pending);
    assert_eq!(t.pending_operations_count().await, 1);

    let report = t.sync_pending_operations().await.unwrap();
    assert_eq!(
        report,
        SyncReport {
            success: true,
            processed: 1,
            failed: 0,
            errors: vec![],
            deferred: 0,
        }
    );

    let listed = t.list_envelopes(OWNER).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, "42");
    assert_eq!(listed[0].data.id, "42");
    assert_eq!(listed[0].data.name, "IPA");
    assert_eq!(listed[0].sync_status, SyncStatus::Synced);
    assert_eq!(t.pending_operations_count().await, 0);
}

#[tokio::test]
async fn tombstones_are_never_listed() {
    let t = TestRepo::with_max_retries(1);
    let keep = t.create(Recipe::named(OWNER, "Keep")).await.unwrap();
    t.tick(10);
    let pending = t.create(Recipe::named(OWNER, "Pending")).await.unwrap();
    t.sync_pending_operations().await.unwrap();

    // Tombstone awaiting sync.
    let pending_id = t.list(OWNER).await.unwrap()[0].id.clone();
    assert_ne!(pending_id, pending.id);
    t.delete(&pending_id, OWNER).await.unwrap();
    assert_eq!(t.get(&pending_id).await.unwrap().unwrap().sync_status, SyncStatus::Pending);

    // Tombstone whose delete was dropped.
    t.remote.fail_id(&pending_id, "locked");
    t.sync_pending_operations().await.unwrap();
    let tombstone = t.get(&pending_id).await.unwrap().unwrap();
    assert!(tombstone.is_deleted);
    assert_eq!(tombstone.sync_status, SyncStatus::Error);

    let listed = t.list(OWNER).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, keep.name);
}

#[tokio::test]
async fn fifo_with_failing_middle_operation() {
    let t = TestRepo::new();
    let a = t.create(Recipe::named(OWNER, "A")).await.unwrap();
    t.tick(10);
    let b = t.create(Recipe::named(OWNER, "B")).await.unwrap();
    t.tick(10);
    let c = t.create(Recipe::named(OWNER, "C")).await.unwrap();
    t.remote.fail_id(&b.id, "validation failed");

    let report = t.sync_pending_operations().await.unwrap();
    assert!(!report.success);
    assert_eq!(report.processed, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.errors, vec!["create recipe: server error: validation failed"]);

    let order: Vec<String> = t.remote.calls().into_iter().map(|c| c.entity_id).collect();
    assert_eq!(order, vec![a.id.clone(), b.id.clone(), c.id.clone()]);

    let listed = t.list_envelopes(OWNER).await.unwrap();
    let status: Vec<(&str, SyncStatus)> = listed
        .iter()
        .map(|e| (e.data.name.as_str(), e.sync_status))
        .collect();
    assert_eq!(
        status,
        vec![
            ("C", SyncStatus::Synced),
            ("B", SyncStatus::Pending),
            ("A", SyncStatus::Synced)
        ]
    );

    let ops = t.pending_operations().await.unwrap();
    assert_eq!(ops.len(), 1);
    assert_eq!(ops[0].entity_id, b.id);
    assert_eq!(ops[0].retry_count, 1);
}

#[tokio::test]
async fn queued_update_follows_remapped_id() {
    let t = TestRepo::new();
    let created = t.create(Recipe::named(OWNER, "Pale")).await.unwrap();
    t.tick(5);
    t.update(&created.id, &json!({"name": "Pale Ale", "style": "APA"}))
        .await
        .unwrap();

    let report = t.sync_pending_operations().await.unwrap();
    assert!(report.success);
    assert_eq!(report.processed, 2);

    let calls = t.remote.calls();
    assert_eq!(calls[0].op_type, OperationType::Create);
    assert_eq!(calls[0].entity_id, created.id);
    assert_eq!(calls[1].op_type, OperationType::Update);
    assert_eq!(calls[1].entity_id, "1");
    assert_eq!(calls[1].record.as_ref().unwrap().id, "1");

    let listed = t.list_envelopes(OWNER).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, "1");
    assert_eq!(listed[0].data.name, "Pale Ale");
    assert_eq!(listed[0].data.style, "APA");
    assert_eq!(listed[0].sync_status, SyncStatus::Synced);
    assert_eq!(t.remote.server_records()[0].name, "Pale Ale");
}

#[tokio::test]
async fn create_then_delete_before_sync_leaves_nothing() {
    let t = TestRepo::new();
    let created = t.create(Recipe::named(OWNER, "Oops")).await.unwrap();
    t.delete(&created.id, OWNER).await.unwrap();
    assert_eq!(t.pending_operations_count().await, 2);

    let report = t.sync_pending_operations().await.unwrap();
    assert_eq!(report.processed, 2);
    assert!(t.get(&created.id).await.unwrap().is_none());
    assert!(t.get("1").await.unwrap().is_none());
    assert!(t.remote.server_records().is_empty());
}

#[tokio::test]
async fn confirmed_delete_removes_tombstone() {
    let t = TestRepo::new();
    t.create(Recipe::named(OWNER, "Gose")).await.unwrap();
    t.sync_pending_operations().await.unwrap();

    t.delete("1", OWNER).await.unwrap();
    assert!(t.get("1").await.unwrap().unwrap().is_deleted);

    t.sync_pending_operations().await.unwrap();
    assert!(t.get("1").await.unwrap().is_none());
    assert!(t.remote.server_records().is_empty());
}

#[tokio::test]
async fn retry_exhaustion_drops_operation() {
    let t = TestRepo::with_max_retries(3);
    let created = t.create(Recipe::named(OWNER, "Bock")).await.unwrap();
    t.remote.fail_id(&created.id, "unavailable");

    for expected_retry in 1..=2 {
        let report = t.sync_pending_operations().await.unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(t.pending_operations().await.unwrap()[0].retry_count, expected_retry);
    }

    assert_eq!(t.pending_operations_count().await, 1);
    let report = t.sync_pending_operations().await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(report.errors, vec!["Max retries reached for create recipe"]);
    assert_eq!(t.pending_operations_count().await, 0);

    let failed = t.failed_entities().await.unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].id, created.id);
    assert!(failed[0].last_error.as_deref().unwrap().contains("unavailable"));
}

#[tokio::test]
async fn requeue_failed_gets_dropped_work_through() {
    let t = TestRepo::with_max_retries(1);
    let created = t.create(Recipe::named(OWNER, "Kolsch")).await.unwrap();
    t.remote.fail_id(&created.id, "maintenance");
    t.sync_pending_operations().await.unwrap();
    assert_eq!(t.failed_entities().await.unwrap().len(), 1);

    t.remote.heal_id(&created.id);
    assert_eq!(t.requeue_failed().await.unwrap(), 1);
    assert_eq!(t.pending_operations_count().await, 1);

    let report = t.sync_pending_operations().await.unwrap();
    assert!(report.success);
    let listed = t.list_envelopes(OWNER).await.unwrap();
    assert_eq!(listed[0].id, "1");
    assert_eq!(listed[0].sync_status, SyncStatus::Synced);
    assert!(t.failed_entities().await.unwrap().is_empty());
}

#[tokio::test]
async fn concurrent_pass_is_rejected_without_touching_journal() {
    let t = TestRepo::new();
    t.create(Recipe::named(OWNER, "Helles")).await.unwrap();
    let gate = t.remote.hold_next();

    let repo = Arc::clone(&t.repo);
    let first = tokio::spawn(async move { repo.sync_pending_operations().await });
    gate.entered().await;

    assert_eq!(t.sync_state(), SyncState::Running);
    let before = t.pending_operations().await.unwrap();
    let err = t.sync_pending_operations().await.unwrap_err();
    assert!(matches!(err, SyncError::SyncInProgress));
    assert_eq!(t.pending_operations().await.unwrap(), before);

    gate.release();
    let report = first.await.unwrap().unwrap();
    assert_eq!(report.processed, 1);
    assert_eq!(t.sync_state(), SyncState::Idle);
    assert!(t.sync_pending_operations().await.is_ok());
}

#[tokio::test]
async fn local_mutation_during_pass_is_picked_up_next_pass() {
    let t = TestRepo::new();
    t.create(Recipe::named(OWNER, "First")).await.unwrap();
    let gate = t.remote.hold_next();

    let repo = Arc::clone(&t.repo);
    let pass = tokio::spawn(async move { repo.sync_pending_operations().await });
    gate.entered().await;
    t.create(Recipe::named(OWNER, "Second")).await.unwrap();
    gate.release();

    assert_eq!(pass.await.unwrap().unwrap().processed, 1);
    assert_eq!(t.pending_operations_count().await, 1);
    assert_eq!(t.sync_pending_operations().await.unwrap().processed, 1);
    assert_eq!(t.remote.server_records().len(), 2);
}

#[tokio::test]
async fn list_is_newest_first_and_repeatable() {
    let t = TestRepo::new();
    let t1 = t.create(Recipe::named(OWNER, "One")).await.unwrap();
    t.tick(1_000);
    let t2 = t.create(Recipe::named(OWNER, "Two")).await.unwrap();
    t.tick(1_000);
    let t3 = t.create(Recipe::named(OWNER, "Three")).await.unwrap();
    t.create(Recipe::named("someone-else", "Other")).await.unwrap();

    let first = t.list(OWNER).await.unwrap();
    let ids: Vec<&str> = first.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec![t3.id.as_str(), t2.id.as_str(), t1.id.as_str()]);
    assert_eq!(first, t.list(OWNER).await.unwrap());
}

#[tokio::test]
async fn journal_entry_without_envelope_is_repaired() {
    let store = Arc::new(InMemoryStore::new());
    let orphan = Recipe {
        id: "temp_lost".into(),
        created_at: START_MILLIS,
        ..Recipe::named(OWNER, "Orphan")
    };
    let op = PendingOperation::create("recipe", "temp_lost", serde_json::to_value(&orphan).unwrap(), 1, 3);
    store
        .set("pending_operations", serde_json::to_string(&vec![op]).unwrap())
        .await
        .unwrap();

    let t = TestRepo::over_store(store, CacheConfig::default());
    let report = t.sync_pending_operations().await.unwrap();
    assert!(report.success);

    let listed = t.list_envelopes(OWNER).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, "1");
    assert_eq!(listed[0].sync_status, SyncStatus::Synced);
}

#[tokio::test]
async fn last_sync_is_recorded_even_when_everything_fails() {
    let t = TestRepo::new();
    let created = t.create(Recipe::named(OWNER, "Dunkel")).await.unwrap();
    t.remote.fail_id(&created.id, "offline");
    t.tick(500);

    let report = t.sync_pending_operations().await.unwrap();
    assert!(!report.success);

    let metadata = t.sync_metadata().await.unwrap();
    assert_eq!(metadata.last_sync, Some(START_MILLIS + 500));
    assert_eq!(metadata.last_summary.unwrap().failed, 1);
}

#[tokio::test]
async fn storage_faults_surface_as_cache_unavailable() {
    let flaky = Arc::new(FlakyStore::in_memory());
    let remote = Arc::new(ScriptedRemote::<Recipe>::new());
    let repo = OfflineRepository::new(flaky.clone(), remote, CacheConfig::default());

    repo.create(Recipe::named(OWNER, "Rauch")).await.unwrap();

    flaky.set_fail_writes(true);
    let err = repo.create(Recipe::named(OWNER, "Lost")).await.unwrap_err();
    assert!(err.is_unavailable());
    let err = repo.clear_sync_queue().await.unwrap_err();
    assert!(err.is_unavailable());
    flaky.set_fail_writes(false);
    assert_eq!(repo.list(OWNER).await.unwrap().len(), 1);

    flaky.set_fail_reads(true);
    assert_eq!(repo.pending_operations_count().await, 0);
    assert!(matches!(
        repo.list(OWNER).await.unwrap_err(),
        CoreError::CacheUnavailable { .. }
    ));
    let err = repo.sync_pending_operations().await.unwrap_err();
    assert!(matches!(err, SyncError::Core(_)));
    assert_eq!(repo.sync_state(), SyncState::Idle);

    flaky.set_fail_reads(false);
    assert_eq!(repo.pending_operations_count().await, 1);
}

#[tokio::test]
async fn unrecorded_sync_metadata_shows_in_stats() {
    let flaky = Arc::new(FlakyStore::in_memory());
    let remote = Arc::new(ScriptedRemote::<Recipe>::new());
    let repo = OfflineRepository::new(flaky.clone(), remote, CacheConfig::default());

    flaky.set_fail_writes(true);
    let report = repo.sync_pending_operations().await.unwrap();
    assert!(report.success);
    let last_error = repo.sync_stats().last_error.unwrap();
    assert!(last_error.contains("sync metadata not recorded"));
    flaky.set_fail_writes(false);
    assert_eq!(repo.sync_metadata().await.unwrap().last_sync, None);

    repo.sync_pending_operations().await.unwrap();
    assert!(repo.sync_stats().last_error.is_none());
    assert!(repo.sync_metadata().await.unwrap().last_sync.is_some());
}

#[tokio::test]
async fn offline_work_survives_restart() {
    let dir = TestDir::new();
    let clock = Arc::new(ManualClock::new(START_MILLIS));
    let remote = Arc::new(ScriptedRemote::new());
    {
        let repo = dir.open_repo(Arc::clone(&remote), Arc::clone(&clock));
        let created = repo.create(Recipe::named(OWNER, "Altbier")).await.unwrap();
        repo.update(&created.id, &json!({"style": "Alt"})).await.unwrap();
        remote.fail_next("no network");
        let report = repo.sync_pending_operations().await.unwrap();
        assert_eq!((report.failed, report.deferred), (1, 1));
    }

    let repo = dir.open_repo(Arc::clone(&remote), clock);
    assert_eq!(repo.pending_operations_count().await, 2);
    let report = repo.sync_pending_operations().await.unwrap();
    assert!(report.success);

    let listed = repo.list(OWNER).await.unwrap();
    assert_eq!(listed[0].id, "1");
    assert_eq!(listed[0].style, "Alt");
}

#[tokio::test]
async fn loopback_remote_round_trip() {
    let remote = Arc::new(LoopbackRemote::<Recipe>::new(Arc::new(InMemoryStore::new())));
    let repo = OfflineRepository::with_clock(
        Arc::new(InMemoryStore::new()),
        Arc::clone(&remote),
        CacheConfig::default(),
        Arc::new(ManualClock::new(START_MILLIS)),
    );

    remote.set_offline(true);
    let created = repo.create(Recipe::named(OWNER, "Witbier")).await.unwrap();
    let report = repo.sync_pending_operations().await.unwrap();
    assert_eq!(report.errors, vec!["create recipe: transport error: server unreachable"]);

    remote.set_offline(false);
    assert!(repo.sync_pending_operations().await.unwrap().success);
    assert!(repo.get(&created.id).await.unwrap().is_none());
    assert_eq!(remote.records().await.unwrap()[0].name, "Witbier");
}

#[tokio::test]
async fn periodic_sync_drains_the_journal() {
    let t = TestRepo::new();
    t.create(Recipe::named(OWNER, "Marzen")).await.unwrap();
    t.remote.fail_next("warming up");

    let config = SyncConfig::new(Duration::from_millis(20))
        .with_backoff(BackoffConfig::fixed(Duration::from_millis(20)));
    let handle = spawn_periodic_sync(Arc::clone(&t.repo), config);

    let mut drained = false;
    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        if t.pending_operations_count().await == 0 {
            drained = true;
            break;
        }
    }
    handle.abort();

    assert!(drained);
    assert!(t.sync_stats().passes_completed >= 2);
    assert_eq!(t.list(OWNER).await.unwrap()[0].id, "1");
}

fn apply_mutations(t: &TestRepo, mutations: Vec<Mutation>) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    runtime.block_on(async {
        for mutation in mutations {
            t.tick(1);
            let live = t.list(OWNER).await.unwrap();
            match mutation {
                Mutation::Create(recipe) => {
                    t.create(recipe).await.unwrap();
                }
                Mutation::Rename(i, name) if !live.is_empty() => {
                    let id = &live[i % live.len()].id;
                    t.update(id, &json!({ "name": name })).await.unwrap();
                }
                Mutation::Delete(i) if !live.is_empty() => {
                    let id = &live[i % live.len()].id;
                    t.delete(id, OWNER).await.unwrap();
                }
                _ => {}
            }
        }
    });
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn one_pass_converges_with_healthy_remote(
        mutations in mutation_sequence_strategy(OWNER, 16)
    ) {
        let t = TestRepo::new();
        apply_mutations(&t, mutations);

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let (report, listed, pending) = runtime.block_on(async {
            let report = t.sync_pending_operations().await.unwrap();
            let listed = t.list(OWNER).await.unwrap();
            (report, listed, t.pending_operations_count().await)
        });

        prop_assert!(report.success);
        prop_assert_eq!(pending, 0);
        prop_assert!(listed.iter().all(|r| !r.id.starts_with("temp_")));

        let mut local: Vec<(String, String)> =
            listed.into_iter().map(|r| (r.id, r.name)).collect();
        let mut server: Vec<(String, String)> = t
            .remote
            .server_records()
            .into_iter()
            .map(|r| (r.id, r.name))
            .collect();
        local.sort();
        server.sort();
        prop_assert_eq!(local, server);
    }
}
