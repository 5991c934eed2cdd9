use std::sync::Arc;

use arnica::{
    AddCommand, ArnicaError, CommitCommand, DELETE_ALL_VERSION, DeleteByIdCommand,
    DeleteByQueryCommand, Document, IndexEngine, IndexSnapshot, LogEntry, MemoryIndexEngine,
    MemoryUpdateLog, MergeCommand, SharedCoreState, Term, UpdateConfig, UpdateCoordinator,
    UpdateLog,
};

#[allow(clippy::type_complexity)]
fn setup_with_config(
    config: UpdateConfig,
) -> (
    Arc<UpdateCoordinator>,
    Arc<MemoryIndexEngine>,
    Arc<MemoryUpdateLog>,
    Arc<SharedCoreState>,
) {
    let engine = Arc::new(MemoryIndexEngine::new());
    let core = Arc::new(SharedCoreState::new(engine.clone()));
    let ulog = Arc::new(MemoryUpdateLog::new());
    let coordinator = UpdateCoordinator::new(
        config,
        core.clone(),
        Some(ulog.clone() as Arc<dyn UpdateLog>),
    );
    (coordinator, engine, ulog, core)
}

#[allow(clippy::type_complexity)]
fn setup() -> (
    Arc<UpdateCoordinator>,
    Arc<MemoryIndexEngine>,
    Arc<MemoryUpdateLog>,
    Arc<SharedCoreState>,
) {
    setup_with_config(UpdateConfig::default())
}

fn doc(id: &str, version: i64) -> Document {
    Document::new_with_id(id)
        .add_keyword("id", id)
        .add_integer("_version_", version)
}

#[test]
fn test_add_then_hard_commit_is_durable() -> arnica::Result<()> {
    let (coordinator, engine, ulog, _core) = setup();

    coordinator.add_doc(AddCommand::new(doc("a", 1)).version(1))?;
    coordinator.add_doc(AddCommand::new(doc("b", 2)).version(2))?;

    assert_eq!(engine.num_committed_docs(), 0);
    assert!(ulog.has_uncommitted_changes());

    coordinator.commit(CommitCommand::hard())?;

    // Everything the log holds was applied and is committed.
    let logged_ids: Vec<Option<String>> = ulog
        .records()
        .iter()
        .map(|r| match &r.entry {
            LogEntry::Add { id, .. } => id.clone(),
            _ => None,
        })
        .collect();
    assert_eq!(
        logged_ids,
        vec![Some("a".to_string()), Some("b".to_string())]
    );

    let committed: Vec<Option<String>> =
        engine.committed_docs().iter().map(|d| d.id.clone()).collect();
    assert!(committed.contains(&Some("a".to_string())));
    assert!(committed.contains(&Some("b".to_string())));
    assert!(!ulog.has_uncommitted_changes());

    Ok(())
}

#[test]
fn test_overwrite_replaces_by_unique_key() -> arnica::Result<()> {
    let (coordinator, engine, _ulog, _core) = setup();

    coordinator.add_doc(AddCommand::new(doc("a", 1)).version(1))?;
    coordinator.add_doc(AddCommand::new(doc("a", 2)).version(2))?;

    let docs = engine.live_docs();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].get("_version_").unwrap().as_integer(), Some(2));

    Ok(())
}

#[test]
fn test_overwrite_false_allows_duplicates() -> arnica::Result<()> {
    let (coordinator, engine, _ulog, _core) = setup();

    coordinator.add_doc(AddCommand::new(doc("a", 1)).overwrite(false))?;
    coordinator.add_doc(AddCommand::new(doc("a", 2)).overwrite(false))?;

    assert_eq!(engine.num_live_docs(), 2);

    Ok(())
}

#[test]
fn test_no_unique_key_forces_append() -> arnica::Result<()> {
    let config = UpdateConfig {
        unique_key_field: None,
        ..Default::default()
    };
    let (coordinator, engine, _ulog, _core) = setup_with_config(config);

    // Overwrite is requested but there is no key to overwrite against.
    coordinator.add_doc(AddCommand::new(doc("a", 1)))?;
    coordinator.add_doc(AddCommand::new(doc("a", 2)))?;

    assert_eq!(engine.num_live_docs(), 2);

    Ok(())
}

#[test]
fn test_block_add_keeps_children_with_parent() -> arnica::Result<()> {
    let (coordinator, engine, _ulog, _core) = setup();

    let cmd = AddCommand::new(doc("parent", 1).add_keyword("_root_", "parent")).children(vec![
        doc("c1", 1).add_keyword("_root_", "parent"),
        doc("c2", 1).add_keyword("_root_", "parent"),
    ]);
    coordinator.add_doc(cmd)?;
    assert_eq!(engine.num_live_docs(), 3);

    // Re-adding the block replaces the whole block via the root term.
    let cmd = AddCommand::new(doc("parent", 2).add_keyword("_root_", "parent"))
        .children(vec![doc("c1", 2).add_keyword("_root_", "parent")]);
    coordinator.add_doc(cmd)?;
    assert_eq!(engine.num_live_docs(), 2);

    Ok(())
}

#[test]
fn test_in_place_update_merges_doc_values() -> arnica::Result<()> {
    let (coordinator, engine, _ulog, _core) = setup();

    coordinator.add_doc(AddCommand::new(doc("a", 1).add_integer("count", 5)))?;

    let mut cmd = AddCommand::new(doc("a", 1).add_integer("count", 9));
    cmd.in_place_update = true;
    coordinator.add_doc(cmd)?;

    let docs = engine.live_docs();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].get("count").unwrap().as_integer(), Some(9));

    Ok(())
}

#[test]
fn test_dedup_update_term_keeps_ids_unique() -> arnica::Result<()> {
    let (coordinator, engine, _ulog, _core) = setup();

    coordinator.add_doc(AddCommand::new(
        doc("a", 1).add_keyword("signature", "s1"),
    ))?;

    // The override term does not match the old copy, so the extra guard
    // delete (same id, different signature) must remove it.
    let cmd = AddCommand::new(doc("a", 2).add_keyword("signature", "s2"))
        .update_term(Term::new("signature", "s2"));
    coordinator.add_doc(cmd)?;

    let docs = engine.live_docs();
    assert_eq!(docs.len(), 1);
    assert_eq!(
        docs[0].get("signature").unwrap().as_text(),
        Some("s2")
    );

    Ok(())
}

#[test]
fn test_delete_by_id() -> arnica::Result<()> {
    let (coordinator, engine, ulog, _core) = setup();

    coordinator.add_doc(AddCommand::new(doc("a", 1)))?;
    coordinator.delete(DeleteByIdCommand::new("a"))?;

    assert_eq!(engine.num_live_docs(), 0);
    let records = ulog.records();
    assert_eq!(records.len(), 2);
    assert_eq!(
        records[1].entry,
        LogEntry::Delete {
            id: "a".to_string(),
            version: 0,
        }
    );

    Ok(())
}

#[test]
fn test_delete_by_query_respects_newer_versions() -> arnica::Result<()> {
    let (coordinator, engine, _ulog, _core) = setup();

    coordinator.add_doc(AddCommand::new(doc("a", 11).add_keyword("kind", "tmp")).version(11))?;

    // A delete carrying an older version must not remove the newer document.
    let mut del = DeleteByQueryCommand::new("kind:tmp");
    del.version = 10;
    coordinator.delete_by_query(del)?;
    assert_eq!(engine.num_live_docs(), 1);

    // A delete carrying a newer version removes it.
    let mut del = DeleteByQueryCommand::new("kind:tmp");
    del.version = 12;
    coordinator.delete_by_query(del)?;
    assert_eq!(engine.num_live_docs(), 0);

    Ok(())
}

#[test]
fn test_delete_by_query_refreshes_realtime_view() -> arnica::Result<()> {
    let (coordinator, _engine, ulog, _core) = setup();

    coordinator.add_doc(AddCommand::new(doc("a", 1).add_keyword("kind", "tmp")))?;
    assert_eq!(ulog.realtime_generation(), 0);

    coordinator.delete_by_query(DeleteByQueryCommand::new("kind:tmp"))?;
    assert_eq!(ulog.realtime_generation(), 1);

    let records = ulog.records();
    assert_eq!(
        records.last().unwrap().entry,
        LogEntry::DeleteByQuery {
            query: "kind:tmp".to_string(),
            version: 0,
        }
    );

    Ok(())
}

#[test]
fn test_sentinel_delete_all_bypasses_version_checks() -> arnica::Result<()> {
    let (coordinator, engine, ulog, _core) = setup();

    coordinator.add_doc(AddCommand::new(doc("a", 100)).version(100))?;
    coordinator.add_doc(AddCommand::new(doc("b", 200)).version(200))?;
    assert_eq!(ulog.records().len(), 2);

    let mut del = DeleteByQueryCommand::new("*:*");
    del.version = DELETE_ALL_VERSION;
    coordinator.delete_by_query(del)?;

    assert_eq!(engine.num_live_docs(), 0);
    assert!(ulog.records().is_empty());
    assert_eq!(coordinator.statistics().errors, 0);

    Ok(())
}

#[test]
fn test_malformed_delete_query_is_bad_request() {
    let (coordinator, _engine, _ulog, _core) = setup();

    let err = coordinator
        .delete_by_query(DeleteByQueryCommand::new("not a query"))
        .unwrap_err();
    assert!(matches!(err, ArnicaError::BadRequest(_)));

    let stats = coordinator.statistics();
    assert_eq!(stats.errors, 1);
    assert_eq!(stats.cumulative_errors, 1);
}

#[test]
fn test_add_failure_wrapped_with_printable_id() {
    let (coordinator, engine, _ulog, _core) = setup();

    engine.close().unwrap();

    let err = coordinator
        .add_doc(AddCommand::new(doc("doc42", 1)))
        .unwrap_err();
    match err {
        ArnicaError::BadRequest(message) => assert!(message.contains("doc42")),
        other => panic!("expected BadRequest, got {other:?}"),
    }

    let stats = coordinator.statistics();
    assert_eq!(stats.errors, 1);
    assert_eq!(stats.docs_pending, 0);
}

#[test]
fn test_merge_indexes() -> arnica::Result<()> {
    let (coordinator, engine, _ulog, _core) = setup();

    assert_eq!(coordinator.merge_indexes(MergeCommand::default())?, 0);

    let snapshot = IndexSnapshot::new(vec![doc("m1", 1), doc("m2", 2)]);
    assert_eq!(
        coordinator.merge_indexes(MergeCommand::new(vec![snapshot]))?,
        1
    );
    assert_eq!(engine.num_live_docs(), 2);

    Ok(())
}

#[test]
fn test_merge_indexes_arms_time_bound() -> arnica::Result<()> {
    let config = UpdateConfig {
        auto_commit_max_time_ms: 600_000,
        ..Default::default()
    };
    let (coordinator, _engine, _ulog, _core) = setup_with_config(config);

    let snapshot = IndexSnapshot::new(vec![doc("m1", 1)]);
    coordinator.merge_indexes(MergeCommand::new(vec![snapshot]))?;
    assert!(coordinator.commit_tracker().has_pending());

    coordinator.commit_tracker().cancel_pending_commit();
    Ok(())
}

#[test]
fn test_clear_index() -> arnica::Result<()> {
    let (coordinator, engine, ulog, _core) = setup();

    coordinator.add_doc(AddCommand::new(doc("a", 1)))?;
    coordinator.clear_index()?;

    assert_eq!(engine.num_live_docs(), 0);
    assert!(ulog.records().is_empty());

    Ok(())
}

#[test]
fn test_statistics_snapshot() -> arnica::Result<()> {
    let (coordinator, _engine, _ulog, _core) = setup();

    coordinator.add_doc(AddCommand::new(doc("a", 1)))?;
    coordinator.add_doc(AddCommand::new(doc("b", 2)))?;
    coordinator.delete(DeleteByIdCommand::new("a"))?;
    coordinator.delete_by_query(DeleteByQueryCommand::new("kind:tmp"))?;

    let stats = coordinator.statistics();
    assert_eq!(stats.adds, 2);
    assert_eq!(stats.cumulative_adds, 2);
    assert_eq!(stats.deletes_by_id, 1);
    assert_eq!(stats.deletes_by_query, 1);
    assert_eq!(stats.docs_pending, 2);
    assert_eq!(stats.commits, 0);

    coordinator.commit(CommitCommand::hard())?;

    let stats = coordinator.statistics();
    assert_eq!(stats.adds, 0);
    assert_eq!(stats.deletes_by_id, 0);
    assert_eq!(stats.deletes_by_query, 0);
    assert_eq!(stats.cumulative_adds, 2);
    assert_eq!(stats.cumulative_deletes_by_id, 1);
    assert_eq!(stats.docs_pending, 0);
    assert_eq!(stats.commits, 1);

    Ok(())
}

#[test]
fn test_writer_leases_released_after_operations() -> arnica::Result<()> {
    let (coordinator, engine, _ulog, core) = setup();

    coordinator.add_doc(AddCommand::new(doc("a", 1)))?;
    coordinator.delete(DeleteByIdCommand::new("a"))?;
    coordinator.delete_by_query(DeleteByQueryCommand::new("kind:x"))?;
    coordinator.commit(CommitCommand::hard())?;

    // Failed operations release their lease too.
    engine.close().unwrap();
    let _ = coordinator.add_doc(AddCommand::new(doc("b", 2)));

    assert_eq!(core.active_leases(), 0);

    Ok(())
}
