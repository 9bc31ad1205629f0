//! Recovery sweep behavior observed through store reopen.

use crate::prelude::*;
use grove_core::{JobId, Successor};
use grove_store::{sweep, JobStore};
use tempfile::tempdir;

fn entry(id: &JobId) -> Successor {
    Successor {
        job_id: id.clone(),
        memory: 1,
        cpu: 1,
        predecessor_id: None,
    }
}

#[test]
fn top_group_shrinks_to_survivors_in_exactly_one_update() {
    let dir = tempdir().unwrap();
    let store = create_store(dir.path());

    let mut root = store.create(Some("root"), 1, 1, "u-root", 0).unwrap();
    let survivor = store.create(Some("child"), 1, 1, "u-child", 1).unwrap();
    root.push_group(vec![
        entry(&JobId::new("deleted-a")),
        entry(&survivor.id),
        entry(&JobId::new("deleted-b")),
    ]);
    store.update(&root).unwrap();

    let stats = sweep(&store).unwrap();
    assert_eq!(stats.records_repaired, 1);
    assert_eq!(stats.orphans_deleted, 0);

    let repaired = store.load(&root.id).unwrap();
    assert_eq!(repaired.stack, vec![vec![entry(&survivor.id)]]);
}

#[test]
fn reopen_sweeps_and_a_second_reopen_changes_nothing() {
    let dir = tempdir().unwrap();
    {
        let store = create_store(dir.path());
        let mut root = store.create(Some("root"), 1, 1, "u-root", 0).unwrap();

        // Crashed mid-spawn: intents persisted, children created, link
        // never committed. One child also carries a dangling log ID.
        root.jobs_to_delete = ["o1", "o2"].into_iter().map(String::from).collect();
        store.update(&root).unwrap();
        store.create(Some("orphan1"), 1, 1, "o1", 1).unwrap();
        let mut orphan2 = store.create(Some("orphan2"), 1, 1, "o2", 1).unwrap();
        orphan2.log_file_id = Some(grove_core::FileId::new(format!(
            "jobs/{}/files/dangling",
            orphan2.id
        )));
        store.update(&orphan2).unwrap();

        // And a survivor pointing at a fully-completed group.
        let mut done = store.create(Some("other"), 1, 1, "u-done", 0).unwrap();
        done.push_group(vec![entry(&JobId::new("long-gone"))]);
        store.update(&done).unwrap();
    }

    let reopened = open_store(dir.path());
    let records = reopened.jobs().unwrap();
    assert_eq!(records.len(), 2);
    for record in &records {
        assert!(record.jobs_to_delete.is_empty());
        assert!(record.stack.is_empty());
        assert_eq!(record.log_file_id, None);
    }

    // Idempotence: the swept state is the fixed point.
    let snapshot = {
        let mut records = records;
        records.sort_by(|a, b| a.id.cmp(&b.id));
        records
    };
    let again = open_store(dir.path());
    let mut records = again.jobs().unwrap();
    records.sort_by(|a, b| a.id.cmp(&b.id));
    assert_eq!(records, snapshot);
}
