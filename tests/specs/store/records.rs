//! Record lifecycle across independent store handles.

use crate::prelude::*;
use grove_core::{JobId, Successor};
use grove_store::JobStore;
use tempfile::tempdir;

#[test]
fn root_record_defaults_and_cross_handle_equality() {
    let dir = tempdir().unwrap();
    let master = create_store(dir.path());

    assert!(!master.exists(&JobId::new("foo")).unwrap());

    let root = master.create(Some("root"), 12, 34, "foo", 0).unwrap();
    assert!(master.exists(&root.id).unwrap());
    assert_eq!(root.command.as_deref(), Some("root"));
    assert_eq!(root.memory, 12);
    assert_eq!(root.cpu, 34);
    assert_eq!(root.update_id, "foo");
    assert!(root.stack.is_empty());
    assert_eq!(root.predecessor_number, 0);
    assert!(root.predecessors_finished.is_empty());
    assert_eq!(root.log_file_id, None);

    // A second handle simulating a worker observes an equal record.
    let worker = open_store(dir.path());
    assert_eq!(worker.load(&root.id).unwrap(), root);
}

#[test]
fn spawn_pattern_state_is_equal_across_handles() {
    let dir = tempdir().unwrap();
    let master = create_store(dir.path());
    let worker = open_store(dir.path());

    let mut root = master.create(Some("root"), 12, 34, "foo", 0).unwrap();

    // The creation pattern: intents persist first, then the children,
    // then the linking update clears the intents.
    root.jobs_to_delete = ["1", "2"].into_iter().map(String::from).collect();
    worker.update(&root).unwrap();
    assert_eq!(
        master.load(&root.id).unwrap().jobs_to_delete,
        root.jobs_to_delete
    );

    let child1 = worker.create(Some("child1"), 23, 45, "1", 1).unwrap();
    let child2 = worker.create(Some("child2"), 34, 56, "2", 1).unwrap();
    root.push_group(vec![Successor {
        job_id: child1.id.clone(),
        memory: 23,
        cpu: 45,
        predecessor_id: None,
    }]);
    root.push_group(vec![Successor {
        job_id: child2.id.clone(),
        memory: 34,
        cpu: 56,
        predecessor_id: None,
    }]);
    root.jobs_to_delete.clear();
    worker.update(&root).unwrap();

    // Both handles agree on every record.
    assert_eq!(master.load(&root.id).unwrap(), root);
    assert_eq!(master.load(&child1.id).unwrap(), child1);
    assert_eq!(master.load(&child2.id).unwrap(), child2);

    // Enumeration sees exactly the three records from either handle.
    assert_eq!(master.jobs().unwrap().len(), 3);
    assert_eq!(worker.jobs().unwrap().len(), 3);

    // Deletion is visible across handles and idempotent.
    master.delete(&root.id).unwrap();
    assert!(!worker.exists(&root.id).unwrap());
    master.delete(&root.id).unwrap();
    assert!(matches!(
        worker.load(&root.id),
        Err(grove_store::StoreError::NoSuchJob(_))
    ));
}
