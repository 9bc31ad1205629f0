//! Worker chaining end to end: linear chains collapse into a single
//! worker invocation, and payloads can unfold the graph at runtime.

use crate::prelude::*;
use grove_store::{spawn_successors, JobStore, SuccessorSpec};
use grove_worker::{
    Payload, PayloadContext, PayloadError, PayloadRegistry, PayloadRun, Worker, WorkerOptions,
    WorkerOutcome,
};
use tempfile::tempdir;

fn chain_spec(command: &str, update_id: &str) -> SuccessorSpec {
    SuccessorSpec {
        command: Some(command.to_string()),
        memory: 8,
        cpu: 2,
        update_id: update_id.to_string(),
        predecessor_number: 1,
    }
}

fn quiet_options() -> WorkerOptions {
    WorkerOptions {
        capture_output: false,
        ..WorkerOptions::default()
    }
}

#[test]
fn a_singleton_chain_is_fully_consumed_by_one_worker() {
    let dir = tempdir().unwrap();
    let store = create_store(dir.path());

    // J1 → J2 → J3 with equal resources and predecessor_number=1.
    let mut j1 = store.create(Some("true"), 8, 2, "u1", 0).unwrap();
    let mut j2 = spawn_successors(&store, &mut j1, &[chain_spec("true", "u2")]).unwrap()[0].clone();
    let j3 = spawn_successors(&store, &mut j2, &[chain_spec("true", "u3")]).unwrap()[0].clone();

    let outcome = Worker::new(&store, quiet_options()).run(&j1.id).unwrap();
    assert_eq!(outcome, WorkerOutcome::Completed);

    // J2 and J3 were swallowed and deleted mid-chain; J1 finished with
    // no command and no stack and was deleted as complete.
    for id in [&j1.id, &j2.id, &j3.id] {
        assert!(!store.exists(id).unwrap());
    }
    assert!(store.jobs().unwrap().is_empty());
}

/// A payload that unfolds the graph while running: it spawns one
/// follow-on job onto its own record through the spawn protocol.
struct Expander;

impl Payload for Expander {
    fn run(&self, run: &mut PayloadRun<'_>) -> Result<Vec<String>, PayloadError> {
        spawn_successors(
            run.store,
            run.record,
            &[SuccessorSpec {
                command: Some("true".to_string()),
                memory: run.record.memory,
                cpu: run.record.cpu,
                update_id: "u-unfolded".to_string(),
                predecessor_number: 1,
            }],
        )?;
        Ok(vec!["unfolded one successor".to_string()])
    }
}

#[test]
fn a_payload_can_unfold_work_that_the_same_worker_then_chains_into() {
    let dir = tempdir().unwrap();
    let store = create_store(dir.path());

    let root = store.create(Some("placeholder"), 8, 2, "u-root", 0).unwrap();
    let (writer, blob_id) = store.write_file_stream(&root.id).unwrap();
    writer.commit().unwrap();
    let mut root = store.load(&root.id).unwrap();
    root.command = Some(format!("payload expand {}", blob_id));
    store.update(&root).unwrap();

    let mut registry = PayloadRegistry::with_builtins();
    registry.register("expand", |_blob, _ctx| Ok(Box::new(Expander)));
    let options = WorkerOptions {
        capture_output: false,
        context: PayloadContext::default(),
        registry,
    };

    let outcome = Worker::new(&store, options).run(&root.id).unwrap();

    // The dynamically-spawned successor was chained into and completed;
    // nothing is left in the store.
    assert_eq!(outcome, WorkerOutcome::Completed);
    assert!(store.jobs().unwrap().is_empty());

    // The payload's message reached the sink.
    let mut blobs = Vec::new();
    store
        .read_stats_and_logging(&mut |reader| {
            let mut blob = String::new();
            std::io::Read::read_to_string(reader, &mut blob)?;
            blobs.push(blob);
            Ok(())
        })
        .unwrap();
    assert_eq!(blobs.len(), 1);
    assert!(blobs[0].contains("<message>unfolded one successor</message>"));
}

#[test]
fn a_worker_dispatched_mid_graph_only_consumes_its_own_chain() {
    let dir = tempdir().unwrap();
    let store = create_store(dir.path());

    // Root fans out into two branches; each branch is a chain of one.
    let mut root = store.create(Some("true"), 8, 2, "u-root", 0).unwrap();
    let branches = spawn_successors(
        &store,
        &mut root,
        &[chain_spec("true", "u-left"), chain_spec("true", "u-right")],
    )
    .unwrap();

    // The root's worker runs the root command and yields at the fan-out.
    let outcome = Worker::new(&store, quiet_options()).run(&root.id).unwrap();
    assert_eq!(outcome, WorkerOutcome::Yielded);

    // The leader then dispatches each branch; each completes alone.
    for branch in &branches {
        let outcome = Worker::new(&store, quiet_options()).run(&branch.id).unwrap();
        assert_eq!(outcome, WorkerOutcome::Completed);
    }

    // Only the root shell remains, its fan-out group now fully absent;
    // its next worker invocation flushes the stack and completes it.
    let outcome = Worker::new(&store, quiet_options()).run(&root.id).unwrap();
    assert_eq!(outcome, WorkerOutcome::Completed);
    assert!(store.jobs().unwrap().is_empty());
}
