//! Worker initialization: the shared environment blob reaches the
//! worker process before any payload runs.

use crate::prelude::*;
use grove_store::JobStore;
use grove_worker::{Worker, WorkerOptions, WorkerOutcome, ENVIRONMENT_SHARED_FILE};
use std::collections::HashMap;
use std::io::Write;
use tempfile::tempdir;

#[test]
fn worker_applies_the_shared_environment_before_running() {
    let dir = tempdir().unwrap();
    let store = create_store(dir.path());

    let environment: HashMap<&str, &str> = [
        ("GROVE_SPEC_WORKER_ENV", "applied"),
        // Machine-local keys must not cross from the leader.
        ("HOSTNAME", "leader-host"),
    ]
    .into_iter()
    .collect();
    let mut writer = store
        .write_shared_file_stream(ENVIRONMENT_SHARED_FILE)
        .unwrap();
    writer
        .write_all(&serde_json::to_vec(&environment).unwrap())
        .unwrap();
    writer.commit().unwrap();

    // The job's command sees the variable through plain process env.
    let job = store
        .create(
            Some(r#"test "$GROVE_SPEC_WORKER_ENV" = applied"#),
            1,
            1,
            "u",
            0,
        )
        .unwrap();

    let outcome = Worker::new(
        &store,
        WorkerOptions {
            capture_output: false,
            ..WorkerOptions::default()
        },
    )
    .run(&job.id)
    .unwrap();

    assert_eq!(outcome, WorkerOutcome::Completed);
    assert_eq!(std::env::var("GROVE_SPEC_WORKER_ENV").unwrap(), "applied");
    assert_ne!(std::env::var("HOSTNAME").ok().as_deref(), Some("leader-host"));
}
