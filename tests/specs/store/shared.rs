//! Shared file namespace across handles.

use crate::prelude::*;
use grove_store::JobStore;
use std::io::Write;
use tempfile::tempdir;

#[test]
fn shared_file_written_on_master_reads_back_everywhere() {
    let dir = tempdir().unwrap();
    let master = create_store(dir.path());
    let worker = open_store(dir.path());

    let mut writer = master.write_shared_file_stream("foo").unwrap();
    writer.write_all(b"bar").unwrap();
    writer.commit().unwrap();

    assert_eq!(read_all(worker.read_shared_file_stream("foo").unwrap()), b"bar");
    assert_eq!(read_all(master.read_shared_file_stream("foo").unwrap()), b"bar");
}

#[test]
fn shared_files_survive_every_job_completing() {
    let dir = tempdir().unwrap();
    let master = create_store(dir.path());

    let mut writer = master.write_shared_file_stream("workflow-state").unwrap();
    writer.write_all(b"still here").unwrap();
    writer.commit().unwrap();

    let job = master.create(Some("run"), 1, 1, "u", 0).unwrap();
    master.delete(&job.id).unwrap();

    // Shared files are workflow-lifetime resources; only deleting the
    // whole store removes them.
    assert_eq!(
        read_all(master.read_shared_file_stream("workflow-state").unwrap()),
        b"still here"
    );
    master.delete_job_store().unwrap();
    assert!(!dir.path().join("shared/workflow-state").exists());
}
