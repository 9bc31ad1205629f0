//! Per-job file namespace: streams, local copies, and the ownership
//! cascade.

use crate::prelude::*;
use grove_store::{JobStore, StoreError};
use std::fs;
use std::io::Write;
use tempfile::tempdir;

#[test]
fn per_job_file_lifecycle_and_ownership_cascade() {
    let dir = tempdir().unwrap();
    let work = tempdir().unwrap();
    let master = create_store(dir.path());
    let worker = open_store(dir.path());

    let root = master.create(Some("root"), 12, 34, "foo", 0).unwrap();

    // Reserve an empty file, then fill it through an update stream.
    let file_one = worker.empty_file_id(&root.id).unwrap();
    let mut writer = worker.update_file_stream(&file_one).unwrap();
    writer.write_all(b"one").unwrap();
    writer.commit().unwrap();
    assert_eq!(read_all(master.read_file_stream(&file_one).unwrap()), b"one");

    // Localize to disk, rewrite locally, and store as a second file.
    let local = work.path().join("scratch-copy");
    master.read_file(&file_one, &local).unwrap();
    assert_eq!(fs::read(&local).unwrap(), b"one");
    fs::write(&local, b"two").unwrap();
    let file_two = master.write_file(&root.id, &local).unwrap();
    assert_eq!(read_all(worker.read_file_stream(&file_two).unwrap()), b"two");

    // Update the first file from the same local copy; both now agree.
    master.update_file(&file_one, &local).unwrap();
    assert_eq!(read_all(worker.read_file_stream(&file_one).unwrap()), b"two");

    // A third file arrives through a write stream.
    let (mut writer, file_three) = worker.write_file_stream(&root.id).unwrap();
    writer.write_all(b"three").unwrap();
    writer.commit().unwrap();
    assert_eq!(
        read_all(master.read_file_stream(&file_three).unwrap()),
        b"three"
    );

    // Explicit deletion for one file, cascade for the rest.
    worker.delete_file(&file_one).unwrap();
    master.delete(&root.id).unwrap();
    assert!(!master.exists(&root.id).unwrap());
    for id in [&file_two, &file_three] {
        assert!(matches!(
            worker.read_file_stream(id),
            Err(StoreError::NoSuchFile(_))
        ));
    }
}
