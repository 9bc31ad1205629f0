// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::tempdir;

fn writer_for(dir: &Path, expected: Option<u64>) -> (FileWriter, PathBuf, PathBuf) {
    let target = dir.join("data");
    let gen = dir.join("data.gen");
    let writer = FileWriter::stage(target.clone(), gen.clone(), expected, "data").unwrap();
    (writer, target, gen)
}

#[test]
fn commit_makes_content_observable() {
    let dir = tempdir().unwrap();
    let (mut writer, target, _) = writer_for(dir.path(), None);

    writer.write_all(b"hello").unwrap();
    writer.commit().unwrap();

    assert_eq!(fs::read(&target).unwrap(), b"hello");
}

#[test]
fn dropped_writer_leaves_no_file() {
    let dir = tempdir().unwrap();
    let (mut writer, target, _) = writer_for(dir.path(), None);

    writer.write_all(b"doomed").unwrap();
    drop(writer);

    assert!(!target.exists());
    // No stray temp files either
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn commit_bumps_generation_for_updates() {
    let dir = tempdir().unwrap();
    let (mut writer, _, gen) = writer_for(dir.path(), Some(0));

    writer.write_all(b"v1").unwrap();
    writer.commit().unwrap();

    assert_eq!(read_generation(&gen), 1);
}

#[test]
fn stale_generation_fails_with_conflict() {
    let dir = tempdir().unwrap();
    let (mut loser, target, gen) = writer_for(dir.path(), Some(0));
    loser.write_all(b"slow").unwrap();

    // A second writer acquires and commits while the first is in flight.
    let (mut winner, _, _) = writer_for(dir.path(), Some(0));
    winner.write_all(b"fast").unwrap();
    winner.commit().unwrap();

    let err = loser.commit().unwrap_err();
    assert!(matches!(err, StoreError::ConcurrentFileModification(ref f) if f == "data"));
    // The winning content survives untouched.
    assert_eq!(fs::read(&target).unwrap(), b"fast");
    assert_eq!(read_generation(&gen), 1);
}

#[test]
fn fresh_writes_skip_generation_tracking() {
    let dir = tempdir().unwrap();
    let (mut writer, _, gen) = writer_for(dir.path(), None);

    writer.write_all(b"x").unwrap();
    writer.commit().unwrap();

    assert!(!gen.exists());
}

#[test]
fn empty_commit_yields_zero_byte_file() {
    let dir = tempdir().unwrap();
    let (writer, target, _) = writer_for(dir.path(), None);

    writer.commit().unwrap();

    assert_eq!(fs::metadata(&target).unwrap().len(), 0);
}

#[test]
fn generation_of_absent_stamp_is_zero() {
    let dir = tempdir().unwrap();
    assert_eq!(read_generation(&dir.path().join("missing.gen")), 0);
}

#[test]
fn tmp_sibling_stays_in_target_directory() {
    let tmp = tmp_sibling(Path::new("/a/b/record.json"));
    assert_eq!(tmp.parent(), Some(Path::new("/a/b")));
    assert!(tmp
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with("record.json.tmp."));
}
