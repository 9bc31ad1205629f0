//! Multipart-sized content integrity across independent handles.

use crate::prelude::*;
use grove_store::{JobStore, PART_SIZE};
use sha2::{Digest, Sha256};
use std::io::Write;
use tempfile::tempdir;

fn digest(bytes: &[u8]) -> [u8; 32] {
    Sha256::digest(bytes).into()
}

fn patterned(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i.wrapping_mul(131) >> 4) as u8).collect()
}

#[test]
fn multi_part_content_written_on_one_handle_verifies_on_another() {
    let dir = tempdir().unwrap();
    let master = create_store(dir.path());
    let worker = open_store(dir.path());

    let job = master.create(Some("run"), 1, 1, "u", 0).unwrap();

    // One file ends exactly on a part boundary, one mid-part.
    for len in [2 * PART_SIZE, 2 * PART_SIZE + PART_SIZE / 3] {
        let content = patterned(len);
        let (mut writer, file_id) = master.write_file_stream(&job.id).unwrap();
        writer.write_all(&content).unwrap();
        writer.commit().unwrap();

        let returned = read_all(worker.read_file_stream(&file_id).unwrap());
        assert_eq!(returned.len(), len);
        assert_eq!(digest(&returned), digest(&content));
    }
}
