//! Shared helpers for the spec suite.

#![allow(dead_code)]

use grove_core::WorkflowConfig;
use grove_store::FileJobStore;
use std::io::Read;
use std::path::Path;

pub fn test_config() -> WorkflowConfig {
    WorkflowConfig {
        try_count: 1,
        ..WorkflowConfig::default()
    }
}

/// Create a fresh store at `root` with the spec-suite configuration.
pub fn create_store(root: &Path) -> FileJobStore {
    FileJobStore::create(root, test_config()).unwrap()
}

/// Bind a second (or later) handle to an existing store, running its
/// recovery sweep the way a separate process would.
pub fn open_store(root: &Path) -> FileJobStore {
    FileJobStore::open(root).unwrap()
}

pub fn read_all(mut reader: Box<dyn Read + Send>) -> Vec<u8> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes).unwrap();
    bytes
}
