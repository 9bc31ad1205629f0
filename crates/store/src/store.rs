// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `JobStore` trait: the contract every backend implements.

use crate::error::StoreError;
use crate::stream::FileWriter;
use grove_core::{FileId, JobId, JobRecord, WorkflowConfig};
use std::io::{self, Read};
use std::path::Path;

/// Persistence contract for job records, per-job files, shared files,
/// and the stats sink.
///
/// All operations are blocking. Multiple store handles (in the same or
/// different processes) may point at the same backing storage; an
/// `update` that has returned is observable by any subsequent `load`,
/// and a `create` that has returned makes `exists` true for every
/// observer. Record updates are last-writer-wins at whole-record
/// granularity: readers never see a half-written record.
pub trait JobStore {
    /// Workflow configuration read from (or written to) the shared file
    /// `config.xml` at construction.
    fn config(&self) -> &WorkflowConfig;

    /// Create and persist a new record with a fresh unique ID.
    ///
    /// After return the record has `stack = []`, no intents, no finished
    /// predecessors, no log file, and a retry budget seeded from the
    /// configured `try_count`.
    fn create(
        &self,
        command: Option<&str>,
        memory: u64,
        cpu: u64,
        update_id: &str,
        predecessor_number: u32,
    ) -> Result<JobRecord, StoreError>;

    /// True iff a record with this ID is currently persisted.
    fn exists(&self, id: &JobId) -> Result<bool, StoreError>;

    fn load(&self, id: &JobId) -> Result<JobRecord, StoreError>;

    /// Atomically replace the persisted state of `record.id`.
    fn update(&self, record: &JobRecord) -> Result<(), StoreError>;

    /// Remove a record and every per-job file it owns. Idempotent:
    /// deleting an unknown ID succeeds silently.
    fn delete(&self, id: &JobId) -> Result<(), StoreError>;

    /// Enumerate all persisted records. Ordering is unspecified;
    /// partially-created records are never exposed.
    fn jobs(&self) -> Result<Vec<JobRecord>, StoreError>;

    /// True once `create` has ever been called against this backing
    /// store, even if every record has since been deleted.
    fn started(&self) -> Result<bool, StoreError>;

    /// Load the record made by the first `create` call.
    fn load_root_job(&self) -> Result<JobRecord, StoreError>;

    // --- per-job files ---

    /// Copy a local file into the store under the given owner and return
    /// its new opaque ID.
    fn write_file(&self, owner: &JobId, local_path: &Path) -> Result<FileId, StoreError>;

    /// Replace the contents of an existing file from a local path.
    fn update_file(&self, id: &FileId, local_path: &Path) -> Result<(), StoreError>;

    /// Materialize the latest committed version at a local path.
    fn read_file(&self, id: &FileId, local_path: &Path) -> Result<(), StoreError>;

    /// Delete a stored file. Fails with `NoSuchFile` if absent.
    fn delete_file(&self, id: &FileId) -> Result<(), StoreError>;

    /// Reserve a new opaque ID with empty content.
    fn empty_file_id(&self, owner: &JobId) -> Result<FileId, StoreError>;

    /// Scoped write of a new per-job file. Nothing becomes observable
    /// until the writer's `commit`; a dropped writer leaves no file.
    fn write_file_stream(&self, owner: &JobId) -> Result<(FileWriter, FileId), StoreError>;

    /// Scoped replace of an existing file, with the same commit
    /// semantics as `write_file_stream`.
    fn update_file_stream(&self, id: &FileId) -> Result<FileWriter, StoreError>;

    /// Scoped read; opening an absent file fails with `NoSuchFile`.
    fn read_file_stream(&self, id: &FileId) -> Result<Box<dyn Read + Send>, StoreError>;

    // --- shared files ---

    /// Scoped write of a named global file. Names must match
    /// `[A-Za-z0-9._-]+`; racing writers either serialize or fail with
    /// `ConcurrentFileModification` at commit.
    fn write_shared_file_stream(&self, name: &str) -> Result<FileWriter, StoreError>;

    fn read_shared_file_stream(&self, name: &str) -> Result<Box<dyn Read + Send>, StoreError>;

    // --- stats & logging sink ---

    /// Append an opaque blob to the stats/logging sink.
    fn write_stats_and_logging(&self, blob: &[u8]) -> Result<(), StoreError>;

    /// Invoke the callback once per accumulated blob, removing each blob
    /// only after the callback returns Ok. Returns the number of blobs
    /// fully processed; a callback error aborts the drain without losing
    /// the remaining blobs.
    fn read_stats_and_logging(
        &self,
        callback: &mut dyn FnMut(&mut dyn Read) -> io::Result<()>,
    ) -> Result<usize, StoreError>;

    /// Destroy the entire backing store, shared files included.
    fn delete_job_store(&self) -> Result<(), StoreError>;
}
