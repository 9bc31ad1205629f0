// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Filesystem job store backend.
//!
//! Layout under the store root:
//!
//! ```text
//! grove.json                     store marker (records the root job ID)
//! shared/<name>                  shared files, config.xml included
//! jobs/<jobId>/record.json       job record
//! jobs/<jobId>/files/<uuid>      per-job file content
//! stats/<uuid>                   stats/logging blobs
//! .gen/...                       generation stamps, mirroring file paths
//! ```
//!
//! Per-job file IDs are the file's path relative to the root, so the
//! owning job is encoded in the ID and deleting the job's directory
//! cascades to its files. Every write lands in a uniquely-named temp
//! sibling, is fsynced, and is renamed into place; readers see either
//! the old or the new content, never a torn write.

use crate::error::StoreError;
use crate::recovery;
use crate::retry::with_retries;
use crate::store::JobStore;
use crate::stream::{read_generation, tmp_sibling, FileWriter};
use grove_core::{FileId, IdGen, JobId, JobRecord, UuidIdGen, WorkflowConfig, CONFIG_SHARED_FILE};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Buffer size for streamed copies. Content of any length round-trips;
/// the final part may be any size up to this, including zero.
pub const PART_SIZE: usize = 64 * 1024;

const MARKER_FILE: &str = "grove.json";
const RECORD_FILE: &str = "record.json";
const JOBS_DIR: &str = "jobs";
const FILES_DIR: &str = "files";
const SHARED_DIR: &str = "shared";
const STATS_DIR: &str = "stats";
const GEN_DIR: &str = ".gen";

/// Store-level metadata persisted at the root.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreMarker {
    /// ID assigned by the first `create` call, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    root_job: Option<JobId>,
}

/// Job store backed by a local directory tree.
pub struct FileJobStore {
    root: PathBuf,
    config: WorkflowConfig,
    id_gen: Box<dyn IdGen>,
}

impl FileJobStore {
    /// Create a new physical store at `root`, write the configuration to
    /// the shared file `config.xml`, and run the recovery sweep (a no-op
    /// on the fresh store).
    pub fn create(root: impl Into<PathBuf>, config: WorkflowConfig) -> Result<Self, StoreError> {
        let root = root.into();
        for dir in [JOBS_DIR, SHARED_DIR, STATS_DIR, GEN_DIR] {
            fs::create_dir_all(root.join(dir))?;
        }

        let store = Self {
            root,
            config,
            id_gen: Box::new(UuidIdGen),
        };
        store.write_marker(&StoreMarker::default())?;

        let config_xml = store.config.to_xml().map_err(|e| StoreError::Corrupt {
            id: CONFIG_SHARED_FILE.to_string(),
            message: e.to_string(),
        })?;
        let mut writer = store.write_shared_file_stream(CONFIG_SHARED_FILE)?;
        writer.write_all(&config_xml)?;
        writer.commit()?;

        recovery::sweep(&store)?;
        info!(root = %store.root.display(), "created job store");
        Ok(store)
    }

    /// Bind to an existing physical store: read `config.xml`, then run
    /// the recovery sweep to repair partially-applied updates.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();

        let config = {
            let mut bytes = Vec::new();
            let path = root.join(SHARED_DIR).join(CONFIG_SHARED_FILE);
            let mut reader = File::open(&path)?;
            reader.read_to_end(&mut bytes)?;
            WorkflowConfig::from_xml(&bytes).map_err(|e| StoreError::Corrupt {
                id: CONFIG_SHARED_FILE.to_string(),
                message: e.to_string(),
            })?
        };

        let store = Self {
            root,
            config,
            id_gen: Box::new(UuidIdGen),
        };
        let stats = recovery::sweep(&store)?;
        if stats.orphans_deleted > 0 || stats.records_repaired > 0 {
            info!(
                orphans_deleted = stats.orphans_deleted,
                records_repaired = stats.records_repaired,
                "recovery sweep repaired store"
            );
        }
        Ok(store)
    }

    /// Swap in a deterministic ID generator (tests).
    pub fn with_id_gen(mut self, id_gen: impl IdGen + 'static) -> Self {
        self.id_gen = Box::new(id_gen);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // --- paths ---

    fn jobs_dir(&self) -> PathBuf {
        self.root.join(JOBS_DIR)
    }

    fn job_dir(&self, id: &JobId) -> PathBuf {
        self.jobs_dir().join(id.as_str())
    }

    fn record_path(&self, id: &JobId) -> PathBuf {
        self.job_dir(id).join(RECORD_FILE)
    }

    fn shared_path(&self, name: &str) -> PathBuf {
        self.root.join(SHARED_DIR).join(name)
    }

    fn stats_dir(&self) -> PathBuf {
        self.root.join(STATS_DIR)
    }

    /// Resolve a per-job file ID to its absolute path, rejecting IDs
    /// that do not have the expected `jobs/<id>/files/<name>` shape.
    fn file_path(&self, id: &FileId) -> Result<PathBuf, StoreError> {
        let parts: Vec<&str> = id.as_str().split('/').collect();
        let well_formed = parts.len() == 4
            && parts[0] == JOBS_DIR
            && parts[2] == FILES_DIR
            && parts
                .iter()
                .all(|p| !p.is_empty() && *p != "." && *p != "..");
        if !well_formed {
            return Err(StoreError::NoSuchFile(id.clone()));
        }
        Ok(self.root.join(id.as_str()))
    }

    fn file_gen_path(&self, id: &FileId) -> PathBuf {
        self.root.join(GEN_DIR).join(id.as_str())
    }

    fn shared_gen_path(&self, name: &str) -> PathBuf {
        self.root.join(GEN_DIR).join(SHARED_DIR).join(name)
    }

    // --- marker ---

    fn read_marker(&self) -> Result<StoreMarker, StoreError> {
        match fs::read(self.root.join(MARKER_FILE)) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt {
                id: MARKER_FILE.to_string(),
                message: e.to_string(),
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(StoreMarker::default()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_marker(&self, marker: &StoreMarker) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(marker)?;
        atomic_write(&self.root.join(MARKER_FILE), &bytes)?;
        Ok(())
    }

    fn require_job(&self, id: &JobId) -> Result<(), StoreError> {
        if self.record_path(id).exists() {
            Ok(())
        } else {
            Err(StoreError::NoSuchJob(id.clone()))
        }
    }

    fn new_file_id(&self, owner: &JobId) -> FileId {
        FileId::new(format!(
            "{}/{}/{}/{}",
            JOBS_DIR,
            owner,
            FILES_DIR,
            self.id_gen.next()
        ))
    }
}

impl JobStore for FileJobStore {
    fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    fn create(
        &self,
        command: Option<&str>,
        memory: u64,
        cpu: u64,
        update_id: &str,
        predecessor_number: u32,
    ) -> Result<JobRecord, StoreError> {
        let id = JobId::new(self.id_gen.next());
        let record = JobRecord::new(
            id.clone(),
            command.map(str::to_string),
            memory,
            cpu,
            update_id,
            predecessor_number,
            self.config.try_count,
        );

        fs::create_dir_all(self.job_dir(&id))?;
        let bytes = serde_json::to_vec_pretty(&record)?;
        atomic_write(&self.record_path(&id), &bytes)?;

        let mut marker = self.read_marker()?;
        if marker.root_job.is_none() {
            marker.root_job = Some(id.clone());
            self.write_marker(&marker)?;
        }

        debug!(job = %id, update_id, "created job record");
        Ok(record)
    }

    fn exists(&self, id: &JobId) -> Result<bool, StoreError> {
        Ok(self.record_path(id).exists())
    }

    fn load(&self, id: &JobId) -> Result<JobRecord, StoreError> {
        let bytes = match with_retries("load record", || fs::read(self.record_path(id))) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NoSuchJob(id.clone()))
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt {
            id: id.to_string(),
            message: e.to_string(),
        })
    }

    fn update(&self, record: &JobRecord) -> Result<(), StoreError> {
        self.require_job(&record.id)?;
        let bytes = serde_json::to_vec_pretty(record)?;
        atomic_write(&self.record_path(&record.id), &bytes)?;
        debug!(job = %record.id, "updated job record");
        Ok(())
    }

    fn delete(&self, id: &JobId) -> Result<(), StoreError> {
        match fs::remove_dir_all(self.job_dir(id)) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        }
        // Generation stamps for the job's files go with it.
        let _ = fs::remove_dir_all(self.root.join(GEN_DIR).join(JOBS_DIR).join(id.as_str()));
        debug!(job = %id, "deleted job record");
        Ok(())
    }

    fn jobs(&self) -> Result<Vec<JobRecord>, StoreError> {
        let mut records = Vec::new();
        for entry in fs::read_dir(self.jobs_dir())? {
            let entry = entry?;
            let record_path = entry.path().join(RECORD_FILE);
            let bytes = match fs::read(&record_path) {
                Ok(bytes) => bytes,
                // A directory without a committed record is a record
                // mid-create or mid-delete; the consistent view omits it.
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            match serde_json::from_slice::<JobRecord>(&bytes) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(path = %record_path.display(), error = %e, "skipping unreadable record");
                }
            }
        }
        Ok(records)
    }

    fn started(&self) -> Result<bool, StoreError> {
        Ok(self.read_marker()?.root_job.is_some())
    }

    fn load_root_job(&self) -> Result<JobRecord, StoreError> {
        match self.read_marker()?.root_job {
            Some(id) => self.load(&id),
            None => Err(StoreError::NoSuchJob(JobId::new("<root>"))),
        }
    }

    // --- per-job files ---

    fn write_file(&self, owner: &JobId, local_path: &Path) -> Result<FileId, StoreError> {
        let (mut writer, file_id) = self.write_file_stream(owner)?;
        let mut source = File::open(local_path)?;
        copy_in_parts(&mut source, &mut writer)?;
        writer.commit()?;
        Ok(file_id)
    }

    fn update_file(&self, id: &FileId, local_path: &Path) -> Result<(), StoreError> {
        let mut writer = self.update_file_stream(id)?;
        let mut source = File::open(local_path)?;
        copy_in_parts(&mut source, &mut writer)?;
        writer.commit()
    }

    fn read_file(&self, id: &FileId, local_path: &Path) -> Result<(), StoreError> {
        let mut reader = self.read_file_stream(id)?;
        let mut target = File::create(local_path)?;
        copy_in_parts(&mut *reader, &mut target)?;
        Ok(())
    }

    fn delete_file(&self, id: &FileId) -> Result<(), StoreError> {
        let path = self.file_path(id)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                let _ = fs::remove_file(self.file_gen_path(id));
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(StoreError::NoSuchFile(id.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn empty_file_id(&self, owner: &JobId) -> Result<FileId, StoreError> {
        let (writer, file_id) = self.write_file_stream(owner)?;
        writer.commit()?;
        Ok(file_id)
    }

    fn write_file_stream(&self, owner: &JobId) -> Result<(FileWriter, FileId), StoreError> {
        self.require_job(owner)?;
        let file_id = self.new_file_id(owner);
        let target = self.file_path(&file_id)?;
        let writer = FileWriter::stage(target, self.file_gen_path(&file_id), None, file_id.as_str())?;
        Ok((writer, file_id))
    }

    fn update_file_stream(&self, id: &FileId) -> Result<FileWriter, StoreError> {
        let target = self.file_path(id)?;
        if !target.exists() {
            return Err(StoreError::NoSuchFile(id.clone()));
        }
        let gen_path = self.file_gen_path(id);
        let expected = read_generation(&gen_path);
        let writer = FileWriter::stage(target, gen_path, Some(expected), id.as_str())?;
        Ok(writer)
    }

    fn read_file_stream(&self, id: &FileId) -> Result<Box<dyn Read + Send>, StoreError> {
        let path = self.file_path(id)?;
        match File::open(&path) {
            Ok(file) => Ok(Box::new(BufReader::new(file))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(StoreError::NoSuchFile(id.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    // --- shared files ---

    fn write_shared_file_stream(&self, name: &str) -> Result<FileWriter, StoreError> {
        validate_shared_name(name)?;
        let gen_path = self.shared_gen_path(name);
        let expected = read_generation(&gen_path);
        let writer = FileWriter::stage(self.shared_path(name), gen_path, Some(expected), name)?;
        Ok(writer)
    }

    fn read_shared_file_stream(&self, name: &str) -> Result<Box<dyn Read + Send>, StoreError> {
        validate_shared_name(name)?;
        match File::open(self.shared_path(name)) {
            Ok(file) => Ok(Box::new(BufReader::new(file))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(StoreError::NoSuchFile(
                FileId::new(format!("{}/{}", SHARED_DIR, name)),
            )),
            Err(e) => Err(e.into()),
        }
    }

    // --- stats & logging sink ---

    fn write_stats_and_logging(&self, blob: &[u8]) -> Result<(), StoreError> {
        let path = self.stats_dir().join(self.id_gen.next());
        atomic_write(&path, blob)?;
        Ok(())
    }

    fn read_stats_and_logging(
        &self,
        callback: &mut dyn FnMut(&mut dyn Read) -> io::Result<()>,
    ) -> Result<usize, StoreError> {
        let mut processed = 0;
        for entry in fs::read_dir(self.stats_dir())? {
            let entry = entry?;
            if entry.file_name().to_string_lossy().contains(".tmp.") {
                continue;
            }
            let mut reader = BufReader::new(File::open(entry.path())?);
            // The blob is removed only after the callback returns Ok;
            // aborting here leaves it and everything undrained in place.
            callback(&mut reader)?;
            fs::remove_file(entry.path())?;
            processed += 1;
        }
        Ok(processed)
    }

    fn delete_job_store(&self) -> Result<(), StoreError> {
        match fs::remove_dir_all(&self.root) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Shared names are restricted to `[A-Za-z0-9._-]+`, with the dot-only
/// names additionally rejected so a name can never be a path traversal.
fn validate_shared_name(name: &str) -> Result<(), StoreError> {
    let charset_ok = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if !charset_ok || name == "." || name == ".." {
        return Err(StoreError::InvalidSharedName(name.to_string()));
    }
    Ok(())
}

/// Write bytes to a temp sibling, fsync, and rename over the target.
fn atomic_write(target: &Path, bytes: &[u8]) -> io::Result<()> {
    let tmp = tmp_sibling(target);
    with_retries("atomic write", || {
        let mut file = File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()
    })?;
    fs::rename(&tmp, target)
}

/// Buffered copy in `PART_SIZE` chunks; the final part may be any size
/// up to the part size, including zero.
pub(crate) fn copy_in_parts(
    reader: &mut dyn Read,
    writer: &mut dyn Write,
) -> io::Result<u64> {
    let mut buf = vec![0u8; PART_SIZE];
    let mut total = 0u64;
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                writer.write_all(&buf[..n])?;
                total += n as u64;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(total)
}

#[cfg(test)]
#[path = "fs_tests.rs"]
mod tests;
