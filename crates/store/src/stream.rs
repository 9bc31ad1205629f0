// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scoped file writers with commit-or-discard semantics.
//!
//! A `FileWriter` stages content in a uniquely-named temp file next to
//! its target. Nothing becomes observable until `commit`, which fsyncs
//! the temp and renames it over the target; a writer dropped without
//! commit removes the temp, so an erroring scope leaves no file behind.
//!
//! Updates to existing files carry the generation observed at
//! acquisition. If another writer committed in the meantime the
//! generation has moved and `commit` fails with
//! `ConcurrentFileModification` instead of silently losing that write.

use crate::error::StoreError;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Read a generation stamp; absent or unreadable stamps count as zero.
pub(crate) fn read_generation(gen_path: &Path) -> u64 {
    fs::read_to_string(gen_path)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(0)
}

pub(crate) fn write_generation(gen_path: &Path, generation: u64) -> io::Result<()> {
    if let Some(parent) = gen_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(gen_path, generation.to_string())
}

/// A scoped sink that atomically commits a file on `commit` and
/// discards it on drop.
pub struct FileWriter {
    inner: Option<BufWriter<File>>,
    tmp_path: PathBuf,
    target_path: PathBuf,
    gen_path: PathBuf,
    /// Generation observed at acquisition; `None` for brand-new IDs,
    /// which cannot conflict.
    expected_generation: Option<u64>,
    /// Name reported in conflict errors (file ID or shared name).
    label: String,
    committed: bool,
}

impl FileWriter {
    pub(crate) fn stage(
        target_path: PathBuf,
        gen_path: PathBuf,
        expected_generation: Option<u64>,
        label: impl Into<String>,
    ) -> io::Result<Self> {
        if let Some(parent) = target_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp_path = tmp_sibling(&target_path);
        let file = File::create(&tmp_path)?;
        Ok(Self {
            inner: Some(BufWriter::new(file)),
            tmp_path,
            target_path,
            gen_path,
            expected_generation,
            label: label.into(),
            committed: false,
        })
    }

    /// Make the staged content observable.
    ///
    /// Flushes and fsyncs the temp file, verifies the generation still
    /// matches the one observed at acquisition, bumps it, and renames
    /// the temp over the target.
    pub fn commit(mut self) -> Result<(), StoreError> {
        let writer = match self.inner.take() {
            Some(writer) => writer,
            None => return Ok(()),
        };
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;

        if let Some(expected) = self.expected_generation {
            let current = read_generation(&self.gen_path);
            if current != expected {
                let _ = fs::remove_file(&self.tmp_path);
                self.committed = true; // temp already cleaned up
                return Err(StoreError::ConcurrentFileModification(self.label.clone()));
            }
            write_generation(&self.gen_path, expected + 1)?;
        }

        fs::rename(&self.tmp_path, &self.target_path)?;
        self.committed = true;
        Ok(())
    }
}

impl Write for FileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.inner.as_mut() {
            Some(writer) => writer.write(buf),
            None => Err(io::Error::other("writer already committed")),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.inner.as_mut() {
            Some(writer) => writer.flush(),
            None => Ok(()),
        }
    }
}

impl Drop for FileWriter {
    fn drop(&mut self) {
        if !self.committed {
            drop(self.inner.take());
            let _ = fs::remove_file(&self.tmp_path);
        }
    }
}

/// Uniquely-named temp path in the same directory (and so on the same
/// filesystem) as the target.
pub(crate) fn tmp_sibling(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!("{}.tmp.{}", name, uuid::Uuid::new_v4()))
}

#[cfg(test)]
#[path = "stream_tests.rs"]
mod tests;
