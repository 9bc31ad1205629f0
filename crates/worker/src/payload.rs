// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Payload reconstruction and execution.
//!
//! A structured command names a payload kind and a stored blob. The
//! registry maps each kind to a constructor that turns the blob back
//! into an executable unit; the loader context carries the payload
//! search path, so reconstruction never mutates global state.

use grove_core::{JobRecord, PayloadDescriptor};
use grove_store::{JobStore, StoreError};
use std::collections::HashMap;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

/// Errors raised while reconstructing or executing a payload.
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("unknown payload kind: {0}")]
    UnknownKind(String),
    #[error("malformed payload: {0}")]
    Malformed(String),
    #[error("payload execution failed: {0}")]
    Failed(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Explicit loader context passed to payload constructors.
#[derive(Debug, Clone, Default)]
pub struct PayloadContext {
    /// Directories a payload may resolve auxiliary resources against,
    /// in search order.
    pub search_dirs: Vec<PathBuf>,
}

/// Everything a running payload may touch.
///
/// The record is the job currently executing; payloads extend the
/// workflow by spawning successor groups onto it through the store's
/// spawn protocol.
pub struct PayloadRun<'a> {
    pub store: &'a dyn JobStore,
    pub record: &'a mut JobRecord,
    pub scratch_dir: &'a Path,
    pub default_memory: u64,
    pub default_cpu: u64,
}

/// An executable unit reconstructed from a stored blob.
pub trait Payload {
    /// Execute; returns user-level log messages for the stats record.
    fn run(&self, run: &mut PayloadRun<'_>) -> Result<Vec<String>, PayloadError>;
}

type Constructor =
    Box<dyn Fn(&[u8], &PayloadContext) -> Result<Box<dyn Payload>, PayloadError> + Send + Sync>;

/// Tagged-kind registry mapping a stable identifier to a constructor.
#[derive(Default)]
pub struct PayloadRegistry {
    constructors: HashMap<String, Constructor>,
}

impl PayloadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in kinds registered.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("shell", |blob, _ctx| {
            let script = String::from_utf8(blob.to_vec())
                .map_err(|e| PayloadError::Malformed(e.to_string()))?;
            Ok(Box::new(ShellPayload { script }))
        });
        registry
    }

    pub fn register(
        &mut self,
        kind: impl Into<String>,
        constructor: impl Fn(&[u8], &PayloadContext) -> Result<Box<dyn Payload>, PayloadError>
            + Send
            + Sync
            + 'static,
    ) {
        self.constructors.insert(kind.into(), Box::new(constructor));
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.constructors.contains_key(kind)
    }

    /// Fetch the descriptor's blob from the store and reconstruct the
    /// executable unit.
    pub fn load(
        &self,
        store: &dyn JobStore,
        descriptor: &PayloadDescriptor,
        context: &PayloadContext,
    ) -> Result<Box<dyn Payload>, PayloadError> {
        let constructor = self
            .constructors
            .get(&descriptor.kind)
            .ok_or_else(|| PayloadError::UnknownKind(descriptor.kind.clone()))?;

        let mut blob = Vec::new();
        store
            .read_file_stream(&descriptor.file_id)?
            .read_to_end(&mut blob)?;
        constructor(&blob, context)
    }
}

/// Built-in kind `shell`: the blob is a script run with `sh -c` in the
/// scratch directory. Non-empty stdout lines become user messages.
struct ShellPayload {
    script: String,
}

impl Payload for ShellPayload {
    fn run(&self, run: &mut PayloadRun<'_>) -> Result<Vec<String>, PayloadError> {
        let output = Command::new("sh")
            .arg("-c")
            .arg(&self.script)
            .current_dir(run.scratch_dir)
            .output()?;
        if !output.status.success() {
            return Err(PayloadError::Failed(format!(
                "shell payload exited with {}",
                output.status
            )));
        }
        let messages = String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        Ok(messages)
    }
}

#[cfg(test)]
#[path = "payload_tests.rs"]
mod tests;
