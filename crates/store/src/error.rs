// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy surfaced by job store operations

use grove_core::{FileId, JobId};
use std::io;
use thiserror::Error;

/// Errors that can occur in job store operations.
///
/// Anything not covered by a named kind is fatal for the current
/// operation and surfaces as `Io` or `Corrupt`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("the job '{0}' does not exist")]
    NoSuchJob(JobId),
    #[error("the file '{0}' does not exist")]
    NoSuchFile(FileId),
    #[error("concurrent update to file '{0}' detected")]
    ConcurrentFileModification(String),
    #[error("invalid shared file name {0:?}")]
    InvalidSharedName(String),
    #[error("unsupported job store endpoint {0:?}")]
    UnsupportedEndpoint(String),
    #[error("corrupt record '{id}': {message}")]
    Corrupt { id: String, message: String },
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl StoreError {
    /// True for the absent-file kind, used where deletion cascades must
    /// tolerate files that are already gone.
    pub fn is_no_such_file(&self) -> bool {
        matches!(self, StoreError::NoSuchFile(_))
    }
}
