// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the worker

use crate::capture::CaptureError;
use crate::payload::PayloadError;
use grove_core::JobId;
use grove_store::StoreError;
use std::io;
use thiserror::Error;

/// Errors that can escape the worker's chain loop.
///
/// Every variant except the setup failures is caught by the worker's
/// outer guard, annotated into the store, and converted into a normal
/// exit; the batch system never sees a payload failure as a nonzero
/// exit code.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Payload(#[from] PayloadError),
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error("command exited unsuccessfully: {0}")]
    CommandFailed(String),
    #[error("job without a command still has successors on its stack")]
    ShellWithSuccessors,
    #[error("successor {id} does not match its stack entry: {reason}")]
    SuccessorMismatch { id: JobId, reason: String },
    #[error("malformed environment blob: {0}")]
    Environment(String),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
