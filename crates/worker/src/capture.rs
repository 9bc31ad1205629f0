// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scoped OS-level stdout/stderr capture.
//!
//! Redirecting the high-level streams is not enough: child processes
//! inherit file descriptors, not Rust handles. The capture duplicates
//! the original descriptors, points 1 and 2 at the worker log, and
//! restores the originals when the scope ends, so everything the worker
//! and its subprocesses print lands in the log.

use nix::unistd::{close, dup, dup2};
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::Path;
use thiserror::Error;

/// Errors raised while redirecting or restoring descriptors.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("descriptor operation failed: {0}")]
    Os(#[from] nix::Error),
}

/// Guard holding the original stdout/stderr descriptors.
///
/// Prefer the explicit `restore()`; the drop implementation restores
/// best-effort for the failure paths that unwind past it.
pub struct OutputCapture {
    saved_stdout: RawFd,
    saved_stderr: RawFd,
    restored: bool,
}

impl OutputCapture {
    /// Point descriptors 1 and 2 at `log_path` (append mode), saving the
    /// originals for restoration.
    pub fn redirect_to(log_path: &Path) -> Result<Self, CaptureError> {
        let log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;

        let saved_stdout = dup(io::stdout().as_raw_fd())?;
        let saved_stderr = dup(io::stderr().as_raw_fd())?;

        dup2(log.as_raw_fd(), io::stdout().as_raw_fd())?;
        dup2(log.as_raw_fd(), io::stderr().as_raw_fd())?;
        // `log` closes here; descriptors 1 and 2 keep the file open.

        Ok(Self {
            saved_stdout,
            saved_stderr,
            restored: false,
        })
    }

    /// Flush and put the original descriptors back.
    pub fn restore(mut self) -> Result<(), CaptureError> {
        self.restore_inner()
    }

    fn restore_inner(&mut self) -> Result<(), CaptureError> {
        if self.restored {
            return Ok(());
        }
        // Flush the Rust-level buffers into the log before swapping the
        // descriptors out from under them.
        let _ = io::stdout().flush();
        let _ = io::stderr().flush();

        dup2(self.saved_stdout, io::stdout().as_raw_fd())?;
        dup2(self.saved_stderr, io::stderr().as_raw_fd())?;
        close(self.saved_stdout)?;
        close(self.saved_stderr)?;
        self.restored = true;
        Ok(())
    }
}

impl Drop for OutputCapture {
    fn drop(&mut self) {
        let _ = self.restore_inner();
    }
}

#[cfg(test)]
#[path = "capture_tests.rs"]
mod tests;
