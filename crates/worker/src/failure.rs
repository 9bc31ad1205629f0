// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Failure annotation.
//!
//! When a worker attempt fails, the record is reloaded fresh from the
//! store (the in-memory copy may hold half-applied chain state), its
//! retry budget is decremented, and the captured worker log is attached
//! so diagnostics survive into the next attempt. The leader reads a
//! budget of zero as permanent failure.

use crate::error::WorkerError;
use crate::stats::{truncate_to_tail, LOG_TAIL_BYTES};
use grove_core::{JobId, JobRecord};
use grove_store::JobStore;
use std::fs::File;
use std::io;
use std::path::Path;
use tracing::warn;

/// Annotate a failed attempt: decrement the retry budget and attach the
/// truncated worker log. Returns the persisted record.
pub fn annotate_failure(
    store: &dyn JobStore,
    job_id: &JobId,
    worker_log: &Path,
) -> Result<JobRecord, WorkerError> {
    let mut record = store.load(job_id)?;
    record.remaining_retry_count = record.remaining_retry_count.saturating_sub(1);

    truncate_to_tail(worker_log, LOG_TAIL_BYTES)?;
    let (mut writer, log_id) = store.write_file_stream(job_id)?;
    let mut log = File::open(worker_log)?;
    io::copy(&mut log, &mut writer)?;
    writer.commit()?;
    record.log_file_id = Some(log_id);

    store.update(&record)?;
    warn!(
        job = %job_id,
        remaining_retries = record.remaining_retry_count,
        "annotated failed worker attempt"
    );
    Ok(record)
}

#[cfg(test)]
#[path = "failure_tests.rs"]
mod tests;
