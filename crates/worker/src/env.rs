// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker environment materialization.
//!
//! The leader serializes its environment into the shared file
//! `environment.json` (a string-to-string JSON object); every worker
//! applies it at startup so user payloads run under the environment the
//! workflow was launched from. Machine-local keys are excluded, and the
//! payload search path picks up `GROVE_PAYLOAD_PATH` if present.

use crate::error::WorkerError;
use crate::payload::PayloadContext;
use grove_store::JobStore;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::debug;

/// Shared-file name of the serialized environment mapping.
pub const ENVIRONMENT_SHARED_FILE: &str = "environment.json";

/// Colon-separated directories appended to the payload search path.
pub const PAYLOAD_PATH_VAR: &str = "GROVE_PAYLOAD_PATH";

/// Keys that stay machine-local and are never overwritten.
const EXCLUDED_VARS: [&str; 4] = ["TMPDIR", "TMP", "HOSTNAME", "HOSTTYPE"];

/// Apply the shared environment blob to this process, extending the
/// payload search path from `GROVE_PAYLOAD_PATH`. A store without an
/// environment blob applies nothing.
///
/// Returns the number of variables applied.
pub fn materialize_environment(
    store: &dyn JobStore,
    context: &mut PayloadContext,
) -> Result<usize, WorkerError> {
    let reader = match store.read_shared_file_stream(ENVIRONMENT_SHARED_FILE) {
        Ok(reader) => reader,
        Err(e) if e.is_no_such_file() => {
            debug!("no environment blob in store");
            return Ok(0);
        }
        Err(e) => return Err(e.into()),
    };

    let environment: HashMap<String, String> =
        serde_json::from_reader(reader).map_err(|e| WorkerError::Environment(e.to_string()))?;

    let mut applied = 0;
    for (key, value) in &environment {
        if EXCLUDED_VARS.contains(&key.as_str()) {
            continue;
        }
        std::env::set_var(key, value);
        applied += 1;
    }

    if let Some(paths) = environment.get(PAYLOAD_PATH_VAR) {
        context
            .search_dirs
            .extend(paths.split(':').filter(|p| !p.is_empty()).map(PathBuf::from));
    }

    debug!(applied, "materialized worker environment");
    Ok(applied)
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
