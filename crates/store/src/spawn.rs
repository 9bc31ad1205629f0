// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Crash-safe successor creation.
//!
//! Creating N successors from a running job proceeds in three ordered
//! steps: persist the intent (the successors' update IDs in the
//! parent's `jobs_to_delete`), create the successor records, then link
//! them in and clear the intent with a single parent update. A crash at
//! any point is resolved by the recovery sweep: committed successors
//! whose link never landed carry update IDs in the orphan set and are
//! deleted, so the parent ends up looking as if the spawn never started.
//! This is the only mechanism that makes create-then-link safe without
//! a multi-object transaction.

use crate::error::StoreError;
use crate::store::JobStore;
use grove_core::{JobRecord, Successor, SuccessorGroup};
use tracing::debug;

/// What to create for one successor of a group.
#[derive(Debug, Clone)]
pub struct SuccessorSpec {
    pub command: Option<String>,
    pub memory: u64,
    pub cpu: u64,
    /// Must be unique among in-flight spawns; matched against record
    /// `update_id`s during recovery.
    pub update_id: String,
    pub predecessor_number: u32,
}

/// Create one successor group for `parent` and push it onto the
/// parent's stack. A group of two or more is a parallel fan-out; a
/// singleton is a chain candidate.
///
/// Returns the created records in spec order.
pub fn spawn_successors(
    store: &dyn JobStore,
    parent: &mut JobRecord,
    specs: &[SuccessorSpec],
) -> Result<Vec<JobRecord>, StoreError> {
    if specs.is_empty() {
        return Ok(Vec::new());
    }

    // Step 1: persist the intent before any successor exists.
    parent.jobs_to_delete = specs.iter().map(|s| s.update_id.clone()).collect();
    store.update(parent)?;

    // Step 2: create the successors.
    let mut created = Vec::with_capacity(specs.len());
    for spec in specs {
        let record = store.create(
            spec.command.as_deref(),
            spec.memory,
            spec.cpu,
            &spec.update_id,
            spec.predecessor_number,
        )?;
        created.push(record);
    }

    // Step 3: link them in and clear the intent atomically.
    let group: SuccessorGroup = specs
        .iter()
        .zip(&created)
        .map(|(spec, record)| Successor {
            job_id: record.id.clone(),
            memory: spec.memory,
            cpu: spec.cpu,
            predecessor_id: (spec.predecessor_number >= 2).then(|| parent.id.clone()),
        })
        .collect();
    parent.push_group(group);
    parent.jobs_to_delete.clear();
    store.update(parent)?;

    debug!(parent = %parent.id, successors = created.len(), "spawned successor group");
    Ok(created)
}

#[cfg(test)]
#[path = "spawn_tests.rs"]
mod tests;
