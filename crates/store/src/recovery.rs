// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recovery sweep run at store open.
//!
//! The spawn protocol persists intended-successor update IDs in the
//! parent's `jobs_to_delete` before creating the successors, and clears
//! them in the same update that links the successors in. A crash in
//! between leaves either nothing or provisionally-created records whose
//! linking update never committed; the sweep erases those and repairs
//! the survivors, so after it runs the parent looks as if the spawn was
//! never attempted.
//!
//! The sweep behaves as if run to fixed point: each phase enumerates
//! afresh, phase two only deletes, and phase three rewrites disjoint
//! records, so a second sweep finds nothing to do.

use crate::error::StoreError;
use crate::store::JobStore;
use std::collections::BTreeSet;
use tracing::debug;

/// What a sweep changed; all zeros for a clean store.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepStats {
    /// Provisionally-created records erased in phase two.
    pub orphans_deleted: usize,
    /// Surviving records rewritten in phase three.
    pub records_repaired: usize,
}

/// Reconcile partially-applied updates. Invoked by store construction;
/// callable directly against any handle for testing.
pub fn sweep(store: &dyn JobStore) -> Result<SweepStats, StoreError> {
    let mut stats = SweepStats::default();
    if !store.started()? {
        return Ok(stats);
    }

    // Phase 1: collate intents left by interrupted spawns.
    let mut orphan_updates: BTreeSet<String> = BTreeSet::new();
    for record in store.jobs()? {
        orphan_updates.extend(record.jobs_to_delete.iter().cloned());
    }

    // Phase 2: erase records whose creation was intended but whose
    // parent's linking update did not commit.
    if !orphan_updates.is_empty() {
        for record in store.jobs()? {
            if orphan_updates.contains(&record.update_id) {
                debug!(job = %record.id, update_id = %record.update_id, "deleting orphaned record");
                store.delete(&record.id)?;
                stats.orphans_deleted += 1;
            }
        }
    }

    // Phase 3: per-record cleanup of the survivors.
    for mut record in store.jobs()? {
        let mut changed = false;

        if !record.jobs_to_delete.is_empty() {
            record.jobs_to_delete.clear();
            changed = true;
        }

        // Drop stack groups whose successors have all completed (their
        // workers deleted them); shrink a partially-completed top group
        // to its surviving members and stop there.
        loop {
            let top = match record.top_group() {
                Some(group) if !group.is_empty() => group.clone(),
                _ => break,
            };
            let mut kept = Vec::with_capacity(top.len());
            for successor in &top {
                if store.exists(&successor.job_id)? {
                    kept.push(successor.clone());
                }
            }
            if kept.is_empty() {
                record.pop_group();
                changed = true;
                continue;
            }
            if kept.len() < top.len() {
                if let Some(group) = record.stack.last_mut() {
                    *group = kept;
                }
                changed = true;
            }
            break;
        }

        // A leftover log file belongs to an attempt that is being
        // retried; the field is cleared even if the file is gone.
        if let Some(log_id) = record.log_file_id.take() {
            match store.delete_file(&log_id) {
                Ok(()) => {}
                Err(e) if e.is_no_such_file() => {}
                Err(e) => return Err(e),
            }
            changed = true;
        }

        if changed {
            store.update(&record)?;
            stats.records_repaired += 1;
        }
    }

    Ok(stats)
}

#[cfg(test)]
#[path = "recovery_tests.rs"]
mod tests;
