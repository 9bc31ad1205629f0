// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persisted job record: a node of the in-flight workflow DAG.

use crate::id::{FileId, JobId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One entry of a successor group: the successor's ID plus the resource
/// requirements and join marker the worker consults before chaining.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Successor {
    pub job_id: JobId,
    pub memory: u64,
    pub cpu: u64,
    /// Set when the successor joins two or more parents. A worker never
    /// chains into such a successor; the leader coordinates the join.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predecessor_id: Option<JobId>,
}

/// A set of successors that must all complete before the group below
/// them on the stack becomes runnable. Two or more members means a
/// parallel fan-out the leader must dispatch.
pub type SuccessorGroup = Vec<Successor>;

/// The atomic unit persisted by the job store.
///
/// Mutated only through `JobStore::update`; the store replaces the whole
/// record atomically, so observers never see a half-written state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    /// Primary key; unique and stable for the record's lifetime.
    pub id: JobId,
    /// Payload descriptor. Present means the job has work to run; absent
    /// means the record is a shell whose only remaining work is to
    /// unwind `stack`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    pub memory: u64,
    pub cpu: u64,
    /// Caller-supplied identifier, matched against `jobs_to_delete`
    /// intents during the recovery sweep.
    pub update_id: String,
    /// Ordered successor groups; the last element is the next to run.
    #[serde(default)]
    pub stack: Vec<SuccessorGroup>,
    /// Number of parent records that must complete before this record is
    /// ready (0 for roots).
    #[serde(default)]
    pub predecessor_number: u32,
    /// Parent IDs that have signaled completion. The record is ready when
    /// this reaches `predecessor_number`.
    #[serde(default)]
    pub predecessors_finished: BTreeSet<String>,
    /// Update IDs of records whose creation was intended but may not have
    /// been atomically observable; consumed by the recovery sweep.
    #[serde(default)]
    pub jobs_to_delete: BTreeSet<String>,
    /// Captured worker log of the most recent failed attempt; cleared on
    /// the next successful pre-execution cleanup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file_id: Option<FileId>,
    /// Remaining worker attempts; 0 means permanent failure.
    #[serde(default)]
    pub remaining_retry_count: u32,
}

impl JobRecord {
    /// Build a freshly-created record with the store's post-conditions:
    /// empty stack, no intents, no finished predecessors, no log.
    pub fn new(
        id: JobId,
        command: Option<String>,
        memory: u64,
        cpu: u64,
        update_id: impl Into<String>,
        predecessor_number: u32,
        remaining_retry_count: u32,
    ) -> Self {
        Self {
            id,
            command,
            memory,
            cpu,
            update_id: update_id.into(),
            stack: Vec::new(),
            predecessor_number,
            predecessors_finished: BTreeSet::new(),
            jobs_to_delete: BTreeSet::new(),
            log_file_id: None,
            remaining_retry_count,
        }
    }

    /// A record is ready when every required predecessor has finished.
    pub fn is_ready(&self) -> bool {
        self.predecessors_finished.len() as u32 == self.predecessor_number
    }

    /// The next group to run, if any.
    pub fn top_group(&self) -> Option<&SuccessorGroup> {
        self.stack.last()
    }

    pub fn push_group(&mut self, group: SuccessorGroup) {
        self.stack.push(group);
    }

    pub fn pop_group(&mut self) -> Option<SuccessorGroup> {
        self.stack.pop()
    }

    /// True once the command has been consumed and no successors remain:
    /// the job is fully complete and can be deleted.
    pub fn is_complete(&self) -> bool {
        self.command.is_none() && self.stack.is_empty()
    }
}

#[cfg(test)]
#[path = "record_tests.rs"]
mod tests;
