// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The worker execution loop.
//!
//! One invocation serves one job record. The worker loads it, runs its
//! payload, and then — rather than returning to the leader — chains
//! into the sole successor whenever that successor could have been
//! dispatched to this very worker anyway: same-or-smaller resources, a
//! single predecessor, no pending joins. Chains are swallowed by
//! transplanting the successor's command and stack into the running
//! record, so a linear run of small jobs costs one worker dispatch.
//!
//! Any failure escapes to a single outer guard that annotates the store
//! (retry budget, captured log) and exits normally; the batch system
//! learns about failures from the store, not from exit codes.

use crate::capture::OutputCapture;
use crate::env::materialize_environment;
use crate::error::WorkerError;
use crate::failure::annotate_failure;
use crate::payload::{PayloadContext, PayloadError, PayloadRegistry, PayloadRun};
use crate::stats::{self, Measurements};
use grove_core::{JobId, JobRecord, PayloadDescriptor, Successor, WorkflowConfig};
use grove_store::JobStore;
use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::Command;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// How a worker invocation ended. All three exit the process with
/// status zero; `Failed` is reported through the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerOutcome {
    /// The record (and everything chained into it) finished and was
    /// deleted from the store.
    Completed,
    /// Work remains but must go back to the leader: a fan-out, a join,
    /// bigger resources, or an exhausted time budget.
    Yielded,
    /// The attempt failed and was annotated; the leader decides whether
    /// a retry remains.
    Failed,
}

/// Knobs for one worker invocation.
pub struct WorkerOptions {
    /// Redirect OS-level stdout/stderr into the worker log. The binary
    /// enables this; in-process tests keep their output.
    pub capture_output: bool,
    pub context: PayloadContext,
    pub registry: PayloadRegistry,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            capture_output: true,
            context: PayloadContext::default(),
            registry: PayloadRegistry::with_builtins(),
        }
    }
}

struct ChainRun {
    complete: bool,
    messages: Vec<String>,
}

/// Executes one job (plus whatever chains into it) against a store.
pub struct Worker<'a> {
    store: &'a dyn JobStore,
    options: WorkerOptions,
}

impl<'a> Worker<'a> {
    pub fn new(store: &'a dyn JobStore, options: WorkerOptions) -> Self {
        Self { store, options }
    }

    pub fn run(&mut self, job_id: &JobId) -> Result<WorkerOutcome, WorkerError> {
        let config = self.store.config().clone();
        materialize_environment(self.store, &mut self.options.context)?;

        // Scratch tree and worker log live in a fresh temp dir that is
        // removed however this invocation ends.
        let worker_dir = tempfile::tempdir()?;
        let scratch_dir = worker_dir.path().join("scratch");
        fs::create_dir_all(&scratch_dir)?;
        let log_path = worker_dir.path().join("worker.log");

        let capture = if self.options.capture_output {
            let capture = OutputCapture::redirect_to(&log_path)?;
            println!("---GROVE WORKER LOG---");
            let _ = std::io::stdout().flush();
            Some(capture)
        } else {
            None
        };

        let started = Instant::now();
        let (cpu_start, _) = stats::cpu_and_rss();

        let result = self.run_chain(job_id, &scratch_dir, started, &config);

        // Restore descriptors before any further store traffic so the
        // captured log is complete and later logging reaches the batch
        // system again.
        if let Some(capture) = capture {
            if let Err(e) = capture.restore() {
                warn!(error = %e, "failed to restore output descriptors");
            }
        }

        match result {
            Ok(chain) => {
                self.flush_stats(&config, started, cpu_start, &chain.messages)?;
                if chain.complete {
                    self.store.delete(job_id)?;
                    info!(job = %job_id, "job chain fully completed");
                    Ok(WorkerOutcome::Completed)
                } else {
                    info!(job = %job_id, "worker yielding to leader");
                    Ok(WorkerOutcome::Yielded)
                }
            }
            Err(error) => {
                warn!(job = %job_id, error = %error, "worker attempt failed");
                let mut log = fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&log_path)?;
                writeln!(log, "worker error: {error}")?;
                drop(log);

                annotate_failure(self.store, job_id, &log_path)?;
                Ok(WorkerOutcome::Failed)
            }
        }
    }

    fn run_chain(
        &self,
        job_id: &JobId,
        scratch_dir: &Path,
        started: Instant,
        config: &WorkflowConfig,
    ) -> Result<ChainRun, WorkerError> {
        let mut record = self.store.load(job_id)?;
        info!(job = %job_id, "loaded job record");

        // Cleanup from any earlier invocation. Successor groups whose
        // first member is gone were fully run and deleted by their own
        // workers; flush them off the stack.
        let mut changed = false;
        loop {
            let first = record
                .top_group()
                .and_then(|group| group.first())
                .map(|s| s.job_id.clone());
            match first {
                Some(id) if !self.store.exists(&id)? => {
                    record.pop_group();
                    changed = true;
                }
                _ => break,
            }
        }
        // A log left by a failed attempt is superseded by this retry.
        if let Some(log_id) = record.log_file_id.take() {
            match self.store.delete_file(&log_id) {
                Ok(()) => {}
                Err(e) if e.is_no_such_file() => {}
                Err(e) => return Err(e.into()),
            }
            changed = true;
        }
        if changed {
            self.store.update(&record)?;
        }

        let mut messages: Vec<String> = Vec::new();
        let job_time = Duration::from_secs(config.job_time);

        loop {
            match record.command.clone() {
                Some(command) => {
                    if PayloadDescriptor::is_payload_command(&command) {
                        let descriptor = PayloadDescriptor::parse(&command)
                            .map_err(|e| PayloadError::Malformed(e.to_string()))?;
                        let payload =
                            self.options
                                .registry
                                .load(self.store, &descriptor, &self.options.context)?;
                        let mut run = PayloadRun {
                            store: self.store,
                            record: &mut record,
                            scratch_dir,
                            default_memory: config.default_memory,
                            default_cpu: config.default_cpu,
                        };
                        let mut produced = payload.run(&mut run)?;
                        messages.append(&mut produced);
                    } else {
                        run_shell(&command)?;
                    }
                    // The command is consumed; checkpoint so the record
                    // on disk is a shell carrying only its successors.
                    record.command = None;
                    self.store.update(&record)?;
                }
                None => {
                    if !record.stack.is_empty() {
                        return Err(WorkerError::ShellWithSuccessors);
                    }
                    break;
                }
            }

            purge_dir(scratch_dir)?;

            if started.elapsed() > job_time {
                info!(job = %record.id, "wall-time budget exceeded, yielding");
                break;
            }
            let next = match record.top_group() {
                None => break,
                Some(group) if group.len() >= 2 => {
                    info!(
                        job = %record.id,
                        successors = group.len(),
                        "parallel fan-out, returning to leader"
                    );
                    break;
                }
                Some(group) => match group.first() {
                    Some(successor) => successor.clone(),
                    None => break,
                },
            };
            if next.memory > record.memory || next.cpu > record.cpu {
                info!(
                    job = %record.id,
                    successor = %next.job_id,
                    "successor needs more resources, returning to leader"
                );
                break;
            }
            if next.predecessor_id.is_some() {
                info!(
                    job = %record.id,
                    successor = %next.job_id,
                    "successor joins multiple parents, returning to leader"
                );
                break;
            }

            // Chain: swallow the successor into the running record, then
            // delete it; it is wholly incorporated here.
            record.pop_group();
            let successor = self.store.load(&next.job_id)?;
            verify_chain_target(&successor, &next)?;

            record.command = successor.command.clone();
            record.stack.extend(successor.stack.iter().cloned());
            record.jobs_to_delete = BTreeSet::from([successor.id.to_string()]);
            self.store.update(&record)?;
            self.store.delete(&successor.id)?;
            // The intent is spent once the delete lands; clear it so
            // later checkpoints don't persist a stale entry.
            record.jobs_to_delete.clear();
            info!(job = %record.id, successor = %successor.id, "chained into successor");
        }

        Ok(ChainRun {
            complete: record.is_complete(),
            messages,
        })
    }

    fn flush_stats(
        &self,
        config: &WorkflowConfig,
        started: Instant,
        cpu_start: f64,
        messages: &[String],
    ) -> Result<(), WorkerError> {
        if config.stats {
            let (cpu_now, max_rss_kib) = stats::cpu_and_rss();
            let measurements = Measurements {
                wall_seconds: started.elapsed().as_secs_f64(),
                cpu_seconds: (cpu_now - cpu_start).max(0.0),
                max_rss_kib,
            };
            let xml = stats::worker_record_xml(Some(measurements), messages)?;
            self.store.write_stats_and_logging(&xml)?;
        } else if !messages.is_empty() {
            let xml = stats::worker_record_xml(None, messages)?;
            self.store.write_stats_and_logging(&xml)?;
        }
        Ok(())
    }
}

/// Chain targets must exactly match their stack entry and must be
/// plain single-predecessor jobs that nothing else is waiting on.
fn verify_chain_target(successor: &JobRecord, entry: &Successor) -> Result<(), WorkerError> {
    let reason = if successor.memory != entry.memory {
        Some("memory differs from stack entry")
    } else if successor.cpu != entry.cpu {
        Some("cpu differs from stack entry")
    } else if successor.predecessor_number != 1 {
        Some("successor does not have exactly one predecessor")
    } else if !successor.predecessors_finished.is_empty() {
        Some("successor already has finished predecessors")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(WorkerError::SuccessorMismatch {
            id: successor.id.clone(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

fn run_shell(command: &str) -> Result<(), WorkerError> {
    let status = Command::new("sh").arg("-c").arg(command).status()?;
    if !status.success() {
        return Err(WorkerError::CommandFailed(status.to_string()));
    }
    Ok(())
}

/// Remove the contents of a directory, keeping the directory itself.
fn purge_dir(dir: &Path) -> std::io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            fs::remove_dir_all(entry.path())?;
        } else {
            fs::remove_file(entry.path())?;
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
