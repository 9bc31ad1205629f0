// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Grove worker binary (grovew)
//!
//! Launched by the batch system with a payload search directory, a job
//! store endpoint, and a single job store ID. Exits zero whether the
//! job completed, yielded, or failed-and-was-annotated; a nonzero exit
//! means the worker itself could not run (bad arguments, unreachable
//! store).

use grove_core::JobId;
use grove_store::{open_job_store, JobStore};
use grove_worker::{PayloadContext, PayloadRegistry, Worker, WorkerOptions};
use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();

    if let Some(first) = args.first() {
        match first.as_str() {
            "--version" | "-V" | "-v" => {
                println!("grovew {}", env!("CARGO_PKG_VERSION"));
                return ExitCode::SUCCESS;
            }
            "--help" | "-h" | "help" => {
                println!("grovew {}", env!("CARGO_PKG_VERSION"));
                println!("Grove worker - runs one job from a job store, chaining where it can");
                println!();
                println!("USAGE:");
                println!("    grovew <payloadSearchDir> <jobStoreEndpoint> <jobStoreID>");
                println!();
                println!("The worker is launched by the batch system on behalf of the");
                println!("leader and should not normally be invoked by hand.");
                println!();
                println!("OPTIONS:");
                println!("    -h, --help       Print help information");
                println!("    -v, --version    Print version information");
                return ExitCode::SUCCESS;
            }
            _ => {}
        }
    }

    let [payload_dir, endpoint, job_id] = match <[String; 3]>::try_from(args) {
        Ok(args) => args,
        Err(args) => {
            eprintln!("error: expected 3 arguments, got {}", args.len());
            eprintln!("Usage: grovew <payloadSearchDir> <jobStoreEndpoint> <jobStoreID>");
            return ExitCode::from(2);
        }
    };

    let store = match open_job_store(&endpoint) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("error: failed to open job store '{endpoint}': {e}");
            return ExitCode::FAILURE;
        }
    };

    setup_logging(&store.config().log_level);

    let options = WorkerOptions {
        capture_output: true,
        context: PayloadContext {
            search_dirs: vec![PathBuf::from(payload_dir)],
        },
        registry: PayloadRegistry::with_builtins(),
    };
    let mut worker = Worker::new(&store, options);

    match worker.run(&JobId::new(job_id.clone())) {
        Ok(outcome) => {
            tracing::info!(job = %job_id, ?outcome, "worker finished");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: worker failed internally: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Log to stderr at the configured level. While output capture is
/// active, stderr lands in the worker log; afterwards it reaches the
/// batch system again.
fn setup_logging(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
