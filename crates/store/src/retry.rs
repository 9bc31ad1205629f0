// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded retry for transient backend I/O.

use std::io;
use std::thread;
use std::time::Duration;
use tracing::warn;

/// Attempts per operation, including the first.
const MAX_ATTEMPTS: u32 = 3;

/// Base backoff between attempts; scales linearly with the attempt number.
const BACKOFF: Duration = Duration::from_millis(50);

/// Run an I/O operation, retrying errors judged transient.
///
/// Non-transient errors and the final failed attempt propagate unchanged.
pub(crate) fn with_retries<T>(
    what: &str,
    mut op: impl FnMut() -> io::Result<T>,
) -> io::Result<T> {
    let mut attempt = 1;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(e) if attempt < MAX_ATTEMPTS && is_transient(&e) => {
                warn!(operation = what, attempt, error = %e, "transient backend error, retrying");
                thread::sleep(BACKOFF * attempt);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
