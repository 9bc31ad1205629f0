// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker stats records and log truncation.
//!
//! At exit a worker flushes a `<worker time=".." clock=".." memory="..">`
//! element into the store's stats sink, with one `<message>` child per
//! user-level log line. When stats are disabled but messages exist, the
//! element carries only the messages.

use nix::sys::resource::{getrusage, UsageWho};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::fs::{self, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Captured worker logs are truncated to this many trailing bytes
/// before upload.
pub const LOG_TAIL_BYTES: u64 = 50_000;

/// Resource figures measured across one worker invocation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurements {
    pub wall_seconds: f64,
    pub cpu_seconds: f64,
    pub max_rss_kib: i64,
}

/// Total CPU seconds (user + system, self + children) and peak RSS.
///
/// Children are included so chained subprocess payloads are accounted
/// for. Returns zeros if the platform refuses the query.
pub fn cpu_and_rss() -> (f64, i64) {
    let mut cpu = 0.0;
    let mut max_rss = 0;
    for who in [UsageWho::RUSAGE_SELF, UsageWho::RUSAGE_CHILDREN] {
        if let Ok(usage) = getrusage(who) {
            let user = usage.user_time();
            let system = usage.system_time();
            cpu += user.tv_sec() as f64
                + user.tv_usec() as f64 / 1e6
                + system.tv_sec() as f64
                + system.tv_usec() as f64 / 1e6;
            max_rss = max_rss.max(usage.max_rss() as i64);
        }
    }
    (cpu, max_rss)
}

/// Build the `<worker>` stats element. Measurements are omitted when
/// stats collection is disabled and only messages need reporting.
pub fn worker_record_xml(
    measurements: Option<Measurements>,
    messages: &[String],
) -> io::Result<Vec<u8>> {
    let mut writer = Writer::new(Vec::new());

    let mut worker = BytesStart::new("worker");
    let formatted;
    if let Some(m) = measurements {
        formatted = (
            format!("{:.3}", m.wall_seconds),
            format!("{:.3}", m.cpu_seconds),
            m.max_rss_kib.to_string(),
        );
        worker.push_attribute(("time", formatted.0.as_str()));
        worker.push_attribute(("clock", formatted.1.as_str()));
        worker.push_attribute(("memory", formatted.2.as_str()));
    }
    writer
        .write_event(Event::Start(worker))
        .map_err(into_io_error)?;

    writer
        .write_event(Event::Start(BytesStart::new("messages")))
        .map_err(into_io_error)?;
    for message in messages {
        writer
            .write_event(Event::Start(BytesStart::new("message")))
            .map_err(into_io_error)?;
        writer
            .write_event(Event::Text(BytesText::new(message)))
            .map_err(into_io_error)?;
        writer
            .write_event(Event::End(BytesEnd::new("message")))
            .map_err(into_io_error)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new("messages")))
        .map_err(into_io_error)?;

    writer
        .write_event(Event::End(BytesEnd::new("worker")))
        .map_err(into_io_error)?;
    Ok(writer.into_inner())
}

fn into_io_error(e: impl std::fmt::Display) -> io::Error {
    io::Error::other(e.to_string())
}

/// Truncate a file in place to its trailing `max_bytes` bytes.
pub fn truncate_to_tail(path: &Path, max_bytes: u64) -> io::Result<()> {
    let len = fs::metadata(path)?.len();
    if len <= max_bytes {
        return Ok(());
    }

    let mut file = OpenOptions::new().read(true).write(true).open(path)?;
    file.seek(SeekFrom::Start(len - max_bytes))?;
    let mut tail = Vec::with_capacity(max_bytes as usize);
    file.read_to_end(&mut tail)?;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(&tail)?;
    file.set_len(tail.len() as u64)?;
    Ok(())
}

#[cfg(test)]
#[path = "stats_tests.rs"]
mod tests;
