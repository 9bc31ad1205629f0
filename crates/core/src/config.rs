// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow configuration, stored as the shared file `config.xml`.
//!
//! The configuration is written once when a store is created and read by
//! every worker at startup. It travels as a single XML element with
//! attribute-encoded fields:
//!
//! `<config try_count="2" job_time="3600" default_memory="..." .../>`

use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};
use std::str::FromStr;
use thiserror::Error;

/// Shared-file name under which the configuration is persisted.
pub const CONFIG_SHARED_FILE: &str = "config.xml";

/// Errors raised while encoding or decoding the configuration element.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("malformed config XML: {0}")]
    Xml(String),
    #[error("no <config> element found")]
    MissingElement,
    #[error("invalid value for {name}: {value:?}")]
    InvalidAttribute { name: &'static str, value: String },
}

/// Workflow-wide settings consulted by the store and the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowConfig {
    /// Worker attempts granted to each new job (`remaining_retry_count` seed).
    pub try_count: u32,
    /// Per-worker wall-time budget in seconds; checked between chain
    /// iterations, never mid-payload.
    pub job_time: u64,
    /// Default memory requirement handed to payloads that spawn successors.
    pub default_memory: u64,
    /// Default CPU requirement handed to payloads that spawn successors.
    pub default_cpu: u64,
    /// Worker log level (`error`, `warn`, `info`, `debug`, `trace`).
    pub log_level: String,
    /// When set, workers flush a stats record to the sink at exit.
    pub stats: bool,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            try_count: 1,
            job_time: 3600,
            default_memory: 2 * 1024 * 1024 * 1024,
            default_cpu: 1,
            log_level: "info".to_string(),
            stats: false,
        }
    }
}

impl WorkflowConfig {
    /// Encode as a single empty `<config .../>` element.
    pub fn to_xml(&self) -> Result<Vec<u8>, ConfigError> {
        let mut writer = Writer::new(Vec::new());

        let try_count = self.try_count.to_string();
        let job_time = self.job_time.to_string();
        let default_memory = self.default_memory.to_string();
        let default_cpu = self.default_cpu.to_string();

        let mut elem = BytesStart::new("config");
        elem.push_attribute(("try_count", try_count.as_str()));
        elem.push_attribute(("job_time", job_time.as_str()));
        elem.push_attribute(("default_memory", default_memory.as_str()));
        elem.push_attribute(("default_cpu", default_cpu.as_str()));
        elem.push_attribute(("log_level", self.log_level.as_str()));
        if self.stats {
            elem.push_attribute(("stats", "1"));
        }

        writer
            .write_event(Event::Empty(elem))
            .map_err(|e| ConfigError::Xml(e.to_string()))?;
        Ok(writer.into_inner())
    }

    /// Decode from the first `<config>` element in the input.
    ///
    /// Unknown attributes are ignored; missing attributes keep their
    /// defaults. The `stats` attribute toggles by presence, matching the
    /// worker-exit contract.
    pub fn from_xml(bytes: &[u8]) -> Result<Self, ConfigError> {
        let text = std::str::from_utf8(bytes).map_err(|e| ConfigError::Xml(e.to_string()))?;
        let mut reader = Reader::from_str(text);

        loop {
            match reader
                .read_event()
                .map_err(|e| ConfigError::Xml(e.to_string()))?
            {
                Event::Empty(elem) | Event::Start(elem) if elem.name().as_ref() == b"config" => {
                    let mut config = Self::default();
                    for attr in elem.attributes() {
                        let attr = attr.map_err(|e| ConfigError::Xml(e.to_string()))?;
                        let value = attr
                            .unescape_value()
                            .map_err(|e| ConfigError::Xml(e.to_string()))?;
                        match attr.key.as_ref() {
                            b"try_count" => config.try_count = parse_attr("try_count", &value)?,
                            b"job_time" => config.job_time = parse_attr("job_time", &value)?,
                            b"default_memory" => {
                                config.default_memory = parse_attr("default_memory", &value)?;
                            }
                            b"default_cpu" => {
                                config.default_cpu = parse_attr("default_cpu", &value)?;
                            }
                            b"log_level" => config.log_level = value.into_owned(),
                            b"stats" => config.stats = true,
                            _ => {}
                        }
                    }
                    return Ok(config);
                }
                Event::Eof => return Err(ConfigError::MissingElement),
                _ => {}
            }
        }
    }
}

fn parse_attr<T: FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidAttribute {
        name,
        value: value.to_string(),
    })
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
