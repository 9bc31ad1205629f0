// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Structured payload command encoding.
//!
//! A job's `command` is either an opaque shell command or a structured
//! payload reference. Structured payloads are encoded as space-separated
//! tokens behind a fixed marker:
//!
//! `payload <kind> <fileId> [<param>…]`
//!
//! where `kind` selects a constructor from the worker's payload registry
//! and `fileId` names the per-job file whose bytes reconstruct the
//! executable unit.

use crate::id::FileId;
use thiserror::Error;

/// First token of a structured payload command.
pub const PAYLOAD_MARKER: &str = "payload";

/// Errors raised while decoding a structured payload command.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayloadParseError {
    #[error("not a structured payload command")]
    NotAPayload,
    #[error("payload command is missing the {0} token")]
    MissingToken(&'static str),
}

/// Decoded form of a structured payload command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadDescriptor {
    /// Registry key identifying how to reconstruct the payload.
    pub kind: String,
    /// Per-job file holding the serialized payload.
    pub file_id: FileId,
    /// Free-form parameters handed to the payload constructor.
    pub params: Vec<String>,
}

impl PayloadDescriptor {
    pub fn new(kind: impl Into<String>, file_id: FileId) -> Self {
        Self {
            kind: kind.into(),
            file_id,
            params: Vec::new(),
        }
    }

    pub fn with_params(mut self, params: Vec<String>) -> Self {
        self.params = params;
        self
    }

    /// True if the command carries the structured payload marker.
    pub fn is_payload_command(command: &str) -> bool {
        command
            .split_whitespace()
            .next()
            .is_some_and(|tok| tok == PAYLOAD_MARKER)
    }

    /// Decode a structured payload command.
    pub fn parse(command: &str) -> Result<Self, PayloadParseError> {
        let mut tokens = command.split_whitespace();
        if tokens.next() != Some(PAYLOAD_MARKER) {
            return Err(PayloadParseError::NotAPayload);
        }
        let kind = tokens
            .next()
            .ok_or(PayloadParseError::MissingToken("kind"))?;
        let file_id = tokens
            .next()
            .ok_or(PayloadParseError::MissingToken("file id"))?;
        Ok(Self {
            kind: kind.to_string(),
            file_id: FileId::new(file_id),
            params: tokens.map(str::to_string).collect(),
        })
    }

    /// Encode back into command-string form.
    pub fn encode(&self) -> String {
        let mut command = format!("{} {} {}", PAYLOAD_MARKER, self.kind, self.file_id);
        for param in &self.params {
            command.push(' ');
            command.push_str(param);
        }
        command
    }
}

#[cfg(test)]
#[path = "payload_tests.rs"]
mod tests;
