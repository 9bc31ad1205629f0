// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job-store endpoint parsing.
//!
//! Endpoints are backend-specific strings: a bare filesystem path, an
//! explicit `file:<path>`, or `aws:<region>:<namespace>` for an
//! object-store backend. Only the filesystem backend ships; `aws:`
//! endpoints parse but report an unsupported backend.

use crate::error::StoreError;
use crate::fs::FileJobStore;
use grove_core::WorkflowConfig;
use std::path::PathBuf;

/// A parsed job-store endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    File(PathBuf),
    Aws { region: String, namespace: String },
}

impl Endpoint {
    pub fn parse(endpoint: &str) -> Result<Self, StoreError> {
        if let Some(path) = endpoint.strip_prefix("file:") {
            return Ok(Self::File(PathBuf::from(path)));
        }
        if let Some(rest) = endpoint.strip_prefix("aws:") {
            let mut parts = rest.splitn(2, ':');
            return match (parts.next(), parts.next()) {
                (Some(region), Some(namespace)) if !region.is_empty() && !namespace.is_empty() => {
                    Ok(Self::Aws {
                        region: region.to_string(),
                        namespace: namespace.to_string(),
                    })
                }
                _ => Err(StoreError::UnsupportedEndpoint(endpoint.to_string())),
            };
        }
        Ok(Self::File(PathBuf::from(endpoint)))
    }
}

/// Bind to an existing store at the endpoint and run its recovery sweep.
pub fn open_job_store(endpoint: &str) -> Result<FileJobStore, StoreError> {
    match Endpoint::parse(endpoint)? {
        Endpoint::File(path) => FileJobStore::open(path),
        Endpoint::Aws { .. } => Err(StoreError::UnsupportedEndpoint(endpoint.to_string())),
    }
}

/// Create a new physical store at the endpoint.
pub fn create_job_store(
    endpoint: &str,
    config: WorkflowConfig,
) -> Result<FileJobStore, StoreError> {
    match Endpoint::parse(endpoint)? {
        Endpoint::File(path) => FileJobStore::create(path, config),
        Endpoint::Aws { .. } => Err(StoreError::UnsupportedEndpoint(endpoint.to_string())),
    }
}

#[cfg(test)]
#[path = "endpoint_tests.rs"]
mod tests;
