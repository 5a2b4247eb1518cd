// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for catalogd.
//!
//! This module provides the error taxonomy used by the reconciler:
//! - [`OperationError`] - a failure with a condition reason, surfaced on the Ready condition
//! - [`StoreError`] - configuration store (Kubernetes API) failures
//! - [`ReconcileError`] - everything a reconcile call can return; any variant
//!   makes the worker re-enqueue the key with backoff
//!
//! Broker errors live in [`crate::osb::OsbError`].

use crate::osb::OsbError;
use thiserror::Error;

/// A reconciliation failure that carries the reason to record on the Ready condition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct OperationError {
    /// CamelCase condition reason (see [`crate::status_reasons`])
    pub reason: String,
    /// Human-readable explanation
    pub message: String,
}

impl OperationError {
    pub fn new(reason: &str, message: impl Into<String>) -> Self {
        Self {
            reason: reason.to_string(),
            message: message.into(),
        }
    }
}

/// Errors returned by the configuration store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The write lost an optimistic-concurrency race (HTTP 409).
    #[error("conflict writing {kind} {key}: the object has been modified")]
    Conflict {
        /// Resource kind
        kind: String,
        /// `namespace/name` or `name`
        key: String,
    },

    /// The object does not exist.
    #[error("{kind} {key} not found")]
    NotFound {
        /// Resource kind
        kind: String,
        /// `namespace/name` or `name`
        key: String,
    },

    /// Conflicting status writes kept failing for the whole retry window.
    #[error("timed out retrying conflicting status update of {key}")]
    ConflictRetryTimeout {
        /// `namespace/name`
        key: String,
    },

    /// Any other Kubernetes API failure.
    #[error("Kubernetes API error: {0}")]
    Api(String),

    /// A stored object could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Everything a reconcile call can fail with.
///
/// Returning any of these makes the queue worker re-enqueue the key with backoff.
#[derive(Error, Debug)]
pub enum ReconcileError {
    /// Status was updated with the reason; retry this operation later.
    #[error(transparent)]
    Operation(#[from] OperationError),

    /// Reading or writing the configuration store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A broker client could not be built.
    #[error(transparent)]
    Broker(#[from] OsbError),

    /// The instance status violates an invariant the controller relies on.
    #[error("invariant violated: {0}")]
    Invariant(String),

    #[error("{0}")]
    Message(String),
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;
