// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Kubernetes Event recording.
//!
//! Every condition reason the reconciler sets is also emitted as an Event
//! reason on the instance, visible via `kubectl describe serviceinstance`.
//!
//! Events are fire-and-forget: a failed publish is logged and never fails a
//! reconcile.

use crate::constants::CONTROLLER_NAME;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::Client;
use tracing::warn;

/// Action recorded on every event.
pub const EVENT_ACTION_RECONCILE: &str = "Reconcile";

/// Publishes events about reconciled objects.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish an event on `object`.
    ///
    /// # Arguments
    ///
    /// * `object` - The Kubernetes object this event is about
    /// * `type_` - Normal or Warning
    /// * `reason` - CamelCase reason, the same string used on conditions
    /// * `message` - Human-readable message
    async fn publish(&self, object: &ObjectReference, type_: EventType, reason: &str, message: &str);
}

/// Publisher backed by `kube::runtime::events::Recorder`.
pub struct KubeEventPublisher {
    recorder: Recorder,
}

impl KubeEventPublisher {
    #[must_use]
    pub fn new(client: Client) -> Self {
        let reporter = Reporter {
            controller: CONTROLLER_NAME.to_string(),
            instance: None,
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl EventPublisher for KubeEventPublisher {
    async fn publish(&self, object: &ObjectReference, type_: EventType, reason: &str, message: &str) {
        let event = Event {
            type_,
            reason: reason.to_string(),
            note: Some(message.to_string()),
            action: EVENT_ACTION_RECONCILE.to_string(),
            secondary: None,
        };
        if let Err(e) = self.recorder.publish(&event, object).await {
            warn!(
                reason,
                object = ?object.name,
                error = %e,
                "Failed to publish Kubernetes event"
            );
        }
    }
}
