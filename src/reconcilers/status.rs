// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Status condition helpers and conflict-retrying status writes.
//!
//! # Condition Format
//!
//! Conditions follow the Kubernetes conventions:
//! - `type`: `Ready`, `Failed` or `OrphanMitigation`
//! - `status`: "True", "False", or "Unknown"
//! - `reason`: A programmatic identifier (CamelCase)
//! - `message`: A human-readable explanation
//! - `lastTransitionTime`: RFC3339 timestamp of the last status change
//!
//! At most one condition of each type exists, and its transition time only
//! moves when its status changes.
//!
//! # Example
//!
//! ```rust,no_run
//! use catalogd::reconcilers::status::{find_condition, set_condition};
//!
//! let mut conditions = Vec::new();
//! set_condition(&mut conditions, "Ready", "False", "ProvisionRequestInFlight", "Provisioning");
//! assert_eq!(find_condition(&conditions, "Ready").unwrap().status, "False");
//! ```

use crate::constants::{
    CONDITION_STATUS_TRUE, STATUS_CONFLICT_RETRY_INTERVAL_MILLIS,
    STATUS_CONFLICT_RETRY_TIMEOUT_SECS,
};
use crate::crd::{Condition, ServiceInstance};
use crate::errors::StoreError;
use crate::metrics;
use crate::store::CatalogStore;
use chrono::Utc;
use kube::ResourceExt;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Create a new condition stamped with the current time.
#[must_use]
pub fn create_condition(
    condition_type: &str,
    status: &str,
    reason: &str,
    message: &str,
) -> Condition {
    Condition {
        r#type: condition_type.to_string(),
        status: status.to_string(),
        reason: Some(reason.to_string()),
        message: Some(message.to_string()),
        last_transition_time: Some(Utc::now().to_rfc3339()),
    }
}

/// Find a condition by type.
#[must_use]
pub fn find_condition<'a>(
    conditions: &'a [Condition],
    condition_type: &str,
) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.r#type == condition_type)
}

/// True when a condition of `condition_type` exists with status `True`.
#[must_use]
pub fn is_condition_true(conditions: &[Condition], condition_type: &str) -> bool {
    find_condition(conditions, condition_type).is_some_and(|c| c.status == CONDITION_STATUS_TRUE)
}

/// Set a condition in place, appending it when absent.
///
/// `lastTransitionTime` is reset only when the status changes; reason and
/// message are always overwritten.
pub fn set_condition(
    conditions: &mut Vec<Condition>,
    condition_type: &str,
    status: &str,
    reason: &str,
    message: &str,
) {
    let new_condition = create_condition(condition_type, status, reason, message);

    match conditions.iter_mut().find(|c| c.r#type == condition_type) {
        Some(existing) => {
            let last_transition_time = if existing.status == status {
                existing
                    .last_transition_time
                    .take()
                    .or(new_condition.last_transition_time)
            } else {
                debug!(
                    condition_type = condition_type,
                    from = %existing.status,
                    to = status,
                    "Condition status changed"
                );
                new_condition.last_transition_time
            };
            *existing = Condition {
                last_transition_time,
                ..new_condition
            };
        }
        None => conditions.push(new_condition),
    }
}

/// Remove every condition of `condition_type`.
pub fn remove_condition(conditions: &mut Vec<Condition>, condition_type: &str) {
    conditions.retain(|c| c.r#type != condition_type);
}

/// Write the instance status, retrying optimistic-concurrency conflicts.
///
/// On conflict the latest object is re-read, the local status is copied onto
/// it, `post_conflict` is applied (used to re-apply finalizer removal) and the
/// write is retried every 100ms for up to 10s.
///
/// # Errors
///
/// Returns [`StoreError::ConflictRetryTimeout`] when conflicts persist for the
/// whole window, [`StoreError::NotFound`] if the instance disappears, or any
/// other store error unchanged.
pub async fn update_status_with_retry<F>(
    store: &dyn CatalogStore,
    instance: &ServiceInstance,
    mut post_conflict: F,
) -> Result<ServiceInstance, StoreError>
where
    F: FnMut(&mut ServiceInstance) + Send,
{
    let namespace = instance.namespace().unwrap_or_default();
    let name = instance.name_any();
    let interval = Duration::from_millis(STATUS_CONFLICT_RETRY_INTERVAL_MILLIS);
    let deadline = Instant::now() + Duration::from_secs(STATUS_CONFLICT_RETRY_TIMEOUT_SECS);

    let mut attempt = instance.clone();
    loop {
        match store.update_instance_status(&attempt).await {
            Ok(updated) => return Ok(updated),
            Err(e) if e.is_conflict() => {
                metrics::record_status_conflict();
                if Instant::now() + interval > deadline {
                    warn!(
                        namespace = %namespace,
                        name = %name,
                        "Giving up on conflicting status update"
                    );
                    return Err(StoreError::ConflictRetryTimeout {
                        key: format!("{namespace}/{name}"),
                    });
                }
                debug!(
                    namespace = %namespace,
                    name = %name,
                    "Status update conflicted, retrying on the latest version"
                );
                tokio::time::sleep(interval).await;

                let Some(mut latest) = store.get_instance(&namespace, &name).await? else {
                    return Err(StoreError::NotFound {
                        kind: "ServiceInstance".to_string(),
                        key: format!("{namespace}/{name}"),
                    });
                };
                latest.status.clone_from(&instance.status);
                post_conflict(&mut latest);
                attempt = latest;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod status_tests;
