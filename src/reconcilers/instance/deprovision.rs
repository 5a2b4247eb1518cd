// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! The delete path: deprovision a deleted instance, or mitigate a possibly
//! orphaned resource after an ambiguous provision failure.
//!
//! The finalizer is only removed while the instance is being deleted, and
//! only once the broker holds nothing more for it.

use super::requests::{deprovision_request, originating_identity, resolve_class_and_broker};
use super::transitions::{
    end_orphan_mitigation, handle_reconciliation_error, process_deprovision_async,
    process_deprovision_failure, process_deprovision_success, process_graceful_deletion_success,
    process_operation_error, record_operation_start, status_mut, OutcomeCondition,
};
use super::{bump_observed_generation, has_finalizer, InstanceContext, NextAction};
use crate::constants::{CONDITION_STATUS_TRUE, CONDITION_TYPE_ORPHAN_MITIGATION};
use crate::crd::{DeprovisionStatus, PropertiesState, ServiceInstance, ServiceInstanceOperation};
use crate::errors::{OperationError, ReconcileError};
use crate::reconcilers::status::remove_condition;
use crate::status_reasons::{
    MESSAGE_DEPROVISION_BLOCKED_BY_EXISTING_CREDENTIALS, MESSAGE_RECONCILIATION_RETRY_TIMEOUT,
    REASON_DEPROVISION_BLOCKED_BY_EXISTING_CREDENTIALS, REASON_DEPROVISION_CALL_FAILED,
    REASON_ERROR_RECONCILIATION_RETRY_TIMEOUT, REASON_INVALID_DEPROVISION_STATUS,
};
use chrono::Utc;
use kube::ResourceExt;
use tracing::{debug, info};

/// Properties the deprovision request is built from.
fn deprovision_properties(instance: &ServiceInstance) -> Option<PropertiesState> {
    let status = instance.status.as_ref()?;
    status
        .in_progress_properties
        .clone()
        .or_else(|| status.external_properties.clone())
}

/// Fails when a `ServiceBinding` in the namespace still references the instance.
async fn check_existing_bindings(
    ctx: &InstanceContext,
    instance: &ServiceInstance,
) -> Result<(), ReconcileError> {
    let namespace = instance.namespace().unwrap_or_default();
    let name = instance.name_any();
    let bindings = ctx.store.list_bindings(&namespace).await?;
    if bindings.iter().any(|b| b.spec.instance_ref.name == name) {
        return Err(OperationError::new(
            REASON_DEPROVISION_BLOCKED_BY_EXISTING_CREDENTIALS,
            MESSAGE_DEPROVISION_BLOCKED_BY_EXISTING_CREDENTIALS,
        )
        .into());
    }
    Ok(())
}

/// Deprovision a deleted instance or run orphan mitigation.
///
/// # Errors
///
/// Returns an error for every failure that must be retried.
pub async fn reconcile_delete(
    ctx: &InstanceContext,
    mut instance: ServiceInstance,
) -> Result<NextAction, ReconcileError> {
    let instance = &mut instance;
    if !has_finalizer(instance) {
        return Ok(NextAction::Done);
    }
    let deleting = instance.metadata.deletion_timestamp.is_some();
    let status = instance.status.clone().unwrap_or_default();

    match &status.deprovision_status {
        DeprovisionStatus::Failed => {
            debug!("Deprovision failed terminally, leaving the finalizer in place");
            return Ok(NextAction::Done);
        }
        DeprovisionStatus::NotRequired | DeprovisionStatus::Succeeded => {
            if deleting {
                return process_graceful_deletion_success(ctx, instance).await;
            }
            return end_orphan_mitigation(ctx, instance).await;
        }
        DeprovisionStatus::Unrecognized(value) => {
            let message = format!("ServiceInstance has invalid DeprovisionStatus field: {value}");
            let ready = OutcomeCondition::unknown(REASON_INVALID_DEPROVISION_STATUS, message.clone());
            let failed = OutcomeCondition::new(
                CONDITION_STATUS_TRUE,
                REASON_INVALID_DEPROVISION_STATUS,
                message,
            );
            return process_deprovision_failure(ctx, instance, Some(ready), failed).await;
        }
        DeprovisionStatus::Required => {}
    }

    if deleting && !status.orphan_mitigation_in_progress {
        bump_observed_generation(instance);
    }
    if let Err(e) = check_existing_bindings(ctx, instance).await {
        return handle_reconciliation_error(ctx, instance, e).await;
    }

    let catalog = match resolve_class_and_broker(ctx, instance).await {
        Ok(catalog) => catalog,
        Err(e) => return handle_reconciliation_error(ctx, instance, e).await,
    };
    let identity = match originating_identity(ctx, instance) {
        Ok(identity) => identity,
        Err(e) => return handle_reconciliation_error(ctx, instance, e).await,
    };
    let request = deprovision_request(instance, &catalog.class, identity)?;

    if deleting {
        if status.current_operation != Some(ServiceInstanceOperation::Deprovision) {
            let properties = deprovision_properties(instance);
            let status = status_mut(instance);
            if status.orphan_mitigation_in_progress {
                status.orphan_mitigation_in_progress = false;
                remove_condition(&mut status.conditions, CONDITION_TYPE_ORPHAN_MITIGATION);
            }
            record_operation_start(
                ctx,
                instance,
                ServiceInstanceOperation::Deprovision,
                properties,
            )
            .await?;
            return Ok(NextAction::Done);
        }
    } else {
        let status = status_mut(instance);
        if status.operation_start_time.is_none() {
            status.operation_start_time = Some(Utc::now().to_rfc3339());
        }
    }

    info!(
        broker = %catalog.broker.name,
        orphan_mitigation = !deleting,
        "Deprovisioning ServiceInstance"
    );
    let err = match catalog.client.deprovision_instance(&request).await {
        Ok(response) if response.is_async => {
            return process_deprovision_async(ctx, instance, response.operation_key).await;
        }
        Ok(_) => return process_deprovision_success(ctx, instance).await,
        Err(e) => e,
    };

    let message = if err.http_status().is_some() {
        format!("Deprovision call failed; received error response from broker: {err}")
    } else {
        format!(
            "Error deprovisioning, {} {} at {} {:?}: {err}",
            catalog.scope.class_kind(),
            catalog.class,
            catalog.scope.broker_kind(),
            catalog.broker.name
        )
    };
    let ready = OutcomeCondition::unknown(REASON_DEPROVISION_CALL_FAILED, message);
    if ctx.retry_window_exceeded(instance) {
        let failed = OutcomeCondition::new(
            CONDITION_STATUS_TRUE,
            REASON_ERROR_RECONCILIATION_RETRY_TIMEOUT,
            MESSAGE_RECONCILIATION_RETRY_TIMEOUT,
        );
        return process_deprovision_failure(ctx, instance, Some(ready), failed).await;
    }
    process_operation_error(ctx, instance, ready).await
}
