// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Status transitions shared by the add, update, delete and poll paths.
//!
//! Every `process_*` function mutates the local status, emits the matching
//! events, writes the status and returns the reconcile outcome.

use super::{InstanceContext, NextAction};
use crate::constants::{
    CONDITION_STATUS_FALSE, CONDITION_STATUS_TRUE, CONDITION_STATUS_UNKNOWN,
    CONDITION_TYPE_FAILED, CONDITION_TYPE_ORPHAN_MITIGATION, CONDITION_TYPE_READY,
    FINALIZER_SERVICE_CATALOG,
};
use crate::crd::{
    DeprovisionStatus, PropertiesState, ProvisionStatus, ServiceInstance,
    ServiceInstanceOperation, ServiceInstanceStatus,
};
use crate::errors::{OperationError, ReconcileError};
use crate::reconcilers::status::{remove_condition, set_condition, update_status_with_retry};
use crate::status_reasons::{
    MESSAGE_DEPROVISIONED_SUCCESSFULLY, MESSAGE_DEPROVISIONING,
    MESSAGE_DEPROVISION_REQUEST_IN_FLIGHT, MESSAGE_INSTANCE_UPDATED_SUCCESSFULLY,
    MESSAGE_ORPHAN_MITIGATION_SUCCESSFUL, MESSAGE_PROVISIONED_SUCCESSFULLY, MESSAGE_PROVISIONING,
    MESSAGE_PROVISION_REQUEST_IN_FLIGHT, MESSAGE_STARTING_INSTANCE_ORPHAN_MITIGATION,
    MESSAGE_UPDATE_INSTANCE_REQUEST_IN_FLIGHT, MESSAGE_UPDATING_INSTANCE,
    REASON_DEPROVISIONED_SUCCESSFULLY, REASON_DEPROVISIONING,
    REASON_DEPROVISION_REQUEST_IN_FLIGHT, REASON_INSTANCE_UPDATED_SUCCESSFULLY,
    REASON_ORPHAN_MITIGATION_FAILED, REASON_ORPHAN_MITIGATION_SUCCESSFUL,
    REASON_PROVISIONED_SUCCESSFULLY, REASON_PROVISIONING, REASON_PROVISION_REQUEST_IN_FLIGHT,
    REASON_STARTING_INSTANCE_ORPHAN_MITIGATION, REASON_UPDATE_INSTANCE_REQUEST_IN_FLIGHT,
    REASON_UPDATING_INSTANCE,
};
use chrono::Utc;
use kube::runtime::events::EventType;
use tracing::{info, warn};

/// Status, reason and message of a condition about to be recorded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutcomeCondition {
    pub status: &'static str,
    pub reason: String,
    pub message: String,
}

impl OutcomeCondition {
    pub fn new(status: &'static str, reason: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            reason: reason.to_string(),
            message: message.into(),
        }
    }

    pub fn not_ready(reason: &str, message: impl Into<String>) -> Self {
        Self::new(CONDITION_STATUS_FALSE, reason, message)
    }

    pub fn unknown(reason: &str, message: impl Into<String>) -> Self {
        Self::new(CONDITION_STATUS_UNKNOWN, reason, message)
    }

    /// A `Failed=True` condition with the same reason and message.
    #[must_use]
    pub fn into_failed(self) -> Self {
        Self {
            status: CONDITION_STATUS_TRUE,
            ..self
        }
    }
}

/// The status of `instance`, created empty when absent.
pub fn status_mut(instance: &mut ServiceInstance) -> &mut ServiceInstanceStatus {
    instance.status.get_or_insert_with(ServiceInstanceStatus::default)
}

pub fn clear_current_operation(status: &mut ServiceInstanceStatus) {
    status.current_operation = None;
    status.operation_start_time = None;
    status.async_op_in_progress = false;
    status.orphan_mitigation_in_progress = false;
    status.last_operation = None;
    status.in_progress_properties = None;
}

pub fn clear_async_operation(status: &mut ServiceInstanceStatus) {
    status.async_op_in_progress = false;
    status.last_operation = None;
}

fn set_outcome(status: &mut ServiceInstanceStatus, condition_type: &str, c: &OutcomeCondition) {
    set_condition(
        &mut status.conditions,
        condition_type,
        c.status,
        &c.reason,
        &c.message,
    );
}

fn remove_finalizer(instance: &mut ServiceInstance) {
    if let Some(finalizers) = instance.metadata.finalizers.as_mut() {
        finalizers.retain(|f| f != FINALIZER_SERVICE_CATALOG);
    }
}

/// Write the status and drop the finalizer, re-applying the removal on conflict.
async fn write_removing_finalizer(
    ctx: &InstanceContext,
    instance: &mut ServiceInstance,
) -> Result<(), ReconcileError> {
    remove_finalizer(instance);
    let updated = update_status_with_retry(ctx.store.as_ref(), instance, remove_finalizer).await?;
    *instance = updated;
    Ok(())
}

/// Start `operation`: reset the status bookkeeping and mark the request in flight.
pub async fn record_operation_start(
    ctx: &InstanceContext,
    instance: &mut ServiceInstance,
    operation: ServiceInstanceOperation,
    in_progress: Option<PropertiesState>,
) -> Result<(), ReconcileError> {
    let (reason, message) = match operation {
        ServiceInstanceOperation::Provision => (
            REASON_PROVISION_REQUEST_IN_FLIGHT,
            MESSAGE_PROVISION_REQUEST_IN_FLIGHT,
        ),
        ServiceInstanceOperation::Update => (
            REASON_UPDATE_INSTANCE_REQUEST_IN_FLIGHT,
            MESSAGE_UPDATE_INSTANCE_REQUEST_IN_FLIGHT,
        ),
        ServiceInstanceOperation::Deprovision => (
            REASON_DEPROVISION_REQUEST_IN_FLIGHT,
            MESSAGE_DEPROVISION_REQUEST_IN_FLIGHT,
        ),
    };

    let status = status_mut(instance);
    clear_current_operation(status);
    status.current_operation = Some(operation);
    status.operation_start_time = Some(Utc::now().to_rfc3339());
    status.in_progress_properties = in_progress;
    if operation == ServiceInstanceOperation::Provision {
        status.deprovision_status = DeprovisionStatus::Required;
    }
    set_condition(
        &mut status.conditions,
        CONDITION_TYPE_READY,
        CONDITION_STATUS_FALSE,
        reason,
        message,
    );
    remove_condition(&mut status.conditions, CONDITION_TYPE_FAILED);

    info!(operation = %operation, "Starting operation");
    ctx.reset_polling(instance);
    ctx.update_status(instance).await
}

/// Surface an error returned before any broker call.
///
/// An [`OperationError`] is recorded on the Ready condition (Unknown while
/// deprovisioning) and as a warning event. The error is always returned.
pub async fn handle_reconciliation_error(
    ctx: &InstanceContext,
    instance: &mut ServiceInstance,
    err: ReconcileError,
) -> Result<NextAction, ReconcileError> {
    let ReconcileError::Operation(op) = err else {
        return Err(err);
    };

    let status = status_mut(instance);
    let condition_status = if status.current_operation == Some(ServiceInstanceOperation::Deprovision)
    {
        CONDITION_STATUS_UNKNOWN
    } else {
        CONDITION_STATUS_FALSE
    };
    set_condition(
        &mut status.conditions,
        CONDITION_TYPE_READY,
        condition_status,
        &op.reason,
        &op.message,
    );
    ctx.record_event(instance, EventType::Warning, &op.reason, &op.message)
        .await;
    ctx.update_status(instance).await?;
    Err(ReconcileError::Operation(op))
}

/// Record a retriable failure and return it as an error.
pub async fn process_operation_error(
    ctx: &InstanceContext,
    instance: &mut ServiceInstance,
    ready: OutcomeCondition,
) -> Result<NextAction, ReconcileError> {
    ctx.record_event(instance, EventType::Warning, &ready.reason, &ready.message)
        .await;
    set_outcome(status_mut(instance), CONDITION_TYPE_READY, &ready);
    ctx.update_status(instance).await?;
    Err(OperationError::new(&ready.reason, ready.message).into())
}

// ============================================================================
// Provision
// ============================================================================

pub async fn process_provision_success(
    ctx: &InstanceContext,
    instance: &mut ServiceInstance,
    dashboard_url: Option<String>,
) -> Result<NextAction, ReconcileError> {
    let status = status_mut(instance);
    if let Some(url) = dashboard_url.filter(|u| !u.is_empty()) {
        status.dashboard_url = Some(url);
    }
    set_condition(
        &mut status.conditions,
        CONDITION_TYPE_READY,
        CONDITION_STATUS_TRUE,
        REASON_PROVISIONED_SUCCESSFULLY,
        MESSAGE_PROVISIONED_SUCCESSFULLY,
    );
    status.external_properties = status.in_progress_properties.clone();
    clear_current_operation(status);
    status.provision_status = ProvisionStatus::Provisioned;
    status.reconciled_generation = status.observed_generation;
    status.deprovision_status = DeprovisionStatus::Required;

    ctx.update_status(instance).await?;
    ctx.clear_backoff(instance);
    ctx.record_event(
        instance,
        EventType::Normal,
        REASON_PROVISIONED_SUCCESSFULLY,
        MESSAGE_PROVISIONED_SUCCESSFULLY,
    )
    .await;
    info!("Provisioned ServiceInstance");
    Ok(NextAction::Done)
}

pub async fn process_provision_async(
    ctx: &InstanceContext,
    instance: &mut ServiceInstance,
    dashboard_url: Option<String>,
    operation_key: Option<String>,
) -> Result<NextAction, ReconcileError> {
    let status = status_mut(instance);
    if let Some(url) = dashboard_url.filter(|u| !u.is_empty()) {
        status.dashboard_url = Some(url);
    }
    status.last_operation = operation_key.filter(|k| !k.is_empty());
    set_condition(
        &mut status.conditions,
        CONDITION_TYPE_READY,
        CONDITION_STATUS_FALSE,
        REASON_PROVISIONING,
        MESSAGE_PROVISIONING,
    );
    status.async_op_in_progress = true;
    status.deprovision_status = DeprovisionStatus::Required;

    ctx.update_status(instance).await?;
    ctx.record_event(instance, EventType::Normal, REASON_PROVISIONING, MESSAGE_PROVISIONING)
        .await;
    Ok(NextAction::PollLater)
}

/// Record a failed provision.
///
/// With `failed` set and no mitigation the operation ends terminally.
/// Otherwise it stays current so that it is retried; with `mitigate` the
/// instance moves into orphan mitigation first.
pub async fn process_provision_failure(
    ctx: &InstanceContext,
    instance: &mut ServiceInstance,
    ready: OutcomeCondition,
    failed: Option<OutcomeCondition>,
    mitigate: bool,
) -> Result<NextAction, ReconcileError> {
    ctx.record_event(instance, EventType::Warning, &ready.reason, &ready.message)
        .await;
    set_outcome(status_mut(instance), CONDITION_TYPE_READY, &ready);

    if let Some(failed) = failed.as_ref() {
        ctx.record_event(instance, EventType::Warning, &failed.reason, &failed.message)
            .await;
        set_outcome(status_mut(instance), CONDITION_TYPE_FAILED, failed);
        ctx.clear_backoff(instance);
    }

    if mitigate {
        warn!(reason = %ready.reason, "Starting orphan mitigation");
        ctx.record_event(
            instance,
            EventType::Warning,
            REASON_STARTING_INSTANCE_ORPHAN_MITIGATION,
            MESSAGE_STARTING_INSTANCE_ORPHAN_MITIGATION,
        )
        .await;
        let status = status_mut(instance);
        set_condition(
            &mut status.conditions,
            CONDITION_TYPE_ORPHAN_MITIGATION,
            CONDITION_STATUS_TRUE,
            &ready.reason,
            &ready.message,
        );
        set_condition(
            &mut status.conditions,
            CONDITION_TYPE_READY,
            CONDITION_STATUS_FALSE,
            REASON_STARTING_INSTANCE_ORPHAN_MITIGATION,
            MESSAGE_STARTING_INSTANCE_ORPHAN_MITIGATION,
        );
        status.orphan_mitigation_in_progress = true;
        status.deprovision_status = DeprovisionStatus::Required;
    } else {
        status_mut(instance).deprovision_status = DeprovisionStatus::NotRequired;
    }

    let retry = failed.is_none() || mitigate;
    let status = status_mut(instance);
    if retry {
        clear_async_operation(status);
    } else {
        clear_current_operation(status);
    }
    ctx.update_status(instance).await?;

    if retry {
        Err(OperationError::new(&ready.reason, ready.message).into())
    } else {
        Ok(NextAction::Done)
    }
}

// ============================================================================
// Update
// ============================================================================

pub async fn process_update_success(
    ctx: &InstanceContext,
    instance: &mut ServiceInstance,
    dashboard_url: Option<String>,
) -> Result<NextAction, ReconcileError> {
    let status = status_mut(instance);
    if let Some(url) = dashboard_url.filter(|u| !u.is_empty()) {
        status.dashboard_url = Some(url);
    }
    set_condition(
        &mut status.conditions,
        CONDITION_TYPE_READY,
        CONDITION_STATUS_TRUE,
        REASON_INSTANCE_UPDATED_SUCCESSFULLY,
        MESSAGE_INSTANCE_UPDATED_SUCCESSFULLY,
    );
    status.external_properties = status.in_progress_properties.clone();
    clear_current_operation(status);
    status.reconciled_generation = status.observed_generation;

    ctx.update_status(instance).await?;
    ctx.clear_backoff(instance);
    ctx.record_event(
        instance,
        EventType::Normal,
        REASON_INSTANCE_UPDATED_SUCCESSFULLY,
        MESSAGE_INSTANCE_UPDATED_SUCCESSFULLY,
    )
    .await;
    info!("Updated ServiceInstance");
    Ok(NextAction::Done)
}

pub async fn process_update_async(
    ctx: &InstanceContext,
    instance: &mut ServiceInstance,
    dashboard_url: Option<String>,
    operation_key: Option<String>,
) -> Result<NextAction, ReconcileError> {
    let status = status_mut(instance);
    if let Some(url) = dashboard_url.filter(|u| !u.is_empty()) {
        status.dashboard_url = Some(url);
    }
    status.last_operation = operation_key.filter(|k| !k.is_empty());
    set_condition(
        &mut status.conditions,
        CONDITION_TYPE_READY,
        CONDITION_STATUS_FALSE,
        REASON_UPDATING_INSTANCE,
        MESSAGE_UPDATING_INSTANCE,
    );
    status.async_op_in_progress = true;

    ctx.update_status(instance).await?;
    ctx.record_event(
        instance,
        EventType::Normal,
        REASON_UPDATING_INSTANCE,
        MESSAGE_UPDATING_INSTANCE,
    )
    .await;
    Ok(NextAction::PollLater)
}

/// Record a retriable update failure; the update stays current.
pub async fn process_temporary_update_failure(
    ctx: &InstanceContext,
    instance: &mut ServiceInstance,
    ready: OutcomeCondition,
) -> Result<NextAction, ReconcileError> {
    ctx.record_event(instance, EventType::Warning, &ready.reason, &ready.message)
        .await;
    let status = status_mut(instance);
    set_outcome(status, CONDITION_TYPE_READY, &ready);
    clear_async_operation(status);
    ctx.update_status(instance).await?;
    Err(OperationError::new(&ready.reason, ready.message).into())
}

/// Record a terminal update failure; the update is abandoned.
pub async fn process_update_failure(
    ctx: &InstanceContext,
    instance: &mut ServiceInstance,
    ready: OutcomeCondition,
    failed: OutcomeCondition,
) -> Result<NextAction, ReconcileError> {
    ctx.record_event(instance, EventType::Warning, &ready.reason, &ready.message)
        .await;
    let status = status_mut(instance);
    set_outcome(status, CONDITION_TYPE_READY, &ready);
    set_outcome(status, CONDITION_TYPE_FAILED, &failed);
    clear_current_operation(status);
    ctx.update_status(instance).await?;
    ctx.clear_backoff(instance);
    Ok(NextAction::Done)
}

// ============================================================================
// Deprovision
// ============================================================================

/// Drop the finalizer of an instance that needs no deprovision.
pub async fn process_graceful_deletion_success(
    ctx: &InstanceContext,
    instance: &mut ServiceInstance,
) -> Result<NextAction, ReconcileError> {
    write_removing_finalizer(ctx, instance).await?;
    ctx.clear_backoff(instance);
    info!("Cleared finalizer");
    Ok(NextAction::Done)
}

/// Leave orphan mitigation when there is nothing left to deprovision.
///
/// The finalizer stays: the instance itself is not being deleted.
pub async fn end_orphan_mitigation(
    ctx: &InstanceContext,
    instance: &mut ServiceInstance,
) -> Result<NextAction, ReconcileError> {
    let status = status_mut(instance);
    status.orphan_mitigation_in_progress = false;
    remove_condition(&mut status.conditions, CONDITION_TYPE_ORPHAN_MITIGATION);
    ctx.update_status(instance).await?;
    Ok(NextAction::Done)
}

pub async fn process_deprovision_success(
    ctx: &InstanceContext,
    instance: &mut ServiceInstance,
) -> Result<NextAction, ReconcileError> {
    let deleting = instance.metadata.deletion_timestamp.is_some();
    let status = status_mut(instance);
    let (reason, message) = if status.orphan_mitigation_in_progress {
        status.orphan_mitigation_in_progress = false;
        remove_condition(&mut status.conditions, CONDITION_TYPE_ORPHAN_MITIGATION);
        (
            REASON_ORPHAN_MITIGATION_SUCCESSFUL,
            MESSAGE_ORPHAN_MITIGATION_SUCCESSFUL,
        )
    } else {
        (
            REASON_DEPROVISIONED_SUCCESSFULLY,
            MESSAGE_DEPROVISIONED_SUCCESSFULLY,
        )
    };
    set_condition(
        &mut status.conditions,
        CONDITION_TYPE_READY,
        CONDITION_STATUS_FALSE,
        reason,
        message,
    );
    clear_current_operation(status);
    status.external_properties = None;
    status.provision_status = ProvisionStatus::NotProvisioned;
    status.deprovision_status = DeprovisionStatus::Succeeded;

    if deleting {
        write_removing_finalizer(ctx, instance).await?;
        ctx.clear_backoff(instance);
    } else {
        ctx.update_status(instance).await?;
    }
    ctx.record_event(instance, EventType::Normal, reason, message)
        .await;
    info!(reason, "Deprovisioned ServiceInstance");
    Ok(NextAction::Done)
}

pub async fn process_deprovision_async(
    ctx: &InstanceContext,
    instance: &mut ServiceInstance,
    operation_key: Option<String>,
) -> Result<NextAction, ReconcileError> {
    let status = status_mut(instance);
    status.last_operation = operation_key.filter(|k| !k.is_empty());
    set_condition(
        &mut status.conditions,
        CONDITION_TYPE_READY,
        CONDITION_STATUS_FALSE,
        REASON_DEPROVISIONING,
        MESSAGE_DEPROVISIONING,
    );
    status.async_op_in_progress = true;

    ctx.update_status(instance).await?;
    ctx.record_event(
        instance,
        EventType::Normal,
        REASON_DEPROVISIONING,
        MESSAGE_DEPROVISIONING,
    )
    .await;
    Ok(NextAction::PollLater)
}

/// Record a terminal deprovision failure. The finalizer stays in place.
pub async fn process_deprovision_failure(
    ctx: &InstanceContext,
    instance: &mut ServiceInstance,
    ready: Option<OutcomeCondition>,
    failed: OutcomeCondition,
) -> Result<NextAction, ReconcileError> {
    let mitigating = instance
        .status
        .as_ref()
        .is_some_and(|s| s.orphan_mitigation_in_progress);
    let failed = if mitigating {
        OutcomeCondition {
            reason: REASON_ORPHAN_MITIGATION_FAILED.to_string(),
            message: format!("Orphan mitigation failed: {}", failed.message),
            ..failed
        }
    } else {
        failed
    };

    if let Some(ready) = ready.as_ref() {
        ctx.record_event(instance, EventType::Warning, &ready.reason, &ready.message)
            .await;
        set_outcome(status_mut(instance), CONDITION_TYPE_READY, ready);
    }
    ctx.record_event(instance, EventType::Warning, &failed.reason, &failed.message)
        .await;

    let status = status_mut(instance);
    set_outcome(status, CONDITION_TYPE_FAILED, &failed);
    if mitigating {
        remove_condition(&mut status.conditions, CONDITION_TYPE_ORPHAN_MITIGATION);
    }
    clear_current_operation(status);
    status.deprovision_status = DeprovisionStatus::Failed;

    ctx.update_status(instance).await?;
    Ok(NextAction::Done)
}
