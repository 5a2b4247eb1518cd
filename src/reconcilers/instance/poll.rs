// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! The poll path: follow an asynchronous broker operation to completion.
//!
//! The operation being polled is derived from the status:
//!
//! - orphan mitigation or `currentOperation=Deprovision` polls a deprovision
//! - `currentOperation=Provision` polls a provision
//! - anything else polls an update

use super::requests::{
    last_operation_request, lookup_plan, originating_identity, resolve_class_and_broker,
};
use super::transitions::{
    clear_async_operation, handle_reconciliation_error, process_deprovision_failure,
    process_deprovision_success, process_provision_failure, process_provision_success,
    process_temporary_update_failure, process_update_failure, process_update_success, status_mut,
    OutcomeCondition,
};
use super::{InstanceContext, NextAction};
use crate::constants::{CONDITION_STATUS_FALSE, CONDITION_STATUS_UNKNOWN, CONDITION_TYPE_READY};
use crate::crd::{ServiceInstance, ServiceInstanceOperation};
use crate::errors::{OperationError, ReconcileError};
use crate::osb::{LastOperationResponse, LastOperationState};
use crate::reconcilers::status::set_condition;
use crate::status_reasons::{
    MESSAGE_DEPROVISIONING, MESSAGE_PROVISIONING, MESSAGE_RECONCILIATION_RETRY_TIMEOUT,
    MESSAGE_UPDATING_INSTANCE, REASON_DEPROVISIONING, REASON_DEPROVISION_CALL_FAILED,
    REASON_ERROR_POLLING_LAST_OPERATION, REASON_ERROR_RECONCILIATION_RETRY_TIMEOUT,
    REASON_PROVISIONING, REASON_PROVISION_CALL_FAILED, REASON_UPDATE_INSTANCE_CALL_FAILED,
    REASON_UPDATING_INSTANCE,
};
use kube::runtime::events::EventType;
use tracing::{debug, info, warn};

const NO_DESCRIPTION: &str = "(no description provided)";

/// The kind of operation being polled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PolledOperation {
    Provision,
    Update,
    Deprovision,
}

impl PolledOperation {
    #[must_use]
    pub fn for_instance(instance: &ServiceInstance) -> Self {
        let status = instance.status.as_ref();
        let mitigating = status.is_some_and(|s| s.orphan_mitigation_in_progress);
        let operation = status.and_then(|s| s.current_operation);
        if mitigating || operation == Some(ServiceInstanceOperation::Deprovision) {
            Self::Deprovision
        } else if operation == Some(ServiceInstanceOperation::Provision) {
            Self::Provision
        } else {
            Self::Update
        }
    }

    fn in_progress_condition(self) -> (&'static str, &'static str) {
        match self {
            Self::Provision => (REASON_PROVISIONING, MESSAGE_PROVISIONING),
            Self::Update => (REASON_UPDATING_INSTANCE, MESSAGE_UPDATING_INSTANCE),
            Self::Deprovision => (REASON_DEPROVISIONING, MESSAGE_DEPROVISIONING),
        }
    }
}

/// Schedule the next poll.
fn continue_polling() -> NextAction {
    NextAction::PollLater
}

/// A failure while applying a poll result is retried by polling again.
fn polling_error(err: &ReconcileError) -> NextAction {
    debug!(error = %err, "Error during polling, polling again");
    continue_polling()
}

/// Poll the broker for the state of the running async operation.
///
/// # Errors
///
/// Returns an error when the operation must be retried from the top of the
/// state machine.
pub async fn poll_instance(
    ctx: &InstanceContext,
    mut instance: ServiceInstance,
) -> Result<NextAction, ReconcileError> {
    let instance = &mut instance;
    let operation = PolledOperation::for_instance(instance);

    let catalog = match resolve_class_and_broker(ctx, instance).await {
        Ok(catalog) => catalog,
        Err(e) => return handle_reconciliation_error(ctx, instance, e).await,
    };
    let identity = match originating_identity(ctx, instance) {
        Ok(identity) => identity,
        Err(e) => return handle_reconciliation_error(ctx, instance, e).await,
    };
    let plan_id = match lookup_plan(ctx, instance, &catalog).await? {
        Some(plan) => Some(plan.external_id),
        None => instance
            .status
            .as_ref()
            .and_then(|s| s.in_progress_properties.as_ref())
            .map(|p| p.plan_external_id.clone()),
    };
    let request = last_operation_request(instance, &catalog.class, plan_id, identity);

    debug!(operation = ?operation, operation_key = ?request.operation_key, "Polling last operation");
    let response = match catalog.client.poll_last_operation(&request).await {
        Ok(response) => response,
        Err(e) if e.is_gone() && operation == PolledOperation::Deprovision => {
            info!("Broker reports the instance gone, deprovision complete");
            if let Err(e) = process_deprovision_success(ctx, instance).await {
                return Ok(polling_error(&e));
            }
            return Ok(ctx.finish_polling(instance));
        }
        Err(e) => {
            let message = format!("Error polling last operation: {e}");
            warn!(error = %e, "Error polling last operation");
            ctx.record_event(
                instance,
                EventType::Warning,
                REASON_ERROR_POLLING_LAST_OPERATION,
                &message,
            )
            .await;
            if ctx.retry_window_exceeded(instance) {
                return process_polling_retry_timeout(ctx, instance, operation).await;
            }
            return Ok(continue_polling());
        }
    };

    handle_last_operation(ctx, instance, operation, response).await
}

async fn handle_last_operation(
    ctx: &InstanceContext,
    instance: &mut ServiceInstance,
    operation: PolledOperation,
    response: LastOperationResponse,
) -> Result<NextAction, ReconcileError> {
    match response.state {
        LastOperationState::InProgress => {
            if let Some(description) = response.description.as_deref() {
                let (reason, message) = operation.in_progress_condition();
                set_condition(
                    &mut status_mut(instance).conditions,
                    CONDITION_TYPE_READY,
                    CONDITION_STATUS_FALSE,
                    reason,
                    &format!("{message} ({description})"),
                );
                if let Err(e) = ctx.update_status(instance).await {
                    return Ok(polling_error(&e));
                }
            }
            if ctx.retry_window_exceeded(instance) {
                return process_polling_retry_timeout(ctx, instance, operation).await;
            }
            Ok(continue_polling())
        }
        LastOperationState::Succeeded => {
            let result = match operation {
                PolledOperation::Deprovision => process_deprovision_success(ctx, instance).await,
                PolledOperation::Provision => {
                    process_provision_success(ctx, instance, None).await
                }
                PolledOperation::Update => process_update_success(ctx, instance, None).await,
            };
            if let Err(e) = result {
                return Ok(polling_error(&e));
            }
            Ok(ctx.finish_polling(instance))
        }
        LastOperationState::Failed => {
            let description = response.description.as_deref().unwrap_or(NO_DESCRIPTION);
            match operation {
                PolledOperation::Deprovision => {
                    let message = format!("Deprovision call failed: {description}");
                    let status = status_mut(instance);
                    set_condition(
                        &mut status.conditions,
                        CONDITION_TYPE_READY,
                        CONDITION_STATUS_UNKNOWN,
                        REASON_DEPROVISION_CALL_FAILED,
                        &message,
                    );
                    clear_async_operation(status);
                    ctx.update_status(instance).await?;
                    ctx.record_event(
                        instance,
                        EventType::Warning,
                        REASON_DEPROVISION_CALL_FAILED,
                        &message,
                    )
                    .await;
                    ctx.finish_polling(instance);
                    Err(OperationError::new(REASON_DEPROVISION_CALL_FAILED, message).into())
                }
                PolledOperation::Provision => {
                    let ready = OutcomeCondition::not_ready(
                        REASON_PROVISION_CALL_FAILED,
                        format!("Provision call failed: {description}"),
                    );
                    ctx.finish_polling(instance);
                    process_provision_failure(ctx, instance, ready, None, true).await
                }
                PolledOperation::Update => {
                    let ready = OutcomeCondition::not_ready(
                        REASON_UPDATE_INSTANCE_CALL_FAILED,
                        format!("Update call failed: {description}"),
                    );
                    ctx.finish_polling(instance);
                    process_temporary_update_failure(ctx, instance, ready).await
                }
            }
        }
        LastOperationState::Unknown(state) => {
            warn!(state = %state, "Got invalid state in LastOperationResponse");
            if ctx.retry_window_exceeded(instance) {
                return process_polling_retry_timeout(ctx, instance, operation).await;
            }
            Err(ReconcileError::Message(format!(
                "Got invalid state in LastOperationResponse: {state:?}"
            )))
        }
    }
}

/// Give up on an async operation whose retry window elapsed.
async fn process_polling_retry_timeout(
    ctx: &InstanceContext,
    instance: &mut ServiceInstance,
    operation: PolledOperation,
) -> Result<NextAction, ReconcileError> {
    warn!(operation = ?operation, "Retry window elapsed while polling, giving up");
    let failed = OutcomeCondition::not_ready(
        REASON_ERROR_RECONCILIATION_RETRY_TIMEOUT,
        MESSAGE_RECONCILIATION_RETRY_TIMEOUT,
    )
    .into_failed();

    let result = match operation {
        PolledOperation::Deprovision => {
            process_deprovision_failure(ctx, instance, None, failed).await
        }
        PolledOperation::Provision => {
            ctx.finish_polling(instance);
            let ready = OutcomeCondition::not_ready(
                REASON_ERROR_RECONCILIATION_RETRY_TIMEOUT,
                MESSAGE_RECONCILIATION_RETRY_TIMEOUT,
            );
            process_provision_failure(ctx, instance, ready, Some(failed), true).await
        }
        PolledOperation::Update => {
            let ready = OutcomeCondition::not_ready(
                REASON_UPDATE_INSTANCE_CALL_FAILED,
                MESSAGE_RECONCILIATION_RETRY_TIMEOUT,
            );
            process_update_failure(ctx, instance, ready, failed).await
        }
    };
    ctx.finish_polling(instance);
    result
}

#[cfg(test)]
#[path = "poll_tests.rs"]
mod poll_tests;
