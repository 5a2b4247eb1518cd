// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! The update path: push plan and parameter changes of a provisioned instance.

use super::transitions::{
    process_operation_error, process_temporary_update_failure, process_update_async,
    process_update_failure, process_update_success, OutcomeCondition,
};
use super::{hold_operation, prepare_operation, InstanceContext, NextAction, PreparedOperation};
use crate::crd::{ServiceInstance, ServiceInstanceOperation};
use crate::errors::ReconcileError;
use crate::http_errors::is_retriable_http_status;
use crate::status_reasons::{
    MESSAGE_RECONCILIATION_RETRY_TIMEOUT, REASON_ERROR_CALLING_UPDATE_INSTANCE,
    REASON_ERROR_RECONCILIATION_RETRY_TIMEOUT, REASON_UPDATE_INSTANCE_CALL_FAILED,
};
use tracing::{debug, warn};

/// Update a provisioned instance whose spec changed.
///
/// # Errors
///
/// Returns an error for every failure that must be retried.
pub async fn reconcile_update(
    ctx: &InstanceContext,
    mut instance: ServiceInstance,
) -> Result<NextAction, ReconcileError> {
    if let Some(next) = hold_operation(ctx, &instance, ServiceInstanceOperation::Update).await {
        return Ok(next);
    }
    let Some(prepared) =
        prepare_operation(ctx, &mut instance, ServiceInstanceOperation::Update).await?
    else {
        return Ok(NextAction::Done);
    };
    let PreparedOperation {
        catalog,
        plan,
        inputs,
    } = prepared;

    let request = super::requests::update_request(&instance, &catalog.class, &plan, &inputs);
    debug!(
        plan_changed = request.plan_id.is_some(),
        parameters_changed = request.parameters.is_some(),
        "Updating ServiceInstance"
    );

    ctx.mark_broker_attempt(&instance);
    let err = match catalog.client.update_instance(&request).await {
        Ok(response) if response.is_async => {
            return process_update_async(
                ctx,
                &mut instance,
                response.dashboard_url,
                response.operation_key,
            )
            .await;
        }
        Ok(response) => {
            return process_update_success(ctx, &mut instance, response.dashboard_url).await;
        }
        Err(e) => e,
    };

    if let Some(status_code) = err.http_status() {
        warn!(status_code, "Broker rejected update request");
        if is_retriable_http_status(status_code) {
            let ready = OutcomeCondition::not_ready(
                REASON_UPDATE_INSTANCE_CALL_FAILED,
                format!(
                    "ServiceBroker returned a failure for update call; update will be retried: {err}"
                ),
            );
            return process_temporary_update_failure(ctx, &mut instance, ready).await;
        }
        let ready = OutcomeCondition::not_ready(
            REASON_UPDATE_INSTANCE_CALL_FAILED,
            format!(
                "ServiceBroker returned a failure for update call; update will not be retried: {err}"
            ),
        );
        let failed = ready.clone().into_failed();
        return process_update_failure(ctx, &mut instance, ready, failed).await;
    }

    if err.is_timeout() {
        let ready = OutcomeCondition::not_ready(
            REASON_ERROR_CALLING_UPDATE_INSTANCE,
            format!("Communication with the ServiceBroker timed out; update will be retried: {err}"),
        );
        return process_temporary_update_failure(ctx, &mut instance, ready).await;
    }

    let ready = OutcomeCondition::not_ready(
        REASON_ERROR_CALLING_UPDATE_INSTANCE,
        format!(
            "The update call failed and will be retried: Error communicating with broker for updating: {err}"
        ),
    );
    if ctx.retry_window_exceeded(&instance) {
        let failed = OutcomeCondition::not_ready(
            REASON_ERROR_RECONCILIATION_RETRY_TIMEOUT,
            MESSAGE_RECONCILIATION_RETRY_TIMEOUT,
        )
        .into_failed();
        return process_update_failure(ctx, &mut instance, ready, failed).await;
    }
    process_operation_error(ctx, &mut instance, ready).await
}
