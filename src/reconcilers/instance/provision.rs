// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! The add path: provision a new instance at its broker.

use super::transitions::{
    process_operation_error, process_provision_async, process_provision_failure,
    process_provision_success, OutcomeCondition,
};
use super::{hold_operation, prepare_operation, InstanceContext, NextAction, PreparedOperation};
use crate::crd::{ServiceInstance, ServiceInstanceOperation};
use crate::errors::ReconcileError;
use crate::http_errors::{is_retriable_http_status, should_start_orphan_mitigation};
use crate::osb::OsbError;
use crate::status_reasons::{
    MESSAGE_RECONCILIATION_RETRY_TIMEOUT, REASON_CLUSTER_SERVICE_BROKER_RETURNED_FAILURE,
    REASON_ERROR_CALLING_PROVISION, REASON_ERROR_RECONCILIATION_RETRY_TIMEOUT,
    REASON_PROVISION_CALL_FAILED,
};
use tracing::{debug, warn};

/// Provision a new instance.
///
/// # Errors
///
/// Returns an error for every failure that must be retried.
pub async fn reconcile_add(
    ctx: &InstanceContext,
    mut instance: ServiceInstance,
) -> Result<NextAction, ReconcileError> {
    if let Some(next) = hold_operation(ctx, &instance, ServiceInstanceOperation::Provision).await {
        return Ok(next);
    }
    let Some(prepared) =
        prepare_operation(ctx, &mut instance, ServiceInstanceOperation::Provision).await?
    else {
        return Ok(NextAction::Done);
    };
    let PreparedOperation {
        catalog,
        plan,
        inputs,
    } = prepared;

    let request = super::requests::provision_request(
        &instance,
        &catalog.class,
        &plan,
        &inputs,
        &ctx.config.cluster_id,
    );
    debug!(
        class = %catalog.class,
        plan = %plan,
        broker = %catalog.broker.name,
        "Provisioning ServiceInstance"
    );

    ctx.mark_broker_attempt(&instance);
    match catalog.client.provision_instance(&request).await {
        Ok(response) if response.is_async => {
            process_provision_async(
                ctx,
                &mut instance,
                response.dashboard_url,
                response.operation_key,
            )
            .await
        }
        Ok(response) => process_provision_success(ctx, &mut instance, response.dashboard_url).await,
        Err(e) => {
            let scope = &catalog.scope;
            handle_provision_error(
                ctx,
                &mut instance,
                &e,
                scope.class_kind(),
                &catalog.class.to_string(),
                scope.broker_kind(),
                &catalog.broker.name,
            )
            .await
        }
    }
}

async fn handle_provision_error(
    ctx: &InstanceContext,
    instance: &mut ServiceInstance,
    err: &OsbError,
    class_kind: &str,
    class: &str,
    broker_kind: &str,
    broker: &str,
) -> Result<NextAction, ReconcileError> {
    if let Some(status_code) = err.http_status() {
        let message = format!(
            "Error provisioning ServiceInstance of {class_kind} {class} at {broker_kind} {broker:?}: {err}"
        );
        warn!(status_code, "Broker rejected provision request");
        let ready = OutcomeCondition::not_ready(REASON_PROVISION_CALL_FAILED, message.clone());
        let mitigate = should_start_orphan_mitigation(status_code);
        if is_retriable_http_status(status_code) {
            return process_provision_failure(ctx, instance, ready, None, mitigate).await;
        }
        let failed = OutcomeCondition::not_ready(REASON_CLUSTER_SERVICE_BROKER_RETURNED_FAILURE, message)
            .into_failed();
        return process_provision_failure(ctx, instance, ready, Some(failed), mitigate).await;
    }

    if err.is_timeout() {
        let ready = OutcomeCondition::not_ready(
            REASON_ERROR_CALLING_PROVISION,
            format!(
                "Communication with the ClusterServiceBroker timed out; operation will be retried: {err}"
            ),
        );
        return process_provision_failure(ctx, instance, ready, None, true).await;
    }

    let ready = OutcomeCondition::not_ready(
        REASON_ERROR_CALLING_PROVISION,
        format!(
            "The provision call failed and will be retried: Error communicating with broker for provisioning: {err}"
        ),
    );
    if ctx.retry_window_exceeded(instance) {
        let failed = OutcomeCondition::not_ready(
            REASON_ERROR_RECONCILIATION_RETRY_TIMEOUT,
            MESSAGE_RECONCILIATION_RETRY_TIMEOUT,
        )
        .into_failed();
        return process_provision_failure(ctx, instance, ready, Some(failed), false).await;
    }
    process_operation_error(ctx, instance, ready).await
}
