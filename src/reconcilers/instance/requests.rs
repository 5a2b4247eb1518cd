// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Catalog lookups and OSB request construction for one instance.

use super::parameters::realize_parameters;
use super::InstanceContext;
use crate::catalog::{CatalogBroker, CatalogClass, CatalogPlan, CatalogScope};
use crate::constants::{OSB_CONTEXT_CLUSTER_ID_KEY, OSB_PLATFORM_KUBERNETES};
use crate::crd::{PlanReference, PropertiesState, ServiceInstance};
use crate::errors::{OperationError, ReconcileError};
use crate::osb::{
    DeprovisionRequest, LastOperationRequest, OriginatingIdentity, OsbClient, PreviousValues,
    ProvisionRequest, UpdateRequest,
};
use crate::status_reasons::{
    MESSAGE_AMBIGUOUS_PLAN_REFERENCE_SCOPE, REASON_ERROR_FINDING_NAMESPACE_FOR_INSTANCE,
    REASON_ERROR_WITH_ORIGINATING_IDENTITY,
};
use kube::ResourceExt;
use serde_json::{Map, Value};
use std::sync::Arc;

/// The resolved class and broker of an instance, with a client for the broker.
pub struct ClassAndBroker {
    pub reference: PlanReference,
    pub scope: CatalogScope,
    pub class: CatalogClass,
    pub broker: CatalogBroker,
    pub client: Arc<dyn OsbClient>,
}

/// Inputs of a provision or update request.
#[derive(Clone, Debug, PartialEq)]
pub struct RequestInputs {
    /// Realized parameters, secret values included.
    pub parameters: Option<Map<String, Value>>,
    /// Properties recorded as in progress while the request runs.
    pub in_progress: PropertiesState,
    pub originating_identity: Option<OriginatingIdentity>,
    pub context: Map<String, Value>,
    pub namespace_uid: String,
}

fn plan_reference(instance: &ServiceInstance) -> Result<PlanReference, ReconcileError> {
    instance
        .spec
        .plan_reference()
        .ok_or_else(|| ReconcileError::Message(MESSAGE_AMBIGUOUS_PLAN_REFERENCE_SCOPE.to_string()))
}

/// Load the referenced class and its broker, and get a client for the broker.
///
/// # Errors
///
/// [`OperationError`] when the class or broker object is missing or the
/// broker's credentials cannot be read.
pub async fn resolve_class_and_broker(
    ctx: &InstanceContext,
    instance: &ServiceInstance,
) -> Result<ClassAndBroker, ReconcileError> {
    let reference = plan_reference(instance)?;
    let namespace = instance.namespace().unwrap_or_default();
    let scope = CatalogScope::for_reference(&reference, &namespace);

    let class_name = instance.spec.class_ref(&reference).ok_or_else(|| {
        ReconcileError::Invariant(format!("{} reference is not set", scope.class_kind()))
    })?;
    let class = ctx
        .store
        .get_class(&scope, class_name)
        .await?
        .ok_or_else(|| {
            OperationError::new(
                scope.nonexistent_class_reason(),
                format!(
                    "The instance references a non-existent {} {class_name:?} - {}",
                    scope.class_kind(),
                    reference.class()
                ),
            )
        })?;

    let broker = ctx
        .store
        .get_broker(&scope, &class.broker_name)
        .await?
        .ok_or_else(|| {
            OperationError::new(
                scope.nonexistent_broker_reason(),
                format!(
                    "The instance references a non-existent broker {:?}",
                    class.broker_name
                ),
            )
        })?;
    let client = super::broker::broker_client(ctx, &broker).await?;

    Ok(ClassAndBroker {
        reference,
        scope,
        class,
        broker,
        client,
    })
}

/// The referenced plan, `None` when the reference is unset or the object is gone.
///
/// # Errors
///
/// Fails only when the store call fails.
pub async fn lookup_plan(
    ctx: &InstanceContext,
    instance: &ServiceInstance,
    catalog: &ClassAndBroker,
) -> Result<Option<CatalogPlan>, ReconcileError> {
    let Some(plan_name) = instance.spec.plan_ref(&catalog.reference) else {
        return Ok(None);
    };
    Ok(ctx.store.get_plan(&catalog.scope, plan_name).await?)
}

/// The referenced plan, which must exist.
///
/// # Errors
///
/// [`OperationError`] when the plan object is missing.
pub async fn resolve_plan(
    ctx: &InstanceContext,
    instance: &ServiceInstance,
    catalog: &ClassAndBroker,
) -> Result<CatalogPlan, ReconcileError> {
    let scope = &catalog.scope;
    let plan_name = instance
        .spec
        .plan_ref(&catalog.reference)
        .ok_or_else(|| {
            ReconcileError::Invariant(format!("{} reference is not set", scope.plan_kind()))
        })?;
    lookup_plan(ctx, instance, catalog).await?.ok_or_else(|| {
        OperationError::new(
            scope.nonexistent_plan_reason(),
            format!(
                "The instance references a non-existent {} {plan_name:?} - {}",
                scope.plan_kind(),
                catalog.reference.plan()
            ),
        )
        .into()
    })
}

/// Originating identity header of `instance`, when enabled and a user is known.
///
/// # Errors
///
/// [`OperationError`] with reason `ErrorWithOriginatingIdentity` when the
/// user info cannot be encoded.
pub fn originating_identity(
    ctx: &InstanceContext,
    instance: &ServiceInstance,
) -> Result<Option<OriginatingIdentity>, ReconcileError> {
    if !ctx.config.originating_identity {
        return Ok(None);
    }
    let Some(user_info) = instance.spec.user_info.as_ref() else {
        return Ok(None);
    };
    let value = serde_json::to_string(user_info).map_err(|e| {
        OperationError::new(
            REASON_ERROR_WITH_ORIGINATING_IDENTITY,
            format!("Error building originating identity headers: {e}"),
        )
    })?;
    Ok(Some(OriginatingIdentity::kubernetes(value)))
}

/// The `context` object sent with provision and update requests.
#[must_use]
pub fn request_context(cluster_id: &str, instance: &ServiceInstance) -> Map<String, Value> {
    let mut context = Map::new();
    context.insert(
        "platform".to_string(),
        Value::String(OSB_PLATFORM_KUBERNETES.to_string()),
    );
    context.insert(
        "namespace".to_string(),
        Value::String(instance.namespace().unwrap_or_default()),
    );
    context.insert(
        OSB_CONTEXT_CLUSTER_ID_KEY.to_string(),
        Value::String(cluster_id.to_string()),
    );
    context.insert(
        "instance_name".to_string(),
        Value::String(instance.name_any()),
    );
    context
}

/// Gather everything a provision or update request needs.
///
/// # Errors
///
/// [`OperationError`] when parameters, the originating identity or the
/// namespace UID cannot be obtained.
pub async fn prepare_inputs(
    ctx: &InstanceContext,
    instance: &ServiceInstance,
    plan: &CatalogPlan,
) -> Result<RequestInputs, ReconcileError> {
    let realized = realize_parameters(ctx.store.as_ref(), instance).await?;
    let in_progress = PropertiesState {
        plan_external_id: plan.external_id.clone(),
        plan_external_name: plan.external_name.clone(),
        parameters: realized.redacted,
        parameter_checksum: realized.checksum,
        user_info: instance.spec.user_info.clone(),
    };
    let originating_identity = originating_identity(ctx, instance)?;

    let namespace = instance.namespace().unwrap_or_default();
    let namespace_error = |detail: String| {
        OperationError::new(
            REASON_ERROR_FINDING_NAMESPACE_FOR_INSTANCE,
            format!("Failed to get namespace {namespace:?} during instance create: {detail}"),
        )
    };
    let namespace_uid = ctx
        .store
        .get_namespace_uid(&namespace)
        .await
        .map_err(|e| namespace_error(e.to_string()))?
        .ok_or_else(|| namespace_error("not found".to_string()))?;

    Ok(RequestInputs {
        parameters: realized.parameters,
        in_progress,
        originating_identity,
        context: request_context(&ctx.config.cluster_id, instance),
        namespace_uid,
    })
}

#[must_use]
pub fn provision_request(
    instance: &ServiceInstance,
    class: &CatalogClass,
    plan: &CatalogPlan,
    inputs: &RequestInputs,
    cluster_id: &str,
) -> ProvisionRequest {
    ProvisionRequest {
        instance_id: instance.spec.external_id.clone(),
        accepts_incomplete: true,
        service_id: class.external_id.clone(),
        plan_id: plan.external_id.clone(),
        organization_guid: cluster_id.to_string(),
        space_guid: inputs.namespace_uid.clone(),
        parameters: inputs.parameters.clone(),
        context: inputs.context.clone(),
        originating_identity: inputs.originating_identity.clone(),
    }
}

/// Update request carrying only what changed since the last successful operation.
///
/// The plan is sent when it differs from the external plan. Parameters are
/// sent when their checksum changed; removing every parameter sends an
/// empty object.
#[must_use]
pub fn update_request(
    instance: &ServiceInstance,
    class: &CatalogClass,
    plan: &CatalogPlan,
    inputs: &RequestInputs,
) -> UpdateRequest {
    let external = instance
        .status
        .as_ref()
        .and_then(|s| s.external_properties.as_ref());

    let plan_id = match external {
        Some(external) if external.plan_external_id == plan.external_id => None,
        _ => Some(plan.external_id.clone()),
    };
    let external_checksum = external.and_then(|e| e.parameter_checksum.as_ref());
    let parameters = if external_checksum == inputs.in_progress.parameter_checksum.as_ref() {
        None
    } else {
        Some(inputs.parameters.clone().unwrap_or_default())
    };
    let previous_values = external.map(|e| PreviousValues {
        plan_id: Some(e.plan_external_id.clone()),
        service_id: Some(class.external_id.clone()),
    });

    UpdateRequest {
        instance_id: instance.spec.external_id.clone(),
        accepts_incomplete: true,
        service_id: class.external_id.clone(),
        plan_id,
        parameters,
        previous_values,
        context: inputs.context.clone(),
        originating_identity: inputs.originating_identity.clone(),
    }
}

/// Deprovision request for the plan in progress, else the plan last provisioned.
///
/// # Errors
///
/// [`ReconcileError::Invariant`] when the status records neither.
pub fn deprovision_request(
    instance: &ServiceInstance,
    class: &CatalogClass,
    originating_identity: Option<OriginatingIdentity>,
) -> Result<DeprovisionRequest, ReconcileError> {
    let status = instance.status.as_ref();
    let plan_id = status
        .and_then(|s| s.in_progress_properties.as_ref())
        .or_else(|| status.and_then(|s| s.external_properties.as_ref()))
        .map(|p| p.plan_external_id.clone())
        .ok_or_else(|| {
            ReconcileError::Invariant(
                "the instance has neither in-progress nor external properties to deprovision"
                    .to_string(),
            )
        })?;

    Ok(DeprovisionRequest {
        instance_id: instance.spec.external_id.clone(),
        accepts_incomplete: true,
        service_id: class.external_id.clone(),
        plan_id,
        originating_identity,
    })
}

#[must_use]
pub fn last_operation_request(
    instance: &ServiceInstance,
    class: &CatalogClass,
    plan_id: Option<String>,
    originating_identity: Option<OriginatingIdentity>,
) -> LastOperationRequest {
    LastOperationRequest {
        instance_id: instance.spec.external_id.clone(),
        service_id: Some(class.external_id.clone()),
        plan_id,
        operation_key: instance
            .status
            .as_ref()
            .and_then(|s| s.last_operation.clone()),
        originating_identity,
    }
}

#[cfg(test)]
#[path = "requests_tests.rs"]
mod requests_tests;
