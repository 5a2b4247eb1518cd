// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Resolution of the class and plan named in the instance spec into object references.
//!
//! A class is selected by Kubernetes name, external name or external ID. A
//! plan is selected the same way among the plans of that class offered by the
//! class's broker. The resolved names are written to the `*Ref` spec fields
//! in a single update. A reference that no longer matches its selector after
//! a spec edit is dropped and resolved again.

use super::transitions::status_mut;
use super::InstanceContext;
use crate::catalog::{CatalogClass, CatalogPlan, CatalogScope};
use crate::constants::{CONDITION_STATUS_FALSE, CONDITION_TYPE_READY};
use crate::crd::{CatalogSelector, PlanReference, ServiceInstance};
use crate::errors::{OperationError, ReconcileError};
use crate::reconcilers::status::set_condition;
use crate::status_reasons::{
    MESSAGE_AMBIGUOUS_PLAN_REFERENCE_SCOPE, REASON_REFERENCES_NONEXISTENT_SERVICE_CLASS,
    REASON_REFERENCES_NONEXISTENT_SERVICE_PLAN,
};
use kube::runtime::events::EventType;
use kube::ResourceExt;
use tracing::{debug, info};

fn selector_matches(selector: &CatalogSelector, name: &str, external_name: &str, external_id: &str) -> bool {
    match selector {
        CatalogSelector::Name(v) => v == name,
        CatalogSelector::ExternalName(v) => v == external_name,
        CatalogSelector::ExternalId(v) => v == external_id,
    }
}

/// Message for a selector that matched no object, or more than one.
pub fn nonexistent_message(kind: &str, selector: &CatalogSelector, found: usize) -> String {
    if found == 0 {
        format!("References a non-existent {kind} {selector}")
    } else {
        format!("References a non-existent {kind} {selector} or there is more than one (found: {found})")
    }
}

/// The single class matching `selector`.
///
/// # Errors
///
/// [`OperationError`] when no class or more than one class matches.
pub async fn find_class(
    ctx: &InstanceContext,
    scope: &CatalogScope,
    selector: &CatalogSelector,
) -> Result<CatalogClass, ReconcileError> {
    let mut matches = match selector {
        CatalogSelector::Name(name) => ctx.store.get_class(scope, name).await?.into_iter().collect(),
        _ => ctx
            .store
            .list_classes(scope)
            .await?
            .into_iter()
            .filter(|c| selector_matches(selector, &c.name, &c.external_name, &c.external_id))
            .collect::<Vec<_>>(),
    };
    if matches.len() != 1 {
        return Err(OperationError::new(
            REASON_REFERENCES_NONEXISTENT_SERVICE_CLASS,
            nonexistent_message(scope.class_kind(), selector, matches.len()),
        )
        .into());
    }
    Ok(matches.remove(0))
}

/// The single plan of `class` matching `selector`.
///
/// # Errors
///
/// [`OperationError`] when no plan or more than one plan matches.
pub async fn find_plan(
    ctx: &InstanceContext,
    scope: &CatalogScope,
    class: &CatalogClass,
    selector: &CatalogSelector,
) -> Result<CatalogPlan, ReconcileError> {
    let mut matches: Vec<CatalogPlan> = ctx
        .store
        .list_plans(scope)
        .await?
        .into_iter()
        .filter(|p| p.class_name == class.name && p.broker_name == class.broker_name)
        .filter(|p| selector_matches(selector, &p.name, &p.external_name, &p.external_id))
        .collect();
    if matches.len() != 1 {
        return Err(OperationError::new(
            REASON_REFERENCES_NONEXISTENT_SERVICE_PLAN,
            nonexistent_message(scope.plan_kind(), selector, matches.len()),
        )
        .into());
    }
    Ok(matches.remove(0))
}

async fn resolve(
    ctx: &InstanceContext,
    instance: &ServiceInstance,
    reference: &PlanReference,
    scope: &CatalogScope,
) -> Result<(Option<CatalogClass>, Option<CatalogPlan>), ReconcileError> {
    let spec = &instance.spec;
    let mut class = None;
    if spec.class_ref(reference).is_none() {
        class = Some(find_class(ctx, scope, reference.class()).await?);
    }

    let mut plan = None;
    if spec.plan_ref(reference).is_none() {
        let plan_class = match class.clone() {
            Some(class) => class,
            None => {
                let name = spec.class_ref(reference).unwrap_or_default();
                ctx.store.get_class(scope, name).await?.ok_or_else(|| {
                    ReconcileError::Message(format!(
                        "Couldn't find {} (K8S: {name})",
                        scope.class_kind()
                    ))
                })?
            }
        };
        plan = Some(find_plan(ctx, scope, &plan_class, reference.plan()).await?);
    }
    Ok((class, plan))
}

/// Clear references whose object no longer matches the spec selectors.
///
/// Returns `true` when a reference was cleared. A referenced object that
/// cannot be found is left to the class and plan lookups to report.
async fn drop_stale_references(
    ctx: &InstanceContext,
    instance: &mut ServiceInstance,
    reference: &PlanReference,
    scope: &CatalogScope,
) -> Result<bool, ReconcileError> {
    let (Some(class_ref), Some(plan_ref)) = (
        instance.spec.class_ref(reference).map(str::to_string),
        instance.spec.plan_ref(reference).map(str::to_string),
    ) else {
        return Ok(false);
    };

    let class_stale = ctx
        .store
        .get_class(scope, &class_ref)
        .await?
        .is_some_and(|c| {
            !selector_matches(reference.class(), &c.name, &c.external_name, &c.external_id)
        });
    let plan_stale = class_stale
        || ctx.store.get_plan(scope, &plan_ref).await?.is_some_and(|p| {
            p.class_name != class_ref
                || !selector_matches(reference.plan(), &p.name, &p.external_name, &p.external_id)
        });

    if class_stale {
        info!(class = %class_ref, "Class reference no longer matches the spec");
        instance.spec.clear_class_ref(reference);
    }
    if plan_stale {
        info!(plan = %plan_ref, "Plan reference no longer matches the spec");
        instance.spec.clear_plan_ref(reference);
    }
    Ok(plan_stale)
}

/// Resolve and persist missing or stale class and plan references.
///
/// Returns `true` when the references were written; the write triggers
/// the next reconcile, so the caller stops here.
///
/// # Errors
///
/// Fails when the spec names neither scope, when a selector matches no
/// object (recorded on the Ready condition first) or when a store call fails.
pub async fn resolve_references(
    ctx: &InstanceContext,
    instance: &mut ServiceInstance,
) -> Result<bool, ReconcileError> {
    let Some(reference) = instance.spec.plan_reference() else {
        return Err(ReconcileError::Message(
            MESSAGE_AMBIGUOUS_PLAN_REFERENCE_SCOPE.to_string(),
        ));
    };
    let namespace = instance.namespace().unwrap_or_default();
    let scope = CatalogScope::for_reference(&reference, &namespace);
    if instance.spec.class_ref(&reference).is_some()
        && instance.spec.plan_ref(&reference).is_some()
        && !drop_stale_references(ctx, instance, &reference, &scope).await?
    {
        return Ok(false);
    }
    let (class, plan) = match resolve(ctx, instance, &reference, &scope).await {
        Ok(resolved) => resolved,
        Err(ReconcileError::Operation(e)) => {
            let status = status_mut(instance);
            set_condition(
                &mut status.conditions,
                CONDITION_TYPE_READY,
                CONDITION_STATUS_FALSE,
                &e.reason,
                &e.message,
            );
            ctx.record_event(instance, EventType::Warning, &e.reason, &e.message)
                .await;
            ctx.update_status(instance).await?;
            return Err(e.into());
        }
        Err(e) => return Err(e),
    };

    if let Some(class) = class.as_ref() {
        debug!(class = %class, "Resolved class reference");
        instance.spec.set_class_ref(&reference, &class.name);
    }
    if let Some(plan) = plan.as_ref() {
        debug!(plan = %plan, "Resolved plan reference");
        instance.spec.set_plan_ref(&reference, &plan.name);
    }

    let status = instance.status.clone();
    let mut updated = ctx.store.update_instance_references(instance).await?;
    updated.status = status;
    *instance = updated;
    info!("Resolved class and plan references");
    Ok(true)
}

#[cfg(test)]
#[path = "references_tests.rs"]
mod references_tests;
