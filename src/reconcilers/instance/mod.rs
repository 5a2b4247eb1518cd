// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `ServiceInstance` reconciliation.
//!
//! Each call loads the latest snapshot of one instance, derives the
//! [`ReconciliationAction`] from its status and drives at most one step of
//! the provision, update, deprovision or poll state machine. Every step ends
//! with a status write, so the next step is triggered by the resulting watch
//! event (or by the polling queue for async operations).
//!
//! # Outcomes
//!
//! - `Ok(NextAction::Done)` - nothing more to do until the instance changes
//! - `Ok(NextAction::PollLater)` - an async broker operation is running; the
//!   key goes to the polling queue
//! - `Ok(NextAction::RetryAfter(delay))` - the previous provision or update
//!   attempt of this generation is still backing off
//! - `Err(_)` - the step failed and must be retried with backoff
//!
//! # State Machine
//!
//! ```text
//!            +-----+   async    +------+  succeeded  +-----------+
//!  new ----> | Add | ---------> | Poll | ----------> | Processed |
//!            +-----+            +------+             +-----------+
//!               | ambiguous failure                       |
//!               v                                         | spec change
//!          +--------+                                +--------+
//!          | Delete | (orphan mitigation)            | Update |
//!          +--------+                                +--------+
//! ```

pub mod backoff;
pub mod broker;
pub mod deprovision;
pub mod parameters;
pub mod poll;
pub mod provision;
pub mod references;
pub mod requests;
pub mod transitions;
pub mod update;

use crate::broker_client_manager::BrokerClientManager;
use crate::catalog::CatalogPlan;
use crate::config::ControllerConfig;
use crate::constants::{
    CONDITION_STATUS_TRUE, CONDITION_TYPE_FAILED, CONDITION_TYPE_ORPHAN_MITIGATION,
    CONDITION_TYPE_READY, FINALIZER_SERVICE_CATALOG, KIND_SERVICE_INSTANCE,
};
use crate::crd::{
    PropertiesState, ProvisionStatus, ServiceInstance, ServiceInstanceOperation,
    ServiceInstanceStatus,
};
use crate::errors::ReconcileError;
use crate::events::EventPublisher;
use crate::metrics;
use crate::queue::WorkQueue;
use crate::reconcilers::status::{is_condition_true, remove_condition, set_condition};
use crate::status_reasons::{
    MESSAGE_STARTING_INSTANCE_ORPHAN_MITIGATION, REASON_RETRY_BACKOFF,
    REASON_STARTING_INSTANCE_ORPHAN_MITIGATION,
};
use crate::store::CatalogStore;
use backoff::OperationBackoff;
use chrono::{DateTime, Utc};
use kube::runtime::events::EventType;
use kube::{Resource, ResourceExt};
use requests::{ClassAndBroker, RequestInputs};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, info_span, Instrument};
use transitions::{status_mut, OutcomeCondition};

/// Dependencies of the instance reconciler.
pub struct InstanceContext {
    pub store: Arc<dyn CatalogStore>,
    pub brokers: Arc<BrokerClientManager>,
    pub events: Arc<dyn EventPublisher>,
    /// Queue driving last-operation polls
    pub polling: Arc<WorkQueue>,
    /// Delays between provision or update attempts of one generation
    pub backoff: OperationBackoff,
    pub config: ControllerConfig,
}

/// What the runtime should do with the key after a successful reconcile.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NextAction {
    /// Wait for the next change of the instance.
    Done,
    /// Poll the broker's last operation again after the polling backoff.
    PollLater,
    /// Reconcile again once the delay has passed.
    RetryAfter(Duration),
}

/// The branch of the state machine an instance is in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReconciliationAction {
    Add,
    Update,
    Delete,
    Poll,
}

impl ReconciliationAction {
    /// Derive the action from the instance status.
    #[must_use]
    pub fn for_instance(instance: &ServiceInstance) -> Self {
        let status = instance.status.as_ref();
        if status.is_some_and(|s| s.async_op_in_progress) {
            Self::Poll
        } else if instance.metadata.deletion_timestamp.is_some()
            || status.is_some_and(|s| s.orphan_mitigation_in_progress)
        {
            Self::Delete
        } else if status.is_some_and(|s| s.provision_status == ProvisionStatus::Provisioned) {
            Self::Update
        } else {
            Self::Add
        }
    }
}

impl fmt::Display for ReconciliationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Add => "Add",
            Self::Update => "Update",
            Self::Delete => "Delete",
            Self::Poll => "Poll",
        };
        f.write_str(s)
    }
}

/// Work queue key of an instance.
#[must_use]
pub fn instance_key(instance: &ServiceInstance) -> String {
    format!(
        "{}/{}",
        instance.namespace().unwrap_or_default(),
        instance.name_any()
    )
}

/// True when the current generation already reached a final Ready or Failed
/// state and no orphan mitigation is pending.
#[must_use]
pub fn is_processed_already(instance: &ServiceInstance) -> bool {
    let Some(status) = instance.status.as_ref() else {
        return false;
    };
    let generation = instance.metadata.generation.unwrap_or_default();
    status.observed_generation >= generation
        && (is_condition_true(&status.conditions, CONDITION_TYPE_READY)
            || is_condition_true(&status.conditions, CONDITION_TYPE_FAILED))
        && !status.orphan_mitigation_in_progress
}

/// Equality of two property snapshots as far as the broker is concerned.
///
/// User identities are compared by UID only.
#[must_use]
pub fn properties_state_equal(a: Option<&PropertiesState>, b: Option<&PropertiesState>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => {
            let uid = |p: &PropertiesState| p.user_info.as_ref().map(|u| u.uid.clone());
            a.plan_external_id == b.plan_external_id
                && a.plan_external_name == b.plan_external_name
                && a.parameter_checksum == b.parameter_checksum
                && uid(a).unwrap_or_default() == uid(b).unwrap_or_default()
        }
        _ => false,
    }
}

pub(crate) fn has_finalizer(instance: &ServiceInstance) -> bool {
    instance
        .finalizers()
        .iter()
        .any(|f| f == FINALIZER_SERVICE_CATALOG)
}

/// Move `observedGeneration` to the current generation, dropping the Failed
/// condition of the previous generation.
pub(crate) fn bump_observed_generation(instance: &mut ServiceInstance) {
    let generation = instance.metadata.generation.unwrap_or_default();
    let status = status_mut(instance);
    if status.observed_generation != generation {
        debug!(
            from = status.observed_generation,
            to = generation,
            "Observing new generation"
        );
        status.observed_generation = generation;
        remove_condition(&mut status.conditions, CONDITION_TYPE_FAILED);
    }
}

impl InstanceContext {
    pub(crate) async fn record_event(
        &self,
        instance: &ServiceInstance,
        type_: EventType,
        reason: &str,
        message: &str,
    ) {
        let object = instance.object_ref(&());
        self.events.publish(&object, type_, reason, message).await;
    }

    /// Write the status (and finalizers), replacing `instance` with the stored object.
    pub(crate) async fn update_status(
        &self,
        instance: &mut ServiceInstance,
    ) -> Result<(), ReconcileError> {
        let updated =
            crate::reconcilers::status::update_status_with_retry(self.store.as_ref(), instance, |_| {})
                .await?;
        *instance = updated;
        Ok(())
    }

    /// Record that a provision or update request is about to be sent.
    pub(crate) fn mark_broker_attempt(&self, instance: &ServiceInstance) {
        if let Some(uid) = instance.uid() {
            self.backoff
                .mark_attempt(&uid, instance.metadata.generation.unwrap_or_default());
        }
    }

    /// Drop the attempt backoff of this instance.
    pub(crate) fn clear_backoff(&self, instance: &ServiceInstance) {
        if let Some(uid) = instance.uid() {
            self.backoff.remove(&uid);
        }
    }

    /// Delay left before `operation` may be retried for the current generation.
    async fn retry_backoff(
        &self,
        instance: &ServiceInstance,
        operation: ServiceInstanceOperation,
    ) -> Option<Duration> {
        let uid = instance.uid()?;
        let generation = instance.metadata.generation.unwrap_or_default();
        let delay = self.backoff.pending_delay(&uid, generation)?;
        let message = format!(
            "Delaying {operation} retry, next attempt will be in {:.1}s",
            delay.as_secs_f64()
        );
        info!(?delay, "{message}");
        self.record_event(instance, EventType::Warning, REASON_RETRY_BACKOFF, &message)
            .await;
        Some(delay)
    }

    /// Discard the polling backoff of this instance.
    pub(crate) fn reset_polling(&self, instance: &ServiceInstance) {
        self.polling.forget(&instance_key(instance));
    }

    /// Leave polling: the backoff is discarded and no further poll is scheduled.
    pub(crate) fn finish_polling(&self, instance: &ServiceInstance) -> NextAction {
        self.polling.forget(&instance_key(instance));
        NextAction::Done
    }

    /// True once the current operation has been retried for longer than the
    /// reconciliation retry window.
    pub(crate) fn retry_window_exceeded(&self, instance: &ServiceInstance) -> bool {
        let Some(start) = instance
            .status
            .as_ref()
            .and_then(|s| s.operation_start_time.as_deref())
            .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
        else {
            return false;
        };
        let Ok(window) = chrono::Duration::from_std(self.config.reconciliation_retry_duration)
        else {
            return false;
        };
        start
            .with_timezone(&Utc)
            .checked_add_signed(window)
            .is_some_and(|deadline| Utc::now() > deadline)
    }
}

/// Everything needed to send a provision or update request.
pub struct PreparedOperation {
    pub catalog: ClassAndBroker,
    pub plan: CatalogPlan,
    pub inputs: RequestInputs,
}

/// Outcome of the add or update path when it must not run in this cycle:
/// the generation is already processed, or its previous attempt is still
/// backing off.
pub(crate) async fn hold_operation(
    ctx: &InstanceContext,
    instance: &ServiceInstance,
    operation: ServiceInstanceOperation,
) -> Option<NextAction> {
    if is_processed_already(instance) {
        debug!("Generation already processed");
        return Some(NextAction::Done);
    }
    ctx.retry_backoff(instance, operation)
        .await
        .map(NextAction::RetryAfter)
}

/// The common first half of the add and update paths, run after
/// [`hold_operation`].
///
/// Returns `Ok(None)` when this cycle has nothing left to do: references were
/// just written, a terminal failure was recorded or the operation start was
/// just recorded.
pub(crate) async fn prepare_operation(
    ctx: &InstanceContext,
    instance: &mut ServiceInstance,
    operation: ServiceInstanceOperation,
) -> Result<Option<PreparedOperation>, ReconcileError> {
    bump_observed_generation(instance);

    if references::resolve_references(ctx, instance).await? {
        return Ok(None);
    }

    let catalog = match requests::resolve_class_and_broker(ctx, instance).await {
        Ok(catalog) => catalog,
        Err(e) => return transitions::handle_reconciliation_error(ctx, instance, e).await.map(|_| None),
    };
    let plan = match requests::resolve_plan(ctx, instance, &catalog).await {
        Ok(plan) => plan,
        Err(e) => return transitions::handle_reconciliation_error(ctx, instance, e).await.map(|_| None),
    };

    if let Some(removed) = removed_catalog_entry(instance, &catalog, &plan) {
        match operation {
            ServiceInstanceOperation::Provision => {
                transitions::process_provision_failure(
                    ctx,
                    instance,
                    removed.clone(),
                    Some(removed.into_failed()),
                    false,
                )
                .await?;
            }
            _ => {
                transitions::process_update_failure(
                    ctx,
                    instance,
                    removed.clone(),
                    removed.into_failed(),
                )
                .await?;
            }
        }
        return Ok(None);
    }

    let inputs = match requests::prepare_inputs(ctx, instance, &plan).await {
        Ok(inputs) => inputs,
        Err(e) => return transitions::handle_reconciliation_error(ctx, instance, e).await.map(|_| None),
    };

    let status = instance.status.clone().unwrap_or_default();
    if status.current_operation.is_none()
        || !properties_state_equal(status.in_progress_properties.as_ref(), Some(&inputs.in_progress))
    {
        transitions::record_operation_start(ctx, instance, operation, Some(inputs.in_progress))
            .await?;
        return Ok(None);
    }

    Ok(Some(PreparedOperation {
        catalog,
        plan,
        inputs,
    }))
}

/// Terminal condition for a plan change against a class or plan the broker
/// no longer offers. Parameter-only updates of a provisioned instance pass.
pub(crate) fn removed_catalog_entry(
    instance: &ServiceInstance,
    catalog: &ClassAndBroker,
    plan: &CatalogPlan,
) -> Option<OutcomeCondition> {
    let class = &catalog.class;
    if !class.removed_from_broker_catalog && !plan.removed_from_broker_catalog {
        return None;
    }
    let status = instance.status.as_ref();
    let provisioned = status.is_some_and(|s| s.provision_status == ProvisionStatus::Provisioned);
    let plan_unchanged = status
        .and_then(|s| s.external_properties.as_ref())
        .is_some_and(|p| p.plan_external_id == plan.external_id);
    if provisioned && plan_unchanged {
        return None;
    }

    let scope = &catalog.scope;
    Some(if plan.removed_from_broker_catalog {
        OutcomeCondition::not_ready(
            scope.deleted_plan_reason(),
            format!("{} {} has been deleted; cannot provision.", scope.plan_kind(), plan),
        )
    } else {
        OutcomeCondition::not_ready(
            scope.deleted_class_reason(),
            format!("{} {} has been deleted; cannot provision.", scope.class_kind(), class),
        )
    })
}

/// Initialize a fresh instance: empty status and the service catalog finalizer.
///
/// Returns `true` when it wrote the instance.
async fn initialize(
    ctx: &InstanceContext,
    instance: &mut ServiceInstance,
) -> Result<bool, ReconcileError> {
    let needs_status = instance.status.is_none();
    let needs_finalizer =
        instance.metadata.deletion_timestamp.is_none() && !has_finalizer(instance);
    if !needs_status && !needs_finalizer {
        return Ok(false);
    }

    debug!(needs_status, needs_finalizer, "Initializing ServiceInstance");
    if needs_status {
        instance.status = Some(ServiceInstanceStatus::default());
    }
    if needs_finalizer {
        instance
            .metadata
            .finalizers
            .get_or_insert_with(Vec::new)
            .push(FINALIZER_SERVICE_CATALOG.to_string());
    }
    ctx.update_status(instance).await?;
    Ok(true)
}

/// Back-fill `observedGeneration` on instances written before it existed.
async fn init_observed_generation(
    ctx: &InstanceContext,
    instance: &mut ServiceInstance,
) -> Result<bool, ReconcileError> {
    let status = status_mut(instance);
    if status.observed_generation != 0 || status.reconciled_generation == 0 {
        return Ok(false);
    }

    status.observed_generation = status.reconciled_generation;
    status.provision_status = if is_condition_true(&status.conditions, CONDITION_TYPE_FAILED) {
        ProvisionStatus::NotProvisioned
    } else {
        ProvisionStatus::Provisioned
    };
    info!(
        observed_generation = status.observed_generation,
        "Back-filled observed generation"
    );
    ctx.update_status(instance).await?;
    Ok(true)
}

/// Restore a missing `OrphanMitigation` condition.
async fn init_orphan_mitigation_condition(
    ctx: &InstanceContext,
    instance: &mut ServiceInstance,
) -> Result<bool, ReconcileError> {
    let status = status_mut(instance);
    let has_condition = status
        .conditions
        .iter()
        .any(|c| c.r#type == CONDITION_TYPE_ORPHAN_MITIGATION);
    if !status.orphan_mitigation_in_progress || has_condition {
        return Ok(false);
    }

    set_condition(
        &mut status.conditions,
        CONDITION_TYPE_ORPHAN_MITIGATION,
        CONDITION_STATUS_TRUE,
        REASON_STARTING_INSTANCE_ORPHAN_MITIGATION,
        MESSAGE_STARTING_INSTANCE_ORPHAN_MITIGATION,
    );
    ctx.record_event(
        instance,
        EventType::Warning,
        REASON_STARTING_INSTANCE_ORPHAN_MITIGATION,
        MESSAGE_STARTING_INSTANCE_ORPHAN_MITIGATION,
    )
    .await;
    ctx.update_status(instance).await?;
    Ok(true)
}

/// Run one step of the state machine on an instance snapshot.
///
/// # Errors
///
/// Any error means the step must be retried with backoff.
pub async fn reconcile(
    ctx: &InstanceContext,
    mut instance: ServiceInstance,
) -> Result<NextAction, ReconcileError> {
    if initialize(ctx, &mut instance).await? {
        return Ok(NextAction::Done);
    }
    if init_observed_generation(ctx, &mut instance).await? {
        return Ok(NextAction::Done);
    }
    if init_orphan_mitigation_condition(ctx, &mut instance).await? {
        return Ok(NextAction::Done);
    }

    match ReconciliationAction::for_instance(&instance) {
        ReconciliationAction::Add => provision::reconcile_add(ctx, instance).await,
        ReconciliationAction::Update => update::reconcile_update(ctx, instance).await,
        ReconciliationAction::Delete => deprovision::reconcile_delete(ctx, instance).await,
        ReconciliationAction::Poll => poll::poll_instance(ctx, instance).await,
    }
}

/// Load `namespace/name` and reconcile it inside a tracing span.
///
/// A missing instance is not an error: it was deleted after the key was queued.
///
/// # Errors
///
/// Returns the error of the reconcile step or of loading the instance.
pub async fn reconcile_instance(
    ctx: &InstanceContext,
    namespace: &str,
    name: &str,
) -> Result<NextAction, ReconcileError> {
    let Some(instance) = ctx.store.get_instance(namespace, name).await? else {
        debug!(namespace, name, "ServiceInstance no longer exists");
        return Ok(NextAction::Done);
    };

    let action = ReconciliationAction::for_instance(&instance);
    let span = info_span!(
        "service_instance",
        namespace,
        name,
        generation = instance.metadata.generation.unwrap_or_default(),
        action = %action
    );

    let start = Instant::now();
    let result = reconcile(ctx, instance).instrument(span).await;
    let elapsed = start.elapsed();
    match &result {
        Ok(NextAction::Done | NextAction::RetryAfter(_)) => {
            metrics::record_reconciliation_success(KIND_SERVICE_INSTANCE, elapsed);
        }
        Ok(NextAction::PollLater) => {
            metrics::record_reconciliation_poll(KIND_SERVICE_INSTANCE, elapsed);
        }
        Err(_) => metrics::record_reconciliation_error(KIND_SERVICE_INSTANCE, elapsed),
    }
    result
}
