// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Cleanup of classes and plans that brokers no longer offer.
//!
//! A `{Cluster}ServiceClass` or `{Cluster}ServicePlan` flagged
//! `removedFromBrokerCatalog` is deleted once no `ServiceInstance` in its scope
//! references it. Anything else is left alone.

use crate::catalog::CatalogScope;
use crate::constants::{
    CATALOG_CLEANUP_ERROR_REQUEUE_SECS, CATALOG_CLEANUP_REQUEUE_SECS, KIND_CLUSTER_SERVICE_CLASS,
    KIND_CLUSTER_SERVICE_PLAN, KIND_SERVICE_CLASS, KIND_SERVICE_PLAN,
};
use crate::crd::{
    CatalogEntryStatus, CatalogSelector, ClusterServiceClass, ClusterServicePlan, PlanReference,
    ServiceClass, ServiceInstance, ServicePlan,
};
use crate::errors::{ReconcileError, StoreError};
use crate::metrics;
use crate::store::CatalogStore;
use futures::StreamExt;
use kube::runtime::controller::Action;
use kube::runtime::watcher::Config;
use kube::runtime::Controller;
use kube::{Api, Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Whether a catalog entry is a class or a plan.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    Class,
    Plan,
}

/// What a cleanup pass did with one entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CleanupOutcome {
    /// The entry no longer exists.
    Missing,
    /// The broker still offers the entry.
    Offered,
    /// Removed from the broker catalog but still referenced by an instance.
    InUse,
    Deleted,
}

/// True when `instance` references the entry `name` of `kind` in `scope`.
fn references_entry(
    instance: &ServiceInstance,
    scope: &CatalogScope,
    kind: EntryKind,
    name: &str,
) -> bool {
    let Some(reference) = instance.spec.plan_reference() else {
        return false;
    };
    let in_scope = match (&reference, scope) {
        (PlanReference::ClusterScoped { .. }, CatalogScope::Cluster) => true,
        (PlanReference::NamespaceScoped { .. }, CatalogScope::Namespaced(ns)) => {
            instance.namespace().as_deref() == Some(ns.as_str())
        }
        _ => false,
    };
    if !in_scope {
        return false;
    }
    // an unresolved instance that names the object directly still counts
    let (resolved, selector) = match kind {
        EntryKind::Class => (instance.spec.class_ref(&reference), reference.class()),
        EntryKind::Plan => (instance.spec.plan_ref(&reference), reference.plan()),
    };
    resolved == Some(name) || matches!(selector, CatalogSelector::Name(n) if n == name)
}

/// Delete the entry `name` when it was removed from its broker's catalog and
/// no instance references it.
///
/// # Errors
///
/// Returns the error of any store call.
pub async fn cleanup_entry(
    store: &dyn CatalogStore,
    scope: &CatalogScope,
    kind: EntryKind,
    name: &str,
) -> Result<CleanupOutcome, StoreError> {
    let removed = match kind {
        EntryKind::Class => store
            .get_class(scope, name)
            .await?
            .map(|c| c.removed_from_broker_catalog),
        EntryKind::Plan => store
            .get_plan(scope, name)
            .await?
            .map(|p| p.removed_from_broker_catalog),
    };
    let Some(removed) = removed else {
        return Ok(CleanupOutcome::Missing);
    };
    if !removed {
        return Ok(CleanupOutcome::Offered);
    }

    let instances = store.list_instances(scope.namespace()).await?;
    if instances
        .iter()
        .any(|i| references_entry(i, scope, kind, name))
    {
        debug!(?kind, name, "Entry removed from broker catalog is still referenced");
        return Ok(CleanupOutcome::InUse);
    }

    match kind {
        EntryKind::Class => store.delete_class(scope, name).await?,
        EntryKind::Plan => store.delete_plan(scope, name).await?,
    }
    info!(?kind, name, "Deleted entry removed from broker catalog");
    Ok(CleanupOutcome::Deleted)
}

/// A catalog entry kind watched by a cleanup controller.
pub trait CatalogEntry:
    Resource<DynamicType = ()> + Clone + Debug + DeserializeOwned + Send + Sync + 'static
{
    const KIND: &'static str;
    const ENTRY: EntryKind;

    fn entry_status(&self) -> Option<&CatalogEntryStatus>;

    fn scope(&self) -> CatalogScope {
        match self.meta().namespace.as_deref() {
            Some(ns) => CatalogScope::Namespaced(ns.to_string()),
            None => CatalogScope::Cluster,
        }
    }
}

impl CatalogEntry for ClusterServiceClass {
    const KIND: &'static str = KIND_CLUSTER_SERVICE_CLASS;
    const ENTRY: EntryKind = EntryKind::Class;

    fn entry_status(&self) -> Option<&CatalogEntryStatus> {
        self.status.as_ref()
    }
}

impl CatalogEntry for ServiceClass {
    const KIND: &'static str = KIND_SERVICE_CLASS;
    const ENTRY: EntryKind = EntryKind::Class;

    fn entry_status(&self) -> Option<&CatalogEntryStatus> {
        self.status.as_ref()
    }
}

impl CatalogEntry for ClusterServicePlan {
    const KIND: &'static str = KIND_CLUSTER_SERVICE_PLAN;
    const ENTRY: EntryKind = EntryKind::Plan;

    fn entry_status(&self) -> Option<&CatalogEntryStatus> {
        self.status.as_ref()
    }
}

impl CatalogEntry for ServicePlan {
    const KIND: &'static str = KIND_SERVICE_PLAN;
    const ENTRY: EntryKind = EntryKind::Plan;

    fn entry_status(&self) -> Option<&CatalogEntryStatus> {
        self.status.as_ref()
    }
}

/// Shared state of the cleanup controllers.
pub struct CleanupContext {
    pub store: Arc<dyn CatalogStore>,
}

async fn reconcile_entry<K: CatalogEntry>(
    entry: Arc<K>,
    ctx: Arc<CleanupContext>,
) -> Result<Action, ReconcileError> {
    let requeue = Action::requeue(Duration::from_secs(CATALOG_CLEANUP_REQUEUE_SECS));
    if !entry
        .entry_status()
        .is_some_and(|s| s.removed_from_broker_catalog)
    {
        return Ok(requeue);
    }

    let name = entry.name_any();
    let start = Instant::now();
    let result = cleanup_entry(ctx.store.as_ref(), &entry.scope(), K::ENTRY, &name).await;
    match result {
        Ok(outcome) => {
            metrics::record_reconciliation_success(K::KIND, start.elapsed());
            debug!(kind = K::KIND, name = %name, ?outcome, "Cleanup pass finished");
            Ok(requeue)
        }
        Err(e) => {
            metrics::record_reconciliation_error(K::KIND, start.elapsed());
            error!(kind = K::KIND, name = %name, error = %e, "Failed to clean up catalog entry");
            Err(e.into())
        }
    }
}

fn error_policy<K: CatalogEntry>(
    _entry: Arc<K>,
    _err: &ReconcileError,
    _ctx: Arc<CleanupContext>,
) -> Action {
    Action::requeue(Duration::from_secs(CATALOG_CLEANUP_ERROR_REQUEUE_SECS))
}

/// Run the cleanup controller of `K` until its watch stream ends.
pub async fn run_cleanup_controller<K: CatalogEntry>(
    client: Client,
    store: Arc<dyn CatalogStore>,
) -> anyhow::Result<()> {
    info!(kind = K::KIND, "Starting catalog cleanup controller");

    let api = Api::<K>::all(client);
    Controller::new(api, Config::default())
        .run(
            reconcile_entry::<K>,
            error_policy::<K>,
            Arc::new(CleanupContext { store }),
        )
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

#[cfg(test)]
#[path = "catalog_cleanup_tests.rs"]
mod catalog_cleanup_tests;
