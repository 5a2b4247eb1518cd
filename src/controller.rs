// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Controller runtime.
//!
//! `ServiceInstance` keys flow through two work queues:
//!
//! - the **primary** queue, fed by the watch and the periodic resync, whose
//!   workers run one reconcile step per key;
//! - the **polling** queue, holding instances with an async broker operation,
//!   whose workers hand each key back to the primary queue.
//!
//! The four catalog cleanup reconcilers run as kube-runtime controllers next
//! to the queue workers. A broker watch drops the pooled client of every
//! deleted broker.

use crate::broker_client_manager::{BrokerClientManager, BrokerKey};
use crate::config::ControllerConfig;
use crate::constants::{
    BROKER_OPERATION_RETRY_MAX_DELAY_SECS, BROKER_OPERATION_RETRY_MIN_DELAY_SECS,
    BROKER_OPERATION_RETRY_PURGE_SECS, CLUSTER_ID_SOURCE_NAMESPACE,
    PRIMARY_QUEUE_BASE_DELAY_MILLIS, PRIMARY_QUEUE_MAX_DELAY_SECS,
};
use crate::crd::{
    ClusterServiceBroker, ClusterServiceClass, ClusterServicePlan, ServiceBroker, ServiceClass,
    ServiceInstance, ServicePlan,
};
use crate::events::KubeEventPublisher;
use crate::osb::http_client_factory;
use crate::queue::WorkQueue;
use crate::reconcilers::catalog_cleanup::run_cleanup_controller;
use crate::reconcilers::instance::backoff::OperationBackoff;
use crate::reconcilers::instance::{instance_key, reconcile_instance, InstanceContext, NextAction};
use crate::server::ServerState;
use crate::store::kubernetes::KubeStore;
use crate::store::CatalogStore;
use anyhow::Context;
use futures::StreamExt;
use k8s_openapi::api::core::v1::Namespace;
use kube::runtime::watcher;
use kube::{Api, Client, ResourceExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// True when a watch event for `instance` should queue it.
///
/// Instances with an async operation in flight are driven by the polling
/// queue only.
#[must_use]
pub fn should_enqueue(instance: &ServiceInstance) -> bool {
    !instance
        .status
        .as_ref()
        .is_some_and(|s| s.async_op_in_progress)
}

/// Split a `namespace/name` queue key.
#[must_use]
pub fn split_key(key: &str) -> Option<(&str, &str)> {
    key.split_once('/')
        .filter(|(ns, name)| !ns.is_empty() && !name.is_empty())
}

/// Reconcile one primary queue key and schedule what follows.
///
/// The caller still owns the key and must call [`WorkQueue::done`].
pub async fn process_primary_key(ctx: &InstanceContext, primary: &Arc<WorkQueue>, key: &str) {
    let Some((namespace, name)) = split_key(key) else {
        warn!(key, "Dropping malformed queue key");
        primary.forget(key);
        return;
    };

    match reconcile_instance(ctx, namespace, name).await {
        Ok(NextAction::Done) => primary.forget(key),
        Ok(NextAction::PollLater) => {
            primary.forget(key);
            ctx.polling.add_rate_limited(key);
        }
        Ok(NextAction::RetryAfter(delay)) => {
            primary.forget(key);
            primary.add_after(key, delay);
        }
        Err(e) => {
            warn!(namespace, name, error = %e, "ServiceInstance reconcile failed, requeueing");
            primary.add_rate_limited(key);
        }
    }
}

/// Move a polling queue key to the primary queue.
///
/// The polling backoff only grows again if the next reconcile asks for
/// another poll.
pub fn transfer_polling_key(polling: &WorkQueue, primary: &WorkQueue, key: &str) {
    primary.add(key);
    polling.forget(key);
}

async fn run_primary_worker(id: usize, ctx: Arc<InstanceContext>, primary: Arc<WorkQueue>) {
    debug!(worker = id, "Primary worker started");
    while let Some(key) = primary.get().await {
        process_primary_key(&ctx, &primary, &key).await;
        primary.done(&key);
    }
    debug!(worker = id, "Primary worker stopped");
}

async fn run_polling_worker(id: usize, polling: Arc<WorkQueue>, primary: Arc<WorkQueue>) {
    debug!(worker = id, "Polling worker started");
    while let Some(key) = polling.get().await {
        transfer_polling_key(&polling, &primary, &key);
        polling.done(&key);
    }
    debug!(worker = id, "Polling worker stopped");
}

/// Queue every instance not driven by the polling queue.
///
/// # Errors
///
/// Returns an error if the instances cannot be listed.
pub async fn enqueue_all(store: &dyn CatalogStore, primary: &WorkQueue) -> anyhow::Result<usize> {
    let instances = store
        .list_instances(None)
        .await
        .context("listing ServiceInstances for resync")?;
    let mut queued = 0;
    for instance in instances.iter().filter(|i| should_enqueue(i)) {
        primary.add(instance_key(instance));
        queued += 1;
    }
    Ok(queued)
}

async fn run_resync(store: Arc<dyn CatalogStore>, primary: Arc<WorkQueue>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // the watch's initial list covers the first tick
    ticker.tick().await;
    loop {
        ticker.tick().await;
        match enqueue_all(store.as_ref(), &primary).await {
            Ok(count) => debug!(count, "Resync queued ServiceInstances"),
            Err(e) => warn!(error = %e, "Resync failed"),
        }
    }
}

/// Drop the pooled client of a deleted broker.
pub fn forget_deleted_broker(brokers: &BrokerClientManager, key: &BrokerKey) {
    debug!(broker = %key, "Broker deleted");
    brokers.remove_broker_client(key);
}

async fn watch_cluster_brokers(client: Client, brokers: Arc<BrokerClientManager>) {
    let api = Api::<ClusterServiceBroker>::all(client);
    let mut stream = std::pin::pin!(watcher::watcher(api, watcher::Config::default()));

    info!("Watching ClusterServiceBrokers");
    while let Some(event) = stream.next().await {
        match event {
            Ok(watcher::Event::Delete(broker)) => {
                forget_deleted_broker(&brokers, &BrokerKey::cluster(broker.name_any()));
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "ClusterServiceBroker watch error"),
        }
    }
}

async fn watch_namespaced_brokers(client: Client, brokers: Arc<BrokerClientManager>) {
    let api = Api::<ServiceBroker>::all(client);
    let mut stream = std::pin::pin!(watcher::watcher(api, watcher::Config::default()));

    info!("Watching ServiceBrokers");
    while let Some(event) = stream.next().await {
        match event {
            Ok(watcher::Event::Delete(broker)) => {
                let key =
                    BrokerKey::namespaced(broker.namespace().unwrap_or_default(), broker.name_any());
                forget_deleted_broker(&brokers, &key);
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "ServiceBroker watch error"),
        }
    }
}

async fn run_backoff_purge(ctx: Arc<InstanceContext>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let purged = ctx.backoff.purge_expired();
        if purged > 0 {
            debug!(purged, "Purged expired broker operation backoff entries");
        }
    }
}

async fn watch_instances(client: Client, primary: Arc<WorkQueue>) {
    let api = Api::<ServiceInstance>::all(client);
    let stream = watcher::watcher(api, watcher::Config::default());
    let mut stream = std::pin::pin!(stream);

    info!("Watching ServiceInstances");
    while let Some(event) = stream.next().await {
        match event {
            Ok(watcher::Event::Apply(instance) | watcher::Event::InitApply(instance)) => {
                if should_enqueue(&instance) {
                    primary.add(instance_key(&instance));
                }
            }
            Ok(watcher::Event::Delete(instance)) => {
                debug!(
                    namespace = ?instance.namespace(),
                    name = %instance.name_any(),
                    "ServiceInstance deleted"
                );
            }
            Ok(watcher::Event::Init | watcher::Event::InitDone) => {}
            Err(e) => warn!(error = %e, "ServiceInstance watch error"),
        }
    }
}

fn random_cluster_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// The configured cluster id, else the `kube-system` namespace UID, else a
/// random one.
pub async fn resolve_cluster_id(client: &Client, configured: &str) -> String {
    if !configured.is_empty() {
        return configured.to_string();
    }
    let api = Api::<Namespace>::all(client.clone());
    match api.get_opt(CLUSTER_ID_SOURCE_NAMESPACE).await {
        Ok(Some(ns)) => {
            if let Some(uid) = ns.metadata.uid {
                return uid;
            }
            warn!("Namespace {CLUSTER_ID_SOURCE_NAMESPACE} has no UID, using a random cluster id");
        }
        Ok(None) => {
            warn!("Namespace {CLUSTER_ID_SOURCE_NAMESPACE} not found, using a random cluster id");
        }
        Err(e) => {
            warn!(error = %e, "Failed to read namespace {CLUSTER_ID_SOURCE_NAMESPACE}, using a random cluster id");
        }
    }
    random_cluster_id()
}

/// Resolves on SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received SIGINT"),
        () = terminate => info!("Received SIGTERM"),
    }
}

/// Run every controller until a shutdown signal arrives.
///
/// # Errors
///
/// Returns an error if a cleanup controller or the watch exits unexpectedly.
pub async fn run(
    client: Client,
    mut config: ControllerConfig,
    server_state: Arc<ServerState>,
) -> anyhow::Result<()> {
    config.cluster_id = resolve_cluster_id(&client, &config.cluster_id).await;
    info!(cluster_id = %config.cluster_id, "Using cluster id");

    let store: Arc<dyn CatalogStore> = Arc::new(KubeStore::new(client.clone()));
    let primary = WorkQueue::primary(
        Duration::from_millis(PRIMARY_QUEUE_BASE_DELAY_MILLIS),
        Duration::from_secs(PRIMARY_QUEUE_MAX_DELAY_SECS),
        config.queue_qps,
        config.queue_burst,
    );
    let polling = WorkQueue::polling(config.polling_min_delay, config.polling_max_delay);

    let instance_workers = config.instance_workers;
    let polling_workers = config.polling_workers;
    let resync_interval = config.resync_interval;
    let purge_interval = Duration::from_secs(BROKER_OPERATION_RETRY_PURGE_SECS);
    let brokers = Arc::new(BrokerClientManager::new(http_client_factory()));
    let ctx = Arc::new(InstanceContext {
        store: store.clone(),
        brokers: brokers.clone(),
        events: Arc::new(KubeEventPublisher::new(client.clone())),
        polling: polling.clone(),
        backoff: OperationBackoff::new(
            Duration::from_secs(BROKER_OPERATION_RETRY_MIN_DELAY_SECS),
            Duration::from_secs(BROKER_OPERATION_RETRY_MAX_DELAY_SECS),
        ),
        config,
    });

    let mut workers = JoinSet::new();
    for id in 0..instance_workers {
        workers.spawn(run_primary_worker(id, ctx.clone(), primary.clone()));
    }
    for id in 0..polling_workers {
        workers.spawn(run_polling_worker(id, polling.clone(), primary.clone()));
    }
    info!(instance_workers, polling_workers, "ServiceInstance workers started");
    server_state.set_ready(true);

    let result = tokio::select! {
        () = shutdown_signal() => Ok(()),
        () = watch_instances(client.clone(), primary.clone()) => {
            Err(anyhow::anyhow!("ServiceInstance watch exited unexpectedly"))
        }
        () = run_resync(store.clone(), primary.clone(), resync_interval) => {
            Err(anyhow::anyhow!("Resync loop exited unexpectedly"))
        }
        () = run_backoff_purge(ctx.clone(), purge_interval) => {
            Err(anyhow::anyhow!("Backoff purge loop exited unexpectedly"))
        }
        () = watch_cluster_brokers(client.clone(), brokers.clone()) => {
            Err(anyhow::anyhow!("ClusterServiceBroker watch exited unexpectedly"))
        }
        () = watch_namespaced_brokers(client.clone(), brokers.clone()) => {
            Err(anyhow::anyhow!("ServiceBroker watch exited unexpectedly"))
        }
        result = run_cleanup_controller::<ClusterServiceClass>(client.clone(), store.clone()) => {
            result.and_then(|()| Err(anyhow::anyhow!("ClusterServiceClass cleanup controller exited unexpectedly")))
        }
        result = run_cleanup_controller::<ServiceClass>(client.clone(), store.clone()) => {
            result.and_then(|()| Err(anyhow::anyhow!("ServiceClass cleanup controller exited unexpectedly")))
        }
        result = run_cleanup_controller::<ClusterServicePlan>(client.clone(), store.clone()) => {
            result.and_then(|()| Err(anyhow::anyhow!("ClusterServicePlan cleanup controller exited unexpectedly")))
        }
        result = run_cleanup_controller::<ServicePlan>(client.clone(), store.clone()) => {
            result.and_then(|()| Err(anyhow::anyhow!("ServicePlan cleanup controller exited unexpectedly")))
        }
    };

    info!("Shutting down work queues");
    server_state.set_ready(false);
    primary.shut_down();
    polling.shut_down();
    while let Some(joined) = workers.join_next().await {
        if let Err(e) = joined {
            error!(error = %e, "Worker task failed");
        }
    }
    info!("All workers stopped");

    result
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod controller_tests;
