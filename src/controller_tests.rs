// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `controller.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::catalog::CatalogScope;
    use crate::crd::{ServiceInstanceOperation, ServiceInstanceStatus};
    use crate::osb::LastOperationState;
    use crate::testing::*;
    use tokio::time::timeout;

    fn primary_queue() -> Arc<WorkQueue> {
        WorkQueue::primary(Duration::from_millis(1), Duration::from_millis(10), 100.0, 100)
    }

    fn key(name: &str) -> String {
        format!("{TEST_NAMESPACE}/{name}")
    }

    #[test]
    fn test_should_enqueue_skips_async_instances() {
        assert!(should_enqueue(&service_instance("i1")));
        assert!(should_enqueue(&resolved_instance("i1")));
        assert!(!should_enqueue(&polling_instance(
            "i1",
            ServiceInstanceOperation::Provision
        )));
    }

    #[test]
    fn test_split_key() {
        assert_eq!(split_key("ns1/i1"), Some(("ns1", "i1")));
        assert_eq!(split_key("i1"), None);
        assert_eq!(split_key("/i1"), None);
        assert_eq!(split_key("ns1/"), None);
    }

    #[test]
    fn test_random_cluster_id_is_v4_uuid() {
        let id = random_cluster_id();
        let parsed = uuid::Uuid::parse_str(&id).unwrap();
        assert_eq!(parsed.get_version(), Some(uuid::Version::Random));
        assert_eq!(parsed.get_variant(), uuid::Variant::RFC4122);
        assert_eq!(parsed.hyphenated().to_string(), id);
        assert_ne!(id, random_cluster_id());
    }

    #[tokio::test]
    async fn test_missing_instance_is_forgotten() {
        let h = Harness::new(&CatalogScope::Cluster);
        let primary = primary_queue();
        let key = key("gone");
        primary.add_rate_limited(key.as_str());
        assert_eq!(primary.num_requeues(&key), 1);

        process_primary_key(&h.ctx, &primary, &key).await;

        assert_eq!(primary.num_requeues(&key), 0);
        assert_eq!(h.ctx.polling.num_requeues(&key), 0);
    }

    #[tokio::test]
    async fn test_failed_reconcile_is_rate_limited() {
        let h = Harness::new(&CatalogScope::Cluster);
        let mut instance = service_instance("i1");
        instance.spec.cluster_service_class_external_name = Some("missing".to_string());
        instance.status = Some(ServiceInstanceStatus::default());
        h.put(instance);
        let primary = primary_queue();
        let key = key("i1");

        process_primary_key(&h.ctx, &primary, &key).await;

        assert_eq!(primary.num_requeues(&key), 1);
        let requeued = timeout(Duration::from_secs(1), primary.get()).await.unwrap();
        assert_eq!(requeued, Some(key));
    }

    #[tokio::test]
    async fn test_poll_later_moves_key_to_polling_queue() {
        let h = Harness::new(&CatalogScope::Cluster);
        h.put(polling_instance("i1", ServiceInstanceOperation::Provision));
        h.broker
            .push_last_operation(Ok(last_operation(LastOperationState::InProgress, None)));
        let primary = primary_queue();
        let key = key("i1");

        process_primary_key(&h.ctx, &primary, &key).await;

        assert_eq!(primary.num_requeues(&key), 0);
        assert_eq!(h.ctx.polling.num_requeues(&key), 1);
        let polled = timeout(Duration::from_secs(1), h.ctx.polling.get())
            .await
            .unwrap();
        assert_eq!(polled, Some(key));
    }

    #[tokio::test]
    async fn test_retry_after_requeues_key_after_delay() {
        let mut h = Harness::new(&CatalogScope::Cluster);
        h.ctx.backoff = OperationBackoff::new(Duration::from_millis(50), Duration::from_secs(1));
        h.put(in_flight_instance("i1", ServiceInstanceOperation::Provision));
        h.ctx.backoff.mark_attempt("i1-uid", 1);
        let primary = primary_queue();
        let key = key("i1");

        process_primary_key(&h.ctx, &primary, &key).await;

        assert!(h.broker.calls().is_empty());
        assert_eq!(primary.num_requeues(&key), 0);
        assert!(primary.is_empty());
        let requeued = timeout(Duration::from_secs(1), primary.get()).await.unwrap();
        assert_eq!(requeued, Some(key));
    }

    #[test]
    fn test_forget_deleted_broker_drops_pooled_client() {
        let h = Harness::new(&CatalogScope::Cluster);
        let cluster = BrokerKey::cluster("b1");
        let namespaced = BrokerKey::namespaced(TEST_NAMESPACE, "b1");
        for key in [&cluster, &namespaced] {
            h.ctx
                .brokers
                .update_broker_client(key, &broker_client_config())
                .unwrap();
        }

        forget_deleted_broker(&h.ctx.brokers, &cluster);

        assert!(h.ctx.brokers.broker_client(&cluster).is_none());
        assert!(h.ctx.brokers.broker_client(&namespaced).is_some());
    }

    #[tokio::test]
    async fn test_transfer_polling_key_forgets_backoff() {
        let polling = WorkQueue::polling(Duration::from_millis(1), Duration::from_millis(10));
        let primary = primary_queue();
        polling.add_rate_limited("ns1/i1");
        polling.add_rate_limited("ns1/i1");
        assert_eq!(polling.num_requeues("ns1/i1"), 2);

        let key = timeout(Duration::from_secs(1), polling.get())
            .await
            .unwrap()
            .unwrap();
        transfer_polling_key(&polling, &primary, &key);
        polling.done(&key);

        assert_eq!(polling.num_requeues("ns1/i1"), 0);
        assert_eq!(primary.len(), 1);
        assert_eq!(primary.get().await.as_deref(), Some("ns1/i1"));
    }

    #[tokio::test]
    async fn test_enqueue_all_skips_polled_instances() {
        let h = Harness::new(&CatalogScope::Cluster);
        h.put(resolved_instance("i1"));
        h.put(polling_instance("i2", ServiceInstanceOperation::Provision));
        let primary = primary_queue();

        let queued = enqueue_all(h.store.as_ref(), &primary).await.unwrap();

        assert_eq!(queued, 1);
        assert_eq!(primary.get().await, Some(key("i1")));
        assert!(primary.is_empty());
    }

    #[tokio::test]
    async fn test_workers_stop_after_shutdown() {
        let h = Harness::new(&CatalogScope::Cluster);
        let ctx = Arc::new(h.ctx);
        let primary = primary_queue();
        let polling = ctx.polling.clone();

        let primary_worker = tokio::spawn(run_primary_worker(0, ctx.clone(), primary.clone()));
        let polling_worker = tokio::spawn(run_polling_worker(0, polling.clone(), primary.clone()));

        primary.add(key("gone"));
        polling.shut_down();
        primary.shut_down();

        timeout(Duration::from_secs(1), primary_worker)
            .await
            .unwrap()
            .unwrap();
        timeout(Duration::from_secs(1), polling_worker)
            .await
            .unwrap()
            .unwrap();
    }
}
