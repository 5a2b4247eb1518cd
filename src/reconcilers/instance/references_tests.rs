// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `references.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::crd::{LocalObjectReference, ServiceInstanceStatus};
    use crate::testing::*;

    fn other_class(name: &str, external_name: &str) -> CatalogClass {
        CatalogClass {
            name: name.to_string(),
            external_name: external_name.to_string(),
            external_id: format!("{name}-id"),
            ..catalog_class()
        }
    }

    #[test]
    fn test_nonexistent_message() {
        let selector = CatalogSelector::ExternalName("C".to_string());
        assert_eq!(
            nonexistent_message("ClusterServiceClass", &selector, 0),
            "References a non-existent ClusterServiceClass (externalName: \"C\")"
        );
        assert_eq!(
            nonexistent_message("ClusterServiceClass", &selector, 2),
            "References a non-existent ClusterServiceClass (externalName: \"C\") or there is more than one (found: 2)"
        );
    }

    #[tokio::test]
    async fn test_find_class_by_each_selector() {
        let h = Harness::new(&CatalogScope::Cluster);
        let scope = CatalogScope::Cluster;

        for selector in [
            CatalogSelector::Name(TEST_CLASS_NAME.to_string()),
            CatalogSelector::ExternalName("C".to_string()),
            CatalogSelector::ExternalId(TEST_CLASS_EXTERNAL_ID.to_string()),
        ] {
            let class = find_class(&h.ctx, &scope, &selector).await.unwrap();
            assert_eq!(class.name, TEST_CLASS_NAME, "{selector}");
        }
    }

    #[tokio::test]
    async fn test_find_class_rejects_ambiguous_external_name() {
        let h = Harness::new(&CatalogScope::Cluster);
        h.store
            .add_class(CatalogScope::Cluster, other_class("class-d", "C"));

        let err = find_class(
            &h.ctx,
            &CatalogScope::Cluster,
            &CatalogSelector::ExternalName("C".to_string()),
        )
        .await
        .unwrap_err();

        let ReconcileError::Operation(op) = err else {
            panic!("expected an operation error, got {err:?}");
        };
        assert_eq!(op.reason, REASON_REFERENCES_NONEXISTENT_SERVICE_CLASS);
        assert!(op.message.contains("found: 2"));
    }

    #[tokio::test]
    async fn test_find_class_ignores_other_scope() {
        let h = Harness::new(&CatalogScope::Namespaced(TEST_NAMESPACE.to_string()));

        let result = find_class(
            &h.ctx,
            &CatalogScope::Cluster,
            &CatalogSelector::ExternalName("C".to_string()),
        )
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_find_plan_only_considers_plans_of_the_class() {
        let h = Harness::new(&CatalogScope::Cluster);
        h.store.add_plan(
            CatalogScope::Cluster,
            CatalogPlan {
                name: "plan-of-d".to_string(),
                class_name: "class-d".to_string(),
                ..catalog_plan()
            },
        );
        h.store.add_plan(
            CatalogScope::Cluster,
            CatalogPlan {
                name: "plan-of-other-broker".to_string(),
                broker_name: "b2".to_string(),
                ..catalog_plan()
            },
        );

        let plan = find_plan(
            &h.ctx,
            &CatalogScope::Cluster,
            &catalog_class(),
            &CatalogSelector::ExternalName("P".to_string()),
        )
        .await
        .unwrap();
        assert_eq!(plan.name, TEST_PLAN_NAME);

        let err = find_plan(
            &h.ctx,
            &CatalogScope::Cluster,
            &catalog_class(),
            &CatalogSelector::ExternalName("Q".to_string()),
        )
        .await
        .unwrap_err();
        let ReconcileError::Operation(op) = err else {
            panic!("expected an operation error, got {err:?}");
        };
        assert_eq!(op.reason, REASON_REFERENCES_NONEXISTENT_SERVICE_PLAN);
    }

    #[tokio::test]
    async fn test_resolve_references_writes_both_refs() {
        let h = Harness::new(&CatalogScope::Cluster);
        let mut instance = h.put(service_instance("i1"));
        instance.status = Some(ServiceInstanceStatus {
            observed_generation: 1,
            ..Default::default()
        });

        assert!(resolve_references(&h.ctx, &mut instance).await.unwrap());

        // the in-memory status is kept for the caller
        assert_eq!(instance.status.as_ref().unwrap().observed_generation, 1);
        let stored = h.stored("i1").unwrap();
        assert_eq!(
            stored.spec.cluster_service_class_ref,
            Some(LocalObjectReference {
                name: TEST_CLASS_NAME.to_string()
            })
        );
        assert_eq!(
            stored.spec.cluster_service_plan_ref,
            Some(LocalObjectReference {
                name: TEST_PLAN_NAME.to_string()
            })
        );
        assert_eq!(h.store.reference_writes(), 1);
    }

    #[tokio::test]
    async fn test_resolve_references_fills_missing_plan_ref() {
        let h = Harness::new(&CatalogScope::Cluster);
        let mut instance = resolved_instance("i1");
        instance.spec.cluster_service_plan_ref = None;
        let mut instance = h.put(instance);

        assert!(resolve_references(&h.ctx, &mut instance).await.unwrap());
        assert_eq!(
            instance.spec.cluster_service_plan_ref.map(|r| r.name),
            Some(TEST_PLAN_NAME.to_string())
        );
    }

    #[tokio::test]
    async fn test_resolve_references_noop_when_resolved() {
        let h = Harness::new(&CatalogScope::Cluster);
        let mut instance = h.put(resolved_instance("i1"));

        assert!(!resolve_references(&h.ctx, &mut instance).await.unwrap());
        assert_eq!(h.store.reference_writes(), 0);
    }

    fn plan_q() -> CatalogPlan {
        CatalogPlan {
            name: "plan-q".to_string(),
            external_name: "Q".to_string(),
            external_id: "plan-q-id".to_string(),
            ..catalog_plan()
        }
    }

    #[tokio::test]
    async fn test_resolve_references_replaces_stale_plan_ref() {
        let h = Harness::new(&CatalogScope::Cluster);
        h.store.add_plan(CatalogScope::Cluster, plan_q());
        let mut instance = resolved_instance("i1");
        instance.spec.cluster_service_plan_external_name = Some("Q".to_string());
        let mut instance = h.put(instance);

        assert!(resolve_references(&h.ctx, &mut instance).await.unwrap());

        let stored = h.stored("i1").unwrap();
        assert_eq!(
            stored.spec.cluster_service_plan_ref.map(|r| r.name),
            Some("plan-q".to_string())
        );
        assert_eq!(
            stored.spec.cluster_service_class_ref.map(|r| r.name),
            Some(TEST_CLASS_NAME.to_string())
        );
        assert_eq!(h.store.reference_writes(), 1);
    }

    #[tokio::test]
    async fn test_resolve_references_replaces_stale_class_and_plan_refs() {
        let h = Harness::new(&CatalogScope::Cluster);
        h.store
            .add_class(CatalogScope::Cluster, other_class("class-d", "D"));
        h.store.add_plan(
            CatalogScope::Cluster,
            CatalogPlan {
                name: "plan-of-d".to_string(),
                external_id: "plan-of-d-id".to_string(),
                class_name: "class-d".to_string(),
                ..catalog_plan()
            },
        );
        let mut instance = resolved_instance("i1");
        instance.spec.cluster_service_class_external_name = Some("D".to_string());
        let mut instance = h.put(instance);

        assert!(resolve_references(&h.ctx, &mut instance).await.unwrap());

        assert_eq!(
            instance.spec.cluster_service_class_ref.map(|r| r.name),
            Some("class-d".to_string())
        );
        assert_eq!(
            instance.spec.cluster_service_plan_ref.map(|r| r.name),
            Some("plan-of-d".to_string())
        );
    }

    #[tokio::test]
    async fn test_resolve_references_keeps_ref_to_missing_object() {
        let h = Harness::new(&CatalogScope::Cluster);
        let mut instance = resolved_instance("i1");
        instance.spec.cluster_service_plan_ref = Some(LocalObjectReference {
            name: "gone".to_string(),
        });
        let mut instance = h.put(instance);

        assert!(!resolve_references(&h.ctx, &mut instance).await.unwrap());
        assert_eq!(h.store.reference_writes(), 0);
    }

    #[tokio::test]
    async fn test_resolve_references_without_scope() {
        let h = Harness::new(&CatalogScope::Cluster);
        let mut instance = service_instance("i1");
        instance.spec.cluster_service_class_external_name = None;
        let mut instance = h.put(instance);

        let err = resolve_references(&h.ctx, &mut instance).await.unwrap_err();
        assert_eq!(err.to_string(), MESSAGE_AMBIGUOUS_PLAN_REFERENCE_SCOPE);
        assert!(h.events.events().is_empty());
    }

    #[tokio::test]
    async fn test_resolve_references_records_missing_plan() {
        let h = Harness::new(&CatalogScope::Cluster);
        let mut instance = service_instance("i1");
        instance.spec.cluster_service_plan_external_name = Some("Q".to_string());
        instance.status = Some(ServiceInstanceStatus::default());
        let mut instance = h.put(instance);

        assert!(resolve_references(&h.ctx, &mut instance).await.is_err());

        assert!(h
            .events
            .has_warning(REASON_REFERENCES_NONEXISTENT_SERVICE_PLAN));
        let stored = h.stored("i1").unwrap();
        let ready = crate::reconcilers::status::find_condition(
            &stored.status.as_ref().unwrap().conditions,
            CONDITION_TYPE_READY,
        )
        .unwrap();
        assert_eq!(ready.status, CONDITION_STATUS_FALSE);
        assert!(stored.spec.cluster_service_class_ref.is_none());
    }
}
