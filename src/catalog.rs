// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Scope-independent views of catalog objects.
//!
//! Cluster-scoped and namespaced classes, plans and brokers have the same shape.
//! The reconciler works on these views so that each branch handles a single
//! call site regardless of the scope of the referenced objects.

use crate::crd::{
    BrokerAuthInfo, ClusterServiceBroker, ClusterServiceClass, ClusterServicePlan, PlanReference,
    ServiceBroker, ServiceClass, ServicePlan,
};
use crate::status_reasons::{
    REASON_REFERENCES_DELETED_CLUSTER_SERVICE_CLASS, REASON_REFERENCES_DELETED_CLUSTER_SERVICE_PLAN,
    REASON_REFERENCES_DELETED_SERVICE_CLASS, REASON_REFERENCES_DELETED_SERVICE_PLAN,
    REASON_REFERENCES_NONEXISTENT_CLUSTER_SERVICE_BROKER,
    REASON_REFERENCES_NONEXISTENT_CLUSTER_SERVICE_CLASS,
    REASON_REFERENCES_NONEXISTENT_CLUSTER_SERVICE_PLAN,
    REASON_REFERENCES_NONEXISTENT_SERVICE_BROKER, REASON_REFERENCES_NONEXISTENT_SERVICE_CLASS,
    REASON_REFERENCES_NONEXISTENT_SERVICE_PLAN,
};
use kube::ResourceExt;
use std::fmt;

/// Where catalog objects referenced by an instance live.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum CatalogScope {
    Cluster,
    Namespaced(String),
}

impl CatalogScope {
    /// Scope of the catalog objects named by `reference` for an instance in `namespace`.
    #[must_use]
    pub fn for_reference(reference: &PlanReference, namespace: &str) -> Self {
        if reference.is_cluster_scoped() {
            Self::Cluster
        } else {
            Self::Namespaced(namespace.to_string())
        }
    }

    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        match self {
            Self::Cluster => None,
            Self::Namespaced(ns) => Some(ns.as_str()),
        }
    }

    #[must_use]
    pub fn class_kind(&self) -> &'static str {
        match self {
            Self::Cluster => "ClusterServiceClass",
            Self::Namespaced(_) => "ServiceClass",
        }
    }

    #[must_use]
    pub fn plan_kind(&self) -> &'static str {
        match self {
            Self::Cluster => "ClusterServicePlan",
            Self::Namespaced(_) => "ServicePlan",
        }
    }

    #[must_use]
    pub fn broker_kind(&self) -> &'static str {
        match self {
            Self::Cluster => "ClusterServiceBroker",
            Self::Namespaced(_) => "ServiceBroker",
        }
    }

    #[must_use]
    pub fn nonexistent_class_reason(&self) -> &'static str {
        match self {
            Self::Cluster => REASON_REFERENCES_NONEXISTENT_CLUSTER_SERVICE_CLASS,
            Self::Namespaced(_) => REASON_REFERENCES_NONEXISTENT_SERVICE_CLASS,
        }
    }

    #[must_use]
    pub fn nonexistent_plan_reason(&self) -> &'static str {
        match self {
            Self::Cluster => REASON_REFERENCES_NONEXISTENT_CLUSTER_SERVICE_PLAN,
            Self::Namespaced(_) => REASON_REFERENCES_NONEXISTENT_SERVICE_PLAN,
        }
    }

    #[must_use]
    pub fn nonexistent_broker_reason(&self) -> &'static str {
        match self {
            Self::Cluster => REASON_REFERENCES_NONEXISTENT_CLUSTER_SERVICE_BROKER,
            Self::Namespaced(_) => REASON_REFERENCES_NONEXISTENT_SERVICE_BROKER,
        }
    }

    #[must_use]
    pub fn deleted_class_reason(&self) -> &'static str {
        match self {
            Self::Cluster => REASON_REFERENCES_DELETED_CLUSTER_SERVICE_CLASS,
            Self::Namespaced(_) => REASON_REFERENCES_DELETED_SERVICE_CLASS,
        }
    }

    #[must_use]
    pub fn deleted_plan_reason(&self) -> &'static str {
        match self {
            Self::Cluster => REASON_REFERENCES_DELETED_CLUSTER_SERVICE_PLAN,
            Self::Namespaced(_) => REASON_REFERENCES_DELETED_SERVICE_PLAN,
        }
    }
}

/// A service class in either scope.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CatalogClass {
    pub name: String,
    pub external_name: String,
    pub external_id: String,
    pub broker_name: String,
    pub removed_from_broker_catalog: bool,
}

impl fmt::Display for CatalogClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(K8S: {:?} ExternalName: {:?})",
            self.name, self.external_name
        )
    }
}

/// A service plan in either scope.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CatalogPlan {
    pub name: String,
    pub external_name: String,
    pub external_id: String,
    pub broker_name: String,
    pub class_name: String,
    pub removed_from_broker_catalog: bool,
}

impl fmt::Display for CatalogPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(K8S: {:?} ExternalName: {:?})",
            self.name, self.external_name
        )
    }
}

/// A broker endpoint in either scope.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CatalogBroker {
    pub name: String,
    /// `None` for a `ClusterServiceBroker`.
    pub namespace: Option<String>,
    pub url: String,
    pub insecure_skip_tls_verify: bool,
    pub ca_bundle: Option<String>,
    pub auth_info: Option<BrokerAuthInfo>,
}

impl From<&ClusterServiceClass> for CatalogClass {
    fn from(class: &ClusterServiceClass) -> Self {
        Self {
            name: class.name_any(),
            external_name: class.spec.external_name.clone(),
            external_id: class.spec.external_id.clone(),
            broker_name: class.spec.cluster_service_broker_name.clone(),
            removed_from_broker_catalog: class
                .status
                .as_ref()
                .is_some_and(|s| s.removed_from_broker_catalog),
        }
    }
}

impl From<&ServiceClass> for CatalogClass {
    fn from(class: &ServiceClass) -> Self {
        Self {
            name: class.name_any(),
            external_name: class.spec.external_name.clone(),
            external_id: class.spec.external_id.clone(),
            broker_name: class.spec.service_broker_name.clone(),
            removed_from_broker_catalog: class
                .status
                .as_ref()
                .is_some_and(|s| s.removed_from_broker_catalog),
        }
    }
}

impl From<&ClusterServicePlan> for CatalogPlan {
    fn from(plan: &ClusterServicePlan) -> Self {
        Self {
            name: plan.name_any(),
            external_name: plan.spec.external_name.clone(),
            external_id: plan.spec.external_id.clone(),
            broker_name: plan.spec.cluster_service_broker_name.clone(),
            class_name: plan.spec.cluster_service_class_ref.name.clone(),
            removed_from_broker_catalog: plan
                .status
                .as_ref()
                .is_some_and(|s| s.removed_from_broker_catalog),
        }
    }
}

impl From<&ServicePlan> for CatalogPlan {
    fn from(plan: &ServicePlan) -> Self {
        Self {
            name: plan.name_any(),
            external_name: plan.spec.external_name.clone(),
            external_id: plan.spec.external_id.clone(),
            broker_name: plan.spec.service_broker_name.clone(),
            class_name: plan.spec.service_class_ref.name.clone(),
            removed_from_broker_catalog: plan
                .status
                .as_ref()
                .is_some_and(|s| s.removed_from_broker_catalog),
        }
    }
}

impl From<&ClusterServiceBroker> for CatalogBroker {
    fn from(broker: &ClusterServiceBroker) -> Self {
        Self {
            name: broker.name_any(),
            namespace: None,
            url: broker.spec.url.clone(),
            insecure_skip_tls_verify: broker.spec.insecure_skip_tls_verify,
            ca_bundle: broker.spec.ca_bundle.clone(),
            auth_info: broker.spec.auth_info.clone(),
        }
    }
}

impl From<&ServiceBroker> for CatalogBroker {
    fn from(broker: &ServiceBroker) -> Self {
        Self {
            name: broker.name_any(),
            namespace: broker.namespace(),
            url: broker.spec.url.clone(),
            insecure_skip_tls_verify: broker.spec.insecure_skip_tls_verify,
            ca_bundle: broker.spec.ca_bundle.clone(),
            auth_info: broker.spec.auth_info.clone(),
        }
    }
}

#[cfg(test)]
#[path = "catalog_tests.rs"]
mod catalog_tests;
