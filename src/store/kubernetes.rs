// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Kubernetes API implementation of [`CatalogStore`].
//!
//! Reads go through [`retry_api_call`] so transient API server errors are
//! retried in place. Writes are sent once: a conflict must reach the caller,
//! which owns the conflict retry loop.

use super::CatalogStore;
use crate::catalog::{CatalogBroker, CatalogClass, CatalogPlan, CatalogScope};
use crate::constants::{
    KIND_CLUSTER_SERVICE_BROKER, KIND_CLUSTER_SERVICE_CLASS, KIND_CLUSTER_SERVICE_PLAN,
    KIND_SERVICE_BINDING, KIND_SERVICE_BROKER, KIND_SERVICE_CLASS, KIND_SERVICE_INSTANCE,
    KIND_SERVICE_PLAN,
};
use crate::crd::{
    ClusterServiceBroker, ClusterServiceClass, ClusterServicePlan, ServiceBinding, ServiceBroker,
    ServiceClass, ServiceInstance, ServicePlan,
};
use crate::errors::StoreError;
use crate::reconcilers::retry::retry_api_call;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Namespace, Secret};
use kube::api::{DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::{Api, Client, ResourceExt};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::collections::BTreeMap;
use std::fmt::Debug;
use tracing::debug;

/// Map a kube error onto the store taxonomy.
fn store_error(kind: &str, key: &str, err: kube::Error) -> StoreError {
    match err {
        kube::Error::Api(ae) if ae.code == 409 => StoreError::Conflict {
            kind: kind.to_string(),
            key: key.to_string(),
        },
        kube::Error::Api(ae) if ae.code == 404 => StoreError::NotFound {
            kind: kind.to_string(),
            key: key.to_string(),
        },
        other => StoreError::Api(format!("{kind} {key}: {other}")),
    }
}

async fn get_opt<K>(api: &Api<K>, kind: &str, name: &str) -> Result<Option<K>, StoreError>
where
    K: Clone + DeserializeOwned + Debug,
{
    retry_api_call(|| api.get_opt(name), &format!("get {kind} {name}"))
        .await
        .map_err(|e| store_error(kind, name, e))
}

async fn list<K>(api: &Api<K>, kind: &str) -> Result<Vec<K>, StoreError>
where
    K: Clone + DeserializeOwned + Debug,
{
    let params = ListParams::default();
    retry_api_call(|| api.list(&params), &format!("list {kind}"))
        .await
        .map(|list| list.items)
        .map_err(|e| store_error(kind, "*", e))
}

async fn delete<K>(api: &Api<K>, kind: &str, name: &str) -> Result<(), StoreError>
where
    K: Clone + DeserializeOwned + Debug,
{
    match api.delete(name, &DeleteParams::default()).await {
        Ok(_) => Ok(()),
        Err(kube::Error::Api(ae)) if ae.code == 404 => {
            debug!(kind = kind, name = name, "Already deleted");
            Ok(())
        }
        Err(e) => Err(store_error(kind, name, e)),
    }
}

/// [`CatalogStore`] backed by the Kubernetes API.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn instances(&self, namespace: &str) -> Api<ServiceInstance> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

fn instance_key(instance: &ServiceInstance) -> (String, String) {
    (instance.namespace().unwrap_or_default(), instance.name_any())
}

#[async_trait]
impl CatalogStore for KubeStore {
    async fn get_instance(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ServiceInstance>, StoreError> {
        get_opt(&self.instances(namespace), KIND_SERVICE_INSTANCE, name).await
    }

    async fn list_instances(
        &self,
        namespace: Option<&str>,
    ) -> Result<Vec<ServiceInstance>, StoreError> {
        let api = match namespace {
            Some(ns) => self.instances(ns),
            None => Api::all(self.client.clone()),
        };
        list(&api, KIND_SERVICE_INSTANCE).await
    }

    async fn update_instance_status(
        &self,
        instance: &ServiceInstance,
    ) -> Result<ServiceInstance, StoreError> {
        let (namespace, name) = instance_key(instance);
        let key = format!("{namespace}/{name}");
        let api = self.instances(&namespace);

        // a replace, not a merge patch: fields dropped from the status must
        // disappear from the stored object too
        let updated = api
            .replace_status(&name, &PostParams::default(), instance)
            .await
            .map_err(|e| store_error(KIND_SERVICE_INSTANCE, &key, e))?;

        if updated.finalizers() == instance.finalizers() {
            return Ok(updated);
        }

        // The status subresource ignores metadata; finalizers go to the main resource.
        let patch = json!({
            "metadata": {
                "resourceVersion": updated.resource_version(),
                "finalizers": instance.finalizers(),
            }
        });
        api.patch(&name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|e| store_error(KIND_SERVICE_INSTANCE, &key, e))
    }

    async fn update_instance_references(
        &self,
        instance: &ServiceInstance,
    ) -> Result<ServiceInstance, StoreError> {
        let (namespace, name) = instance_key(instance);
        let patch = json!({
            "metadata": { "resourceVersion": instance.resource_version() },
            "spec": {
                "clusterServiceClassRef": instance.spec.cluster_service_class_ref,
                "clusterServicePlanRef": instance.spec.cluster_service_plan_ref,
                "serviceClassRef": instance.spec.service_class_ref,
                "servicePlanRef": instance.spec.service_plan_ref,
            }
        });
        self.instances(&namespace)
            .patch(&name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|e| store_error(KIND_SERVICE_INSTANCE, &format!("{namespace}/{name}"), e))
    }

    async fn list_bindings(&self, namespace: &str) -> Result<Vec<ServiceBinding>, StoreError> {
        let api: Api<ServiceBinding> = Api::namespaced(self.client.clone(), namespace);
        list(&api, KIND_SERVICE_BINDING).await
    }

    async fn get_class(
        &self,
        scope: &CatalogScope,
        name: &str,
    ) -> Result<Option<CatalogClass>, StoreError> {
        Ok(match scope {
            CatalogScope::Cluster => {
                let api: Api<ClusterServiceClass> = Api::all(self.client.clone());
                get_opt(&api, KIND_CLUSTER_SERVICE_CLASS, name)
                    .await?
                    .as_ref()
                    .map(CatalogClass::from)
            }
            CatalogScope::Namespaced(ns) => {
                let api: Api<ServiceClass> = Api::namespaced(self.client.clone(), ns);
                get_opt(&api, KIND_SERVICE_CLASS, name)
                    .await?
                    .as_ref()
                    .map(CatalogClass::from)
            }
        })
    }

    async fn list_classes(&self, scope: &CatalogScope) -> Result<Vec<CatalogClass>, StoreError> {
        Ok(match scope {
            CatalogScope::Cluster => {
                let api: Api<ClusterServiceClass> = Api::all(self.client.clone());
                list(&api, KIND_CLUSTER_SERVICE_CLASS)
                    .await?
                    .iter()
                    .map(CatalogClass::from)
                    .collect()
            }
            CatalogScope::Namespaced(ns) => {
                let api: Api<ServiceClass> = Api::namespaced(self.client.clone(), ns);
                list(&api, KIND_SERVICE_CLASS)
                    .await?
                    .iter()
                    .map(CatalogClass::from)
                    .collect()
            }
        })
    }

    async fn get_plan(
        &self,
        scope: &CatalogScope,
        name: &str,
    ) -> Result<Option<CatalogPlan>, StoreError> {
        Ok(match scope {
            CatalogScope::Cluster => {
                let api: Api<ClusterServicePlan> = Api::all(self.client.clone());
                get_opt(&api, KIND_CLUSTER_SERVICE_PLAN, name)
                    .await?
                    .as_ref()
                    .map(CatalogPlan::from)
            }
            CatalogScope::Namespaced(ns) => {
                let api: Api<ServicePlan> = Api::namespaced(self.client.clone(), ns);
                get_opt(&api, KIND_SERVICE_PLAN, name)
                    .await?
                    .as_ref()
                    .map(CatalogPlan::from)
            }
        })
    }

    async fn list_plans(&self, scope: &CatalogScope) -> Result<Vec<CatalogPlan>, StoreError> {
        Ok(match scope {
            CatalogScope::Cluster => {
                let api: Api<ClusterServicePlan> = Api::all(self.client.clone());
                list(&api, KIND_CLUSTER_SERVICE_PLAN)
                    .await?
                    .iter()
                    .map(CatalogPlan::from)
                    .collect()
            }
            CatalogScope::Namespaced(ns) => {
                let api: Api<ServicePlan> = Api::namespaced(self.client.clone(), ns);
                list(&api, KIND_SERVICE_PLAN)
                    .await?
                    .iter()
                    .map(CatalogPlan::from)
                    .collect()
            }
        })
    }

    async fn get_broker(
        &self,
        scope: &CatalogScope,
        name: &str,
    ) -> Result<Option<CatalogBroker>, StoreError> {
        Ok(match scope {
            CatalogScope::Cluster => {
                let api: Api<ClusterServiceBroker> = Api::all(self.client.clone());
                get_opt(&api, KIND_CLUSTER_SERVICE_BROKER, name)
                    .await?
                    .as_ref()
                    .map(CatalogBroker::from)
            }
            CatalogScope::Namespaced(ns) => {
                let api: Api<ServiceBroker> = Api::namespaced(self.client.clone(), ns);
                get_opt(&api, KIND_SERVICE_BROKER, name)
                    .await?
                    .as_ref()
                    .map(CatalogBroker::from)
            }
        })
    }

    async fn delete_class(&self, scope: &CatalogScope, name: &str) -> Result<(), StoreError> {
        match scope {
            CatalogScope::Cluster => {
                let api: Api<ClusterServiceClass> = Api::all(self.client.clone());
                delete(&api, KIND_CLUSTER_SERVICE_CLASS, name).await
            }
            CatalogScope::Namespaced(ns) => {
                let api: Api<ServiceClass> = Api::namespaced(self.client.clone(), ns);
                delete(&api, KIND_SERVICE_CLASS, name).await
            }
        }
    }

    async fn delete_plan(&self, scope: &CatalogScope, name: &str) -> Result<(), StoreError> {
        match scope {
            CatalogScope::Cluster => {
                let api: Api<ClusterServicePlan> = Api::all(self.client.clone());
                delete(&api, KIND_CLUSTER_SERVICE_PLAN, name).await
            }
            CatalogScope::Namespaced(ns) => {
                let api: Api<ServicePlan> = Api::namespaced(self.client.clone(), ns);
                delete(&api, KIND_SERVICE_PLAN, name).await
            }
        }
    }

    async fn get_namespace_uid(&self, name: &str) -> Result<Option<String>, StoreError> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        Ok(get_opt(&api, "Namespace", name)
            .await?
            .and_then(|ns| ns.metadata.uid))
    }

    async fn get_secret_data(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<BTreeMap<String, Vec<u8>>>, StoreError> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        Ok(get_opt(&api, "Secret", name).await?.map(|secret| {
            secret
                .data
                .unwrap_or_default()
                .into_iter()
                .map(|(key, value)| (key, value.0))
                .collect()
        }))
    }
}

#[cfg(test)]
#[path = "kubernetes_tests.rs"]
mod kubernetes_tests;
