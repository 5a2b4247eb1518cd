// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-memory [`CatalogStore`] for reconciler tests.
//!
//! Mirrors the API server behaviors the reconciler depends on: resource
//! versions bump on every write, stale writes conflict, and an object whose
//! deletion timestamp is set disappears once its last finalizer is removed.

use super::CatalogStore;
use crate::catalog::{CatalogBroker, CatalogClass, CatalogPlan, CatalogScope};
use crate::constants::KIND_SERVICE_INSTANCE;
use crate::crd::{ServiceBinding, ServiceInstance, ServiceInstanceStatus};
use crate::errors::StoreError;
use async_trait::async_trait;
use kube::ResourceExt;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct MemoryState {
    instances: BTreeMap<(String, String), ServiceInstance>,
    bindings: Vec<ServiceBinding>,
    classes: HashMap<(CatalogScope, String), CatalogClass>,
    plans: HashMap<(CatalogScope, String), CatalogPlan>,
    brokers: HashMap<(CatalogScope, String), CatalogBroker>,
    namespaces: HashMap<String, String>,
    secrets: HashMap<(String, String), BTreeMap<String, Vec<u8>>>,
    next_resource_version: u64,
    pending_conflicts: u32,
    status_writes: Vec<ServiceInstanceStatus>,
    reference_writes: usize,
}

impl MemoryState {
    fn bump(&mut self) -> String {
        self.next_resource_version += 1;
        self.next_resource_version.to_string()
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

fn key_of(instance: &ServiceInstance) -> (String, String) {
    (instance.namespace().unwrap_or_default(), instance.name_any())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap()
    }

    /// Store an instance as a user write would, assigning a resource version.
    pub fn put_instance(&self, mut instance: ServiceInstance) -> ServiceInstance {
        let mut state = self.lock();
        instance.metadata.resource_version = Some(state.bump());
        state.instances.insert(key_of(&instance), instance.clone());
        instance
    }

    pub fn instance(&self, namespace: &str, name: &str) -> Option<ServiceInstance> {
        self.lock()
            .instances
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    pub fn add_binding(&self, binding: ServiceBinding) {
        self.lock().bindings.push(binding);
    }

    pub fn add_class(&self, scope: CatalogScope, class: CatalogClass) {
        self.lock().classes.insert((scope, class.name.clone()), class);
    }

    pub fn add_plan(&self, scope: CatalogScope, plan: CatalogPlan) {
        self.lock().plans.insert((scope, plan.name.clone()), plan);
    }

    pub fn add_broker(&self, scope: CatalogScope, broker: CatalogBroker) {
        self.lock().brokers.insert((scope, broker.name.clone()), broker);
    }

    pub fn add_namespace(&self, name: &str, uid: &str) {
        self.lock()
            .namespaces
            .insert(name.to_string(), uid.to_string());
    }

    pub fn add_secret(&self, namespace: &str, name: &str, data: BTreeMap<String, Vec<u8>>) {
        self.lock()
            .secrets
            .insert((namespace.to_string(), name.to_string()), data);
    }

    pub fn has_class(&self, scope: &CatalogScope, name: &str) -> bool {
        self.lock()
            .classes
            .contains_key(&(scope.clone(), name.to_string()))
    }

    pub fn has_plan(&self, scope: &CatalogScope, name: &str) -> bool {
        self.lock()
            .plans
            .contains_key(&(scope.clone(), name.to_string()))
    }

    /// Make the next `count` instance writes fail with a conflict after
    /// bumping the stored resource version, as a concurrent writer would.
    pub fn inject_conflicts(&self, count: u32) {
        self.lock().pending_conflicts = count;
    }

    /// Every status successfully written, in order.
    pub fn status_writes(&self) -> Vec<ServiceInstanceStatus> {
        self.lock().status_writes.clone()
    }

    pub fn reference_writes(&self) -> usize {
        self.lock().reference_writes
    }

    fn check_write(
        state: &mut MemoryState,
        instance: &ServiceInstance,
    ) -> Result<(String, String), StoreError> {
        let key = key_of(instance);
        let conflict = || StoreError::Conflict {
            kind: KIND_SERVICE_INSTANCE.to_string(),
            key: format!("{}/{}", key.0, key.1),
        };
        let Some(stored_rv) = state
            .instances
            .get(&key)
            .map(|stored| stored.metadata.resource_version.clone())
        else {
            return Err(StoreError::NotFound {
                kind: KIND_SERVICE_INSTANCE.to_string(),
                key: format!("{}/{}", key.0, key.1),
            });
        };
        if state.pending_conflicts > 0 {
            state.pending_conflicts -= 1;
            let rv = state.bump();
            if let Some(stored) = state.instances.get_mut(&key) {
                stored.metadata.resource_version = Some(rv);
            }
            return Err(conflict());
        }
        if stored_rv != instance.metadata.resource_version {
            return Err(conflict());
        }
        Ok(key)
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn get_instance(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ServiceInstance>, StoreError> {
        Ok(self.instance(namespace, name))
    }

    async fn list_instances(
        &self,
        namespace: Option<&str>,
    ) -> Result<Vec<ServiceInstance>, StoreError> {
        Ok(self
            .lock()
            .instances
            .values()
            .filter(|i| namespace.is_none() || i.namespace().as_deref() == namespace)
            .cloned()
            .collect())
    }

    async fn update_instance_status(
        &self,
        instance: &ServiceInstance,
    ) -> Result<ServiceInstance, StoreError> {
        let mut state = self.lock();
        let key = Self::check_write(&mut state, instance)?;
        let rv = state.bump();
        let status = instance.status.clone();

        let stored = state.instances.get_mut(&key).expect("checked above");
        stored.status.clone_from(&status);
        stored.metadata.finalizers.clone_from(&instance.metadata.finalizers);
        stored.metadata.resource_version = Some(rv);
        let updated = stored.clone();

        if updated.metadata.deletion_timestamp.is_some() && updated.finalizers().is_empty() {
            state.instances.remove(&key);
        }
        if let Some(status) = status {
            state.status_writes.push(status);
        }
        Ok(updated)
    }

    async fn update_instance_references(
        &self,
        instance: &ServiceInstance,
    ) -> Result<ServiceInstance, StoreError> {
        let mut state = self.lock();
        let key = Self::check_write(&mut state, instance)?;
        let rv = state.bump();
        state.reference_writes += 1;

        let stored = state.instances.get_mut(&key).expect("checked above");
        stored.spec.cluster_service_class_ref = instance.spec.cluster_service_class_ref.clone();
        stored.spec.cluster_service_plan_ref = instance.spec.cluster_service_plan_ref.clone();
        stored.spec.service_class_ref = instance.spec.service_class_ref.clone();
        stored.spec.service_plan_ref = instance.spec.service_plan_ref.clone();
        stored.metadata.resource_version = Some(rv);
        Ok(stored.clone())
    }

    async fn list_bindings(&self, namespace: &str) -> Result<Vec<ServiceBinding>, StoreError> {
        Ok(self
            .lock()
            .bindings
            .iter()
            .filter(|b| b.namespace().as_deref() == Some(namespace))
            .cloned()
            .collect())
    }

    async fn get_class(
        &self,
        scope: &CatalogScope,
        name: &str,
    ) -> Result<Option<CatalogClass>, StoreError> {
        Ok(self
            .lock()
            .classes
            .get(&(scope.clone(), name.to_string()))
            .cloned())
    }

    async fn list_classes(&self, scope: &CatalogScope) -> Result<Vec<CatalogClass>, StoreError> {
        Ok(self
            .lock()
            .classes
            .iter()
            .filter(|((s, _), _)| s == scope)
            .map(|(_, c)| c.clone())
            .collect())
    }

    async fn get_plan(
        &self,
        scope: &CatalogScope,
        name: &str,
    ) -> Result<Option<CatalogPlan>, StoreError> {
        Ok(self
            .lock()
            .plans
            .get(&(scope.clone(), name.to_string()))
            .cloned())
    }

    async fn list_plans(&self, scope: &CatalogScope) -> Result<Vec<CatalogPlan>, StoreError> {
        Ok(self
            .lock()
            .plans
            .iter()
            .filter(|((s, _), _)| s == scope)
            .map(|(_, p)| p.clone())
            .collect())
    }

    async fn get_broker(
        &self,
        scope: &CatalogScope,
        name: &str,
    ) -> Result<Option<CatalogBroker>, StoreError> {
        Ok(self
            .lock()
            .brokers
            .get(&(scope.clone(), name.to_string()))
            .cloned())
    }

    async fn delete_class(&self, scope: &CatalogScope, name: &str) -> Result<(), StoreError> {
        self.lock().classes.remove(&(scope.clone(), name.to_string()));
        Ok(())
    }

    async fn delete_plan(&self, scope: &CatalogScope, name: &str) -> Result<(), StoreError> {
        self.lock().plans.remove(&(scope.clone(), name.to_string()));
        Ok(())
    }

    async fn get_namespace_uid(&self, name: &str) -> Result<Option<String>, StoreError> {
        Ok(self.lock().namespaces.get(name).cloned())
    }

    async fn get_secret_data(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<BTreeMap<String, Vec<u8>>>, StoreError> {
        Ok(self
            .lock()
            .secrets
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }
}
