// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Configuration store contract.
//!
//! The reconciler reads and writes Kubernetes objects only through
//! [`CatalogStore`]. [`KubeStore`] talks to the API server; tests use the
//! in-memory store.
//!
//! # Write semantics
//!
//! - [`CatalogStore::update_instance_status`] writes the status and the
//!   finalizer list; the spec is ignored
//! - [`CatalogStore::update_instance_references`] writes the resolved
//!   class/plan references; the status is ignored
//!
//! Both writes carry the object's `resourceVersion` and fail with
//! [`StoreError::Conflict`] when the stored object has moved on.

pub mod kubernetes;
#[cfg(test)]
pub mod memory;

pub use kubernetes::KubeStore;

use crate::catalog::{CatalogBroker, CatalogClass, CatalogPlan, CatalogScope};
use crate::crd::{ServiceBinding, ServiceInstance};
use crate::errors::StoreError;
use async_trait::async_trait;
use std::collections::BTreeMap;

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn get_instance(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ServiceInstance>, StoreError>;

    /// Instances in `namespace`, or in every namespace when `None`.
    async fn list_instances(
        &self,
        namespace: Option<&str>,
    ) -> Result<Vec<ServiceInstance>, StoreError>;

    /// Persist status and finalizers; returns the stored object.
    async fn update_instance_status(
        &self,
        instance: &ServiceInstance,
    ) -> Result<ServiceInstance, StoreError>;

    /// Persist the resolved class/plan references; returns the stored object.
    async fn update_instance_references(
        &self,
        instance: &ServiceInstance,
    ) -> Result<ServiceInstance, StoreError>;

    async fn list_bindings(&self, namespace: &str) -> Result<Vec<ServiceBinding>, StoreError>;

    async fn get_class(
        &self,
        scope: &CatalogScope,
        name: &str,
    ) -> Result<Option<CatalogClass>, StoreError>;

    async fn list_classes(&self, scope: &CatalogScope) -> Result<Vec<CatalogClass>, StoreError>;

    async fn get_plan(
        &self,
        scope: &CatalogScope,
        name: &str,
    ) -> Result<Option<CatalogPlan>, StoreError>;

    async fn list_plans(&self, scope: &CatalogScope) -> Result<Vec<CatalogPlan>, StoreError>;

    async fn get_broker(
        &self,
        scope: &CatalogScope,
        name: &str,
    ) -> Result<Option<CatalogBroker>, StoreError>;

    async fn delete_class(&self, scope: &CatalogScope, name: &str) -> Result<(), StoreError>;

    async fn delete_plan(&self, scope: &CatalogScope, name: &str) -> Result<(), StoreError>;

    /// UID of a namespace, `None` when it does not exist.
    async fn get_namespace_uid(&self, name: &str) -> Result<Option<String>, StoreError>;

    /// Decoded data of a secret, `None` when it does not exist.
    async fn get_secret_data(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<BTreeMap<String, Vec<u8>>>, StoreError>;
}
