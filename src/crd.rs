// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Custom Resource Definitions (CRDs) for the Open Service Broker service catalog.
//!
//! This module defines all Kubernetes Custom Resource Definitions used by catalogd.
//! All resources live in the `servicecatalog.k8s.io/v1beta1` API group.
//!
//! # Resource Types
//!
//! ## Instances and Bindings
//!
//! - [`ServiceInstance`] - A provisioned resource obtained from a broker
//! - [`ServiceBinding`] - Credentials for a `ServiceInstance`; blocks its deletion
//!
//! ## Catalog
//!
//! - [`ClusterServiceClass`] / [`ServiceClass`] - Services advertised by a broker
//! - [`ClusterServicePlan`] / [`ServicePlan`] - Plans of a service class
//! - [`ClusterServiceBroker`] / [`ServiceBroker`] - Broker endpoints and credentials
//!
//! The `Cluster*` kinds are cluster-scoped; the others live in a namespace.
//!
//! # Example: Provisioning an Instance
//!
//! ```rust,no_run
//! use catalogd::crd::ServiceInstanceSpec;
//!
//! let spec = ServiceInstanceSpec {
//!     cluster_service_class_external_name: Some("mysql".to_string()),
//!     cluster_service_plan_external_name: Some("small".to_string()),
//!     external_id: "0b9e2c4a-7c4b-4fa2-9b6e-2d0d5f0e2a11".to_string(),
//!     ..Default::default()
//! };
//! ```

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Schema for free-form JSON objects (broker parameters).
fn preserve_unknown_fields(_: &mut schemars::SchemaGenerator) -> schemars::Schema {
    schemars::json_schema!({
        "type": "object",
        "nullable": true,
        "x-kubernetes-preserve-unknown-fields": true
    })
}

/// Condition represents an observation of a resource's current state.
///
/// Conditions are used in status subresources to communicate the state of
/// a resource to users and controllers.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition: Ready, Failed or `OrphanMitigation`.
    pub r#type: String,

    /// Status of the condition: True, False, or Unknown.
    pub status: String,

    /// Brief CamelCase reason for the condition's last transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human-readable message indicating details about the transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Last time the condition transitioned from one status to another (RFC3339 format).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

/// Reference to an object by name, in the same scope as the referrer.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq, JsonSchema)]
pub struct LocalObjectReference {
    pub name: String,
}

/// Reference to a secret, optionally in another namespace.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecretReference {
    /// Secret namespace. Defaults to the namespace of the referring object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub name: String,
}

/// A single key of a secret.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq, JsonSchema)]
pub struct SecretKeyReference {
    pub name: String,
    pub key: String,
}

/// Source of parameters held outside the instance spec.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ParametersFromSource {
    /// A secret key whose value is a JSON object of parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_key_ref: Option<SecretKeyReference>,
}

/// Identity of the user that last changed the instance spec.
///
/// Sent to brokers as the originating identity when that feature is enabled.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub username: String,
    pub uid: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Vec<String>>,
}

// ============================================================================
// ServiceInstance
// ============================================================================

/// `ServiceInstance` declares a resource to be provisioned by a broker.
///
/// The class and plan are named either cluster-scoped (`clusterServiceClass*`,
/// `clusterServicePlan*`) or namespaced (`serviceClass*`, `servicePlan*`), each by
/// external name, external ID, or Kubernetes object name. The controller resolves
/// them into the `*Ref` fields.
///
/// # Example YAML
///
/// ```yaml
/// apiVersion: servicecatalog.k8s.io/v1beta1
/// kind: ServiceInstance
/// metadata:
///   name: orders-db
///   namespace: shop
/// spec:
///   clusterServiceClassExternalName: mysql
///   clusterServicePlanExternalName: small
///   externalID: 0b9e2c4a-7c4b-4fa2-9b6e-2d0d5f0e2a11
///   parameters:
///     storageGb: 20
/// ```
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[kube(
    group = "servicecatalog.k8s.io",
    version = "v1beta1",
    kind = "ServiceInstance",
    namespaced,
    doc = "ServiceInstance represents a provisioned instance of a ServiceClass/ServicePlan obtained from an Open Service Broker."
)]
#[kube(status = "ServiceInstanceStatus")]
#[serde(rename_all = "camelCase")]
pub struct ServiceInstanceSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_service_class_external_name: Option<String>,
    #[serde(
        default,
        rename = "clusterServiceClassExternalID",
        skip_serializing_if = "Option::is_none"
    )]
    pub cluster_service_class_external_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_service_class_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_service_plan_external_name: Option<String>,
    #[serde(
        default,
        rename = "clusterServicePlanExternalID",
        skip_serializing_if = "Option::is_none"
    )]
    pub cluster_service_plan_external_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_service_plan_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_class_external_name: Option<String>,
    #[serde(
        default,
        rename = "serviceClassExternalID",
        skip_serializing_if = "Option::is_none"
    )]
    pub service_class_external_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_class_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_plan_external_name: Option<String>,
    #[serde(
        default,
        rename = "servicePlanExternalID",
        skip_serializing_if = "Option::is_none"
    )]
    pub service_plan_external_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_plan_name: Option<String>,

    /// Resolved `ClusterServiceClass`. Written by the controller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_service_class_ref: Option<LocalObjectReference>,
    /// Resolved `ClusterServicePlan`. Written by the controller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_service_plan_ref: Option<LocalObjectReference>,
    /// Resolved `ServiceClass`. Written by the controller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_class_ref: Option<LocalObjectReference>,
    /// Resolved `ServicePlan`. Written by the controller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_plan_ref: Option<LocalObjectReference>,

    /// Instance ID sent to the broker. Stable for the lifetime of the instance.
    #[serde(default, rename = "externalID")]
    pub external_id: String,

    /// Parameters passed to the broker.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "preserve_unknown_fields")]
    pub parameters: Option<Map<String, Value>>,

    /// Parameters held in secrets, merged with `parameters`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters_from: Vec<ParametersFromSource>,

    /// Identity of the requesting user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_info: Option<UserInfo>,
}

/// Selects a catalog object by one of its identifiers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CatalogSelector {
    /// The broker-advertised name.
    ExternalName(String),
    /// The broker-advertised ID.
    ExternalId(String),
    /// The Kubernetes object name.
    Name(String),
}

impl fmt::Display for CatalogSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExternalName(v) => write!(f, "(externalName: {v:?})"),
            Self::ExternalId(v) => write!(f, "(externalID: {v:?})"),
            Self::Name(v) => write!(f, "(K8S: {v:?})"),
        }
    }
}

/// The class and plan a `ServiceInstance` asks for, in one of the two catalog scopes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlanReference {
    ClusterScoped {
        class: CatalogSelector,
        plan: CatalogSelector,
    },
    NamespaceScoped {
        class: CatalogSelector,
        plan: CatalogSelector,
    },
}

impl PlanReference {
    #[must_use]
    pub fn class(&self) -> &CatalogSelector {
        match self {
            Self::ClusterScoped { class, .. } | Self::NamespaceScoped { class, .. } => class,
        }
    }

    #[must_use]
    pub fn plan(&self) -> &CatalogSelector {
        match self {
            Self::ClusterScoped { plan, .. } | Self::NamespaceScoped { plan, .. } => plan,
        }
    }

    #[must_use]
    pub fn is_cluster_scoped(&self) -> bool {
        matches!(self, Self::ClusterScoped { .. })
    }
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value.filter(|v| !v.is_empty()).cloned()
}

fn selector(
    name: Option<&String>,
    external_name: Option<&String>,
    external_id: Option<&String>,
) -> Option<CatalogSelector> {
    non_empty(name)
        .map(CatalogSelector::Name)
        .or_else(|| non_empty(external_name).map(CatalogSelector::ExternalName))
        .or_else(|| non_empty(external_id).map(CatalogSelector::ExternalId))
}

impl ServiceInstanceSpec {
    /// True when any cluster-scoped class identifier is set.
    #[must_use]
    pub fn cluster_service_class_specified(&self) -> bool {
        selector(
            self.cluster_service_class_name.as_ref(),
            self.cluster_service_class_external_name.as_ref(),
            self.cluster_service_class_external_id.as_ref(),
        )
        .is_some()
    }

    /// True when any namespaced class identifier is set.
    #[must_use]
    pub fn service_class_specified(&self) -> bool {
        selector(
            self.service_class_name.as_ref(),
            self.service_class_external_name.as_ref(),
            self.service_class_external_id.as_ref(),
        )
        .is_some()
    }

    /// Classify the class/plan identifiers into a [`PlanReference`].
    ///
    /// Returns `None` when the scope cannot be determined or the plan is missing.
    #[must_use]
    pub fn plan_reference(&self) -> Option<PlanReference> {
        if self.cluster_service_class_specified() {
            let class = selector(
                self.cluster_service_class_name.as_ref(),
                self.cluster_service_class_external_name.as_ref(),
                self.cluster_service_class_external_id.as_ref(),
            )?;
            let plan = selector(
                self.cluster_service_plan_name.as_ref(),
                self.cluster_service_plan_external_name.as_ref(),
                self.cluster_service_plan_external_id.as_ref(),
            )?;
            return Some(PlanReference::ClusterScoped { class, plan });
        }
        if self.service_class_specified() {
            let class = selector(
                self.service_class_name.as_ref(),
                self.service_class_external_name.as_ref(),
                self.service_class_external_id.as_ref(),
            )?;
            let plan = selector(
                self.service_plan_name.as_ref(),
                self.service_plan_external_name.as_ref(),
                self.service_plan_external_id.as_ref(),
            )?;
            return Some(PlanReference::NamespaceScoped { class, plan });
        }
        None
    }

    /// Resolved class object name for the given scope.
    #[must_use]
    pub fn class_ref(&self, reference: &PlanReference) -> Option<&str> {
        match reference {
            PlanReference::ClusterScoped { .. } => self.cluster_service_class_ref.as_ref(),
            PlanReference::NamespaceScoped { .. } => self.service_class_ref.as_ref(),
        }
        .map(|r| r.name.as_str())
    }

    /// Resolved plan object name for the given scope.
    #[must_use]
    pub fn plan_ref(&self, reference: &PlanReference) -> Option<&str> {
        match reference {
            PlanReference::ClusterScoped { .. } => self.cluster_service_plan_ref.as_ref(),
            PlanReference::NamespaceScoped { .. } => self.service_plan_ref.as_ref(),
        }
        .map(|r| r.name.as_str())
    }

    pub fn set_class_ref(&mut self, reference: &PlanReference, name: &str) {
        let value = Some(LocalObjectReference {
            name: name.to_string(),
        });
        match reference {
            PlanReference::ClusterScoped { .. } => self.cluster_service_class_ref = value,
            PlanReference::NamespaceScoped { .. } => self.service_class_ref = value,
        }
    }

    pub fn clear_class_ref(&mut self, reference: &PlanReference) {
        match reference {
            PlanReference::ClusterScoped { .. } => self.cluster_service_class_ref = None,
            PlanReference::NamespaceScoped { .. } => self.service_class_ref = None,
        }
    }

    pub fn clear_plan_ref(&mut self, reference: &PlanReference) {
        match reference {
            PlanReference::ClusterScoped { .. } => self.cluster_service_plan_ref = None,
            PlanReference::NamespaceScoped { .. } => self.service_plan_ref = None,
        }
    }

    pub fn set_plan_ref(&mut self, reference: &PlanReference, name: &str) {
        let value = Some(LocalObjectReference {
            name: name.to_string(),
        });
        match reference {
            PlanReference::ClusterScoped { .. } => self.cluster_service_plan_ref = value,
            PlanReference::NamespaceScoped { .. } => self.service_plan_ref = value,
        }
    }
}

/// Operation the controller is currently driving at the broker.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub enum ServiceInstanceOperation {
    Provision,
    Update,
    Deprovision,
}

impl fmt::Display for ServiceInstanceOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Provision => "Provision",
            Self::Update => "Update",
            Self::Deprovision => "Deprovision",
        };
        f.write_str(s)
    }
}

/// Whether the broker holds a resource for this instance.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Default, PartialEq, Eq, JsonSchema)]
pub enum ProvisionStatus {
    #[default]
    NotProvisioned,
    Provisioned,
}

/// Whether a deprovision request must be sent before the instance may be deleted.
///
/// Unrecognized values are preserved so that the delete path can report them.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(from = "String", into = "String")]
pub enum DeprovisionStatus {
    #[default]
    NotRequired,
    Required,
    Succeeded,
    Failed,
    Unrecognized(String),
}

impl From<String> for DeprovisionStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "NotRequired" => Self::NotRequired,
            "Required" => Self::Required,
            "Succeeded" => Self::Succeeded,
            "Failed" => Self::Failed,
            _ => Self::Unrecognized(value),
        }
    }
}

impl From<DeprovisionStatus> for String {
    fn from(value: DeprovisionStatus) -> Self {
        value.to_string()
    }
}

impl fmt::Display for DeprovisionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotRequired => f.write_str("NotRequired"),
            Self::Required => f.write_str("Required"),
            Self::Succeeded => f.write_str("Succeeded"),
            Self::Failed => f.write_str("Failed"),
            Self::Unrecognized(v) => f.write_str(v),
        }
    }
}

/// Properties of the instance as sent (or about to be sent) to the broker.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PropertiesState {
    #[serde(rename = "planExternalID")]
    pub plan_external_id: String,
    pub plan_external_name: String,
    /// Parameters with every secret-sourced value redacted.
    #[serde(default)]
    #[schemars(schema_with = "preserve_unknown_fields")]
    pub parameters: Option<Map<String, Value>>,
    /// SHA-256 of the realized parameters.
    #[serde(default)]
    pub parameter_checksum: Option<String>,
    #[serde(default)]
    pub user_info: Option<UserInfo>,
}

/// Status of a `ServiceInstance`. Owned by the controller.
///
/// Optional fields, here and in [`PropertiesState`], serialize as `null`.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInstanceStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub async_op_in_progress: bool,
    #[serde(default)]
    pub orphan_mitigation_in_progress: bool,
    /// Opaque operation key returned by the broker for an async operation.
    #[serde(default)]
    pub last_operation: Option<String>,
    #[serde(default, rename = "dashboardURL")]
    pub dashboard_url: Option<String>,
    #[serde(default)]
    pub current_operation: Option<ServiceInstanceOperation>,
    #[serde(default)]
    pub reconciled_generation: i64,
    #[serde(default)]
    pub observed_generation: i64,
    /// RFC3339 start time of `currentOperation`.
    #[serde(default)]
    pub operation_start_time: Option<String>,
    #[serde(default)]
    pub in_progress_properties: Option<PropertiesState>,
    #[serde(default)]
    pub external_properties: Option<PropertiesState>,
    #[serde(default)]
    pub provision_status: ProvisionStatus,
    #[serde(default)]
    #[schemars(with = "String")]
    pub deprovision_status: DeprovisionStatus,
}

// ============================================================================
// ServiceBinding
// ============================================================================

/// `ServiceBinding` requests credentials for a `ServiceInstance`.
///
/// Only the instance reference is used by catalogd: an existing binding blocks
/// deletion of the instance it names.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "servicecatalog.k8s.io",
    version = "v1beta1",
    kind = "ServiceBinding",
    namespaced,
    doc = "ServiceBinding represents a request for credentials to a ServiceInstance."
)]
#[kube(status = "ServiceBindingStatus")]
#[serde(rename_all = "camelCase")]
pub struct ServiceBindingSpec {
    /// The `ServiceInstance` in the same namespace.
    pub instance_ref: LocalObjectReference,
    /// Secret that receives the credentials.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_name: Option<String>,
}

/// `ServiceBinding` status
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServiceBindingStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

// ============================================================================
// Catalog: classes and plans
// ============================================================================

/// Status shared by class and plan kinds.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntryStatus {
    /// Set when the broker no longer advertises this entry.
    #[serde(default)]
    pub removed_from_broker_catalog: bool,
}

/// A cluster-wide service offered by a `ClusterServiceBroker`.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "servicecatalog.k8s.io",
    version = "v1beta1",
    kind = "ClusterServiceClass",
    doc = "ClusterServiceClass represents a service offered by a ClusterServiceBroker."
)]
#[kube(status = "CatalogEntryStatus")]
#[serde(rename_all = "camelCase")]
pub struct ClusterServiceClassSpec {
    pub cluster_service_broker_name: String,
    pub external_name: String,
    #[serde(rename = "externalID")]
    pub external_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub bindable: bool,
}

/// A namespaced service offered by a `ServiceBroker`.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "servicecatalog.k8s.io",
    version = "v1beta1",
    kind = "ServiceClass",
    namespaced,
    doc = "ServiceClass represents a service offered by a namespaced ServiceBroker."
)]
#[kube(status = "CatalogEntryStatus")]
#[serde(rename_all = "camelCase")]
pub struct ServiceClassSpec {
    pub service_broker_name: String,
    pub external_name: String,
    #[serde(rename = "externalID")]
    pub external_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub bindable: bool,
}

/// A cluster-wide plan of a `ClusterServiceClass`.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "servicecatalog.k8s.io",
    version = "v1beta1",
    kind = "ClusterServicePlan",
    doc = "ClusterServicePlan represents a tier of a ClusterServiceClass."
)]
#[kube(status = "CatalogEntryStatus")]
#[serde(rename_all = "camelCase")]
pub struct ClusterServicePlanSpec {
    pub cluster_service_broker_name: String,
    pub external_name: String,
    #[serde(rename = "externalID")]
    pub external_id: String,
    pub cluster_service_class_ref: LocalObjectReference,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub free: bool,
}

/// A namespaced plan of a `ServiceClass`.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "servicecatalog.k8s.io",
    version = "v1beta1",
    kind = "ServicePlan",
    namespaced,
    doc = "ServicePlan represents a tier of a namespaced ServiceClass."
)]
#[kube(status = "CatalogEntryStatus")]
#[serde(rename_all = "camelCase")]
pub struct ServicePlanSpec {
    pub service_broker_name: String,
    pub external_name: String,
    #[serde(rename = "externalID")]
    pub external_id: String,
    pub service_class_ref: LocalObjectReference,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub free: bool,
}

// ============================================================================
// Catalog: brokers
// ============================================================================

/// Credentials held in a secret.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecretAuth {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<SecretReference>,
}

/// How to authenticate against a broker.
///
/// The basic secret holds `username` and `password`; the bearer secret holds `token`.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq, JsonSchema)]
pub struct BrokerAuthInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basic: Option<SecretAuth>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bearer: Option<SecretAuth>,
}

/// Status shared by broker kinds.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BrokerStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

/// A cluster-wide Open Service Broker endpoint.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "servicecatalog.k8s.io",
    version = "v1beta1",
    kind = "ClusterServiceBroker",
    doc = "ClusterServiceBroker represents an Open Service Broker available to the whole cluster."
)]
#[kube(status = "BrokerStatus")]
#[serde(rename_all = "camelCase")]
pub struct ClusterServiceBrokerSpec {
    pub url: String,
    #[serde(default, rename = "insecureSkipTLSVerify")]
    pub insecure_skip_tls_verify: bool,
    /// Base64-encoded PEM CA bundle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_bundle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_info: Option<BrokerAuthInfo>,
}

/// An Open Service Broker endpoint scoped to one namespace.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "servicecatalog.k8s.io",
    version = "v1beta1",
    kind = "ServiceBroker",
    namespaced,
    doc = "ServiceBroker represents an Open Service Broker available in one namespace."
)]
#[kube(status = "BrokerStatus")]
#[serde(rename_all = "camelCase")]
pub struct ServiceBrokerSpec {
    pub url: String,
    #[serde(default, rename = "insecureSkipTLSVerify")]
    pub insecure_skip_tls_verify: bool,
    /// Base64-encoded PEM CA bundle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_bundle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_info: Option<BrokerAuthInfo>,
}

#[cfg(test)]
#[path = "crd_tests.rs"]
mod crd_tests;
