// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Test doubles shared by unit tests: a scripted broker, a recording
//! event publisher and catalog fixtures.

use crate::broker_client_manager::BrokerClientManager;
use crate::catalog::{CatalogBroker, CatalogClass, CatalogPlan, CatalogScope};
use crate::config::ControllerConfig;
use crate::constants::{
    CONDITION_STATUS_FALSE, CONDITION_STATUS_TRUE, CONDITION_TYPE_READY,
    FINALIZER_SERVICE_CATALOG,
};
use crate::crd::{
    DeprovisionStatus, LocalObjectReference, PropertiesState, ProvisionStatus, ServiceBinding,
    ServiceBindingSpec, ServiceInstance, ServiceInstanceOperation, ServiceInstanceSpec,
    ServiceInstanceStatus,
};
use crate::errors::ReconcileError;
use crate::events::EventPublisher;
use crate::osb::{
    ClientConfiguration, ClientFactory, DeprovisionRequest, DeprovisionResponse,
    LastOperationRequest, LastOperationResponse, LastOperationState, OsbClient, OsbError,
    ProvisionRequest, ProvisionResponse, UpdateRequest, UpdateResponse,
};
use crate::queue::WorkQueue;
use crate::reconcilers::instance::backoff::OperationBackoff;
use crate::reconcilers::instance::{reconcile_instance, InstanceContext, NextAction};
use crate::reconcilers::status::set_condition;
use crate::store::memory::MemoryStore;
use async_trait::async_trait;
use chrono::Utc;
use k8s_openapi::api::core::v1::ObjectReference;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::runtime::events::EventType;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A request received by [`FakeOsbClient`].
#[derive(Clone, Debug, PartialEq)]
pub enum BrokerCall {
    Provision(ProvisionRequest),
    Update(UpdateRequest),
    Deprovision(DeprovisionRequest),
    LastOperation(LastOperationRequest),
}

impl BrokerCall {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Provision(_) => "Provision",
            Self::Update(_) => "Update",
            Self::Deprovision(_) => "Deprovision",
            Self::LastOperation(_) => "LastOperation",
        }
    }
}

/// Broker that answers from per-operation scripts.
///
/// When a script is empty the operation succeeds synchronously (or reports
/// `succeeded` for last-operation polls).
#[derive(Default)]
pub struct FakeOsbClient {
    provision: Mutex<VecDeque<Result<ProvisionResponse, OsbError>>>,
    update: Mutex<VecDeque<Result<UpdateResponse, OsbError>>>,
    deprovision: Mutex<VecDeque<Result<DeprovisionResponse, OsbError>>>,
    last_operation: Mutex<VecDeque<Result<LastOperationResponse, OsbError>>>,
    calls: Mutex<Vec<BrokerCall>>,
}

impl FakeOsbClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_provision(&self, response: Result<ProvisionResponse, OsbError>) {
        self.provision.lock().unwrap().push_back(response);
    }

    pub fn push_update(&self, response: Result<UpdateResponse, OsbError>) {
        self.update.lock().unwrap().push_back(response);
    }

    pub fn push_deprovision(&self, response: Result<DeprovisionResponse, OsbError>) {
        self.deprovision.lock().unwrap().push_back(response);
    }

    pub fn push_last_operation(&self, response: Result<LastOperationResponse, OsbError>) {
        self.last_operation.lock().unwrap().push_back(response);
    }

    pub fn calls(&self) -> Vec<BrokerCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_names(&self) -> Vec<&'static str> {
        self.calls().iter().map(BrokerCall::name).collect()
    }

    fn record(&self, call: BrokerCall) {
        self.calls.lock().unwrap().push(call);
    }
}

/// HTTP error with no body.
pub fn http_error(status_code: u16) -> OsbError {
    OsbError::Http {
        status_code,
        error_message: None,
        description: None,
    }
}

/// Transport error, optionally a timeout.
pub fn transport_error(timeout: bool) -> OsbError {
    OsbError::Transport {
        message: if timeout {
            "request timed out".to_string()
        } else {
            "connection refused".to_string()
        },
        timeout,
    }
}

pub fn last_operation(state: LastOperationState, description: Option<&str>) -> LastOperationResponse {
    LastOperationResponse {
        state,
        description: description.map(str::to_string),
    }
}

#[async_trait]
impl OsbClient for FakeOsbClient {
    async fn provision_instance(
        &self,
        request: &ProvisionRequest,
    ) -> Result<ProvisionResponse, OsbError> {
        self.record(BrokerCall::Provision(request.clone()));
        self.provision
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(ProvisionResponse::default()))
    }

    async fn update_instance(&self, request: &UpdateRequest) -> Result<UpdateResponse, OsbError> {
        self.record(BrokerCall::Update(request.clone()));
        self.update
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(UpdateResponse::default()))
    }

    async fn deprovision_instance(
        &self,
        request: &DeprovisionRequest,
    ) -> Result<DeprovisionResponse, OsbError> {
        self.record(BrokerCall::Deprovision(request.clone()));
        self.deprovision
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(DeprovisionResponse::default()))
    }

    async fn poll_last_operation(
        &self,
        request: &LastOperationRequest,
    ) -> Result<LastOperationResponse, OsbError> {
        self.record(BrokerCall::LastOperation(request.clone()));
        self.last_operation
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(last_operation(LastOperationState::Succeeded, None)))
    }
}

/// An event captured by [`RecordingEventPublisher`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedEvent {
    /// `Normal` or `Warning`
    pub type_: String,
    pub reason: String,
    pub message: String,
}

/// Keeps every published event in memory.
#[derive(Default)]
pub struct RecordingEventPublisher {
    events: Mutex<Vec<RecordedEvent>>,
}

impl RecordingEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn reasons(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.reason).collect()
    }

    pub fn has_warning(&self, reason: &str) -> bool {
        self.events()
            .iter()
            .any(|e| e.type_ == "Warning" && e.reason == reason)
    }
}

#[async_trait]
impl EventPublisher for RecordingEventPublisher {
    async fn publish(&self, _object: &ObjectReference, type_: EventType, reason: &str, message: &str) {
        let type_ = match type_ {
            EventType::Normal => "Normal",
            EventType::Warning => "Warning",
        };
        self.events.lock().unwrap().push(RecordedEvent {
            type_: type_.to_string(),
            reason: reason.to_string(),
            message: message.to_string(),
        });
    }
}

pub const TEST_NAMESPACE: &str = "ns1";
pub const TEST_NAMESPACE_UID: &str = "ns1-uid";
pub const TEST_BROKER: &str = "b1";
pub const TEST_BROKER_URL: &str = "http://broker.example.com";
pub const TEST_CLASS_NAME: &str = "class-c";
pub const TEST_CLASS_EXTERNAL_ID: &str = "class-c-id";
pub const TEST_PLAN_NAME: &str = "plan-p";
pub const TEST_PLAN_EXTERNAL_ID: &str = "plan-p-id";

/// A cluster-scoped instance in `ns1` asking for class `C` and plan `P`,
/// carrying the finalizer and generation 1.
pub fn service_instance(name: &str) -> ServiceInstance {
    let mut instance = ServiceInstance::new(
        name,
        ServiceInstanceSpec {
            cluster_service_class_external_name: Some("C".to_string()),
            cluster_service_plan_external_name: Some("P".to_string()),
            external_id: "E1".to_string(),
            ..Default::default()
        },
    );
    instance.metadata.namespace = Some(TEST_NAMESPACE.to_string());
    instance.metadata.uid = Some(format!("{name}-uid"));
    instance.metadata.generation = Some(1);
    instance.metadata.finalizers = Some(vec![FINALIZER_SERVICE_CATALOG.to_string()]);
    instance
}

pub fn catalog_class() -> CatalogClass {
    CatalogClass {
        name: TEST_CLASS_NAME.to_string(),
        external_name: "C".to_string(),
        external_id: TEST_CLASS_EXTERNAL_ID.to_string(),
        broker_name: TEST_BROKER.to_string(),
        removed_from_broker_catalog: false,
    }
}

pub fn catalog_plan() -> CatalogPlan {
    CatalogPlan {
        name: TEST_PLAN_NAME.to_string(),
        external_name: "P".to_string(),
        external_id: TEST_PLAN_EXTERNAL_ID.to_string(),
        broker_name: TEST_BROKER.to_string(),
        class_name: TEST_CLASS_NAME.to_string(),
        removed_from_broker_catalog: false,
    }
}

pub fn catalog_broker(scope: &CatalogScope) -> CatalogBroker {
    CatalogBroker {
        name: TEST_BROKER.to_string(),
        namespace: scope.namespace().map(str::to_string),
        url: TEST_BROKER_URL.to_string(),
        ..Default::default()
    }
}

/// A store holding the namespace plus class `C`, plan `P` and broker `b1`
/// in the given scope.
pub fn seeded_store(scope: &CatalogScope) -> MemoryStore {
    let store = MemoryStore::new();
    store.add_namespace(TEST_NAMESPACE, TEST_NAMESPACE_UID);
    store.add_class(scope.clone(), catalog_class());
    store.add_plan(scope.clone(), catalog_plan());
    store.add_broker(scope.clone(), catalog_broker(scope));
    store
}

pub const TEST_CLUSTER_ID: &str = "cluster-1";

/// Start time far enough in the past to exceed a short retry window.
pub const OLD_START_TIME: &str = "2020-01-01T00:00:00+00:00";

/// [`service_instance`] with its cluster class and plan references resolved.
pub fn resolved_instance(name: &str) -> ServiceInstance {
    let mut instance = service_instance(name);
    instance.spec.cluster_service_class_ref = Some(LocalObjectReference {
        name: TEST_CLASS_NAME.to_string(),
    });
    instance.spec.cluster_service_plan_ref = Some(LocalObjectReference {
        name: TEST_PLAN_NAME.to_string(),
    });
    instance.status = Some(ServiceInstanceStatus {
        observed_generation: 1,
        ..Default::default()
    });
    instance
}

/// Properties of plan `P` without parameters.
pub fn plan_properties() -> PropertiesState {
    PropertiesState {
        plan_external_id: TEST_PLAN_EXTERNAL_ID.to_string(),
        plan_external_name: "P".to_string(),
        ..Default::default()
    }
}

/// A resolved instance whose generation 1 was provisioned successfully.
pub fn provisioned_instance(name: &str) -> ServiceInstance {
    let mut instance = resolved_instance(name);
    let status = instance.status.get_or_insert_with(Default::default);
    status.reconciled_generation = 1;
    status.provision_status = ProvisionStatus::Provisioned;
    status.deprovision_status = DeprovisionStatus::Required;
    status.external_properties = Some(plan_properties());
    set_condition(
        &mut status.conditions,
        CONDITION_TYPE_READY,
        CONDITION_STATUS_TRUE,
        "ProvisionedSuccessfully",
        "The instance was provisioned successfully",
    );
    instance
}

/// A resolved instance with `operation` recorded as started and not yet sent.
pub fn in_flight_instance(name: &str, operation: ServiceInstanceOperation) -> ServiceInstance {
    let mut instance = match operation {
        ServiceInstanceOperation::Provision => resolved_instance(name),
        _ => provisioned_instance(name),
    };
    let status = instance.status.get_or_insert_with(Default::default);
    status.current_operation = Some(operation);
    status.operation_start_time = Some(Utc::now().to_rfc3339());
    status.in_progress_properties = Some(plan_properties());
    status.deprovision_status = DeprovisionStatus::Required;
    set_condition(
        &mut status.conditions,
        CONDITION_TYPE_READY,
        CONDITION_STATUS_FALSE,
        "ProvisionRequestInFlight",
        "Provision request for ServiceInstance in-flight to Broker",
    );
    instance
}

/// An in-flight instance whose broker answered asynchronously with `op-1`.
pub fn polling_instance(name: &str, operation: ServiceInstanceOperation) -> ServiceInstance {
    let mut instance = in_flight_instance(name, operation);
    let status = instance.status.get_or_insert_with(Default::default);
    status.async_op_in_progress = true;
    status.last_operation = Some("op-1".to_string());
    instance
}

pub fn mark_deleted(instance: &mut ServiceInstance) {
    instance.metadata.deletion_timestamp = Some(Time(k8s_openapi::jiff::Timestamp::now()));
}

/// A binding in the test namespace naming `instance`.
pub fn service_binding(name: &str, instance: &str) -> ServiceBinding {
    let mut binding = ServiceBinding::new(
        name,
        ServiceBindingSpec {
            instance_ref: LocalObjectReference {
                name: instance.to_string(),
            },
            secret_name: None,
        },
    );
    binding.metadata.namespace = Some(TEST_NAMESPACE.to_string());
    binding
}

/// Client configuration pointing at [`TEST_BROKER_URL`].
pub fn broker_client_config() -> ClientConfiguration {
    ClientConfiguration {
        name: TEST_BROKER.to_string(),
        url: TEST_BROKER_URL.to_string(),
        api_version: "2.13".to_string(),
        auth: None,
        insecure: false,
        ca_data: None,
        timeout: Duration::from_secs(60),
    }
}

/// An instance reconciler wired to a seeded store, one scripted broker and
/// a recording event publisher.
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub broker: Arc<FakeOsbClient>,
    pub events: Arc<RecordingEventPublisher>,
    pub ctx: InstanceContext,
}

impl Harness {
    pub fn new(scope: &CatalogScope) -> Self {
        Self::with_config(
            scope,
            ControllerConfig {
                cluster_id: TEST_CLUSTER_ID.to_string(),
                ..ControllerConfig::default()
            },
        )
    }

    pub fn with_config(scope: &CatalogScope, config: ControllerConfig) -> Self {
        let store = Arc::new(seeded_store(scope));
        let broker = Arc::new(FakeOsbClient::new());
        let events = Arc::new(RecordingEventPublisher::new());

        let client = Arc::clone(&broker);
        let factory: ClientFactory = Arc::new(move |_config: &ClientConfiguration| {
            let client: Arc<dyn OsbClient> = client.clone();
            Ok(client)
        });
        let ctx = InstanceContext {
            store: store.clone(),
            brokers: Arc::new(BrokerClientManager::new(factory)),
            events: events.clone(),
            polling: WorkQueue::polling(Duration::from_millis(1), Duration::from_millis(10)),
            // zero delays: attempts are retried at once unless a test swaps in a real backoff
            backoff: OperationBackoff::new(Duration::ZERO, Duration::ZERO),
            config,
        };
        Self {
            store,
            broker,
            events,
            ctx,
        }
    }

    pub fn put(&self, instance: ServiceInstance) -> ServiceInstance {
        self.store.put_instance(instance)
    }

    /// The stored instance `name` in the test namespace.
    pub fn stored(&self, name: &str) -> Option<ServiceInstance> {
        self.store.instance(TEST_NAMESPACE, name)
    }

    pub async fn reconcile(&self, name: &str) -> Result<NextAction, ReconcileError> {
        reconcile_instance(&self.ctx, TEST_NAMESPACE, name).await
    }

    /// Reconcile `times` times, failing the test on any error.
    pub async fn reconcile_ok(&self, name: &str, times: usize) -> NextAction {
        let mut last = NextAction::Done;
        for _ in 0..times {
            last = self.reconcile(name).await.unwrap();
        }
        last
    }
}
