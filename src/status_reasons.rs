// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Condition and event reasons for `ServiceInstance` resources.
//!
//! Reasons are programmatic identifiers in CamelCase. Every reason that appears
//! in a condition is also used as the reason of the matching Kubernetes event,
//! so these strings are part of the controller's external contract and must not
//! change.
//!
//! # Example Status
//!
//! ```yaml
//! status:
//!   conditions:
//!     - type: Ready
//!       status: "False"
//!       reason: StartingInstanceOrphanMitigation
//!       message: "The instance provision call failed with an ambiguous error; ..."
//!     - type: OrphanMitigation
//!       status: "True"
//!       reason: ProvisionCallFailed
//!       message: "Error provisioning ServiceInstance of ..."
//! ```

// ============================================================================
// Success Reasons
// ============================================================================

/// The broker finished provisioning the instance.
pub const REASON_PROVISIONED_SUCCESSFULLY: &str = "ProvisionedSuccessfully";

/// The broker finished updating the instance.
pub const REASON_INSTANCE_UPDATED_SUCCESSFULLY: &str = "InstanceUpdatedSuccessfully";

/// The broker finished deprovisioning the instance.
pub const REASON_DEPROVISIONED_SUCCESSFULLY: &str = "DeprovisionedSuccessfully";

/// A deprovision issued to clean up after an ambiguous provision failure succeeded.
pub const REASON_ORPHAN_MITIGATION_SUCCESSFUL: &str = "OrphanMitigationSuccessful";

// ============================================================================
// Broker Call Failure Reasons
// ============================================================================

/// The broker answered a provision request with an error response.
pub const REASON_PROVISION_CALL_FAILED: &str = "ProvisionCallFailed";

/// The provision request never produced a broker response.
pub const REASON_ERROR_CALLING_PROVISION: &str = "ErrorCallingProvision";

/// The broker answered an update request with an error response.
pub const REASON_UPDATE_INSTANCE_CALL_FAILED: &str = "UpdateInstanceCallFailed";

/// The update request never produced a broker response.
pub const REASON_ERROR_CALLING_UPDATE_INSTANCE: &str = "ErrorCallingUpdateInstance";

/// The deprovision request failed.
pub const REASON_DEPROVISION_CALL_FAILED: &str = "DeprovisionCallFailed";

/// Polling the broker's last operation endpoint failed.
pub const REASON_ERROR_POLLING_LAST_OPERATION: &str = "ErrorPollingLastOperation";

/// The broker rejected a provision request with a non-retriable status.
pub const REASON_CLUSTER_SERVICE_BROKER_RETURNED_FAILURE: &str =
    "ClusterServiceBrokerReturnedFailure";

/// The retry window elapsed; the operation is now failed terminally.
pub const REASON_ERROR_RECONCILIATION_RETRY_TIMEOUT: &str = "ErrorReconciliationRetryTimeout";

// ============================================================================
// Orphan Mitigation Reasons
// ============================================================================

/// Orphan mitigation has begun.
pub const REASON_STARTING_INSTANCE_ORPHAN_MITIGATION: &str = "StartingInstanceOrphanMitigation";

/// The orphan mitigation deprovision failed terminally.
pub const REASON_ORPHAN_MITIGATION_FAILED: &str = "OrphanMitigationFailed";

// ============================================================================
// Deletion Reasons
// ============================================================================

/// Deletion waits for `ServiceBinding` objects that still reference the instance.
pub const REASON_DEPROVISION_BLOCKED_BY_EXISTING_CREDENTIALS: &str =
    "DeprovisionBlockedByExistingCredentials";

/// The instance status carries a deprovision status the delete path cannot act on.
pub const REASON_INVALID_DEPROVISION_STATUS: &str = "InvalidDeprovisionStatus";

// ============================================================================
// Request Preparation Reasons
// ============================================================================

/// Parameters could not be realized from the spec and referenced secrets.
pub const REASON_ERROR_WITH_PARAMETERS: &str = "ErrorWithParameters";

/// The originating identity header could not be built.
pub const REASON_ERROR_WITH_ORIGINATING_IDENTITY: &str = "ErrorWithOriginatingIdentity";

/// The namespace of the instance could not be read.
pub const REASON_ERROR_FINDING_NAMESPACE_FOR_INSTANCE: &str = "ErrorFindingNamespaceForInstance";

/// Broker credentials could not be read from the referenced secret.
pub const REASON_ERROR_GETTING_AUTH_CREDENTIALS: &str = "ErrorGettingAuthCredentials";

/// A new operation was requested while an async operation is still running.
pub const REASON_ERROR_ASYNC_OPERATION_IN_PROGRESS: &str = "ErrorAsyncOperationInProgress";

/// A provision or update retry is held back until the broker backoff passes.
pub const REASON_RETRY_BACKOFF: &str = "RetryBackoff";

// ============================================================================
// Reference Resolution Reasons
// ============================================================================

/// The referenced `ClusterServiceClass` does not exist.
pub const REASON_REFERENCES_NONEXISTENT_CLUSTER_SERVICE_CLASS: &str =
    "ReferencesNonexistentClusterServiceClass";

/// The referenced `ClusterServicePlan` does not exist.
pub const REASON_REFERENCES_NONEXISTENT_CLUSTER_SERVICE_PLAN: &str =
    "ReferencesNonexistentClusterServicePlan";

/// The referenced `ClusterServiceBroker` does not exist.
pub const REASON_REFERENCES_NONEXISTENT_CLUSTER_SERVICE_BROKER: &str =
    "ReferencesNonexistentClusterServiceBroker";

/// The referenced class does not exist.
pub const REASON_REFERENCES_NONEXISTENT_SERVICE_CLASS: &str = "ReferencesNonexistentServiceClass";

/// The referenced plan does not exist.
pub const REASON_REFERENCES_NONEXISTENT_SERVICE_PLAN: &str = "ReferencesNonexistentServicePlan";

/// The referenced broker does not exist.
pub const REASON_REFERENCES_NONEXISTENT_SERVICE_BROKER: &str = "ReferencesNonexistentServiceBroker";

/// The referenced `ClusterServiceClass` was removed from the broker catalog.
pub const REASON_REFERENCES_DELETED_CLUSTER_SERVICE_CLASS: &str =
    "ReferencesDeletedClusterServiceClass";

/// The referenced `ClusterServicePlan` was removed from the broker catalog.
pub const REASON_REFERENCES_DELETED_CLUSTER_SERVICE_PLAN: &str =
    "ReferencesDeletedClusterServicePlan";

/// The referenced class was removed from the broker catalog.
pub const REASON_REFERENCES_DELETED_SERVICE_CLASS: &str = "ReferencesDeletedServiceClass";

/// The referenced plan was removed from the broker catalog.
pub const REASON_REFERENCES_DELETED_SERVICE_PLAN: &str = "ReferencesDeletedServicePlan";

// ============================================================================
// In-Flight and Async Reasons
// ============================================================================

/// A provision request is about to be sent to the broker.
pub const REASON_PROVISION_REQUEST_IN_FLIGHT: &str = "ProvisionRequestInFlight";

/// An update request is about to be sent to the broker.
pub const REASON_UPDATE_INSTANCE_REQUEST_IN_FLIGHT: &str = "UpdateInstanceRequestInFlight";

/// A deprovision request is about to be sent to the broker.
pub const REASON_DEPROVISION_REQUEST_IN_FLIGHT: &str = "DeprovisionRequestInFlight";

/// The broker is provisioning asynchronously.
pub const REASON_PROVISIONING: &str = "Provisioning";

/// The broker is updating asynchronously.
pub const REASON_UPDATING_INSTANCE: &str = "UpdatingInstance";

/// The broker is deprovisioning asynchronously.
pub const REASON_DEPROVISIONING: &str = "Deprovisioning";

// ============================================================================
// Fixed Messages
// ============================================================================

/// Message paired with [`REASON_PROVISIONED_SUCCESSFULLY`].
pub const MESSAGE_PROVISIONED_SUCCESSFULLY: &str = "The instance was provisioned successfully";

/// Message paired with [`REASON_INSTANCE_UPDATED_SUCCESSFULLY`].
pub const MESSAGE_INSTANCE_UPDATED_SUCCESSFULLY: &str = "The instance was updated successfully";

/// Message paired with [`REASON_DEPROVISIONED_SUCCESSFULLY`].
pub const MESSAGE_DEPROVISIONED_SUCCESSFULLY: &str = "The instance was deprovisioned successfully";

/// Message paired with [`REASON_ORPHAN_MITIGATION_SUCCESSFUL`].
pub const MESSAGE_ORPHAN_MITIGATION_SUCCESSFUL: &str =
    "Orphan mitigation was completed successfully";

/// Message paired with [`REASON_PROVISIONING`].
pub const MESSAGE_PROVISIONING: &str = "The instance is being provisioned asynchronously";

/// Message paired with [`REASON_UPDATING_INSTANCE`].
pub const MESSAGE_UPDATING_INSTANCE: &str = "The instance is being updated asynchronously";

/// Message paired with [`REASON_DEPROVISIONING`].
pub const MESSAGE_DEPROVISIONING: &str = "The instance is being deprovisioned asynchronously";

/// Message paired with [`REASON_PROVISION_REQUEST_IN_FLIGHT`].
pub const MESSAGE_PROVISION_REQUEST_IN_FLIGHT: &str =
    "Provision request for ServiceInstance in-flight to Broker";

/// Message paired with [`REASON_UPDATE_INSTANCE_REQUEST_IN_FLIGHT`].
pub const MESSAGE_UPDATE_INSTANCE_REQUEST_IN_FLIGHT: &str =
    "Update request for ServiceInstance in-flight to Broker";

/// Message paired with [`REASON_DEPROVISION_REQUEST_IN_FLIGHT`].
pub const MESSAGE_DEPROVISION_REQUEST_IN_FLIGHT: &str =
    "Deprovision request for ServiceInstance in-flight to Broker";

/// Message paired with [`REASON_STARTING_INSTANCE_ORPHAN_MITIGATION`].
pub const MESSAGE_STARTING_INSTANCE_ORPHAN_MITIGATION: &str = "The instance provision call failed with an ambiguous error; attempting to deprovision the instance in order to mitigate an orphaned resource";

/// Message paired with [`REASON_ERROR_RECONCILIATION_RETRY_TIMEOUT`].
pub const MESSAGE_RECONCILIATION_RETRY_TIMEOUT: &str =
    "Stopping reconciliation retries because too much time has elapsed";

/// Message paired with [`REASON_DEPROVISION_BLOCKED_BY_EXISTING_CREDENTIALS`].
pub const MESSAGE_DEPROVISION_BLOCKED_BY_EXISTING_CREDENTIALS: &str =
    "All associated ServiceBindings must be removed before this ServiceInstance can be deleted";

/// Error message when the instance spec names neither a cluster nor a namespaced class/plan.
pub const MESSAGE_AMBIGUOUS_PLAN_REFERENCE_SCOPE: &str =
    "Couldn't determine if the instance refers to a Cluster or Namespaced ServiceClass/Plan";

#[cfg(test)]
#[path = "status_reasons_tests.rs"]
mod status_reasons_tests;
