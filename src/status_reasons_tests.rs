// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `status_reasons` module
//!
//! Reason strings are an external contract; these tests pin their exact values.

#[cfg(test)]
mod tests {
    use super::super::*;

    // ============================================================================
    // Success Reasons
    // ============================================================================

    #[test]
    fn test_success_reasons() {
        assert_eq!(REASON_PROVISIONED_SUCCESSFULLY, "ProvisionedSuccessfully");
        assert_eq!(
            REASON_INSTANCE_UPDATED_SUCCESSFULLY,
            "InstanceUpdatedSuccessfully"
        );
        assert_eq!(REASON_DEPROVISIONED_SUCCESSFULLY, "DeprovisionedSuccessfully");
        assert_eq!(
            REASON_ORPHAN_MITIGATION_SUCCESSFUL,
            "OrphanMitigationSuccessful"
        );
    }

    // ============================================================================
    // Failure Reasons
    // ============================================================================

    #[test]
    fn test_broker_call_failure_reasons() {
        assert_eq!(REASON_PROVISION_CALL_FAILED, "ProvisionCallFailed");
        assert_eq!(REASON_ERROR_CALLING_PROVISION, "ErrorCallingProvision");
        assert_eq!(REASON_UPDATE_INSTANCE_CALL_FAILED, "UpdateInstanceCallFailed");
        assert_eq!(
            REASON_ERROR_CALLING_UPDATE_INSTANCE,
            "ErrorCallingUpdateInstance"
        );
        assert_eq!(REASON_DEPROVISION_CALL_FAILED, "DeprovisionCallFailed");
        assert_eq!(
            REASON_ERROR_POLLING_LAST_OPERATION,
            "ErrorPollingLastOperation"
        );
        assert_eq!(
            REASON_CLUSTER_SERVICE_BROKER_RETURNED_FAILURE,
            "ClusterServiceBrokerReturnedFailure"
        );
        assert_eq!(
            REASON_ERROR_RECONCILIATION_RETRY_TIMEOUT,
            "ErrorReconciliationRetryTimeout"
        );
    }

    #[test]
    fn test_orphan_mitigation_and_deletion_reasons() {
        assert_eq!(
            REASON_STARTING_INSTANCE_ORPHAN_MITIGATION,
            "StartingInstanceOrphanMitigation"
        );
        assert_eq!(REASON_ORPHAN_MITIGATION_FAILED, "OrphanMitigationFailed");
        assert_eq!(
            REASON_DEPROVISION_BLOCKED_BY_EXISTING_CREDENTIALS,
            "DeprovisionBlockedByExistingCredentials"
        );
        assert_eq!(REASON_INVALID_DEPROVISION_STATUS, "InvalidDeprovisionStatus");
        assert_eq!(
            REASON_ERROR_ASYNC_OPERATION_IN_PROGRESS,
            "ErrorAsyncOperationInProgress"
        );
        assert_eq!(REASON_RETRY_BACKOFF, "RetryBackoff");
    }

    // ============================================================================
    // Reference Reasons
    // ============================================================================

    #[test]
    fn test_reference_reasons_cover_both_scopes() {
        assert_eq!(
            REASON_REFERENCES_NONEXISTENT_SERVICE_CLASS,
            "ReferencesNonexistentServiceClass"
        );
        assert_eq!(
            REASON_REFERENCES_NONEXISTENT_CLUSTER_SERVICE_CLASS,
            "ReferencesNonexistentClusterServiceClass"
        );
        assert_eq!(
            REASON_REFERENCES_NONEXISTENT_SERVICE_PLAN,
            "ReferencesNonexistentServicePlan"
        );
        assert_eq!(
            REASON_REFERENCES_NONEXISTENT_CLUSTER_SERVICE_BROKER,
            "ReferencesNonexistentClusterServiceBroker"
        );
        assert_eq!(
            REASON_REFERENCES_DELETED_CLUSTER_SERVICE_PLAN,
            "ReferencesDeletedClusterServicePlan"
        );
        assert_eq!(
            REASON_REFERENCES_DELETED_SERVICE_CLASS,
            "ReferencesDeletedServiceClass"
        );
    }

    // ============================================================================
    // In-Flight Reasons
    // ============================================================================

    #[test]
    fn test_in_flight_and_async_reasons() {
        assert_eq!(REASON_PROVISION_REQUEST_IN_FLIGHT, "ProvisionRequestInFlight");
        assert_eq!(
            REASON_UPDATE_INSTANCE_REQUEST_IN_FLIGHT,
            "UpdateInstanceRequestInFlight"
        );
        assert_eq!(
            REASON_DEPROVISION_REQUEST_IN_FLIGHT,
            "DeprovisionRequestInFlight"
        );
        assert_eq!(REASON_PROVISIONING, "Provisioning");
        assert_eq!(REASON_UPDATING_INSTANCE, "UpdatingInstance");
        assert_eq!(REASON_DEPROVISIONING, "Deprovisioning");
    }

    #[test]
    fn test_reasons_are_camel_case() {
        let reasons = [
            REASON_PROVISIONED_SUCCESSFULLY,
            REASON_PROVISION_CALL_FAILED,
            REASON_STARTING_INSTANCE_ORPHAN_MITIGATION,
            REASON_ERROR_WITH_PARAMETERS,
            REASON_ERROR_FINDING_NAMESPACE_FOR_INSTANCE,
            REASON_ERROR_WITH_ORIGINATING_IDENTITY,
        ];
        for reason in reasons {
            assert!(reason.chars().next().unwrap().is_ascii_uppercase());
            assert!(!reason.contains(' '), "{reason} must not contain spaces");
        }
    }
}
