// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Integration tests for the OSB HTTP client against a mock broker.
//!
//! Each test drives a full instance lifecycle through the public client
//! manager, the way the reconciler talks to a real broker.

use catalogd::broker_client_manager::{BrokerClientManager, BrokerKey};
use catalogd::http_errors::{is_retriable_http_status, should_start_orphan_mitigation};
use catalogd::osb::{
    http_client_factory, AuthConfig, BasicAuthConfig, ClientConfiguration, DeprovisionRequest,
    LastOperationRequest, LastOperationState, OsbClient, ProvisionRequest,
};
use serde_json::{json, Map};
use std::time::Duration;
use wiremock::matchers::{basic_auth, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn configuration(url: &str) -> ClientConfiguration {
    ClientConfiguration {
        name: "b1".to_string(),
        url: url.to_string(),
        api_version: "2.13".to_string(),
        auth: Some(AuthConfig {
            basic: Some(BasicAuthConfig {
                username: "admin".to_string(),
                password: "secret".to_string(),
            }),
            bearer: None,
        }),
        insecure: false,
        ca_data: None,
        timeout: Duration::from_secs(5),
    }
}

fn provision_request() -> ProvisionRequest {
    let mut context = Map::new();
    context.insert("platform".to_string(), json!("kubernetes"));
    ProvisionRequest {
        instance_id: "E1".to_string(),
        accepts_incomplete: true,
        service_id: "class-id".to_string(),
        plan_id: "plan-id".to_string(),
        organization_guid: "cluster-1".to_string(),
        space_guid: "ns-uid".to_string(),
        parameters: None,
        context,
        originating_identity: None,
    }
}

fn last_operation_request(operation: &str) -> LastOperationRequest {
    LastOperationRequest {
        instance_id: "E1".to_string(),
        service_id: Some("class-id".to_string()),
        plan_id: Some("plan-id".to_string()),
        operation_key: Some(operation.to_string()),
        originating_identity: None,
    }
}

#[tokio::test]
async fn test_async_provision_then_sync_deprovision() {
    let broker = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/v2/service_instances/E1"))
        .and(query_param("accepts_incomplete", "true"))
        .and(basic_auth("admin", "secret"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({"operation": "op-1"})))
        .expect(1)
        .mount(&broker)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/service_instances/E1/last_operation"))
        .and(query_param("operation", "op-1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"state": "succeeded"})),
        )
        .expect(1)
        .mount(&broker)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/v2/service_instances/E1"))
        .and(query_param("service_id", "class-id"))
        .and(query_param("plan_id", "plan-id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&broker)
        .await;

    let manager = BrokerClientManager::new(http_client_factory());
    let key = BrokerKey::cluster("b1");
    let client = manager
        .update_broker_client(&key, &configuration(&broker.uri()))
        .unwrap();

    let provisioned = client.provision_instance(&provision_request()).await.unwrap();
    assert!(provisioned.is_async);
    assert_eq!(provisioned.operation_key.as_deref(), Some("op-1"));

    let polled = client
        .poll_last_operation(&last_operation_request("op-1"))
        .await
        .unwrap();
    assert_eq!(polled.state, LastOperationState::Succeeded);

    let deprovisioned = client
        .deprovision_instance(&DeprovisionRequest {
            instance_id: "E1".to_string(),
            accepts_incomplete: true,
            service_id: "class-id".to_string(),
            plan_id: "plan-id".to_string(),
            originating_identity: None,
        })
        .await
        .unwrap();
    assert!(!deprovisioned.is_async);
}

#[tokio::test]
async fn test_broker_failure_is_classified() {
    let broker = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/v2/service_instances/E1"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": "InternalError",
            "description": "database unavailable"
        })))
        .mount(&broker)
        .await;

    let manager = BrokerClientManager::new(http_client_factory());
    let client = manager
        .update_broker_client(&BrokerKey::cluster("b1"), &configuration(&broker.uri()))
        .unwrap();

    let err = client.provision_instance(&provision_request()).await.unwrap_err();
    let status = err.http_status().unwrap();
    assert_eq!(status, 500);
    assert!(is_retriable_http_status(status));
    assert!(should_start_orphan_mitigation(status));
    assert!(err.to_string().contains("database unavailable"));
}

#[tokio::test]
async fn test_configuration_change_rebuilds_client() {
    let first = MockServer::start().await;
    let second = MockServer::start().await;
    for server in [&first, &second] {
        Mock::given(method("GET"))
            .and(path("/v2/service_instances/E1/last_operation"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"state": "in progress"})),
            )
            .expect(1)
            .mount(server)
            .await;
    }

    let manager = BrokerClientManager::new(http_client_factory());
    let key = BrokerKey::namespaced("ns1", "b1");

    let client = manager
        .update_broker_client(&key, &configuration(&first.uri()))
        .unwrap();
    client
        .poll_last_operation(&last_operation_request("op-1"))
        .await
        .unwrap();

    let client = manager
        .update_broker_client(&key, &configuration(&second.uri()))
        .unwrap();
    let polled = client
        .poll_last_operation(&last_operation_request("op-1"))
        .await
        .unwrap();
    assert_eq!(polled.state, LastOperationState::InProgress);
}
