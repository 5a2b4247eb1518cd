// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `reqwest`-backed Open Service Broker client.
//!
//! # Endpoints
//!
//! | Operation | Method | Path | Success codes |
//! |-----------|--------|------|---------------|
//! | provision | PUT | `/v2/service_instances/{id}` | 200, 201 (sync), 202 (async) |
//! | update | PATCH | `/v2/service_instances/{id}` | 200 (sync), 202 (async) |
//! | deprovision | DELETE | `/v2/service_instances/{id}` | 200, 410 (sync), 202 (async) |
//! | last operation | GET | `/v2/service_instances/{id}/last_operation` | 200 |
//!
//! Any other status becomes [`OsbError::Http`]. The client never retries: the
//! reconciler owns retry policy.

use super::config::ClientConfiguration;
use super::error::OsbError;
use super::types::{
    DeprovisionRequest, DeprovisionResponse, LastOperationRequest, LastOperationResponse,
    LastOperationState, OriginatingIdentity, PreviousValues, ProvisionRequest, ProvisionResponse,
    UpdateRequest, UpdateResponse,
};
use super::OsbClient;
use crate::constants::{OSB_API_VERSION_HEADER, OSB_ORIGINATING_IDENTITY_HEADER};
use crate::metrics;
use async_trait::async_trait;
use reqwest::{Client as HttpClient, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Instant;
use tracing::{debug, error, info};
use url::Url;

/// Body of a provision request.
#[derive(Serialize)]
struct ProvisionBody<'a> {
    service_id: &'a str,
    plan_id: &'a str,
    organization_guid: &'a str,
    space_guid: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<&'a Map<String, Value>>,
    context: &'a Map<String, Value>,
}

/// Body of an update request.
#[derive(Serialize)]
struct UpdateBody<'a> {
    service_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    plan_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<&'a Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    previous_values: Option<&'a PreviousValues>,
    context: &'a Map<String, Value>,
}

/// Body of a successful provision, update or deprovision response.
#[derive(Deserialize, Default)]
struct OperationBody {
    #[serde(default)]
    dashboard_url: Option<String>,
    #[serde(default)]
    operation: Option<String>,
}

#[derive(Deserialize)]
struct LastOperationBody {
    state: String,
    #[serde(default)]
    description: Option<String>,
}

/// Broker error body.
#[derive(Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

/// HTTP client for a single broker.
pub struct HttpOsbClient {
    config: ClientConfiguration,
    http: HttpClient,
    base_url: Url,
}

impl HttpOsbClient {
    /// Build a client from its configuration.
    ///
    /// # Errors
    ///
    /// Returns [`OsbError::Configuration`] when the URL cannot be parsed, the CA
    /// bundle is not valid PEM, or the HTTP client cannot be constructed.
    pub fn new(config: &ClientConfiguration) -> Result<Self, OsbError> {
        let base_url = Url::parse(&config.url)
            .map_err(|e| OsbError::Configuration(format!("invalid URL {:?}: {e}", config.url)))?;

        let mut builder = HttpClient::builder().timeout(config.timeout);
        if config.insecure {
            builder = builder.danger_accept_invalid_certs(true);
        }
        if let Some(ca_data) = &config.ca_data {
            let certificate = reqwest::Certificate::from_pem(ca_data)
                .map_err(|e| OsbError::Configuration(format!("invalid CA bundle: {e}")))?;
            builder = builder.add_root_certificate(certificate);
        }
        let http = builder
            .build()
            .map_err(|e| OsbError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            config: config.clone(),
            http,
            base_url,
        })
    }

    /// `{base}/v2/service_instances/{id}[/{suffix}]`
    fn instance_url(&self, instance_id: &str, suffix: Option<&str>) -> Result<Url, OsbError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|()| {
                OsbError::Configuration(format!("URL {} cannot be a base", self.base_url))
            })?;
            segments
                .pop_if_empty()
                .extend(["v2", "service_instances", instance_id]);
            if let Some(suffix) = suffix {
                segments.push(suffix);
            }
        }
        Ok(url)
    }

    /// Attach the OSB headers and send a request.
    async fn send(
        &self,
        operation: &'static str,
        request: RequestBuilder,
        originating_identity: Option<&OriginatingIdentity>,
    ) -> Result<(StatusCode, String), OsbError> {
        let mut request = request.header(OSB_API_VERSION_HEADER, &self.config.api_version);

        if let Some(auth) = &self.config.auth {
            if let Some(basic) = &auth.basic {
                request = request.basic_auth(&basic.username, Some(&basic.password));
            } else if let Some(bearer) = &auth.bearer {
                request = request.bearer_auth(&bearer.token);
            }
        }
        if let Some(identity) = originating_identity {
            request = request.header(OSB_ORIGINATING_IDENTITY_HEADER, identity.header_value());
        }

        let start = Instant::now();
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                metrics::record_broker_request(operation, "transport_error", start.elapsed());
                error!(
                    broker = %self.config.name,
                    operation = operation,
                    timeout = e.is_timeout(),
                    error = %e,
                    "Broker request failed"
                );
                return Err(OsbError::Transport {
                    message: format!("failed to send {operation} request to broker: {e}"),
                    timeout: e.is_timeout(),
                });
            }
        };

        let status = response.status();
        let body = response.text().await.map_err(|e| OsbError::Transport {
            message: format!("failed to read {operation} response from broker: {e}"),
            timeout: e.is_timeout(),
        })?;

        metrics::record_broker_request(operation, status.as_str(), start.elapsed());
        debug!(
            broker = %self.config.name,
            operation = operation,
            status = %status,
            response_len = body.len(),
            "Broker responded"
        );
        Ok((status, body))
    }
}

fn http_error(status: StatusCode, body: &str) -> OsbError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    OsbError::Http {
        status_code: status.as_u16(),
        error_message: parsed.error,
        description: parsed.description,
    }
}

fn operation_body(body: &str) -> OperationBody {
    if body.trim().is_empty() {
        return OperationBody::default();
    }
    serde_json::from_str(body).unwrap_or_default()
}

#[async_trait]
impl OsbClient for HttpOsbClient {
    async fn provision_instance(
        &self,
        request: &ProvisionRequest,
    ) -> Result<ProvisionResponse, OsbError> {
        let mut url = self.instance_url(&request.instance_id, None)?;
        if request.accepts_incomplete {
            url.query_pairs_mut().append_pair("accepts_incomplete", "true");
        }
        info!(
            broker = %self.config.name,
            instance_id = %request.instance_id,
            plan_id = %request.plan_id,
            "Provisioning instance at broker"
        );

        let body = ProvisionBody {
            service_id: &request.service_id,
            plan_id: &request.plan_id,
            organization_guid: &request.organization_guid,
            space_guid: &request.space_guid,
            parameters: request.parameters.as_ref(),
            context: &request.context,
        };
        let (status, text) = self
            .send(
                "provision",
                self.http.put(url).json(&body),
                request.originating_identity.as_ref(),
            )
            .await?;

        match status {
            StatusCode::OK | StatusCode::CREATED => {
                let parsed = operation_body(&text);
                Ok(ProvisionResponse {
                    is_async: false,
                    dashboard_url: parsed.dashboard_url,
                    operation_key: None,
                })
            }
            StatusCode::ACCEPTED if request.accepts_incomplete => {
                let parsed = operation_body(&text);
                Ok(ProvisionResponse {
                    is_async: true,
                    dashboard_url: parsed.dashboard_url,
                    operation_key: parsed.operation,
                })
            }
            _ => Err(http_error(status, &text)),
        }
    }

    async fn update_instance(&self, request: &UpdateRequest) -> Result<UpdateResponse, OsbError> {
        let mut url = self.instance_url(&request.instance_id, None)?;
        if request.accepts_incomplete {
            url.query_pairs_mut().append_pair("accepts_incomplete", "true");
        }
        info!(
            broker = %self.config.name,
            instance_id = %request.instance_id,
            plan_change = request.plan_id.is_some(),
            parameter_change = request.parameters.is_some(),
            "Updating instance at broker"
        );

        let body = UpdateBody {
            service_id: &request.service_id,
            plan_id: request.plan_id.as_deref(),
            parameters: request.parameters.as_ref(),
            previous_values: request.previous_values.as_ref(),
            context: &request.context,
        };
        let (status, text) = self
            .send(
                "update",
                self.http.patch(url).json(&body),
                request.originating_identity.as_ref(),
            )
            .await?;

        match status {
            StatusCode::OK => {
                let parsed = operation_body(&text);
                Ok(UpdateResponse {
                    is_async: false,
                    dashboard_url: parsed.dashboard_url,
                    operation_key: None,
                })
            }
            StatusCode::ACCEPTED if request.accepts_incomplete => {
                let parsed = operation_body(&text);
                Ok(UpdateResponse {
                    is_async: true,
                    dashboard_url: parsed.dashboard_url,
                    operation_key: parsed.operation,
                })
            }
            _ => Err(http_error(status, &text)),
        }
    }

    async fn deprovision_instance(
        &self,
        request: &DeprovisionRequest,
    ) -> Result<DeprovisionResponse, OsbError> {
        let mut url = self.instance_url(&request.instance_id, None)?;
        {
            let mut query = url.query_pairs_mut();
            if request.accepts_incomplete {
                query.append_pair("accepts_incomplete", "true");
            }
            query
                .append_pair("service_id", &request.service_id)
                .append_pair("plan_id", &request.plan_id);
        }
        info!(
            broker = %self.config.name,
            instance_id = %request.instance_id,
            "Deprovisioning instance at broker"
        );

        let (status, text) = self
            .send(
                "deprovision",
                self.http.delete(url),
                request.originating_identity.as_ref(),
            )
            .await?;

        match status {
            StatusCode::OK | StatusCode::GONE => Ok(DeprovisionResponse::default()),
            StatusCode::ACCEPTED if request.accepts_incomplete => {
                let parsed = operation_body(&text);
                Ok(DeprovisionResponse {
                    is_async: true,
                    operation_key: parsed.operation,
                })
            }
            _ => Err(http_error(status, &text)),
        }
    }

    async fn poll_last_operation(
        &self,
        request: &LastOperationRequest,
    ) -> Result<LastOperationResponse, OsbError> {
        let mut url = self.instance_url(&request.instance_id, Some("last_operation"))?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(service_id) = &request.service_id {
                query.append_pair("service_id", service_id);
            }
            if let Some(plan_id) = &request.plan_id {
                query.append_pair("plan_id", plan_id);
            }
            if let Some(operation) = &request.operation_key {
                query.append_pair("operation", operation);
            }
        }

        let (status, text) = self
            .send(
                "last_operation",
                self.http.get(url),
                request.originating_identity.as_ref(),
            )
            .await?;

        if status != StatusCode::OK {
            return Err(http_error(status, &text));
        }
        let parsed: LastOperationBody = serde_json::from_str(&text).map_err(|e| {
            OsbError::InvalidResponse(format!("last operation body {text:?}: {e}"))
        })?;
        Ok(LastOperationResponse {
            state: LastOperationState::parse(&parsed.state),
            description: parsed.description.filter(|d| !d.is_empty()),
        })
    }
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod http_tests;
