// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Open Service Broker request and response types.
//!
//! These are the controller-side shapes; the HTTP client maps them onto the
//! broker's JSON wire format.

use crate::constants::OSB_PLATFORM_KUBERNETES;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

/// Identity of the user on whose behalf a request is made.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OriginatingIdentity {
    /// Platform name, always `kubernetes` for catalogd.
    pub platform: String,
    /// JSON-encoded user info.
    pub value: String,
}

impl OriginatingIdentity {
    #[must_use]
    pub fn kubernetes(value: String) -> Self {
        Self {
            platform: OSB_PLATFORM_KUBERNETES.to_string(),
            value,
        }
    }

    /// Value of the `X-Broker-API-Originating-Identity` header.
    #[must_use]
    pub fn header_value(&self) -> String {
        format!("{} {}", self.platform, STANDARD.encode(self.value.as_bytes()))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ProvisionRequest {
    pub instance_id: String,
    pub accepts_incomplete: bool,
    pub service_id: String,
    pub plan_id: String,
    pub organization_guid: String,
    pub space_guid: String,
    pub parameters: Option<Map<String, Value>>,
    pub context: Map<String, Value>,
    pub originating_identity: Option<OriginatingIdentity>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProvisionResponse {
    pub is_async: bool,
    pub dashboard_url: Option<String>,
    pub operation_key: Option<String>,
}

/// Values the instance had before an update.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PreviousValues {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct UpdateRequest {
    pub instance_id: String,
    pub accepts_incomplete: bool,
    pub service_id: String,
    /// Only set when the plan changes.
    pub plan_id: Option<String>,
    /// Only set when the parameters change; an empty map clears them.
    pub parameters: Option<Map<String, Value>>,
    pub previous_values: Option<PreviousValues>,
    pub context: Map<String, Value>,
    pub originating_identity: Option<OriginatingIdentity>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UpdateResponse {
    pub is_async: bool,
    pub dashboard_url: Option<String>,
    pub operation_key: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeprovisionRequest {
    pub instance_id: String,
    pub accepts_incomplete: bool,
    pub service_id: String,
    pub plan_id: String,
    pub originating_identity: Option<OriginatingIdentity>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeprovisionResponse {
    pub is_async: bool,
    pub operation_key: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LastOperationRequest {
    pub instance_id: String,
    pub service_id: Option<String>,
    pub plan_id: Option<String>,
    pub operation_key: Option<String>,
    pub originating_identity: Option<OriginatingIdentity>,
}

/// State reported by the last operation endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LastOperationState {
    InProgress,
    Succeeded,
    Failed,
    /// Anything the OSB contract does not define.
    Unknown(String),
}

impl LastOperationState {
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value {
            "in progress" => Self::InProgress,
            "succeeded" => Self::Succeeded,
            "failed" => Self::Failed,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for LastOperationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InProgress => f.write_str("in progress"),
            Self::Succeeded => f.write_str("succeeded"),
            Self::Failed => f.write_str("failed"),
            Self::Unknown(v) => f.write_str(v),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LastOperationResponse {
    pub state: LastOperationState,
    pub description: Option<String>,
}
