// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Realization of instance parameters.
//!
//! Parameters come from secret keys listed in `parametersFrom` (each holding a
//! JSON object) and from the inline `parameters` map. A key defined twice is
//! an error. Values sourced from secrets are redacted in the copy stored on
//! the status.

use crate::constants::REDACTED_PARAMETER_VALUE;
use crate::crd::{SecretKeyReference, ServiceInstance};
use crate::errors::{OperationError, ReconcileError};
use crate::status_reasons::REASON_ERROR_WITH_PARAMETERS;
use crate::store::CatalogStore;
use kube::ResourceExt;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Parameters ready to be sent, with their redacted copy and checksum.
///
/// All three are `None` when the instance defines no parameters.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RealizedParameters {
    pub parameters: Option<Map<String, Value>>,
    pub redacted: Option<Map<String, Value>>,
    pub checksum: Option<String>,
}

/// SHA-256 (lowercase hex) of the JSON encoding of `parameters`.
///
/// Keys are encoded in sorted order, so equal maps give equal checksums.
#[must_use]
pub fn parameters_checksum(parameters: &Map<String, Value>) -> String {
    let json = serde_json::to_string(parameters).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Merge secret-sourced objects and inline parameters.
///
/// # Errors
///
/// Returns a description of the first key defined more than once.
pub fn merge_parameters(
    from_secrets: Vec<Map<String, Value>>,
    inline: Option<&Map<String, Value>>,
) -> Result<RealizedParameters, String> {
    let mut parameters = Map::new();
    let mut redacted = Map::new();

    for source in from_secrets {
        for (key, value) in source {
            if parameters.contains_key(&key) {
                return Err(format!("conflict: duplicate entry for parameter {key:?}"));
            }
            redacted.insert(
                key.clone(),
                Value::String(REDACTED_PARAMETER_VALUE.to_string()),
            );
            parameters.insert(key, value);
        }
    }
    for (key, value) in inline.into_iter().flatten() {
        if parameters.contains_key(key) {
            return Err(format!("conflict: duplicate entry for parameter {key:?}"));
        }
        redacted.insert(key.clone(), value.clone());
        parameters.insert(key.clone(), value.clone());
    }

    if parameters.is_empty() {
        return Ok(RealizedParameters::default());
    }
    Ok(RealizedParameters {
        checksum: Some(parameters_checksum(&parameters)),
        parameters: Some(parameters),
        redacted: Some(redacted),
    })
}

async fn read_secret_parameters(
    store: &dyn CatalogStore,
    namespace: &str,
    secret_ref: &SecretKeyReference,
) -> Result<Map<String, Value>, String> {
    let data = store
        .get_secret_data(namespace, &secret_ref.name)
        .await
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("secret {namespace}/{} not found", secret_ref.name))?;
    let bytes = data.get(&secret_ref.key).ok_or_else(|| {
        format!(
            "key {:?} not found in secret {namespace}/{}",
            secret_ref.key, secret_ref.name
        )
    })?;
    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(format!(
            "secret {namespace}/{} key {:?} does not hold a JSON object",
            secret_ref.name, secret_ref.key
        )),
        Err(e) => Err(format!(
            "failed to unmarshal parameters from secret {namespace}/{} key {:?}: {e}",
            secret_ref.name, secret_ref.key
        )),
    }
}

/// Realize the parameters of `instance`.
///
/// # Errors
///
/// [`OperationError`] with reason `ErrorWithParameters` when a secret is
/// missing or malformed, or when a key is defined twice.
pub async fn realize_parameters(
    store: &dyn CatalogStore,
    instance: &ServiceInstance,
) -> Result<RealizedParameters, ReconcileError> {
    let namespace = instance.namespace().unwrap_or_default();
    let fail = |e: String| -> ReconcileError {
        OperationError::new(
            REASON_ERROR_WITH_PARAMETERS,
            format!("Failed to prepare ServiceInstance parameters: {e}"),
        )
        .into()
    };

    let mut from_secrets = Vec::new();
    for source in &instance.spec.parameters_from {
        if let Some(secret_ref) = source.secret_key_ref.as_ref() {
            from_secrets.push(
                read_secret_parameters(store, &namespace, secret_ref)
                    .await
                    .map_err(fail)?,
            );
        }
    }
    merge_parameters(from_secrets, instance.spec.parameters.as_ref()).map_err(fail)
}

#[cfg(test)]
#[path = "parameters_tests.rs"]
mod parameters_tests;
