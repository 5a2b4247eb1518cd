// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Broker client configuration from a broker object and its auth secret.

use super::InstanceContext;
use crate::broker_client_manager::BrokerKey;
use crate::catalog::CatalogBroker;
use crate::constants::{SECRET_KEY_PASSWORD, SECRET_KEY_TOKEN, SECRET_KEY_USERNAME};
use crate::crd::SecretAuth;
use crate::errors::{OperationError, ReconcileError};
use crate::osb::{AuthConfig, BasicAuthConfig, BearerConfig, ClientConfiguration, OsbClient};
use crate::status_reasons::REASON_ERROR_GETTING_AUTH_CREDENTIALS;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::collections::BTreeMap;
use std::sync::Arc;

fn auth_error(broker: &CatalogBroker, detail: impl std::fmt::Display) -> ReconcileError {
    OperationError::new(
        REASON_ERROR_GETTING_AUTH_CREDENTIALS,
        format!(
            "Error getting broker auth credentials for broker {:?}: {detail}",
            broker.name
        ),
    )
    .into()
}

async fn read_auth_secret(
    ctx: &InstanceContext,
    broker: &CatalogBroker,
    auth: &SecretAuth,
) -> Result<BTreeMap<String, Vec<u8>>, ReconcileError> {
    let Some(secret_ref) = auth.secret_ref.as_ref() else {
        return Err(auth_error(broker, "auth secret reference is not set"));
    };
    let Some(namespace) = secret_ref
        .namespace
        .clone()
        .or_else(|| broker.namespace.clone())
    else {
        return Err(auth_error(
            broker,
            format!("namespace of auth secret {:?} is not set", secret_ref.name),
        ));
    };
    ctx.store
        .get_secret_data(&namespace, &secret_ref.name)
        .await
        .map_err(|e| auth_error(broker, e))?
        .ok_or_else(|| {
            auth_error(
                broker,
                format!("secret {namespace}/{} not found", secret_ref.name),
            )
        })
}

fn secret_value(
    broker: &CatalogBroker,
    data: &BTreeMap<String, Vec<u8>>,
    key: &str,
) -> Result<String, ReconcileError> {
    let bytes = data
        .get(key)
        .ok_or_else(|| auth_error(broker, format!("auth secret has no {key:?} key")))?;
    String::from_utf8(bytes.clone())
        .map_err(|_| auth_error(broker, format!("auth secret key {key:?} is not UTF-8")))
}

/// CA bundles are stored base64-encoded; a raw PEM bundle is accepted as is.
fn decode_ca_bundle(bundle: &str) -> Vec<u8> {
    STANDARD
        .decode(bundle.trim())
        .unwrap_or_else(|_| bundle.as_bytes().to_vec())
}

/// Build the client configuration of `broker`.
///
/// # Errors
///
/// [`OperationError`] with reason `ErrorGettingAuthCredentials` when the
/// auth secret cannot be read.
pub async fn client_configuration(
    ctx: &InstanceContext,
    broker: &CatalogBroker,
) -> Result<ClientConfiguration, ReconcileError> {
    let mut auth = None;
    if let Some(info) = broker.auth_info.as_ref() {
        if let Some(basic) = info.basic.as_ref() {
            let data = read_auth_secret(ctx, broker, basic).await?;
            auth = Some(AuthConfig {
                basic: Some(BasicAuthConfig {
                    username: secret_value(broker, &data, SECRET_KEY_USERNAME)?,
                    password: secret_value(broker, &data, SECRET_KEY_PASSWORD)?,
                }),
                bearer: None,
            });
        } else if let Some(bearer) = info.bearer.as_ref() {
            let data = read_auth_secret(ctx, broker, bearer).await?;
            auth = Some(AuthConfig {
                basic: None,
                bearer: Some(BearerConfig {
                    token: secret_value(broker, &data, SECRET_KEY_TOKEN)?,
                }),
            });
        }
    }

    Ok(ClientConfiguration {
        name: broker.name.clone(),
        url: broker.url.clone(),
        api_version: ctx.config.osb_api_version.clone(),
        auth,
        insecure: broker.insecure_skip_tls_verify,
        ca_data: broker.ca_bundle.as_deref().map(decode_ca_bundle),
        timeout: ctx.config.broker_timeout,
    })
}

/// Pool key of `broker`.
#[must_use]
pub fn broker_key(broker: &CatalogBroker) -> BrokerKey {
    match broker.namespace.as_deref() {
        Some(namespace) => BrokerKey::namespaced(namespace, &broker.name),
        None => BrokerKey::cluster(&broker.name),
    }
}

/// The pooled client of `broker`, rebuilt when its configuration changed.
///
/// # Errors
///
/// Fails when the auth secret cannot be read or the client cannot be built.
pub async fn broker_client(
    ctx: &InstanceContext,
    broker: &CatalogBroker,
) -> Result<Arc<dyn OsbClient>, ReconcileError> {
    let config = client_configuration(ctx, broker).await?;
    Ok(ctx.brokers.update_broker_client(&broker_key(broker), &config)?)
}

#[cfg(test)]
#[path = "broker_tests.rs"]
mod broker_tests;
