// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `parameters.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::crd::ParametersFromSource;
    use crate::store::memory::MemoryStore;
    use crate::testing::{service_instance, TEST_NAMESPACE};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    fn from_secret(name: &str, key: &str) -> ParametersFromSource {
        ParametersFromSource {
            secret_key_ref: Some(SecretKeyReference {
                name: name.to_string(),
                key: key.to_string(),
            }),
        }
    }

    fn store_with_secret(name: &str, key: &str, value: &str) -> MemoryStore {
        let store = MemoryStore::new();
        let mut data = BTreeMap::new();
        data.insert(key.to_string(), value.as_bytes().to_vec());
        store.add_secret(TEST_NAMESPACE, name, data);
        store
    }

    #[test]
    fn test_checksum_is_stable_and_order_independent() {
        let a = map(json!({"a": 1, "b": "two"}));
        let mut b = Map::new();
        b.insert("b".to_string(), json!("two"));
        b.insert("a".to_string(), json!(1));

        let checksum = parameters_checksum(&a);
        assert_eq!(checksum, parameters_checksum(&b));
        assert_eq!(checksum.len(), 64);
        assert!(checksum.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(checksum, parameters_checksum(&map(json!({"a": 2, "b": "two"}))));
    }

    #[test]
    fn test_merge_without_parameters() {
        assert_eq!(
            merge_parameters(Vec::new(), None).unwrap(),
            RealizedParameters::default()
        );
        assert_eq!(
            merge_parameters(Vec::new(), Some(&Map::new())).unwrap(),
            RealizedParameters::default()
        );
    }

    #[test]
    fn test_merge_redacts_secret_values() {
        let secret = map(json!({"password": "hunter2"}));
        let inline = map(json!({"size": 3}));

        let realized = merge_parameters(vec![secret], Some(&inline)).unwrap();

        let parameters = realized.parameters.unwrap();
        assert_eq!(parameters["password"], json!("hunter2"));
        assert_eq!(parameters["size"], json!(3));
        let redacted = realized.redacted.unwrap();
        assert_eq!(redacted["password"], json!(REDACTED_PARAMETER_VALUE));
        assert_eq!(redacted["size"], json!(3));
        assert_eq!(realized.checksum, Some(parameters_checksum(&parameters)));
    }

    #[test]
    fn test_merge_rejects_duplicate_keys() {
        let err = merge_parameters(
            vec![map(json!({"size": 1}))],
            Some(&map(json!({"size": 2}))),
        )
        .unwrap_err();
        assert!(err.contains("duplicate entry for parameter \"size\""));

        let err = merge_parameters(
            vec![map(json!({"size": 1})), map(json!({"size": 2}))],
            None,
        )
        .unwrap_err();
        assert!(err.contains("size"));
    }

    #[tokio::test]
    async fn test_realize_reads_secret_parameters() {
        let store = store_with_secret("creds", "params", r#"{"user": "admin"}"#);
        let mut instance = service_instance("i1");
        instance.spec.parameters_from = vec![from_secret("creds", "params")];

        let realized = realize_parameters(&store, &instance).await.unwrap();

        assert_eq!(realized.parameters.unwrap()["user"], json!("admin"));
        assert_eq!(
            realized.redacted.unwrap()["user"],
            json!(REDACTED_PARAMETER_VALUE)
        );
    }

    #[tokio::test]
    async fn test_realize_fails_on_missing_secret() {
        let store = MemoryStore::new();
        let mut instance = service_instance("i1");
        instance.spec.parameters_from = vec![from_secret("absent", "params")];

        let err = realize_parameters(&store, &instance).await.unwrap_err();

        let ReconcileError::Operation(op) = err else {
            panic!("expected an operation error, got {err:?}");
        };
        assert_eq!(op.reason, REASON_ERROR_WITH_PARAMETERS);
        assert!(op
            .message
            .starts_with("Failed to prepare ServiceInstance parameters: "));
    }

    #[tokio::test]
    async fn test_realize_fails_on_missing_key_or_bad_json() {
        let store = store_with_secret("creds", "params", "not json");
        let mut instance = service_instance("i1");

        instance.spec.parameters_from = vec![from_secret("creds", "other")];
        assert!(realize_parameters(&store, &instance).await.is_err());

        instance.spec.parameters_from = vec![from_secret("creds", "params")];
        assert!(realize_parameters(&store, &instance).await.is_err());
    }

    #[tokio::test]
    async fn test_realize_rejects_non_object_json() {
        let store = store_with_secret("creds", "params", "[1, 2]");
        let mut instance = service_instance("i1");
        instance.spec.parameters_from = vec![from_secret("creds", "params")];

        let err = realize_parameters(&store, &instance).await.unwrap_err();
        assert!(err.to_string().contains("does not hold a JSON object"));
    }
}
