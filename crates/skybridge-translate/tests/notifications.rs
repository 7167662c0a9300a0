//! End-to-end translation of a notification configuration
//!
//! A notification-config resource carries two notification entries whose
//! credentials live in secrets. Collapsing must produce an API payload with
//! the decoded plaintext values and no raw reference structure; expanding
//! the same payload must rebuild one secret per referenced value.

use kube::core::{DynamicObject, ObjectMeta, TypeMeta};
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};

use skybridge_core::{codec, tree};
use skybridge_kube::{Dependencies, DependencySet};
use skybridge_translate::{API_MAPPINGS_ANNOTATION, Translator};

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;

const MAJOR_VERSION: &str = "v20250601";

const MAPPINGS: &str = r#"
properties:
  spec:
    properties:
      v20250601:
        properties:
          entry:
            properties:
              notifications:
                items:
                  properties:
                    apiKeySecretRef:
                      x-kubernetes-mapping:
                        nameSelector: .name
                        propertySelectors: ["$.data.#"]
                        type: {kind: Secret, resource: secrets, version: v1}
                      x-openapi-mapping: {property: .apiKey, type: string}
                    webhookSecretSecretRef:
                      x-kubernetes-mapping:
                        nameSelector: .name
                        propertySelectors: ["$.data.#"]
                        type: {kind: Secret, resource: secrets, version: v1}
                      x-openapi-mapping: {property: .webhookSecret, type: string}
                    webhookUrlSecretRef:
                      x-kubernetes-mapping:
                        nameSelector: .name
                        propertySelectors: ["$.data.#"]
                        type: {kind: Secret, resource: secrets, version: v1}
                      x-openapi-mapping: {property: .webhookUrl, type: string}
"#;

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct AlertConfig {
    enabled: bool,
    event_type_name: String,
    notifications: Vec<Notification>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Notification {
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    webhook_secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    webhook_url: Option<String>,
}

fn notification_config_crd() -> CustomResourceDefinition {
    serde_json::from_value(json!({
        "apiVersion": "apiextensions.k8s.io/v1",
        "kind": "CustomResourceDefinition",
        "metadata": {
            "name": "notificationconfigs.sync.skybridge.dev",
            "annotations": { "api-mappings": MAPPINGS },
        },
        "spec": {
            "group": "sync.skybridge.dev",
            "names": { "kind": "NotificationConfig", "plural": "notificationconfigs" },
            "scope": "Namespaced",
            "versions": [{
                "name": "v1",
                "served": true,
                "storage": true,
                "schema": {
                    "openAPIV3Schema": {
                        "type": "object",
                        "properties": {
                            "spec": {
                                "type": "object",
                                "properties": { "v20250601": { "type": "object" } },
                            },
                            "status": { "type": "object" },
                        },
                    },
                },
            }],
        },
    }))
    .expect("static definition must parse")
}

fn notification_config(spec: JsonValue) -> DynamicObject {
    DynamicObject {
        types: Some(TypeMeta {
            api_version: "sync.skybridge.dev/v1".into(),
            kind: "NotificationConfig".into(),
        }),
        metadata: ObjectMeta {
            name: Some("my-alerts".into()),
            namespace: Some("default".into()),
            ..Default::default()
        },
        data: json!({ "spec": spec }),
    }
}

fn secret(name: &str, entries: &[(&str, &str)]) -> DynamicObject {
    let data: serde_json::Map<String, JsonValue> = entries
        .iter()
        .map(|(key, plaintext)| (key.to_string(), JsonValue::String(codec::encode(plaintext))))
        .collect();
    DynamicObject {
        types: Some(TypeMeta {
            api_version: "v1".into(),
            kind: "Secret".into(),
        }),
        metadata: ObjectMeta {
            name: Some(name.into()),
            namespace: Some("default".into()),
            ..Default::default()
        },
        data: json!({ "data": data }),
    }
}

fn alert_secrets() -> Vec<DynamicObject> {
    vec![
        secret(
            "alert-secrets-0",
            &[
                ("apiKey", "super-secret-key"),
                ("webhookSecret", "hook-signing-secret"),
            ],
        ),
        secret(
            "alert-secrets-1",
            &[("webhookUrl", "https://hooks.example.com/123")],
        ),
    ]
}

mod collapse {
    use super::*;

    #[test]
    fn test_to_api_resolves_both_notification_entries() {
        let translator =
            Translator::new(&notification_config_crd(), "v1", MAJOR_VERSION).unwrap();
        let resource = notification_config(json!({
            "v20250601": {
                "entry": {
                    "enabled": true,
                    "eventTypeName": "replication-lag",
                    "notifications": [
                        {
                            "region": "US",
                            "apiKeySecretRef": { "name": "alert-secrets-0", "key": "apiKey" },
                        },
                        {
                            "webhookSecretSecretRef": { "name": "alert-secrets-0", "key": "webhookSecret" },
                            "webhookUrlSecretRef": { "name": "alert-secrets-1", "key": "webhookUrl" },
                        },
                    ],
                },
            },
        }));
        let mut deps = Dependencies::new(resource, alert_secrets());

        let mut payload = AlertConfig::default();
        translator.to_api(&mut deps, &mut payload).unwrap();

        assert!(payload.enabled);
        assert_eq!(payload.event_type_name, "replication-lag");
        assert_eq!(payload.notifications.len(), 2);

        let first = &payload.notifications[0];
        assert_eq!(first.api_key.as_deref(), Some("super-secret-key"));
        assert_eq!(first.region.as_deref(), Some("US"));

        let second = &payload.notifications[1];
        assert_eq!(second.webhook_secret.as_deref(), Some("hook-signing-secret"));
        assert_eq!(
            second.webhook_url.as_deref(),
            Some("https://hooks.example.com/123")
        );

        // The payload carries no raw reference structure.
        let rendered = serde_json::to_string(&payload).unwrap();
        assert!(!rendered.contains("SecretRef"));
        assert!(!rendered.contains("alert-secrets"));
    }

    #[test]
    fn test_to_api_fails_when_a_secret_is_missing() {
        let translator =
            Translator::new(&notification_config_crd(), "v1", MAJOR_VERSION).unwrap();
        let resource = notification_config(json!({
            "v20250601": {
                "entry": {
                    "notifications": [
                        { "apiKeySecretRef": { "name": "alert-secrets-0", "key": "apiKey" } },
                    ],
                },
            },
        }));
        let mut deps = Dependencies::new(resource, vec![]);

        let mut payload = AlertConfig::default();
        let err = translator.to_api(&mut deps, &mut payload).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}

mod expand {
    use super::*;

    #[test]
    fn test_from_api_builds_one_secret_per_referenced_value() {
        let translator =
            Translator::new(&notification_config_crd(), "v1", MAJOR_VERSION).unwrap();
        let source = AlertConfig {
            enabled: true,
            event_type_name: "replication-lag".into(),
            notifications: vec![
                Notification {
                    api_key: Some("super-secret-key".into()),
                    region: Some("US".into()),
                    ..Default::default()
                },
                Notification {
                    webhook_secret: Some("hook-signing-secret".into()),
                    webhook_url: Some("https://hooks.example.com/123".into()),
                    ..Default::default()
                },
            ],
        };

        let mut deps = Dependencies::new(notification_config(json!({})), vec![]);
        let mut resource = notification_config(json!({}));
        let added = translator
            .from_api(&mut deps, &mut resource, &source)
            .unwrap();

        assert_eq!(added.len(), 3);
        for dep in &added {
            assert_eq!(dep.types.as_ref().unwrap().kind, "Secret");
            // Named after the owner; namespace left to the caller.
            assert!(dep.metadata.name.as_ref().unwrap().starts_with("my-alerts-"));
            assert_eq!(dep.metadata.namespace, None);
        }

        let secret_values: Vec<JsonValue> = added
            .iter()
            .map(|dep| {
                tree::get(
                    &tree::to_tree(dep).unwrap(),
                    &["data"],
                )
                .unwrap()
                .clone()
            })
            .collect();
        assert!(secret_values.contains(&json!({ "apiKey": codec::encode("super-secret-key") })));
        assert!(
            secret_values.contains(&json!({ "webhookSecret": codec::encode("hook-signing-secret") }))
        );
        assert!(secret_values.contains(
            &json!({ "webhookUrl": codec::encode("https://hooks.example.com/123") })
        ));

        // The resource's entry payload now carries reference stubs pointing
        // at the created secrets.
        let resource_tree = tree::to_tree(&resource).unwrap();
        let notifications = tree::get(
            &resource_tree,
            &["spec", MAJOR_VERSION, "entry", "notifications"],
        )
        .unwrap()
        .as_array()
        .unwrap();
        let stub = notifications[0].get("apiKeySecretRef").unwrap();
        assert_eq!(stub.get("key").unwrap(), "apiKey");
        let stub_name = stub.get("name").unwrap().as_str().unwrap();
        assert!(deps.find(stub_name, None).is_some());

        // The envelope carries spec and status copies of the payload.
        assert_eq!(
            tree::get(&resource_tree, &["spec", MAJOR_VERSION, "eventTypeName"]).unwrap(),
            "replication-lag"
        );
        assert_eq!(
            tree::get(&resource_tree, &["status", MAJOR_VERSION, "enabled"]).unwrap(),
            &json!(true)
        );
    }

    #[test]
    fn test_from_api_without_referenced_values_builds_nothing() {
        let translator =
            Translator::new(&notification_config_crd(), "v1", MAJOR_VERSION).unwrap();
        let source = AlertConfig {
            enabled: false,
            event_type_name: "disk-usage".into(),
            notifications: vec![Notification {
                region: Some("EU".into()),
                ..Default::default()
            }],
        };

        let mut deps = Dependencies::new(notification_config(json!({})), vec![]);
        let mut resource = notification_config(json!({}));
        let added = translator
            .from_api(&mut deps, &mut resource, &source)
            .unwrap();
        assert!(added.is_empty());
    }

    #[test]
    fn test_expanded_resource_collapses_back_to_the_payload() {
        let translator =
            Translator::new(&notification_config_crd(), "v1", MAJOR_VERSION).unwrap();
        let source = AlertConfig {
            enabled: true,
            event_type_name: "replication-lag".into(),
            notifications: vec![Notification {
                webhook_url: Some("https://hooks.example.com/123".into()),
                ..Default::default()
            }],
        };

        let mut deps = Dependencies::new(notification_config(json!({})), vec![]);
        let mut resource = notification_config(json!({}));
        let added = translator
            .from_api(&mut deps, &mut resource, &source)
            .unwrap();
        assert_eq!(added.len(), 1);

        // Collapse through a fresh dependency set holding the expanded
        // resource and the secrets it produced.
        let mut deps = Dependencies::new(resource, added);
        let mut payload = AlertConfig::default();
        translator.to_api(&mut deps, &mut payload).unwrap();

        assert_eq!(payload.enabled, source.enabled);
        assert_eq!(payload.event_type_name, source.event_type_name);
        assert_eq!(
            payload.notifications[0].webhook_url.as_deref(),
            Some("https://hooks.example.com/123")
        );
    }
}
