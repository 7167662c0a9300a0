//! The versioned translator
//!
//! A [`Translator`] is built once from a resource definition and a pair of
//! version identifiers and is immutable afterwards, so it can be shared
//! freely across threads. Each call borrows a caller-owned dependency set
//! exclusively and either fully populates its target or returns no usable
//! result.

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::{
    CustomResourceDefinition, CustomResourceDefinitionVersion,
};
use kube::core::DynamicObject;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use tracing::debug;

use skybridge_core::tree::{self, Tree};
use skybridge_kube::{DependencySet, KindRegistry};

use crate::error::{Result, ResultExt, TranslateError};
use crate::mapping::{Direction, Mapper, MappingNode};

/// Annotation on the resource definition carrying the mapping document.
pub const API_MAPPINGS_ANNOTATION: &str = "api-mappings";

const SPEC_FIELD: &str = "spec";
const STATUS_FIELD: &str = "status";
const ENTRY_FIELD: &str = "entry";

/// Translates back and forth between a resource schema and API structures of
/// a pinned major version.
#[derive(Debug)]
pub struct Translator {
    major_version: String,
    schema: jsonschema::Validator,
    mappings: Option<String>,
    entry_field: Option<String>,
    registry: KindRegistry,
}

impl Translator {
    /// Create a translator for a resource definition and version pair.
    ///
    /// Given the following example resource:
    ///
    /// ```yaml
    /// apiVersion: sync.skybridge.dev/v1
    /// kind: NotificationConfig
    /// metadata:
    ///   name: my-alerts
    /// spec:
    ///   v20250601:
    /// ```
    ///
    /// `crd_version` is `v1` and `major_version` is `v20250601`. An empty
    /// `crd_version` selects the definition's first version.
    pub fn new(
        crd: &CustomResourceDefinition,
        crd_version: &str,
        major_version: &str,
    ) -> Result<Self> {
        let version =
            select_version(crd, crd_version).ok_or_else(|| TranslateError::UnknownVersion {
                version: crd_version.to_string(),
            })?;
        assert_major_version(version, major_version)?;
        let schema = compile_schema(version)?;
        let mappings = crd
            .metadata
            .annotations
            .as_ref()
            .and_then(|annotations| annotations.get(API_MAPPINGS_ANNOTATION))
            .cloned();
        Ok(Self {
            major_version: major_version.to_string(),
            schema,
            mappings,
            entry_field: None,
            registry: KindRegistry::with_defaults(),
        })
    }

    /// Nest the entry payload under this field on `to_api`, for target
    /// types that expect their payload under a named field rather than at
    /// the top level.
    pub fn with_entry_field(mut self, field: impl Into<String>) -> Self {
        self.entry_field = Some(field.into());
        self
    }

    /// Replace the referenced-kind registry.
    pub fn with_registry(mut self, registry: KindRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// The pinned major version.
    pub fn major_version(&self) -> &str {
        &self.major_version
    }

    /// Check an object against the compiled resource schema.
    pub fn validate(&self, obj: &JsonValue) -> Result<()> {
        if self.schema.is_valid(obj) {
            return Ok(());
        }
        let message = self
            .schema
            .iter_errors(obj)
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        Err(TranslateError::Validation { message })
    }

    /// Translate the dependency set's main object into an API structure,
    /// collapsing every reference under `spec.<major-version>` into its
    /// literal value.
    pub fn to_api<T>(&self, deps: &mut dyn DependencySet, target: &mut T) -> Result<()>
    where
        T: DeserializeOwned,
    {
        debug!(version = %self.major_version, "translating resource into API structure");
        let major = self.major_version.as_str();
        let mut source = tree::to_tree(deps.main())?;
        self.validate(&JsonValue::Object(source.clone()))
            .context_with(|| "input object rejected by the resource schema".to_string())?;

        let root = self.mapping_root()?;
        let versioned = tree::get_tree_mut(&mut source, &[SPEC_FIELD, major])
            .context_with(|| format!("failed to access the {major:?} spec value"))?;

        if let Some(root) = &root {
            if let Some(MappingNode::Object(props)) = root.descend(&[SPEC_FIELD, major]) {
                Mapper::new(Direction::Collapse, &self.registry)
                    .map_properties(deps, &[], props, versioned)
                    .context_with(|| "failed to collapse references in the spec".to_string())?;
            }
        }

        let mut target_tree = tree::skip_keys(versioned, &[ENTRY_FIELD]);
        if let Some(JsonValue::Object(entry)) = versioned.get(ENTRY_FIELD) {
            match &self.entry_field {
                Some(field) => {
                    target_tree.insert(field.clone(), JsonValue::Object(entry.clone()));
                }
                None => tree::copy_fields(&mut target_tree, entry),
            }
        }
        *target = tree::from_tree(target_tree)?;
        Ok(())
    }

    /// Translate an API structure into the resource shape, expanding every
    /// reference into a dependent object. Returns the objects the
    /// dependency set accumulated.
    pub fn from_api<S, T>(
        &self,
        deps: &mut dyn DependencySet,
        target: &mut T,
        source: &S,
    ) -> Result<Vec<DynamicObject>>
    where
        S: Serialize,
        T: Serialize + DeserializeOwned,
    {
        debug!(version = %self.major_version, "translating API structure into resource");
        let major = self.major_version.as_str();
        let source_tree = tree::to_tree(source)?;
        let mut target_tree = tree::to_tree(target)?;

        let versioned_spec = tree::get_or_create_tree(&mut target_tree, &[SPEC_FIELD, major])
            .context_with(|| "failed to create the versioned spec".to_string())?;
        tree::copy_fields(versioned_spec, &source_tree);

        let mut entry = Tree::new();
        tree::copy_fields(&mut entry, &source_tree);
        versioned_spec.insert(ENTRY_FIELD.to_string(), JsonValue::Object(entry));

        let mut status = Tree::new();
        tree::copy_fields(&mut status, &source_tree);
        tree::set(
            &mut target_tree,
            JsonValue::Object(status),
            &[STATUS_FIELD, major],
        )
        .context_with(|| "failed to create the versioned status".to_string())?;

        if let Some(root) = self.mapping_root()? {
            let sections: [(&str, Vec<&str>); 3] = [
                ("spec", vec![SPEC_FIELD, major]),
                ("spec entry", vec![SPEC_FIELD, major, ENTRY_FIELD]),
                ("status", vec![STATUS_FIELD, major]),
            ];
            for (title, section) in sections {
                let Some(MappingNode::Object(props)) = root.descend(&section) else {
                    continue;
                };
                let sub = tree::get_tree_mut(&mut target_tree, &section)
                    .context_with(|| format!("failed to access the {title}"))?;
                Mapper::new(Direction::Expand, &self.registry)
                    .map_properties(deps, &[], props, sub)
                    .context_with(|| format!("failed to expand references in the {title}"))?;
            }
        }

        self.validate(&JsonValue::Object(target_tree.clone()))
            .context_with(|| "output object rejected by the resource schema".to_string())?;
        *target = tree::from_tree(target_tree)?;
        Ok(deps.added())
    }

    /// Parse the mapping document annotation, fresh on every call.
    fn mapping_root(&self) -> Result<Option<MappingNode>> {
        let Some(raw) = &self.mappings else {
            return Ok(None);
        };
        if raw.trim().is_empty() {
            return Ok(None);
        }
        let doc: JsonValue = serde_yaml::from_str(raw)?;
        Ok(Some(MappingNode::parse(&doc, &[])?))
    }
}

/// The definition version matching `version`, or the first one when
/// `version` is empty.
fn select_version<'a>(
    crd: &'a CustomResourceDefinition,
    version: &str,
) -> Option<&'a CustomResourceDefinitionVersion> {
    let versions = &crd.spec.versions;
    if version.is_empty() {
        return versions.first();
    }
    versions.iter().find(|v| v.name == version)
}

/// The major version must appear among the schema's `spec` properties.
fn assert_major_version(
    version: &CustomResourceDefinitionVersion,
    major_version: &str,
) -> Result<()> {
    let schema = open_api_schema(version)?;
    let properties = schema
        .properties
        .as_ref()
        .ok_or_else(|| TranslateError::Schema {
            message: "schema has no properties".to_string(),
        })?;
    let spec = properties
        .get(SPEC_FIELD)
        .ok_or_else(|| TranslateError::Schema {
            message: "schema has no spec property".to_string(),
        })?;
    let declared = spec.properties.as_ref().is_some_and(|spec_properties| {
        spec_properties.contains_key(major_version)
    });
    if !declared {
        return Err(TranslateError::UnknownVersion {
            version: major_version.to_string(),
        });
    }
    Ok(())
}

fn compile_schema(version: &CustomResourceDefinitionVersion) -> Result<jsonschema::Validator> {
    let schema = open_api_schema(version)?;
    let schema_json = serde_json::to_value(schema).map_err(skybridge_core::CoreError::Json)?;
    jsonschema::validator_for(&schema_json).map_err(|e| TranslateError::Schema {
        message: format!("failed to compile: {e}"),
    })
}

fn open_api_schema(
    version: &CustomResourceDefinitionVersion,
) -> Result<&k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::JSONSchemaProps> {
    version
        .schema
        .as_ref()
        .and_then(|validation| validation.open_api_v3_schema.as_ref())
        .ok_or_else(|| TranslateError::Schema {
            message: format!("version {:?} has no OpenAPI schema", version.name),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::core::{ObjectMeta, TypeMeta};
    use serde::Deserialize;
    use serde_json::json;
    use skybridge_kube::Dependencies;

    fn crd(annotation: Option<&str>) -> CustomResourceDefinition {
        let mut doc = json!({
            "apiVersion": "apiextensions.k8s.io/v1",
            "kind": "CustomResourceDefinition",
            "metadata": { "name": "notificationconfigs.sync.skybridge.dev" },
            "spec": {
                "group": "sync.skybridge.dev",
                "names": {
                    "kind": "NotificationConfig",
                    "plural": "notificationconfigs",
                },
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
                                    "properties": {
                                        "v20250601": { "type": "object" },
                                    },
                                },
                                "status": { "type": "object" },
                            },
                        },
                    },
                }],
            },
        });
        if let Some(annotation) = annotation {
            doc["metadata"]["annotations"] = json!({ "api-mappings": annotation });
        }
        serde_json::from_value(doc).unwrap()
    }

    fn main_object(spec: JsonValue) -> DynamicObject {
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

    #[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase", default)]
    struct AlertConfig {
        enabled: bool,
        event_type_name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        severity: Option<String>,
    }

    #[test]
    fn test_new_selects_versions_like_the_definition() {
        assert!(Translator::new(&crd(None), "v1", "v20250601").is_ok());
        // An empty requested version selects the first one.
        assert!(Translator::new(&crd(None), "", "v20250601").is_ok());

        let err = Translator::new(&crd(None), "v2", "v20250601").unwrap_err();
        assert!(matches!(err, TranslateError::UnknownVersion { .. }));

        let err = Translator::new(&crd(None), "v1", "v19990101").unwrap_err();
        assert!(matches!(err, TranslateError::UnknownVersion { .. }));
    }

    #[test]
    fn test_validate_rejects_schema_violations() {
        let translator = Translator::new(&crd(None), "v1", "v20250601").unwrap();
        translator
            .validate(&json!({ "spec": { "v20250601": {} } }))
            .unwrap();
        let err = translator
            .validate(&json!({ "spec": "not-an-object" }))
            .unwrap_err();
        assert!(matches!(err, TranslateError::Validation { .. }));
    }

    #[test]
    fn test_round_trip_without_references_is_lossless() {
        let translator = Translator::new(&crd(None), "v1", "v20250601").unwrap();
        let source = AlertConfig {
            enabled: true,
            event_type_name: "some-event".into(),
            severity: Some("severe".into()),
        };

        let mut resource = main_object(json!({}));
        let mut deps = Dependencies::new(main_object(json!({})), vec![]);
        let added = translator
            .from_api(&mut deps, &mut resource, &source)
            .unwrap();
        assert!(added.is_empty());

        let resource_tree = tree::to_tree(&resource).unwrap();
        assert_eq!(
            tree::get(&resource_tree, &["spec", "v20250601", "eventTypeName"]).unwrap(),
            "some-event"
        );
        assert_eq!(
            tree::get(&resource_tree, &["spec", "v20250601", "entry", "enabled"]).unwrap(),
            &json!(true)
        );
        assert_eq!(
            tree::get(&resource_tree, &["status", "v20250601", "severity"]).unwrap(),
            "severe"
        );

        let mut deps = Dependencies::new(resource, vec![]);
        let mut back = AlertConfig::default();
        translator.to_api(&mut deps, &mut back).unwrap();
        assert_eq!(back, source);
    }

    #[test]
    fn test_to_api_fails_without_the_versioned_spec() {
        let translator = Translator::new(&crd(None), "v1", "v20250601").unwrap();
        let mut deps = Dependencies::new(main_object(json!({})), vec![]);
        let mut target = AlertConfig::default();
        let err = translator.to_api(&mut deps, &mut target).unwrap_err();
        assert!(err.to_string().contains("v20250601"));
    }

    #[test]
    fn test_to_api_nests_the_entry_under_the_configured_field() {
        #[derive(Debug, Default, Serialize, Deserialize)]
        #[serde(rename_all = "camelCase", default)]
        struct CreateAlertParams {
            alert_config: AlertConfig,
            dry_run: Option<bool>,
        }

        let translator = Translator::new(&crd(None), "v1", "v20250601")
            .unwrap()
            .with_entry_field("alertConfig");
        let resource = main_object(json!({
            "v20250601": {
                "entry": { "enabled": true, "eventTypeName": "some-event" },
                "dryRun": true,
            },
        }));
        let mut deps = Dependencies::new(resource, vec![]);
        let mut target = CreateAlertParams::default();
        translator.to_api(&mut deps, &mut target).unwrap();

        assert!(target.alert_config.enabled);
        assert_eq!(target.alert_config.event_type_name, "some-event");
        // Siblings of the entry are still copied at the top level.
        assert_eq!(target.dry_run, Some(true));
    }

    #[test]
    fn test_from_api_rejects_envelopes_violating_the_schema() {
        let mut strict = crd(None);
        // Narrow the spec schema so the assembled envelope cannot satisfy it.
        let version = &mut strict.spec.versions[0];
        let validation = version.schema.as_mut().unwrap();
        let schema = validation.open_api_v3_schema.as_mut().unwrap();
        let spec_props = schema.properties.as_mut().unwrap();
        let narrowed: k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::JSONSchemaProps =
            serde_json::from_value(json!({
                "type": "object",
                "properties": { "v20250601": { "type": "string" } },
            }))
            .unwrap();
        spec_props.insert("spec".to_string(), narrowed);

        let translator = Translator::new(&strict, "v1", "v20250601").unwrap();
        let mut resource = main_object(json!({}));
        let mut deps = Dependencies::new(main_object(json!({})), vec![]);
        let err = translator
            .from_api(&mut deps, &mut resource, &AlertConfig::default())
            .unwrap_err();
        assert!(err.to_string().contains("rejected by the resource schema"));
    }

    #[test]
    fn test_mapping_annotation_is_parsed_per_call() {
        let translator = Translator::new(
            &crd(Some("properties: {spec: {properties: {}}}")),
            "v1",
            "v20250601",
        )
        .unwrap();
        assert!(translator.mapping_root().unwrap().is_some());

        let translator = Translator::new(&crd(Some("{not valid yaml")), "v1", "v20250601").unwrap();
        let err = translator.mapping_root().unwrap_err();
        assert!(matches!(err, TranslateError::MappingDocument(_)));
    }
}
