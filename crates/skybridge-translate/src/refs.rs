//! Reference descriptors and their resolution
//!
//! A reference leaf in the mapping document carries two facets: the
//! resolution side describes how to locate the referenced Kubernetes object
//! and where its value lives, the external side names the single dotted path
//! in the API-shaped tree the value is read from or written to. Collapse and
//! expand share one declarative vocabulary (`properties`,
//! `propertySelectors`) applied in opposite read/write roles, so a
//! descriptor is usable unmodified in both directions.

use serde::Deserialize;
use serde_json::Value as JsonValue;

use kube::core::DynamicObject;
use skybridge_core::tree::{self, Tree};
use skybridge_kube::registry::KindSupport;
use skybridge_kube::{DependencySet, KindRef, KindRegistry, dependency_name};

use crate::error::{Result, TranslateError};

pub(crate) const KUBE_MAPPING_KEY: &str = "x-kubernetes-mapping";
pub(crate) const API_MAPPING_KEY: &str = "x-openapi-mapping";
pub(crate) const ENTRY_SEGMENT: &str = "entry";

const REF_NAME: &str = "name";
const REF_KEY: &str = "key";
const SELECTOR_TOKEN_SUFFIX: &str = ".#";

/// Resolution-side facet: how to locate the referenced object and where its
/// value is stored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResolutionFacet {
    /// Field of the reference holding the referenced object's name
    pub name_selector: String,
    /// Direct candidate paths on the referenced object, in priority order
    pub properties: Vec<String>,
    /// Fallback path patterns for values stored under caller-chosen keys;
    /// a trailing `.#` token is substituted with the target key
    pub property_selectors: Vec<String>,
    /// Declared type identity of the referenced object
    #[serde(rename = "type")]
    pub kind: KindRef,
}

/// External-shape facet: where the resolved value lives in the API-shaped
/// tree.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ShapeFacet {
    /// Dotted target path, relative to the sub-tree holding the reference
    pub property: String,
    /// Primitive type tag of the referenced value
    #[serde(rename = "type")]
    pub value_type: String,
}

/// A reference descriptor: both facets of one reference leaf.
#[derive(Debug, Clone)]
pub struct ReferenceMapping {
    pub resolution: ResolutionFacet,
    pub shape: ShapeFacet,
}

/// Whether a raw mapping node is a reference leaf.
pub(crate) fn is_reference(node: &Tree) -> bool {
    node.contains_key(KUBE_MAPPING_KEY) && node.contains_key(API_MAPPING_KEY)
}

impl ReferenceMapping {
    /// Deserialize both facets from a raw reference leaf.
    pub(crate) fn parse(node: &Tree, path: &[String]) -> Result<Self> {
        Ok(Self {
            resolution: facet(node, KUBE_MAPPING_KEY, path)?,
            shape: facet(node, API_MAPPING_KEY, path)?,
        })
    }

    /// The external target path, relative to the sub-tree holding the
    /// reference.
    pub fn target_path(&self) -> Vec<String> {
        tree::parse_path(&self.shape.property)
    }

    /// The last segment of the external target path.
    pub fn target_base(&self) -> String {
        let path = self.target_path();
        tree::base(&path).to_string()
    }

    /// Resolve the reference held by `obj` into a literal value at the
    /// external target path (external ← resource).
    pub fn collapse(
        &self,
        deps: &mut dyn DependencySet,
        registry: &KindRegistry,
        path: &[String],
        obj: &mut Tree,
    ) -> Result<()> {
        // Not every reference is populated.
        let Some(raw) = obj.get(tree::base(path)) else {
            return Ok(());
        };
        let Some(reference) = raw.as_object() else {
            return Ok(());
        };
        if reference.is_empty() {
            return Ok(());
        }
        let reference = reference.clone();

        let name = self.referenced_name(&reference, path)?;
        let target_path = self.target_path();
        let target_key = match reference.get(REF_KEY).and_then(JsonValue::as_str) {
            Some(key) if !key.is_empty() => key.to_string(),
            _ => tree::base(&target_path).to_string(),
        };

        let found = deps
            .find(&name, None)
            .ok_or_else(|| TranslateError::ReferenceNotFound { name: name.clone() })?;
        if self.resolution.kind.is_declared()
            && !found
                .types
                .as_ref()
                .is_some_and(|types| self.resolution.kind.matches(types))
        {
            let found_types = found
                .types
                .as_ref()
                .map(|types| format!("{}, Kind={}", types.api_version, types.kind))
                .unwrap_or_else(|| "an untyped object".to_string());
            return Err(TranslateError::TypeConflict {
                name,
                expected: self.resolution.kind.gvk(),
                found: found_types,
            });
        }
        let found_tree = tree::to_tree(found)?;

        let support = registry.lookup(&self.resolution.kind.gvr())?;
        let value = self
            .fetch_value(&found_tree, &target_key)?
            .ok_or_else(|| TranslateError::ReferenceValueNotFound { name })?;
        let decoded = support.decode(&value)?;
        tree::set(obj, decoded, &target_path)?;
        Ok(())
    }

    /// Build a fresh dependent object from the value at the external target
    /// path and hand it to the dependency set (resource ← external).
    pub fn expand(
        &self,
        deps: &mut dyn DependencySet,
        registry: &KindRegistry,
        path: &[String],
        obj: &mut Tree,
    ) -> Result<()> {
        let target_path = self.target_path();
        // The source value sits where collapse would write it.
        let value = match tree::get(obj, &target_path) {
            Ok(value) => value.clone(),
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        let support = registry.lookup(&self.resolution.kind.gvr())?;
        let encoded = support.encode(&value)?;
        let target_key = tree::base(&target_path).to_string();
        let Some(mut dep) = self.build_dependent(support, &encoded, &target_key)? else {
            return Err(TranslateError::ReferenceValueNotFound {
                name: tree::join_path(path),
            });
        };

        let owner = deps.main().metadata.name.clone().unwrap_or_default();
        let name = dependency_name(&owner, name_path(path));
        if deps.find(&name, None).is_some() {
            return Ok(());
        }
        dep.metadata.name = Some(name.clone());
        // The namespace stays unset: the same-namespace sentinel. Final
        // naming and persisting remain the caller's responsibility.

        // The reference replaces the literal value.
        tree::remove(obj, &target_path);
        let mut stub = Tree::new();
        stub.insert(REF_NAME.to_string(), JsonValue::String(name));
        if !self.shape.property.is_empty() {
            stub.insert(REF_KEY.to_string(), JsonValue::String(target_key));
        }
        obj.insert(tree::base(path).to_string(), JsonValue::Object(stub));
        deps.add(dep);
        Ok(())
    }

    fn referenced_name(&self, reference: &Tree, path: &[String]) -> Result<String> {
        let selector = &self.resolution.name_selector;
        if selector.is_empty() {
            return Err(missing_selector(path));
        }
        match tree::get(reference, &tree::parse_path(selector)) {
            Ok(JsonValue::String(name)) if !name.is_empty() => Ok(name.clone()),
            Ok(_) => Err(missing_selector(path)),
            Err(e) if e.is_not_found() => Err(missing_selector(path)),
            Err(e) => Err(e.into()),
        }
    }

    /// Try each direct property, then each selector pattern, in strict list
    /// order; the first present value wins.
    fn fetch_value(&self, resource: &Tree, target_key: &str) -> Result<Option<JsonValue>> {
        for prop in &self.resolution.properties {
            let path = tree::parse_path(prop);
            match tree::get(resource, &path) {
                Ok(value) => return Ok(Some(value.clone())),
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e.into()),
            }
        }
        for selector in &self.resolution.property_selectors {
            let path = tree::parse_path(&substitute(selector, target_key));
            match tree::get(resource, &path) {
                Ok(value) => return Ok(Some(value.clone())),
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(None)
    }

    /// The first selector whose written value survives the kind's schema
    /// round-trip wins: an existence test on the fresh instance, not a value
    /// test.
    fn build_dependent(
        &self,
        support: &KindSupport,
        value: &JsonValue,
        target_key: &str,
    ) -> Result<Option<DynamicObject>> {
        for selector in &self.resolution.property_selectors {
            let path = tree::parse_path(&substitute(selector, target_key));
            let mut seed = Tree::new();
            tree::set(&mut seed, value.clone(), &path)?;
            let dep = support.new_object(seed)?;
            let round = tree::to_tree(&dep)?;
            match tree::get(&round, &path) {
                Ok(kept) if kept == value => return Ok(Some(dep)),
                Ok(_) => continue,
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(None)
    }
}

fn facet<T: serde::de::DeserializeOwned>(node: &Tree, key: &str, path: &[String]) -> Result<T> {
    let raw = node.get(key).cloned().unwrap_or(JsonValue::Null);
    serde_json::from_value(raw).map_err(|e| TranslateError::Mapping {
        path: tree::join_path(path),
        reason: format!("bad {key}: {e}"),
    })
}

/// Substitute the trailing wildcard token with the target key.
fn substitute(selector: &str, target_key: &str) -> String {
    match selector.strip_suffix(SELECTOR_TOKEN_SUFFIX) {
        Some(prefix) => format!("{prefix}.{target_key}"),
        None => selector.to_string(),
    }
}

/// Dependent names ignore the entry duplication so the spec, entry and
/// status walks converge on the same object.
fn name_path(path: &[String]) -> &[String] {
    match path.first() {
        Some(first) if first == ENTRY_SEGMENT => &path[1..],
        _ => path,
    }
}

fn missing_selector(path: &[String]) -> TranslateError {
    TranslateError::MissingSelector {
        path: tree::join_path(path),
    }
}
