//! Declarative mapping nodes and the property mapper
//!
//! The mapping document mixes three node shapes without an explicit
//! discriminant; they are resolved once per call into the tagged
//! [`MappingNode`] enum instead of re-inspecting raw maps at every
//! recursion. The [`Mapper`] then walks the node tree and the object tree in
//! lock-step, delegating every reference leaf to the resolver in the
//! configured direction.

use std::collections::BTreeMap;

use serde_json::Value as JsonValue;

use skybridge_core::tree::{self, Tree};
use skybridge_kube::{DependencySet, KindRegistry};

use crate::error::{Result, ResultExt, TranslateError};
use crate::refs::{self, ReferenceMapping};

/// Direction of a translation walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// resource ← external: build dependent objects from an external payload
    Expand,
    /// external ← resource: resolve dependent objects into literal values
    Collapse,
}

/// One node of the mapping document, resolved into its tagged shape.
#[derive(Debug)]
pub enum MappingNode {
    /// Nested object: child nodes keyed by schema property name
    Object(BTreeMap<String, MappingNode>),
    /// Array of objects: child nodes keyed by a discriminator field present
    /// in each applicable element
    Array(BTreeMap<String, MappingNode>),
    /// Terminal reference descriptor
    Reference(Box<ReferenceMapping>),
}

impl MappingNode {
    /// Parse a raw mapping document value into a node tree. A node matching
    /// none of the known shapes is a schema error.
    pub fn parse(raw: &JsonValue, path: &[String]) -> Result<Self> {
        let Some(node) = raw.as_object() else {
            return Err(TranslateError::Mapping {
                path: tree::join_path(path),
                reason: format!("expected an object node, got {}", tree::json_type(raw)),
            });
        };
        if refs::is_reference(node) {
            let reference = ReferenceMapping::parse(node, path)?;
            return Ok(Self::Reference(Box::new(reference)));
        }
        if let Some(props) = node.get("properties") {
            return Ok(Self::Object(Self::parse_children(props, path)?));
        }
        if let Some(items) = node.get("items") {
            let props = items
                .as_object()
                .and_then(|m| m.get("properties"))
                .ok_or_else(|| TranslateError::Mapping {
                    path: tree::join_path(path),
                    reason: "array node without items.properties".to_string(),
                })?;
            return Ok(Self::Array(Self::parse_children(props, path)?));
        }
        Err(TranslateError::Mapping {
            path: tree::join_path(path),
            reason: format!(
                "node matches no known shape, fields {:?}",
                node.keys().collect::<Vec<_>>()
            ),
        })
    }

    fn parse_children(raw: &JsonValue, path: &[String]) -> Result<BTreeMap<String, MappingNode>> {
        let Some(children) = raw.as_object() else {
            return Err(TranslateError::Mapping {
                path: tree::join_path(path),
                reason: format!("expected property nodes, got {}", tree::json_type(raw)),
            });
        };
        let mut parsed = BTreeMap::new();
        for (key, value) in children {
            let mut sub_path = path.to_vec();
            sub_path.push(key.clone());
            parsed.insert(key.clone(), Self::parse(value, &sub_path)?);
        }
        Ok(parsed)
    }

    /// Descend through object children by key.
    pub fn descend(&self, path: &[&str]) -> Option<&MappingNode> {
        let mut node = self;
        for key in path {
            let Self::Object(children) = node else {
                return None;
            };
            node = children.get(*key)?;
        }
        Some(node)
    }
}

/// Walks mapping nodes and an object tree in lock-step.
pub struct Mapper<'a> {
    direction: Direction,
    registry: &'a KindRegistry,
}

impl<'a> Mapper<'a> {
    pub fn new(direction: Direction, registry: &'a KindRegistry) -> Self {
        Self {
            direction,
            registry,
        }
    }

    /// Apply every child mapping of an object node to the given tree.
    pub fn map_properties(
        &self,
        deps: &mut dyn DependencySet,
        path: &[String],
        props: &BTreeMap<String, MappingNode>,
        obj: &mut Tree,
    ) -> Result<()> {
        for (key, node) in props {
            let sub_path = push(path, key);
            if let MappingNode::Reference(reference) = node {
                self.resolve(deps, &sub_path, reference, obj)
                    .context_with(|| format!("failed to process reference {key:?}"))?;
                continue;
            }
            match obj.get_mut(key) {
                // Optional structure.
                None => continue,
                Some(JsonValue::Array(list)) => {
                    let MappingNode::Array(items) = node else {
                        return Err(TranslateError::Mapping {
                            path: tree::join_path(&sub_path),
                            reason: "list value requires an array node".to_string(),
                        });
                    };
                    self.map_array(deps, &sub_path, items, list)
                        .context_with(|| format!("failed to process array mapping {key:?}"))?;
                }
                Some(JsonValue::Object(sub_obj)) => {
                    let MappingNode::Object(children) = node else {
                        return Err(TranslateError::Mapping {
                            path: tree::join_path(&sub_path),
                            reason: "object value requires a nested object node".to_string(),
                        });
                    };
                    self.map_properties(deps, &sub_path, children, sub_obj)
                        .context_with(|| format!("failed to process object mapping {key:?}"))?;
                }
                Some(other) => {
                    return Err(TranslateError::Mapping {
                        path: tree::join_path(&sub_path),
                        reason: format!("unsupported mapping over {}", tree::json_type(other)),
                    });
                }
            }
        }
        Ok(())
    }

    /// Recurse into every array element that carries the discriminator
    /// field; differently shaped elements are left untouched.
    fn map_array(
        &self,
        deps: &mut dyn DependencySet,
        path: &[String],
        items: &BTreeMap<String, MappingNode>,
        list: &mut [JsonValue],
    ) -> Result<()> {
        for (discriminator, node) in items {
            // On expand a reference field does not exist yet; the element is
            // recognized by the value at its external target path instead.
            let element_key = match (self.direction, node) {
                (Direction::Expand, MappingNode::Reference(reference)) => reference.target_base(),
                _ => discriminator.clone(),
            };
            for element in list.iter_mut() {
                let Some(entry) = element.as_object_mut() else {
                    continue;
                };
                if !entry.contains_key(&element_key) {
                    continue;
                }
                let sub_path = push(path, discriminator);
                match node {
                    MappingNode::Reference(reference) => self
                        .resolve(deps, &sub_path, reference, entry)
                        .context_with(|| {
                            format!("failed to process reference {discriminator:?}")
                        })?,
                    MappingNode::Object(children) => self
                        .map_properties(deps, &sub_path, children, entry)
                        .context_with(|| {
                            format!("failed to map array item {discriminator:?}")
                        })?,
                    MappingNode::Array(_) => {
                        return Err(TranslateError::Mapping {
                            path: tree::join_path(&sub_path),
                            reason: "nested array mappings are not supported".to_string(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    fn resolve(
        &self,
        deps: &mut dyn DependencySet,
        path: &[String],
        reference: &ReferenceMapping,
        obj: &mut Tree,
    ) -> Result<()> {
        match self.direction {
            Direction::Expand => reference.expand(deps, self.registry, path, obj),
            Direction::Collapse => reference.collapse(deps, self.registry, path, obj),
        }
    }
}

fn push(path: &[String], key: &str) -> Vec<String> {
    let mut sub = path.to_vec();
    sub.push(key.to_string());
    sub
}
