//! Referenced-kind registry
//!
//! Reference resolution is generic over an open set of Kubernetes kinds. A
//! [`KindRegistry`] maps a kind's group/version/resource identity to the
//! small capability set resolution needs: an optional decode/encode pair for
//! values stored in an opaque form, and a constructor that materializes a
//! fresh object of the kind from a tree. Lookups fail closed: an
//! unregistered kind is an error, never a passthrough.
//!
//! Typed constructors round-trip the tree through the kind's Rust type, so
//! fields outside the kind's schema are silently dropped. Expansion relies
//! on this to test whether a candidate write path exists on the kind at all.

use std::collections::HashMap;

use k8s_openapi::api::core::v1::Secret;
use kube::core::{DynamicObject, TypeMeta};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use skybridge_core::tree::{self, Tree};
use skybridge_core::codec;

use crate::error::{KubeError, Result};

/// Type identity of a referenced kind.
///
/// Kind/group/version validate a found object; group/version/resource key
/// registry lookup and construction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct KindRef {
    pub kind: String,
    pub group: String,
    pub version: String,
    pub resource: String,
}

impl KindRef {
    pub fn new(
        kind: impl Into<String>,
        group: impl Into<String>,
        version: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            group: group.into(),
            version: version.into(),
            resource: resource.into(),
        }
    }

    /// The registry key: `group/version/resource`, or `version/resource`
    /// for the empty group.
    pub fn gvr(&self) -> String {
        if self.group.is_empty() {
            format!("{}/{}", self.version, self.resource)
        } else {
            format!("{}/{}/{}", self.group, self.version, self.resource)
        }
    }

    /// The `apiVersion` value objects of this kind carry.
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    /// Display form of the group/version/kind identity.
    pub fn gvk(&self) -> String {
        if self.group.is_empty() {
            format!("{}, Kind={}", self.version, self.kind)
        } else {
            format!("{}/{}, Kind={}", self.group, self.version, self.kind)
        }
    }

    /// Whether a kind identity was declared at all.
    pub fn is_declared(&self) -> bool {
        !self.kind.is_empty()
    }

    /// Whether an object's type meta carries this identity.
    pub fn matches(&self, types: &TypeMeta) -> bool {
        types.api_version == self.api_version() && types.kind == self.kind
    }

    pub fn type_meta(&self) -> TypeMeta {
        TypeMeta {
            api_version: self.api_version(),
            kind: self.kind.clone(),
        }
    }
}

/// A value transform applied when a referenced value crosses the boundary.
pub type CodecFn = fn(&JsonValue) -> Result<JsonValue>;

type FactoryFn = fn(&KindRef, Tree) -> Result<DynamicObject>;

/// The capability set registered for one referenced kind.
#[derive(Debug)]
pub struct KindSupport {
    kind_ref: KindRef,
    decode: Option<CodecFn>,
    encode: Option<CodecFn>,
    factory: FactoryFn,
}

impl KindSupport {
    /// Support backed by a typed Rust representation of the kind. The
    /// constructor round-trips through `T`, dropping fields the kind's
    /// schema does not carry.
    pub fn typed<T>(kind_ref: KindRef) -> Self
    where
        T: Serialize + DeserializeOwned,
    {
        Self {
            kind_ref,
            decode: None,
            encode: None,
            factory: construct_typed::<T>,
        }
    }

    /// Support for an open-schema kind: the constructor keeps the tree
    /// as-is, so any write path exists.
    pub fn schemaless(kind_ref: KindRef) -> Self {
        Self {
            kind_ref,
            decode: None,
            encode: None,
            factory: construct_schemaless,
        }
    }

    /// Attach a decode (collapse-time) and encode (expand-time) transform.
    pub fn with_codec(mut self, decode: CodecFn, encode: CodecFn) -> Self {
        self.decode = Some(decode);
        self.encode = Some(encode);
        self
    }

    pub fn kind_ref(&self) -> &KindRef {
        &self.kind_ref
    }

    /// Materialize a fresh object of this kind holding the given tree.
    pub fn new_object(&self, data: Tree) -> Result<DynamicObject> {
        (self.factory)(&self.kind_ref, data)
    }

    /// Transform a stored value into its usable form.
    pub fn decode(&self, value: &JsonValue) -> Result<JsonValue> {
        match self.decode {
            Some(decode) => decode(value),
            None => Ok(value.clone()),
        }
    }

    /// Transform a usable value into its stored form.
    pub fn encode(&self, value: &JsonValue) -> Result<JsonValue> {
        match self.encode {
            Some(encode) => encode(value),
            None => Ok(value.clone()),
        }
    }
}

/// Registry of referenced kinds, keyed by GVR. Populated at startup, looked
/// up per reference, failing closed on a miss.
#[derive(Debug)]
pub struct KindRegistry {
    kinds: HashMap<String, KindSupport>,
}

impl KindRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            kinds: HashMap::new(),
        }
    }

    /// A registry with the built-in kinds: `v1/secrets` backed by the
    /// typed [`Secret`] with the opaque-payload codec.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(
            KindSupport::typed::<Secret>(KindRef::new("Secret", "", "v1", "secrets"))
                .with_codec(secret_decode, secret_encode),
        );
        registry
    }

    /// Register support for a kind, keyed by its GVR. Last write wins.
    pub fn register(&mut self, support: KindSupport) {
        self.kinds.insert(support.kind_ref.gvr(), support);
    }

    /// Look up support for a GVR, failing `UnsupportedKind` on a miss.
    pub fn lookup(&self, gvr: &str) -> Result<&KindSupport> {
        self.kinds
            .get(gvr)
            .ok_or_else(|| KubeError::UnsupportedKind {
                gvr: gvr.to_string(),
            })
    }
}

impl Default for KindRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn secret_decode(value: &JsonValue) -> Result<JsonValue> {
    let JsonValue::String(opaque) = value else {
        return Err(KubeError::Value {
            message: format!(
                "expected a string to decode, got {}",
                tree::json_type(value)
            ),
        });
    };
    Ok(JsonValue::String(codec::decode(opaque)?))
}

fn secret_encode(value: &JsonValue) -> Result<JsonValue> {
    let JsonValue::String(plaintext) = value else {
        return Err(KubeError::Value {
            message: format!(
                "expected a string to encode, got {}",
                tree::json_type(value)
            ),
        });
    };
    Ok(JsonValue::String(codec::encode(plaintext)))
}

fn construct_typed<T>(kind_ref: &KindRef, mut data: Tree) -> Result<DynamicObject>
where
    T: Serialize + DeserializeOwned,
{
    data.insert("apiVersion".to_string(), kind_ref.api_version().into());
    data.insert("kind".to_string(), kind_ref.kind.clone().into());
    ensure_metadata(&mut data);
    let typed: T =
        serde_json::from_value(JsonValue::Object(data)).map_err(|e| KubeError::Construct {
            kind: kind_ref.kind.clone(),
            message: e.to_string(),
        })?;
    finish_object(kind_ref, tree::to_tree(&typed)?)
}

fn construct_schemaless(kind_ref: &KindRef, data: Tree) -> Result<DynamicObject> {
    finish_object(kind_ref, data)
}

fn finish_object(kind_ref: &KindRef, mut data: Tree) -> Result<DynamicObject> {
    ensure_metadata(&mut data);
    let mut obj: DynamicObject =
        serde_json::from_value(JsonValue::Object(data)).map_err(|e| KubeError::Construct {
            kind: kind_ref.kind.clone(),
            message: e.to_string(),
        })?;
    obj.types = Some(kind_ref.type_meta());
    Ok(obj)
}

fn ensure_metadata(data: &mut Tree) {
    data.entry("metadata")
        .or_insert_with(|| JsonValue::Object(Tree::new()));
}
