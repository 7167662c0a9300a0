//! Dependency lookup and accumulation for translation calls
//!
//! A translation call never fetches anything itself: every related object it
//! may need is supplied up front through a [`DependencySet`], assumed to be
//! backed by an already-warm cache. Objects built during expansion are handed
//! back through the same collaborator. The set is owned by the caller and
//! outlives the call; each concurrent call must be given its own instance.

use std::collections::HashMap;

use kube::core::DynamicObject;

/// Lookup of known related objects plus collection of newly created ones.
///
/// Objects are addressed by name and namespace. `None` is the
/// same-namespace sentinel: it resolves to the main object's namespace, as
/// does an object that carries no namespace of its own.
pub trait DependencySet {
    /// The main object being translated.
    fn main(&self) -> &DynamicObject;

    /// Look up a known object by name and namespace.
    fn find(&self, name: &str, namespace: Option<&str>) -> Option<&DynamicObject>;

    /// Record a newly built object. Idempotent by `(name, namespace)`,
    /// last write wins.
    fn add(&mut self, obj: DynamicObject);

    /// Every added object, in first-occurrence order.
    fn added(&self) -> Vec<DynamicObject>;
}

/// The standard [`DependencySet`] implementation.
pub struct Dependencies {
    main: DynamicObject,
    known: HashMap<(String, String), DynamicObject>,
    added: Vec<DynamicObject>,
}

impl Dependencies {
    /// Create a dependency set around the main object and its already-known
    /// related objects.
    pub fn new(main: DynamicObject, objects: Vec<DynamicObject>) -> Self {
        let mut deps = Self {
            main,
            known: HashMap::new(),
            added: Vec::new(),
        };
        for obj in objects {
            let key = deps.key_of(&obj);
            deps.known.insert(key, obj);
        }
        deps
    }

    /// Whether an object with this name and namespace is known.
    pub fn has(&self, name: &str, namespace: Option<&str>) -> bool {
        self.find(name, namespace).is_some()
    }

    fn main_namespace(&self) -> &str {
        self.main.metadata.namespace.as_deref().unwrap_or("")
    }

    fn resolve_namespace(&self, namespace: Option<&str>) -> String {
        match namespace {
            Some(ns) if !ns.is_empty() => ns.to_string(),
            _ => self.main_namespace().to_string(),
        }
    }

    fn key_of(&self, obj: &DynamicObject) -> (String, String) {
        (
            obj.metadata.name.clone().unwrap_or_default(),
            self.resolve_namespace(obj.metadata.namespace.as_deref()),
        )
    }
}

impl DependencySet for Dependencies {
    fn main(&self) -> &DynamicObject {
        &self.main
    }

    fn find(&self, name: &str, namespace: Option<&str>) -> Option<&DynamicObject> {
        self.known
            .get(&(name.to_string(), self.resolve_namespace(namespace)))
    }

    fn add(&mut self, obj: DynamicObject) {
        let key = self.key_of(&obj);
        match self.added.iter().position(|o| self.key_of(o) == key) {
            Some(pos) => self.added[pos] = obj.clone(),
            None => self.added.push(obj.clone()),
        }
        self.known.insert(key, obj);
    }

    fn added(&self) -> Vec<DynamicObject> {
        self.added.clone()
    }
}
