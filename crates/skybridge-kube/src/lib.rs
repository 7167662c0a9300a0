//! Skybridge Kube - Kubernetes collaborators for the declarative resource translator
//!
//! This crate provides:
//! - **Dependency Sets**: caller-owned lookup of known related objects and
//!   collection of objects built during expansion
//! - **Referenced-Kind Registry**: per-GVR decode/encode transforms and
//!   fresh-object constructors, failing closed on unregistered kinds
//! - **Deterministic Naming**: stable names for dependent objects derived
//!   from the owner and the mapping path

pub mod deps;
pub mod error;
pub mod naming;
pub mod registry;

pub use deps::{Dependencies, DependencySet};
pub use error::{KubeError, Result};
pub use naming::dependency_name;
pub use registry::{CodecFn, KindRef, KindRegistry, KindSupport};
