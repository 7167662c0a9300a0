//! Skybridge Core - Tree utilities and codecs for the declarative resource translator
//!
//! This crate provides the foundational pieces shared across Skybridge:
//! - `Tree`: the generic nested-map representation every typed value crosses
//! - Strict path accessors with distinguishable not-found and create-only writes
//! - `codec`: the reversible transform for opaque secret payloads

pub mod codec;
pub mod error;
pub mod tree;

pub use error::{CoreError, Result};
pub use tree::Tree;
