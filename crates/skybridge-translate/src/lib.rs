//! Skybridge Translate - Schema-driven bidirectional translation
//!
//! This crate converts between a resource's version-labelled spec/status
//! tree and the request/response structures of a versioned external API,
//! driven entirely by a declarative mapping document attached to the
//! resource's schema:
//! - **Mapping Nodes**: the document parsed into tagged object/array/reference shapes
//! - **Property Mapper**: lock-step walk of mapping and object trees
//! - **Reference Resolver**: collapse references into literal values, or
//!   expand payload values into fresh dependent objects
//! - **Translator**: the versioned envelope, entry-payload indirection, and
//!   schema validation around both entry points

pub mod error;
pub mod mapping;
pub mod refs;
pub mod translator;

pub use error::{Result, TranslateError};
pub use mapping::{Direction, Mapper, MappingNode};
pub use refs::{ReferenceMapping, ResolutionFacet, ShapeFacet};
pub use translator::{API_MAPPINGS_ANNOTATION, Translator};
