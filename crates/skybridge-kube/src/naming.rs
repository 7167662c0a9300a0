//! Deterministic names for dependent objects
//!
//! Objects created during expansion are named from the owning object and the
//! mapping path that produced them, so repeated expansions of the same
//! resource converge on the same dependent objects instead of accumulating
//! duplicates.

use sha2::{Digest, Sha256};

/// Length of the hex digest suffix kept in a dependent-object name.
const SUFFIX_LEN: usize = 19;

/// Derive a stable name for a dependent object from its owner's name and the
/// mapping path that referenced it.
pub fn dependency_name(owner: &str, path: &[impl AsRef<str>]) -> String {
    let joined = path
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join("/");
    let digest = hex::encode(Sha256::digest(joined.as_bytes()));
    format!("{owner}-{}", &digest[..SUFFIX_LEN])
}
