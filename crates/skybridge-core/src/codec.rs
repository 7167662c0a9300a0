//! Reversible codec for opaque secret payloads
//!
//! Credential-bearing objects store their values in an opaque encoded form;
//! a referenced value must be decoded before it is written into an external
//! payload, and encoded again when a payload value moves back into a fresh
//! credential object. Which kinds use the codec is decided by the
//! referenced-kind registry, not here.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use crate::error::Result;

/// Encode a plaintext value into its opaque stored form.
pub fn encode(plaintext: &str) -> String {
    STANDARD.encode(plaintext.as_bytes())
}

/// Decode an opaque stored value back into plaintext.
pub fn decode(opaque: &str) -> Result<String> {
    let bytes = STANDARD.decode(opaque)?;
    Ok(String::from_utf8(bytes)?)
}
