//! Generates key material for transaction signing.
//!
//! # Parameters
//! - `spec`: a single key algorithm, a key list, or a threshold key; composite
//!   specs nest arbitrarily.
//!
//! # Returns
//! - The public key structure in requested order, together with every private key
//!   generated on the way, depth-first.

use crate::error::Result;
use crate::types::{Key, KeyGenerationResult, KeySpec, PrivateKey};
use tracing::debug;

/// Generates fresh key material for `spec`.
///
/// Nothing is cached; every call draws new keys from the OS RNG. A threshold
/// outside `1..=members` anywhere in `spec` fails with `InvalidKeySpec`
/// before any key is generated.
pub fn generate_key(spec: &KeySpec) -> Result<KeyGenerationResult> {
    spec.validate()?;
    let key = build(spec);
    let result = KeyGenerationResult::new(key);
    debug!(
        private_keys = result.private_keys.len(),
        "generated key material"
    );
    Ok(result)
}

fn build(spec: &KeySpec) -> Key {
    match spec {
        KeySpec::Single(algorithm) => Key::from_private(PrivateKey::generate(*algorithm)),
        KeySpec::List(members) => Key::List(members.iter().map(build).collect()),
        KeySpec::Threshold { threshold, members } => Key::Threshold {
            threshold: *threshold,
            keys: members.iter().map(build).collect(),
        },
    }
}

/// Writes a generation result as pretty JSON.
pub fn save_keys(result: &KeyGenerationResult, path: &str) -> Result<()> {
    let file = std::fs::File::create(path)?;
    serde_json::to_writer_pretty(file, result).map_err(crate::codec::CodecError::from)?;
    Ok(())
}

/// Reads a generation result written by [`save_keys`] or returned by the
/// server's `generateKey`.
pub fn load_keys(path: &str) -> Result<KeyGenerationResult> {
    let text = std::fs::read_to_string(path)?;
    Ok(crate::codec::decode(&text)?)
}
