//! Module for checking signature sets against key structures.

use crate::error::{Result, TckError};
use crate::keygen::load_keys;
use crate::sign::SignatureSet;
use crate::types::Key;

impl Key {
    /// Decides whether `signatures` meets this key's signing policy for `message`.
    ///
    /// A raw key needs a valid signature of its own, a key list needs every
    /// member satisfied, and a threshold key needs at least `threshold` members.
    pub fn is_satisfied_by(&self, signatures: &SignatureSet, message: &[u8]) -> bool {
        match self {
            Key::Raw { public, .. } => signatures.is_signed_by(public, message),
            Key::List(keys) => keys.iter().all(|k| k.is_satisfied_by(signatures, message)),
            Key::Threshold { threshold, keys } => {
                let satisfied = keys
                    .iter()
                    .filter(|k| k.is_satisfied_by(signatures, message))
                    .count();
                satisfied >= *threshold as usize
            }
        }
    }
}

/// Validates a signature set against a key structure.
///
/// # Returns
///
/// - `Ok(())` if the policy is met.
/// - `SignaturePolicy` naming how many signatures were offered otherwise.
pub fn validate_signatures(key: &Key, signatures: &SignatureSet, message: &[u8]) -> Result<()> {
    if key.is_satisfied_by(signatures, message) {
        Ok(())
    } else {
        Err(TckError::SignaturePolicy(format!(
            "{} signature(s) do not satisfy the key",
            signatures.len()
        )))
    }
}

/// Validates a stored signature set for a message against a stored key.
pub fn validate_signature(message: &str, key_file: &str, signature_file: &str) -> Result<()> {
    let keys = load_keys(key_file)?;
    let text = std::fs::read_to_string(signature_file)?;
    let signatures: SignatureSet = crate::codec::decode(&text)?;

    validate_signatures(&keys.key, &signatures, message.as_bytes())?;

    tracing::info!("signature set is valid");
    Ok(())
}
