//! Module for producing signature sets from generated private keys.

use crate::error::{Result, TckError};
use crate::keygen::load_keys;
use crate::types::{PrivateKey, PublicKey};
use serde::{Deserialize, Serialize};
use std::fs::File;
use tracing::info;

/// One signature and the public key it verifies under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignaturePair {
    pub public_key: PublicKey,
    pub signature: Vec<u8>,
}

/// Signatures collected for a single message, in signing order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignatureSet {
    pub pairs: Vec<SignaturePair>,
}

impl SignatureSet {
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// True if some signature in the set verifies `message` under `public_key`.
    pub fn is_signed_by(&self, public_key: &PublicKey, message: &[u8]) -> bool {
        self.pairs
            .iter()
            .any(|p| &p.public_key == public_key && public_key.verify(message, &p.signature))
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignaturePairHex {
    public_key: String,
    signature: String,
}

impl Serialize for SignatureSet {
    fn serialize<S: serde::Serializer>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        let pairs: Vec<SignaturePairHex> = self
            .pairs
            .iter()
            .map(|p| SignaturePairHex {
                public_key: p.public_key.to_der_hex(),
                signature: hex::encode(&p.signature),
            })
            .collect();
        pairs.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SignatureSet {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let raw = Vec::<SignaturePairHex>::deserialize(deserializer)?;
        let mut pairs = Vec::with_capacity(raw.len());
        for p in raw {
            let public_key =
                PublicKey::from_der_hex(&p.public_key).map_err(serde::de::Error::custom)?;
            let signature = hex::decode(&p.signature).map_err(serde::de::Error::custom)?;
            pairs.push(SignaturePair {
                public_key,
                signature,
            });
        }
        Ok(SignatureSet { pairs })
    }
}

/// Signs `message` with each key in order.
pub fn sign_message(keys: &[PrivateKey], message: &[u8]) -> SignatureSet {
    let pairs = keys
        .iter()
        .map(|sk| SignaturePair {
            public_key: sk.public_key(),
            signature: sk.sign(message),
        })
        .collect();
    SignatureSet { pairs }
}

/// Signs a message with keys loaded from a key file.
///
/// # Arguments
/// - `message`: The message to be signed.
/// - `key_file`: Path to a key generation result.
/// - `signature_file`: Path to save the signature set.
/// - `signers`: How many of the stored private keys to use, in order. `None`
///   picks the minimal subset satisfying the key's policy.
///
/// # Errors
/// Returns an error if the key file cannot be read, `signers` exceeds the
/// stored keys, or the signature file cannot be written.
pub fn sign_file(
    message: &str,
    key_file: &str,
    signature_file: &str,
    signers: Option<usize>,
) -> Result<SignatureSet> {
    let keys = load_keys(key_file)?;

    let chosen = match signers {
        None => keys.satisfying_keys()?,
        Some(n) if n <= keys.private_keys.len() => keys.private_keys[..n].to_vec(),
        Some(n) => {
            return Err(TckError::SignaturePolicy(format!(
                "asked for {n} signers, key file holds {}",
                keys.private_keys.len()
            )))
        }
    };

    let set = sign_message(&chosen, message.as_bytes());

    let file = File::create(signature_file)?;
    serde_json::to_writer_pretty(file, &set).map_err(crate::codec::CodecError::from)?;

    info!(signatures = set.len(), path = signature_file, "signature set saved");
    Ok(set)
}
