use crate::error::{Result, TckError};
use crate::proto;
use ed25519_dalek::{Signer as _, Verifier as _};
use k256::ecdsa::signature::{DigestSigner as _, DigestVerifier as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha3::{Digest as _, Keccak256};
use std::fmt;
use std::str::FromStr;

const ED25519_PRIVATE_DER_PREFIX: &str = "302e020100300506032b657004220420";
const ED25519_PUBLIC_DER_PREFIX: &str = "302a300506032b6570032100";
const SECP256K1_PRIVATE_DER_PREFIX: &str = "3030020100300706052b8104000a04220420";
const SECP256K1_PUBLIC_DER_PREFIX: &str = "302d300706052b8104000a032200";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum KeyAlgorithm {
    Ed25519,
    EcdsaSecp256k1,
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyAlgorithm::Ed25519 => f.write_str("ed25519"),
            KeyAlgorithm::EcdsaSecp256k1 => f.write_str("ecdsa-secp256k1"),
        }
    }
}

impl FromStr for KeyAlgorithm {
    type Err = TckError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ed25519" => Ok(KeyAlgorithm::Ed25519),
            "ecdsa-secp256k1" | "secp256k1" | "ecdsaSecp256k1" => Ok(KeyAlgorithm::EcdsaSecp256k1),
            other => Err(TckError::InvalidKeySpec(format!(
                "unknown key algorithm `{other}`"
            ))),
        }
    }
}

fn decode_hex_after(text: &str, prefix: &str) -> Option<Vec<u8>> {
    let lower = text.to_ascii_lowercase();
    lower.strip_prefix(prefix).and_then(|rest| hex::decode(rest).ok())
}

fn fixed<const N: usize>(bytes: &[u8]) -> Result<[u8; N]> {
    bytes
        .try_into()
        .map_err(|_| TckError::InvalidKey(format!("expected {N} bytes, got {}", bytes.len())))
}

/// Private half of a generated key pair.
#[derive(Clone)]
pub enum PrivateKey {
    Ed25519(ed25519_dalek::SigningKey),
    EcdsaSecp256k1(k256::ecdsa::SigningKey),
}

impl PrivateKey {
    pub fn generate(algorithm: KeyAlgorithm) -> Self {
        let mut rng = rand::rngs::OsRng;
        match algorithm {
            KeyAlgorithm::Ed25519 => {
                PrivateKey::Ed25519(ed25519_dalek::SigningKey::generate(&mut rng))
            }
            KeyAlgorithm::EcdsaSecp256k1 => {
                PrivateKey::EcdsaSecp256k1(k256::ecdsa::SigningKey::random(&mut rng))
            }
        }
    }

    pub fn algorithm(&self) -> KeyAlgorithm {
        match self {
            PrivateKey::Ed25519(_) => KeyAlgorithm::Ed25519,
            PrivateKey::EcdsaSecp256k1(_) => KeyAlgorithm::EcdsaSecp256k1,
        }
    }

    pub fn public_key(&self) -> PublicKey {
        match self {
            PrivateKey::Ed25519(sk) => PublicKey::Ed25519(sk.verifying_key()),
            PrivateKey::EcdsaSecp256k1(sk) => PublicKey::EcdsaSecp256k1(sk.verifying_key().clone()),
        }
    }

    /// Signs `message`. Secp256k1 keys sign its keccak-256 digest, as the
    /// ledger does, so signatures match what an SDK produces.
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        match self {
            PrivateKey::Ed25519(sk) => sk.sign(message).to_bytes().to_vec(),
            PrivateKey::EcdsaSecp256k1(sk) => {
                let signature: k256::ecdsa::Signature =
                    sk.sign_digest(Keccak256::new_with_prefix(message));
                signature.to_bytes().to_vec()
            }
        }
    }

    /// DER (PKCS#8) encoding as lowercase hex.
    pub fn to_der_hex(&self) -> String {
        match self {
            PrivateKey::Ed25519(sk) => {
                format!("{ED25519_PRIVATE_DER_PREFIX}{}", hex::encode(sk.to_bytes()))
            }
            PrivateKey::EcdsaSecp256k1(sk) => {
                format!("{SECP256K1_PRIVATE_DER_PREFIX}{}", hex::encode(sk.to_bytes()))
            }
        }
    }

    pub fn from_der_hex(text: &str) -> Result<Self> {
        if let Some(raw) = decode_hex_after(text, ED25519_PRIVATE_DER_PREFIX) {
            return Ok(PrivateKey::Ed25519(ed25519_dalek::SigningKey::from_bytes(
                &fixed::<32>(&raw)?,
            )));
        }
        if let Some(raw) = decode_hex_after(text, SECP256K1_PRIVATE_DER_PREFIX) {
            let sk = k256::ecdsa::SigningKey::from_slice(&raw)
                .map_err(|e| TckError::InvalidKey(e.to_string()))?;
            return Ok(PrivateKey::EcdsaSecp256k1(sk));
        }
        Err(TckError::InvalidKey(format!(
            "unrecognized private key encoding `{text}`"
        )))
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKey({}, {})", self.algorithm(), self.public_key())
    }
}

impl Serialize for PrivateKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_der_hex())
    }
}

impl<'de> Deserialize<'de> for PrivateKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        PrivateKey::from_der_hex(&text).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicKey {
    Ed25519(ed25519_dalek::VerifyingKey),
    EcdsaSecp256k1(k256::ecdsa::VerifyingKey),
}

impl PublicKey {
    pub fn algorithm(&self) -> KeyAlgorithm {
        match self {
            PublicKey::Ed25519(_) => KeyAlgorithm::Ed25519,
            PublicKey::EcdsaSecp256k1(_) => KeyAlgorithm::EcdsaSecp256k1,
        }
    }

    /// 32 bytes for ed25519, 33 (compressed point) for secp256k1.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            PublicKey::Ed25519(vk) => vk.as_bytes().to_vec(),
            PublicKey::EcdsaSecp256k1(vk) => vk.to_encoded_point(true).as_bytes().to_vec(),
        }
    }

    pub fn from_bytes(algorithm: KeyAlgorithm, bytes: &[u8]) -> Result<Self> {
        match algorithm {
            KeyAlgorithm::Ed25519 => ed25519_dalek::VerifyingKey::from_bytes(&fixed::<32>(bytes)?)
                .map(PublicKey::Ed25519)
                .map_err(|e| TckError::InvalidKey(e.to_string())),
            KeyAlgorithm::EcdsaSecp256k1 => k256::ecdsa::VerifyingKey::from_sec1_bytes(bytes)
                .map(PublicKey::EcdsaSecp256k1)
                .map_err(|e| TckError::InvalidKey(e.to_string())),
        }
    }

    pub fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        match self {
            PublicKey::Ed25519(vk) => ed25519_dalek::Signature::from_slice(signature)
                .map(|sig| vk.verify(message, &sig).is_ok())
                .unwrap_or(false),
            PublicKey::EcdsaSecp256k1(vk) => k256::ecdsa::Signature::from_slice(signature)
                .map(|sig| {
                    vk.verify_digest(Keccak256::new_with_prefix(message), &sig)
                        .is_ok()
                })
                .unwrap_or(false),
        }
    }

    pub fn to_der_hex(&self) -> String {
        let prefix = match self {
            PublicKey::Ed25519(_) => ED25519_PUBLIC_DER_PREFIX,
            PublicKey::EcdsaSecp256k1(_) => SECP256K1_PUBLIC_DER_PREFIX,
        };
        format!("{prefix}{}", hex::encode(self.to_bytes()))
    }

    pub fn from_der_hex(text: &str) -> Result<Self> {
        if let Some(raw) = decode_hex_after(text, ED25519_PUBLIC_DER_PREFIX) {
            return PublicKey::from_bytes(KeyAlgorithm::Ed25519, &raw);
        }
        if let Some(raw) = decode_hex_after(text, SECP256K1_PUBLIC_DER_PREFIX) {
            return PublicKey::from_bytes(KeyAlgorithm::EcdsaSecp256k1, &raw);
        }
        Err(TckError::InvalidKey(format!(
            "unrecognized public key encoding `{text}`"
        )))
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_der_hex())
    }
}

/// A signing requirement: a single key or a composite of keys.
///
/// Member order is significant: it is preserved in the protobuf encoding the
/// server-under-test receives.
#[derive(Debug, Clone)]
pub enum Key {
    Raw {
        public: PublicKey,
        /// Present when this key was generated locally.
        private: Option<PrivateKey>,
    },
    List(Vec<Key>),
    Threshold { threshold: u32, keys: Vec<Key> },
}

impl Key {
    pub fn from_private(private: PrivateKey) -> Self {
        Key::Raw {
            public: private.public_key(),
            private: Some(private),
        }
    }

    /// Wire form: DER hex for a single key, protobuf `Key` hex otherwise.
    pub fn to_wire(&self) -> String {
        match self {
            Key::Raw { public, .. } => public.to_der_hex(),
            _ => hex::encode(proto::encode_key(self)),
        }
    }

    pub fn from_wire(text: &str) -> Result<Self> {
        if let Ok(public) = PublicKey::from_der_hex(text) {
            return Ok(Key::Raw {
                public,
                private: None,
            });
        }
        // `generateKey` for a private key type answers with the private DER.
        if let Ok(private) = PrivateKey::from_der_hex(text) {
            return Ok(Key::from_private(private));
        }
        let bytes = hex::decode(text)
            .map_err(|e| TckError::InvalidKey(format!("key is not hex: {e}")))?;
        proto::decode_key(&bytes)
    }

    /// Public keys in depth-first order.
    pub fn public_keys(&self) -> Vec<PublicKey> {
        match self {
            Key::Raw { public, .. } => vec![public.clone()],
            Key::List(keys) | Key::Threshold { keys, .. } => {
                keys.iter().flat_map(Key::public_keys).collect()
            }
        }
    }

    /// Private keys held by this structure, in generation order.
    pub fn private_keys(&self) -> Vec<PrivateKey> {
        match self {
            Key::Raw { private, .. } => private.iter().cloned().collect(),
            Key::List(keys) | Key::Threshold { keys, .. } => {
                keys.iter().flat_map(Key::private_keys).collect()
            }
        }
    }

    /// Smallest set of locally held private keys meeting this key's policy:
    /// every member of a list, the first `threshold` members of a threshold key.
    pub fn satisfying_keys(&self) -> Result<Vec<PrivateKey>> {
        match self {
            Key::Raw { private: Some(sk), .. } => Ok(vec![sk.clone()]),
            Key::Raw { public, private: None } => Err(TckError::SignaturePolicy(format!(
                "no private key held for {public}"
            ))),
            Key::List(keys) => {
                let mut out = Vec::new();
                for key in keys {
                    out.extend(key.satisfying_keys()?);
                }
                Ok(out)
            }
            Key::Threshold { threshold, keys } => {
                let mut out = Vec::new();
                for key in keys.iter().take(*threshold as usize) {
                    out.extend(key.satisfying_keys()?);
                }
                Ok(out)
            }
        }
    }

    /// Copies matching private keys into the raw leaves of this structure.
    pub fn attach_private_keys(&mut self, privates: &[PrivateKey]) {
        match self {
            Key::Raw { public, private } => {
                if private.is_none() {
                    *private = privates.iter().find(|sk| sk.public_key() == *public).cloned();
                }
            }
            Key::List(keys) | Key::Threshold { keys, .. } => {
                for key in keys {
                    key.attach_private_keys(privates);
                }
            }
        }
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Key::Raw { public: a, .. }, Key::Raw { public: b, .. }) => a == b,
            (Key::List(a), Key::List(b)) => a == b,
            (
                Key::Threshold { threshold: ta, keys: a },
                Key::Threshold { threshold: tb, keys: b },
            ) => ta == tb && a == b,
            _ => false,
        }
    }
}

impl Serialize for Key {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_wire())
    }
}

impl<'de> Deserialize<'de> for Key {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Key::from_wire(&text).map_err(serde::de::Error::custom)
    }
}

/// What to generate. Serializes to the server's `generateKey` parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "KeySpecParams", into = "KeySpecParams")]
pub enum KeySpec {
    Single(KeyAlgorithm),
    List(Vec<KeySpec>),
    Threshold { threshold: u32, members: Vec<KeySpec> },
}

impl KeySpec {
    pub fn ed25519() -> Self {
        KeySpec::Single(KeyAlgorithm::Ed25519)
    }

    pub fn ecdsa_secp256k1() -> Self {
        KeySpec::Single(KeyAlgorithm::EcdsaSecp256k1)
    }

    pub fn key_list(members: Vec<KeySpec>) -> Self {
        KeySpec::List(members)
    }

    /// Builds a threshold spec, rejecting `threshold` outside `1..=members.len()`.
    pub fn threshold(threshold: u32, members: Vec<KeySpec>) -> Result<Self> {
        let spec = KeySpec::Threshold { threshold, members };
        spec.validate()?;
        Ok(spec)
    }

    /// Checks the threshold invariant at every level.
    pub fn validate(&self) -> Result<()> {
        match self {
            KeySpec::Single(_) => Ok(()),
            KeySpec::List(members) => members.iter().try_for_each(KeySpec::validate),
            KeySpec::Threshold { threshold, members } => {
                if *threshold < 1 || *threshold as usize > members.len() {
                    return Err(TckError::InvalidKeySpec(format!(
                        "threshold {threshold} outside 1..={}",
                        members.len()
                    )));
                }
                members.iter().try_for_each(KeySpec::validate)
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeySpecParams {
    #[serde(rename = "type")]
    kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    threshold: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    keys: Option<Vec<KeySpecParams>>,
}

impl From<KeySpec> for KeySpecParams {
    fn from(spec: KeySpec) -> Self {
        let members = |m: Vec<KeySpec>| Some(m.into_iter().map(KeySpecParams::from).collect());
        match spec {
            KeySpec::Single(KeyAlgorithm::Ed25519) => KeySpecParams {
                kind: "ed25519PublicKey".into(),
                threshold: None,
                keys: None,
            },
            KeySpec::Single(KeyAlgorithm::EcdsaSecp256k1) => KeySpecParams {
                kind: "ecdsaSecp256k1PublicKey".into(),
                threshold: None,
                keys: None,
            },
            KeySpec::List(m) => KeySpecParams {
                kind: "keyList".into(),
                threshold: None,
                keys: members(m),
            },
            KeySpec::Threshold { threshold, members: m } => KeySpecParams {
                kind: "thresholdKey".into(),
                threshold: Some(threshold),
                keys: members(m),
            },
        }
    }
}

impl TryFrom<KeySpecParams> for KeySpec {
    type Error = TckError;

    fn try_from(params: KeySpecParams) -> Result<Self> {
        let members = |keys: Option<Vec<KeySpecParams>>| -> Result<Vec<KeySpec>> {
            keys.unwrap_or_default()
                .into_iter()
                .map(KeySpec::try_from)
                .collect()
        };
        match params.kind.as_str() {
            "ed25519PublicKey" | "ed25519PrivateKey" => Ok(KeySpec::ed25519()),
            "ecdsaSecp256k1PublicKey" | "ecdsaSecp256k1PrivateKey" => {
                Ok(KeySpec::ecdsa_secp256k1())
            }
            "keyList" => Ok(KeySpec::List(members(params.keys)?)),
            "thresholdKey" => {
                let threshold = params.threshold.ok_or_else(|| {
                    TckError::InvalidKeySpec("thresholdKey without threshold".into())
                })?;
                KeySpec::threshold(threshold, members(params.keys)?)
            }
            other => Err(TckError::InvalidKeySpec(format!("unknown key type `{other}`"))),
        }
    }
}

/// Public key structure plus every private key generated for it.
#[derive(Debug, Clone)]
pub struct KeyGenerationResult {
    pub key: Key,
    /// All descendant private keys in generation order.
    pub private_keys: Vec<PrivateKey>,
}

impl KeyGenerationResult {
    pub fn new(key: Key) -> Self {
        let private_keys = key.private_keys();
        KeyGenerationResult { key, private_keys }
    }

    /// Minimal subset of `private_keys` that satisfies the key's policy.
    pub fn satisfying_keys(&self) -> Result<Vec<PrivateKey>> {
        self.key.satisfying_keys()
    }

    /// Private keys as DER hex, ready for `commonTransactionParams.signers`.
    pub fn signers(&self) -> Vec<String> {
        self.private_keys.iter().map(PrivateKey::to_der_hex).collect()
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyGenerationDocument {
    key: Key,
    #[serde(default)]
    private_keys: Vec<PrivateKey>,
}

impl Serialize for KeyGenerationResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        KeyGenerationDocument {
            key: self.key.clone(),
            private_keys: self.private_keys.clone(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for KeyGenerationResult {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let KeyGenerationDocument {
            mut key,
            private_keys,
        } = KeyGenerationDocument::deserialize(deserializer)?;
        key.attach_private_keys(&private_keys);
        Ok(KeyGenerationResult { key, private_keys })
    }
}

/// `shard.realm.num` entity identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId {
    pub shard: u64,
    pub realm: u64,
    pub num: u64,
}

impl EntityId {
    pub fn new(shard: u64, realm: u64, num: u64) -> Self {
        EntityId { shard, realm, num }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.shard, self.realm, self.num)
    }
}

impl FromStr for EntityId {
    type Err = TckError;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split('.').collect();
        let [shard, realm, num] = parts.as_slice() else {
            return Err(TckError::Protocol(format!("malformed entity id `{s}`")));
        };
        let part = |p: &str| {
            p.parse::<u64>()
                .map_err(|_| TckError::Protocol(format!("malformed entity id `{s}`")))
        };
        Ok(EntityId::new(part(*shard)?, part(*realm)?, part(*num)?))
    }
}

impl Serialize for EntityId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        String::deserialize(deserializer)?
            .parse()
            .map_err(serde::de::Error::custom)
    }
}

/// `seconds.nanos` instant as reported by the mirror service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp {
    pub seconds: i64,
    pub nanos: u32,
}

impl FromStr for Timestamp {
    type Err = TckError;

    fn from_str(s: &str) -> Result<Self> {
        let malformed = || TckError::Protocol(format!("malformed timestamp `{s}`"));
        let (secs, frac) = s.split_once('.').unwrap_or((s, ""));
        let seconds = secs.parse::<i64>().map_err(|_| malformed())?;
        let nanos = if frac.is_empty() {
            0
        } else if frac.len() <= 9 && frac.bytes().all(|b| b.is_ascii_digit()) {
            format!("{frac:0<9}").parse::<u32>().map_err(|_| malformed())?
        } else {
            return Err(malformed());
        };
        Ok(Timestamp { seconds, nanos })
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.seconds, self.nanos)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        String::deserialize(deserializer)?
            .parse()
            .map_err(serde::de::Error::custom)
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
