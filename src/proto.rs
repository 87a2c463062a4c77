//! Protobuf encoding of the ledger's `Key` message.
//!
//! Only the fields the harness produces are modelled:
//! `Key { ed25519 = 2; thresholdKey = 5; keyList = 6; ECDSA_secp256k1 = 7 }`,
//! `ThresholdKey { threshold = 1; keys = 2 }`, `KeyList { keys = 1 }`.

use crate::error::{Result, TckError};
use crate::types::{Key, KeyAlgorithm, PublicKey};
use prost::Message;

#[derive(Clone, PartialEq, Message)]
pub struct KeyProto {
    #[prost(oneof = "key_proto::Kind", tags = "2, 5, 6, 7")]
    kind: Option<key_proto::Kind>,
}

mod key_proto {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Kind {
        #[prost(bytes = "vec", tag = "2")]
        Ed25519(Vec<u8>),
        #[prost(message, tag = "5")]
        ThresholdKey(super::ThresholdKeyProto),
        #[prost(message, tag = "6")]
        KeyList(super::KeyListProto),
        #[prost(bytes = "vec", tag = "7")]
        EcdsaSecp256k1(Vec<u8>),
    }
}

#[derive(Clone, PartialEq, Message)]
pub struct ThresholdKeyProto {
    #[prost(uint32, tag = "1")]
    threshold: u32,
    #[prost(message, optional, tag = "2")]
    keys: Option<KeyListProto>,
}

#[derive(Clone, PartialEq, Message)]
pub struct KeyListProto {
    #[prost(message, repeated, tag = "1")]
    keys: Vec<KeyProto>,
}

impl From<&Key> for KeyProto {
    fn from(key: &Key) -> Self {
        use key_proto::Kind;
        let kind = match key {
            Key::Raw { public, .. } => match public.algorithm() {
                KeyAlgorithm::Ed25519 => Kind::Ed25519(public.to_bytes()),
                KeyAlgorithm::EcdsaSecp256k1 => Kind::EcdsaSecp256k1(public.to_bytes()),
            },
            Key::List(keys) => Kind::KeyList(KeyListProto::from(keys.as_slice())),
            Key::Threshold { threshold, keys } => Kind::ThresholdKey(ThresholdKeyProto {
                threshold: *threshold,
                keys: Some(KeyListProto::from(keys.as_slice())),
            }),
        };
        KeyProto { kind: Some(kind) }
    }
}

impl From<&[Key]> for KeyListProto {
    fn from(keys: &[Key]) -> Self {
        KeyListProto {
            keys: keys.iter().map(KeyProto::from).collect(),
        }
    }
}

impl TryFrom<KeyProto> for Key {
    type Error = TckError;

    fn try_from(proto: KeyProto) -> Result<Self> {
        use key_proto::Kind;
        let raw = |algorithm, bytes: &[u8]| -> Result<Key> {
            Ok(Key::Raw {
                public: PublicKey::from_bytes(algorithm, bytes)?,
                private: None,
            })
        };
        match proto.kind {
            None => Err(TckError::InvalidKey("empty key".into())),
            Some(Kind::Ed25519(bytes)) => raw(KeyAlgorithm::Ed25519, &bytes),
            Some(Kind::EcdsaSecp256k1(bytes)) => raw(KeyAlgorithm::EcdsaSecp256k1, &bytes),
            Some(Kind::KeyList(list)) => Ok(Key::List(members(list)?)),
            Some(Kind::ThresholdKey(threshold)) => {
                let keys = members(threshold.keys.unwrap_or_default())?;
                if threshold.threshold < 1 || threshold.threshold as usize > keys.len() {
                    return Err(TckError::InvalidKey(format!(
                        "threshold {} outside 1..={}",
                        threshold.threshold,
                        keys.len()
                    )));
                }
                Ok(Key::Threshold {
                    threshold: threshold.threshold,
                    keys,
                })
            }
        }
    }
}

fn members(list: KeyListProto) -> Result<Vec<Key>> {
    list.keys.into_iter().map(Key::try_from).collect()
}

pub fn encode_key(key: &Key) -> Vec<u8> {
    KeyProto::from(key).encode_to_vec()
}

/// Decodes a `Key`. As with any protobuf oneof, the last member present wins.
pub fn decode_key(bytes: &[u8]) -> Result<Key> {
    let proto = KeyProto::decode(bytes)
        .map_err(|e| TckError::InvalidKey(format!("malformed protobuf key: {e}")))?;
    Key::try_from(proto)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sign::SignatureSet;
    use crate::types::PrivateKey;

    fn ed25519() -> Key {
        Key::from_private(PrivateKey::generate(KeyAlgorithm::Ed25519))
    }

    #[test]
    fn test_single_ed25519_field_layout() {
        let bytes = encode_key(&ed25519());
        assert_eq!(bytes[0], 0x12);
        assert_eq!(bytes[1], 32);
        assert_eq!(bytes.len(), 34);
    }

    #[test]
    fn test_threshold_layout_and_decode() {
        let key = Key::Threshold {
            threshold: 2,
            keys: vec![
                ed25519(),
                Key::from_private(PrivateKey::generate(KeyAlgorithm::EcdsaSecp256k1)),
                ed25519(),
            ],
        };
        let bytes = encode_key(&key);
        assert_eq!(bytes[0], 0x2a);
        // threshold field follows the outer length prefix
        assert_eq!(&bytes[2..4], &[0x08, 0x02]);

        let decoded = decode_key(&bytes).unwrap();
        assert_eq!(decoded, key);
    }

    #[test]
    fn test_decode_rejects_truncated_input() {
        let bytes = encode_key(&Key::List(vec![ed25519()]));
        assert!(decode_key(&bytes[..bytes.len() - 4]).is_err());
    }

    #[test]
    fn test_decode_rejects_threshold_out_of_range() {
        for threshold in [0, 3, 5] {
            let key = Key::Threshold {
                threshold,
                keys: vec![ed25519(), ed25519()],
            };
            let err = decode_key(&encode_key(&key)).unwrap_err();
            assert!(matches!(err, TckError::InvalidKey(_)), "threshold {threshold}");
        }
    }

    #[test]
    fn test_zero_threshold_never_satisfied_by_empty_set() {
        let key = Key::Threshold {
            threshold: 0,
            keys: vec![ed25519(), ed25519()],
        };
        assert!(Key::from_wire(&key.to_wire()).is_err());

        let valid = Key::Threshold {
            threshold: 1,
            keys: vec![ed25519(), ed25519()],
        };
        let decoded = Key::from_wire(&valid.to_wire()).unwrap();
        assert!(!decoded.is_satisfied_by(&SignatureSet::default(), b"msg"));
    }

    #[test]
    fn test_last_oneof_member_wins() {
        let first = ed25519();
        let last = Key::from_private(PrivateKey::generate(KeyAlgorithm::EcdsaSecp256k1));
        let mut bytes = encode_key(&first);
        bytes.extend(encode_key(&last));
        assert_eq!(decode_key(&bytes).unwrap(), last);
    }

    #[test]
    fn test_empty_message_is_rejected() {
        assert!(matches!(decode_key(&[]), Err(TckError::InvalidKey(_))));
    }
}
