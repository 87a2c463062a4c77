//! Parameter and result types for the server's JSON-RPC methods.
//!
//! Every method gets its own struct so nothing untyped travels past the RPC
//! client. Optional fields are omitted from the payload when unset; tests
//! that exercise "field missing" cases rely on that.

use crate::types::{EntityId, Key, PrivateKey};
use serde::{Deserialize, Serialize};

/// `setup`: points the server's SDK client at a network and operator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupParams {
    pub operator_account_id: EntityId,
    pub operator_private_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_account_id: Option<EntityId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mirror_network_ip: Option<String>,
}

/// Result of `setup` and `reset`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatusResponse {
    pub message: Option<String>,
    pub status: Option<String>,
}

/// Fields shared by every transaction-submitting method.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommonTransactionParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_transaction_fee: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_transaction_duration: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regenerate_transaction_id: Option<bool>,
    /// DER-hex private keys the server signs the transaction with.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signers: Option<Vec<String>>,
}

impl CommonTransactionParams {
    pub fn signed_by(keys: &[PrivateKey]) -> Self {
        CommonTransactionParams {
            signers: Some(keys.iter().map(PrivateKey::to_der_hex).collect()),
            ..Default::default()
        }
    }
}

/// `createFile`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFileParams {
    /// Wire-form keys (DER hex or protobuf `Key` hex).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keys: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contents: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
    /// Seconds since the epoch; any `i64` reaches the server unchanged.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub common_transaction_params: Option<CommonTransactionParams>,
}

impl CreateFileParams {
    pub fn with_keys(keys: &[Key]) -> Self {
        CreateFileParams {
            keys: Some(keys.iter().map(Key::to_wire).collect()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFileResponse {
    pub file_id: EntityId,
    #[serde(default)]
    pub status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unset_fields_are_omitted() {
        let params = CreateFileParams {
            memo: Some("m".into()),
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(&params).unwrap(), json!({ "memo": "m" }));
    }

    #[test]
    fn test_create_file_wire_names() {
        let params = CreateFileParams {
            contents: Some("abc".into()),
            expiration_time: Some(i64::MAX),
            common_transaction_params: Some(CommonTransactionParams {
                signers: Some(vec!["302e".into()]),
                ..Default::default()
            }),
            ..Default::default()
        };
        let text = crate::codec::encode(&params).unwrap();
        assert!(text.contains(r#""expirationTime":9223372036854775807"#));
        assert!(text.contains(r#""commonTransactionParams":{"signers":["302e"]}"#));
    }

    #[test]
    fn test_create_file_response() {
        let response: CreateFileResponse =
            serde_json::from_value(json!({ "fileId": "0.0.1001", "status": "SUCCESS" })).unwrap();
        assert_eq!(response.file_id, EntityId::new(0, 0, 1001));
        assert_eq!(response.status.as_deref(), Some("SUCCESS"));
    }
}
