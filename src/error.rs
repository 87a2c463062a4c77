//! Error types for the harness.
//!
//! Every failure a test case can observe is a [`TckError`]. Only the
//! eventual-consistency variants are transient; the retry helper matches on
//! [`TckError::is_transient`] and lets everything else through untouched.

use crate::codec::CodecError;
use serde_json::Value;

/// JSON-RPC error classes the harness distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MalformedRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
}

impl ErrorKind {
    /// Classifies a JSON-RPC error code.
    ///
    /// Parse errors and invalid requests fold into `MalformedRequest`. The
    /// implementation-defined server range and unknown codes are reported as
    /// `InternalError`; the raw code is always kept on the error.
    pub fn from_code(code: i64) -> Self {
        match code {
            -32700 | -32600 => ErrorKind::MalformedRequest,
            -32601 => ErrorKind::MethodNotFound,
            -32602 => ErrorKind::InvalidParams,
            _ => ErrorKind::InternalError,
        }
    }
}

/// Error envelope returned by the server-under-test.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{kind:?} ({code}): {message}{}", status_suffix(.status))]
pub struct RpcError {
    pub kind: ErrorKind,
    pub code: i64,
    pub message: String,
    /// Domain status string from `data.status`, verbatim.
    pub status: Option<String>,
    pub data: Option<Value>,
}

fn status_suffix(status: &Option<String>) -> String {
    status
        .as_deref()
        .map(|s| format!(" [{s}]"))
        .unwrap_or_default()
}

impl RpcError {
    pub fn new(code: i64, message: String, data: Option<Value>) -> Self {
        let status = data
            .as_ref()
            .and_then(|d| d.get("status"))
            .and_then(Value::as_str)
            .map(str::to_owned);
        RpcError {
            kind: ErrorKind::from_code(code),
            code,
            message,
            status,
            data,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TckError {
    /// Channel-level failure; never retried.
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("rpc error: {0}")]
    Rpc(#[from] RpcError),

    /// Envelope that does not follow JSON-RPC 2.0.
    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The mirror has not caught up with the ledger yet.
    #[error("{what} not yet visible")]
    NotYetVisible { what: String },

    /// A replicated field does not (yet) hold the expected value.
    #[error("field `{field}` mismatch: expected {expected}, got {actual}")]
    Mismatch {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("mirror query failed: {0}")]
    Mirror(String),

    /// Caller misuse; a defect in the calling test.
    #[error("invalid key spec: {0}")]
    InvalidKeySpec(String),

    #[error("invalid key material: {0}")]
    InvalidKey(String),

    #[error("signature policy not satisfied: {0}")]
    SignaturePolicy(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("test case exceeded {0:?}")]
    Timeout(std::time::Duration),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TckError {
    /// True for eventual-consistency misses, the only errors worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TckError::NotYetVisible { .. } | TckError::Mismatch { .. }
        )
    }

    /// Domain status string carried by a server rejection, if any.
    pub fn status(&self) -> Option<&str> {
        match self {
            TckError::Rpc(err) => err.status.as_deref(),
            _ => None,
        }
    }

    /// JSON-RPC classification, if this is a server error envelope.
    pub fn rpc_kind(&self) -> Option<ErrorKind> {
        match self {
            TckError::Rpc(err) => Some(err.kind),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for TckError {
    fn from(err: reqwest::Error) -> Self {
        TckError::Transport(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TckError>;
