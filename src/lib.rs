//! Compliance harness for a ledger SDK.
//!
//! Drives an SDK test server over JSON-RPC, generates the key material its
//! transactions are signed with, and checks submitted state against the
//! mirror service once it has replicated.

pub mod codec;
pub mod config;
pub mod context;
pub mod error;
pub mod keygen;
pub mod mirror;
pub mod params;
mod proto;
pub mod retry;
pub mod rpc;
pub mod sign;
pub mod types;
pub mod verify;

pub use config::TckConfig;
pub use context::{run_case, Operator, TestContext};
pub use error::{ErrorKind, Result, RpcError, TckError};
pub use keygen::{generate_key, load_keys, save_keys};
pub use mirror::MirrorClient;
pub use retry::{expect_field, retry_on_error, Backoff, RetryPolicy};
pub use rpc::{HttpTransport, RpcClient, Transport};
pub use sign::{sign_file, sign_message, SignatureSet};
pub use types::{
    EntityId, Key, KeyAlgorithm, KeyGenerationResult, KeySpec, PrivateKey, PublicKey, Timestamp,
};
pub use verify::{validate_signature, validate_signatures};
