//! JSON-RPC 2.0 client for the server-under-test.
//!
//! The client owns a transport and a correlation counter and nothing else.
//! It never retries: a transaction that was sent may have reached consensus,
//! so resubmitting it is not safe.

use crate::codec::{self, CodecError};
use crate::error::{Result, RpcError, TckError};
use crate::params::{CreateFileParams, CreateFileResponse, SetupParams, StatusResponse};
use crate::types::{KeyGenerationResult, KeySpec};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, instrument, Span};

/// Moves one serialized request to the server and returns the raw reply.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, body: String) -> Result<String>;
}

/// HTTP POST transport.
pub struct HttpTransport {
    http: reqwest::Client,
    url: String,
}

impl HttpTransport {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TckError::Transport(e.to_string()))?;
        Ok(HttpTransport {
            http,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, body: String) -> Result<String> {
        let response = self
            .http
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;
        // Error envelopes may arrive with a non-2xx status; the body decides.
        Ok(response.text().await?)
    }
}

#[derive(Serialize)]
struct JsonRpcRequest<'a, P: ?Sized> {
    jsonrpc: &'static str,
    method: &'a str,
    params: &'a P,
    id: u64,
}

#[derive(Deserialize)]
struct JsonRpcErrorBody {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

#[derive(Serialize)]
struct NoParams {}

pub struct RpcClient {
    transport: Box<dyn Transport>,
    next_id: AtomicU64,
}

impl RpcClient {
    pub fn new(transport: impl Transport + 'static) -> Self {
        RpcClient {
            transport: Box::new(transport),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn http(url: &str, timeout: Duration) -> Result<Self> {
        Ok(RpcClient::new(HttpTransport::new(url, timeout)?))
    }

    /// Calls `method` and decodes its result into `R`.
    pub async fn call<P, R>(&self, method: &str, params: &P) -> Result<R>
    where
        P: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let value = self.call_value(method, params).await?;
        codec::ensure_exact(&value)?;
        Ok(serde_json::from_value(value).map_err(CodecError::from)?)
    }

    /// Calls `method` and returns its raw result.
    #[instrument(skip(self, params), fields(id = tracing::field::Empty))]
    pub async fn call_value<P>(&self, method: &str, params: &P) -> Result<Value>
    where
        P: Serialize + ?Sized + Sync,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        Span::current().record("id", id);

        let body = codec::encode(&JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id,
        })?;
        debug!(%body, "sending request");

        let reply = self.transport.send(body).await?;
        debug!(%reply, "received response");

        parse_response(id, &reply)
    }

    /// Clears the server's per-case state.
    pub async fn reset(&self) -> Result<StatusResponse> {
        status_result(self.call_value("reset", &NoParams {}).await?)
    }

    pub async fn setup(&self, params: &SetupParams) -> Result<StatusResponse> {
        status_result(self.call_value("setup", params).await?)
    }

    /// Asks the server's SDK to generate keys for `spec`.
    pub async fn generate_key(&self, spec: &KeySpec) -> Result<KeyGenerationResult> {
        self.call("generateKey", spec).await
    }

    pub async fn create_file(&self, params: &CreateFileParams) -> Result<CreateFileResponse> {
        self.call("createFile", params).await
    }
}

fn status_result(value: Value) -> Result<StatusResponse> {
    if value.is_null() {
        return Ok(StatusResponse::default());
    }
    Ok(serde_json::from_value(value).map_err(CodecError::from)?)
}

fn parse_response(id: u64, reply: &str) -> Result<Value> {
    let mut envelope: Value = codec::decode(reply)
        .map_err(|e| TckError::Protocol(format!("unparseable response: {e}")))?;
    let obj = envelope
        .as_object_mut()
        .ok_or_else(|| TckError::Protocol("response is not an object".into()))?;

    let error = obj.remove("error").filter(|e| !e.is_null());

    match obj.get("id") {
        // Servers answer requests they could not parse with a null id.
        Some(Value::Null) | None if error.is_some() => {}
        Some(v) => {
            let echoed = codec::exact_i64(v).map_err(|e| TckError::Protocol(e.to_string()))?;
            if i128::from(echoed) != i128::from(id) {
                return Err(TckError::Protocol(format!(
                    "response id {echoed} does not match request id {id}"
                )));
            }
        }
        None => return Err(TckError::Protocol("response without id".into())),
    }

    if let Some(error) = error {
        let body: JsonRpcErrorBody = serde_json::from_value(error)
            .map_err(|e| TckError::Protocol(format!("malformed error object: {e}")))?;
        let err = RpcError::new(body.code, body.message, body.data);
        debug!(code = err.code, status = ?err.status, "server returned error");
        return Err(err.into());
    }

    obj.remove("result")
        .ok_or_else(|| TckError::Protocol("response has neither result nor error".into()))
}
