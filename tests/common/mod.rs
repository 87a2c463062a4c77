#![allow(dead_code)]

use async_trait::async_trait;
use ledger_tck::{generate_key, KeySpec, Result, TckError, Transport};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Replays canned replies and records every request body.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    replies: Arc<Mutex<VecDeque<Result<String>>>>,
    pub sent: Arc<Mutex<Vec<String>>>,
}

impl ScriptedTransport {
    pub fn new(replies: Vec<Result<String>>) -> Self {
        ScriptedTransport {
            replies: Arc::new(Mutex::new(replies.into())),
            sent: Arc::default(),
        }
    }

    pub fn sent(&self) -> Vec<Value> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|s| serde_json::from_str(s).unwrap())
            .collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, body: String) -> Result<String> {
        self.sent.lock().unwrap().push(body);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TckError::Transport("no scripted reply left".into())))
    }
}

#[derive(Debug, Default)]
pub struct FakeState {
    pub operator: Option<String>,
    pub next_file: u64,
    /// (file id, paying operator, raw expirationTime token)
    pub files: Vec<(String, String, Option<String>)>,
}

/// In-process stand-in for the SDK test server.
#[derive(Clone, Default)]
pub struct FakeServer {
    pub state: Arc<Mutex<FakeState>>,
}

fn sdk_error(status: &str) -> Value {
    json!({ "code": -32001, "message": "Hiero error", "data": { "status": status } })
}

impl FakeServer {
    fn handle(&self, method: &str, params: &Value) -> std::result::Result<Value, Value> {
        let mut state = self.state.lock().unwrap();
        match method {
            "reset" => {
                // Ledger state survives; only the client context is dropped.
                state.operator = None;
                Ok(json!({ "status": "SUCCESS" }))
            }
            "setup" => {
                let operator = params["operatorAccountId"].as_str().unwrap_or_default();
                state.operator = Some(operator.to_string());
                Ok(json!({ "message": "client set up", "status": "SUCCESS" }))
            }
            "generateKey" => {
                let spec: KeySpec = serde_json::from_value(params.clone())
                    .map_err(|e| json!({ "code": -32602, "message": e.to_string() }))?;
                let result = generate_key(&spec)
                    .map_err(|e| json!({ "code": -32602, "message": e.to_string() }))?;
                Ok(serde_json::to_value(&result).unwrap())
            }
            "createFile" => {
                let Some(operator) = state.operator.clone() else {
                    return Err(sdk_error("OPERATOR_NOT_SET"));
                };
                if params["memo"].as_str().map_or(false, |m| m.len() > 100) {
                    return Err(sdk_error("MEMO_TOO_LONG"));
                }
                state.next_file += 1;
                let file_id = format!("0.0.{}", 1000 + state.next_file);
                let expiry = params.get("expirationTime").map(|v| v.to_string());
                state.files.push((file_id.clone(), operator, expiry));
                Ok(json!({ "fileId": file_id, "status": "SUCCESS" }))
            }
            other => Err(json!({
                "code": -32601,
                "message": format!("Method not found: {other}")
            })),
        }
    }
}

#[async_trait]
impl Transport for FakeServer {
    async fn send(&self, body: String) -> Result<String> {
        let request: Value = serde_json::from_str(&body).unwrap();
        let method = request["method"].as_str().unwrap_or_default();
        let reply = match self.handle(method, &request["params"]) {
            Ok(result) => json!({ "jsonrpc": "2.0", "id": request["id"], "result": result }),
            Err(error) => json!({ "jsonrpc": "2.0", "id": request["id"], "error": error }),
        };
        Ok(reply.to_string())
    }
}

/// Minimal HTTP/1.1 responder: answers each connection with the next scripted
/// `(status, body)` and records `(request line, body)` pairs.
pub struct HttpResponder {
    pub url: String,
    pub requests: Arc<Mutex<Vec<(String, String)>>>,
}

pub async fn spawn_responder(replies: Vec<(u16, String)>) -> HttpResponder {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let requests: Arc<Mutex<Vec<(String, String)>>> = Arc::default();
    let seen = requests.clone();

    tokio::spawn(async move {
        for (status, body) in replies {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            let header_end = loop {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break None;
                }
                buf.extend_from_slice(&chunk[..n]);
                if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                    break Some(pos + 4);
                }
            };
            let Some(header_end) = header_end else {
                continue;
            };
            let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
            let content_length = head
                .lines()
                .find_map(|l| {
                    let (name, value) = l.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            while buf.len() < header_end + content_length {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
            }
            let request_line = head.lines().next().unwrap_or_default().to_string();
            let request_body = String::from_utf8_lossy(&buf[header_end..]).to_string();
            seen.lock().unwrap().push((request_line, request_body));

            let response = format!(
                "HTTP/1.1 {status} X\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        }
    });

    HttpResponder { url, requests }
}
