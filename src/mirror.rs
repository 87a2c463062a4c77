//! Read-only client for the mirror service.
//!
//! The mirror lags the ledger, so a missing entity is reported as the
//! transient [`TckError::NotYetVisible`] and left to the retry helper.

use crate::codec;
use crate::error::{Result, TckError};
use crate::types::{EntityId, Timestamp};
use base64::Engine as _;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FileEntity {
    pub file_id: EntityId,
    #[serde(default)]
    pub memo: String,
    #[serde(default)]
    pub expiration_timestamp: Option<Timestamp>,
    /// Base64 file contents.
    #[serde(default)]
    pub contents: Option<String>,
    #[serde(default)]
    pub deleted: bool,
}

impl FileEntity {
    pub fn contents_bytes(&self) -> Result<Vec<u8>> {
        match &self.contents {
            None => Ok(Vec::new()),
            Some(encoded) => base64::engine::general_purpose::STANDARD
                .decode(encoded)
                .map_err(|e| TckError::Mirror(format!("file contents are not base64: {e}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MirrorKey {
    #[serde(rename = "_type")]
    pub kind: String,
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AccountBalance {
    pub balance: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AccountEntity {
    pub account: EntityId,
    #[serde(default)]
    pub memo: String,
    #[serde(default)]
    pub expiry_timestamp: Option<Timestamp>,
    #[serde(default)]
    pub key: Option<MirrorKey>,
    #[serde(default)]
    pub balance: Option<AccountBalance>,
    #[serde(default)]
    pub auto_renew_period: Option<i64>,
    #[serde(default)]
    pub deleted: bool,
}

pub struct MirrorClient {
    http: reqwest::Client,
    base_url: String,
}

impl MirrorClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TckError::Transport(e.to_string()))?;
        Ok(MirrorClient {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// `GET {base}/api/v1/{collection}/{id}`.
    #[instrument(skip(self))]
    pub async fn entity<T: DeserializeOwned>(&self, collection: &str, id: &str) -> Result<T> {
        let url = format!("{}/api/v1/{collection}/{id}", self.base_url);
        let response = self.http.get(&url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status == reqwest::StatusCode::NOT_FOUND {
            debug!("entity not yet replicated");
            return Err(TckError::NotYetVisible {
                what: format!("{collection}/{id}"),
            });
        }
        if !status.is_success() {
            return Err(TckError::Mirror(format!("{url} returned {status}: {body}")));
        }
        Ok(codec::decode(&body)?)
    }

    pub async fn file(&self, id: &EntityId) -> Result<FileEntity> {
        self.entity("files", &id.to_string()).await
    }

    pub async fn account(&self, id: &EntityId) -> Result<AccountEntity> {
        self.entity("accounts", &id.to_string()).await
    }
}
