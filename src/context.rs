//! Per-case state, passed explicitly instead of living in process globals.
//!
//! A case starts with [`TestContext::begin`], which resets the server and
//! installs the case's operator, and ends with [`TestContext::finish`].
//! Nothing carries over: the next case builds a fresh context.

use crate::error::{Result, TckError};
use crate::mirror::MirrorClient;
use crate::params::SetupParams;
use crate::retry::{retry_on_error, RetryPolicy};
use crate::rpc::RpcClient;
use crate::types::EntityId;
use std::future::Future;
use std::time::Duration;
use tracing::info;

/// Account paying for the case's transactions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operator {
    pub account_id: EntityId,
    /// DER-hex private key.
    pub private_key: String,
}

impl Operator {
    pub fn setup_params(&self) -> SetupParams {
        SetupParams {
            operator_account_id: self.account_id,
            operator_private_key: self.private_key.clone(),
            node_ip: None,
            node_account_id: None,
            mirror_network_ip: None,
        }
    }
}

pub struct TestContext<'a> {
    client: &'a RpcClient,
    mirror: Option<&'a MirrorClient>,
    operator: Operator,
    retry: RetryPolicy,
}

impl<'a> TestContext<'a> {
    /// Resets the server, then sets it up with `setup`'s operator.
    pub async fn begin(client: &'a RpcClient, setup: SetupParams) -> Result<TestContext<'a>> {
        client.reset().await?;
        client.setup(&setup).await?;
        info!(operator = %setup.operator_account_id, "test context ready");
        Ok(TestContext {
            client,
            mirror: None,
            operator: Operator {
                account_id: setup.operator_account_id,
                private_key: setup.operator_private_key,
            },
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_mirror(mut self, mirror: &'a MirrorClient) -> Self {
        self.mirror = Some(mirror);
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn client(&self) -> &'a RpcClient {
        self.client
    }

    pub fn mirror(&self) -> Result<&'a MirrorClient> {
        self.mirror
            .ok_or_else(|| TckError::Config("no mirror client configured".into()))
    }

    pub fn operator(&self) -> &Operator {
        &self.operator
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Runs a post-submission check under this context's retry policy.
    pub async fn verify<T, F, Fut>(&self, check: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        retry_on_error(&self.retry, check).await
    }

    pub async fn finish(self) -> Result<()> {
        self.client.reset().await?;
        info!(operator = %self.operator.account_id, "test context finished");
        Ok(())
    }
}

/// Bounds a whole case (submission, retries, verification) by `timeout`.
pub async fn run_case<T, Fut>(timeout: Duration, case: Fut) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, case).await {
        Ok(result) => result,
        Err(_) => Err(TckError::Timeout(timeout)),
    }
}
