//! HTTP client for the EVM quote and build service

use super::types::*;
use super::EvmQuoteApi;
use crate::config::EvmQuoteConfig;
use crate::error::SwapResult;
use crate::http;

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// reqwest implementation of [`EvmQuoteApi`]
#[derive(Clone)]
pub struct EvmQuoteClient {
    client: Client,
    base_url: String,
}

impl EvmQuoteClient {
    pub fn new(config: &EvmQuoteConfig) -> SwapResult<Self> {
        Ok(Self {
            client: http::build_client(Some(Duration::from_millis(config.timeout_ms)))?,
            base_url: config.api_url.clone(),
        })
    }

    fn url(&self, evm_chain_id: u64, endpoint: &str) -> String {
        http::join(
            &self.base_url,
            &format!("/v1/chains/{}/{}", evm_chain_id, endpoint),
        )
    }
}

#[async_trait]
impl EvmQuoteApi for EvmQuoteClient {
    async fn metadata(&self, evm_chain_id: u64) -> SwapResult<ChainMetadata> {
        let url = self.url(evm_chain_id, "metadata");
        debug!("GET {}", url);

        let envelope: ResultEnvelope<ChainMetadata> =
            http::decode(self.client.get(&url).send().await?).await?;
        Ok(envelope.result)
    }

    async fn balances(&self, evm_chain_id: u64, wallet: &str) -> SwapResult<Vec<TokenBalance>> {
        let url = self.url(evm_chain_id, "balances");
        debug!("GET {} for {}", url, wallet);

        let envelope: ResultEnvelope<Vec<TokenBalance>> = http::decode(
            self.client
                .get(&url)
                .query(&[("walletAddress", wallet)])
                .send()
                .await?,
        )
        .await?;
        Ok(envelope.result)
    }

    async fn quote(&self, evm_chain_id: u64, request: &QuoteRequest) -> SwapResult<QuoteResponse> {
        let url = self.url(evm_chain_id, "quote");
        debug!(
            "POST {} {} -> {} amount {}",
            url, request.token_in_addr, request.token_out_addr, request.amount
        );

        let envelope: ResultEnvelope<QuoteResponse> =
            http::decode(self.client.post(&url).json(request).send().await?).await?;
        Ok(envelope.result)
    }

    async fn build(&self, evm_chain_id: u64, request: &BuildRequest) -> SwapResult<BuiltTransaction> {
        let url = self.url(evm_chain_id, "build");
        debug!("POST {} from {}", url, request.from);

        let envelope: ResultEnvelope<BuiltTransaction> =
            http::decode(self.client.post(&url).json(request).send().await?).await?;
        Ok(envelope.result)
    }
}
