//! Client for the remote routing service
//!
//! Stateless request/response wrapper: chain and asset listing, route
//! quoting, message building and transaction tracking.

pub mod types;

pub use types::*;

use crate::config::RoutingConfig;
use crate::error::SwapResult;
use crate::http;

use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use tracing::debug;

/// Operations offered by the routing service
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RoutingApi: Send + Sync {
    /// Supported chains, minus the ignore list
    async fn chains(&self) -> SwapResult<Vec<Chain>>;

    /// Assets per chain id
    async fn assets(&self) -> SwapResult<HashMap<String, Vec<Asset>>>;

    /// Quote a route between two assets
    async fn route(&self, request: &RouteRequest) -> SwapResult<RouteResponse>;

    /// Build chain messages for a route
    async fn msgs(&self, request: &MsgsRequest) -> SwapResult<Vec<MultiChainMsg>>;

    /// Register a broadcast transaction for relay tracking
    async fn track(&self, tx_hash: &str, chain_id: &str) -> SwapResult<()>;

    /// Current relay status of a tracked transaction
    async fn status(&self, tx_hash: &str, chain_id: &str) -> SwapResult<TxStatusResponse>;
}

/// reqwest implementation of [`RoutingApi`]
#[derive(Clone)]
pub struct RoutingClient {
    client: Client,
    base_url: String,
    ignore_chains: Vec<String>,
}

impl RoutingClient {
    pub fn new(config: &RoutingConfig) -> SwapResult<Self> {
        Ok(Self {
            client: http::build_client(None)?,
            base_url: config.api_url.clone(),
            ignore_chains: config.ignore_chains.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        http::join(&self.base_url, path)
    }
}

#[async_trait]
impl RoutingApi for RoutingClient {
    async fn chains(&self) -> SwapResult<Vec<Chain>> {
        let url = self.url("/info/chains");
        debug!("GET {}", url);

        let response: ChainsResponse = http::decode(self.client.get(&url).send().await?).await?;

        Ok(response
            .chains
            .into_iter()
            .filter(|c| !self.ignore_chains.contains(&c.chain_name))
            .collect())
    }

    async fn assets(&self) -> SwapResult<HashMap<String, Vec<Asset>>> {
        let url = self.url("/fungible/assets");
        debug!("GET {}", url);

        let response: AssetsResponse = http::decode(
            self.client
                .get(&url)
                .query(&[("native_only", "false")])
                .send()
                .await?,
        )
        .await?;

        Ok(response
            .chain_to_assets_map
            .into_iter()
            .map(|(chain_id, list)| (chain_id, list.assets))
            .collect())
    }

    async fn route(&self, request: &RouteRequest) -> SwapResult<RouteResponse> {
        let url = self.url("/fungible/route");
        debug!(
            "POST {} {}:{} -> {}:{}",
            url,
            request.source_asset_chain_id,
            request.source_asset_denom,
            request.dest_asset_chain_id,
            request.dest_asset_denom
        );

        http::decode(self.client.post(&url).json(request).send().await?).await
    }

    async fn msgs(&self, request: &MsgsRequest) -> SwapResult<Vec<MultiChainMsg>> {
        let url = self.url("/fungible/msgs");
        debug!("POST {} ({} operations)", url, request.operations.len());

        let response: MsgsResponse =
            http::decode(self.client.post(&url).json(request).send().await?).await?;
        Ok(response.msgs)
    }

    async fn track(&self, tx_hash: &str, chain_id: &str) -> SwapResult<()> {
        let url = self.url("/tx/track");
        debug!("POST {} {} on {}", url, tx_hash, chain_id);

        let body = TrackRequest {
            tx_hash: tx_hash.to_string(),
            chain_id: chain_id.to_string(),
        };
        let _: TrackResponse = http::decode(self.client.post(&url).json(&body).send().await?).await?;
        Ok(())
    }

    async fn status(&self, tx_hash: &str, chain_id: &str) -> SwapResult<TxStatusResponse> {
        let url = self.url("/tx/status");

        http::decode(
            self.client
                .get(&url)
                .query(&[("tx_hash", tx_hash), ("chain_id", chain_id)])
                .send()
                .await?,
        )
        .await
    }
}
