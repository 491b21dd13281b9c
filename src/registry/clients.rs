//! Memoized per-chain REST clients with endpoint fallback

use crate::chain::{ChainQuery, CosmosRestClient};
use crate::config::ChainConfig;
use crate::error::{SwapError, SwapResult};
use crate::http;
use crate::metrics;

use dashmap::DashMap;
use futures::future::{select_ok, BoxFuture, FutureExt};
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Connect-once pool of read-only chain clients
pub struct ChainClientPool {
    endpoints: HashMap<String, ChainEndpoints>,
    clients: DashMap<String, Arc<dyn ChainQuery>>,
    http: Client,
}

#[derive(Debug, Clone)]
struct ChainEndpoints {
    preferred: Option<String>,
    discovered: Vec<String>,
}

impl ChainClientPool {
    pub fn new(chains: &HashMap<String, ChainConfig>) -> SwapResult<Self> {
        let endpoints = chains
            .iter()
            .map(|(chain_id, chain)| {
                (
                    chain_id.clone(),
                    ChainEndpoints {
                        preferred: chain.preferred_rest.clone(),
                        discovered: chain.rest_endpoints.clone(),
                    },
                )
            })
            .collect();

        Ok(Self {
            endpoints,
            clients: DashMap::new(),
            http: http::build_client(None)?,
        })
    }

    /// Install a client directly, bypassing endpoint probing
    pub fn insert(&self, chain_id: impl Into<String>, client: Arc<dyn ChainQuery>) {
        self.clients.insert(chain_id.into(), client);
    }

    /// Client for a chain, connecting on first use
    pub async fn get(&self, chain_id: &str) -> SwapResult<Arc<dyn ChainQuery>> {
        if let Some(client) = self.clients.get(chain_id) {
            return Ok(client.clone());
        }

        let endpoints = self
            .endpoints
            .get(chain_id)
            .ok_or_else(|| SwapError::ChainNotFound {
                chain_id: chain_id.to_string(),
            })?;

        let client = self.connect(chain_id, endpoints).await?;

        // First writer wins if two callers raced
        let client = self
            .clients
            .entry(chain_id.to_string())
            .or_insert(client)
            .clone();
        Ok(client)
    }

    async fn connect(
        &self,
        chain_id: &str,
        endpoints: &ChainEndpoints,
    ) -> SwapResult<Arc<dyn ChainQuery>> {
        if let Some(preferred) = &endpoints.preferred {
            let client = CosmosRestClient::new(chain_id, preferred.clone(), self.http.clone());
            match client.latest_height().await {
                Ok(height) => {
                    debug!("Connected to {} via preferred endpoint {} at height {}", chain_id, preferred, height);
                    return Ok(Arc::new(client));
                }
                Err(e) => {
                    warn!("Preferred endpoint {} for {} failed: {}", preferred, chain_id, e);
                    metrics::record_endpoint_fallback(chain_id);
                }
            }
        }

        let candidates: Vec<_> = endpoints
            .discovered
            .iter()
            .filter(|url| Some(*url) != endpoints.preferred.as_ref())
            .cloned()
            .collect();
        if candidates.is_empty() {
            return Err(SwapError::AllEndpointsFailed {
                chain_id: chain_id.to_string(),
            });
        }

        let probes: Vec<BoxFuture<'_, SwapResult<CosmosRestClient>>> = candidates
            .into_iter()
            .map(|url| {
                let client = CosmosRestClient::new(chain_id, url, self.http.clone());
                async move {
                    client.latest_height().await?;
                    Ok(client)
                }
                .boxed()
            })
            .collect();

        match select_ok(probes).await {
            Ok((client, _)) => {
                info!("Connected to {} via fastest endpoint {}", chain_id, client.endpoint());
                Ok(Arc::new(client))
            }
            Err(e) => {
                warn!("All endpoints for {} failed, last error: {}", chain_id, e);
                Err(SwapError::AllEndpointsFailed {
                    chain_id: chain_id.to_string(),
                })
            }
        }
    }
}
