//! JSON-RPC access to EVM execution extensions

use super::EvmRpc;
use crate::config::Settings;
use crate::error::{SwapError, SwapResult};

use async_trait::async_trait;
use ethers::providers::{Http, Middleware, Provider};
use ethers::types::{Address, BlockNumber, U256};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

/// ethers-backed [`EvmRpc`], one HTTP provider per EVM chain id
pub struct EthersEvmRpc {
    providers: HashMap<u64, Provider<Http>>,
}

impl EthersEvmRpc {
    /// Create providers for every configured chain with an EVM extension
    pub fn new(settings: &Settings) -> SwapResult<Self> {
        let mut providers = HashMap::new();

        for (chain_id, chain) in &settings.chains {
            let (Some(evm_chain_id), Some(url)) = (chain.evm_chain_id, chain.evm_rpc.as_ref()) else {
                continue;
            };
            let provider = Provider::<Http>::try_from(url.as_str()).map_err(|e| SwapError::Rpc {
                chain_id: chain_id.clone(),
                message: format!("Invalid EVM RPC url {}: {}", url, e),
            })?;
            providers.insert(evm_chain_id, provider.interval(Duration::from_millis(100)));
            debug!("Added EVM provider for {} ({}): {}", chain_id, evm_chain_id, url);
        }

        Ok(Self { providers })
    }

    fn provider(&self, evm_chain_id: u64) -> SwapResult<&Provider<Http>> {
        self.providers
            .get(&evm_chain_id)
            .ok_or_else(|| SwapError::ChainNotFound {
                chain_id: evm_chain_id.to_string(),
            })
    }
}

#[async_trait]
impl EvmRpc for EthersEvmRpc {
    async fn transaction_count(&self, evm_chain_id: u64, address: Address) -> SwapResult<U256> {
        self.provider(evm_chain_id)?
            .get_transaction_count(address, Some(BlockNumber::Pending.into()))
            .await
            .map_err(|e| SwapError::Rpc {
                chain_id: evm_chain_id.to_string(),
                message: e.to_string(),
            })
    }

    async fn gas_price(&self, evm_chain_id: u64) -> SwapResult<U256> {
        self.provider(evm_chain_id)?
            .get_gas_price()
            .await
            .map_err(|e| {
                warn!("Gas price query failed on EVM chain {}: {}", evm_chain_id, e);
                SwapError::Rpc {
                    chain_id: evm_chain_id.to_string(),
                    message: e.to_string(),
                }
            })
    }
}
