//! Chain and asset registry
//!
//! Built once from configuration and passed to the composer, message builder
//! and execution engine. Answers static lookups (fee tokens, bech32 prefixes,
//! EVM token addresses, swap venues) and hands out memoized chain clients.

pub mod assets;
pub mod clients;

pub use assets::{
    display_assets, filter_assets_with_metadata, find_asset, find_equivalent_asset, native_assets,
};
pub use clients::ChainClientPool;

use crate::chain::ChainQuery;
use crate::config::{ChainConfig, FeeToken, Settings, SigningKind};
use crate::error::{SwapError, SwapResult};
use crate::routing::Asset;

use std::collections::HashMap;
use std::sync::Arc;

/// Static chain data plus the client pool
pub struct ChainRegistry {
    chains: HashMap<String, ChainConfig>,
    swap_venues: HashMap<String, String>,
    clients: ChainClientPool,
}

impl ChainRegistry {
    pub fn from_settings(settings: &Settings) -> SwapResult<Self> {
        Ok(Self {
            chains: settings.chains.clone(),
            swap_venues: settings.swap_venues.clone(),
            clients: ChainClientPool::new(&settings.chains)?,
        })
    }

    /// Chain configuration by chain id
    pub fn chain(&self, chain_id: &str) -> SwapResult<&ChainConfig> {
        self.chains.get(chain_id).ok_or_else(|| SwapError::ChainNotFound {
            chain_id: chain_id.to_string(),
        })
    }

    /// Configured chain ids, sorted
    pub fn chain_ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.chains.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// chain id to display name, for symbol disambiguation
    pub fn pretty_names(&self) -> HashMap<String, String> {
        self.chains
            .iter()
            .map(|(id, c)| {
                (
                    id.clone(),
                    c.pretty_name.clone().unwrap_or_else(|| c.chain_name.clone()),
                )
            })
            .collect()
    }

    /// Primary fee token of a chain
    pub fn fee_token(&self, chain_id: &str) -> SwapResult<&FeeToken> {
        self.chain(chain_id)?
            .fee_tokens
            .first()
            .ok_or_else(|| SwapError::MissingFeeToken {
                chain_id: chain_id.to_string(),
            })
    }

    /// First fee token of the chain that is also a listed asset
    pub fn fee_asset<'a>(&self, chain_id: &str, assets: &'a [Asset]) -> Option<&'a Asset> {
        self.chain(chain_id).ok()?.fee_tokens.iter().find_map(|fee| {
            assets
                .iter()
                .find(|a| a.chain_id == chain_id && a.denom == fee.denom)
        })
    }

    pub fn bech32_prefix(&self, chain_id: &str) -> SwapResult<&str> {
        Ok(self.chain(chain_id)?.bech32_prefix.as_str())
    }

    /// EVM chain id of the chain's execution extension
    pub fn evm_chain_id(&self, chain_id: &str) -> Option<u64> {
        self.chains.get(chain_id).and_then(|c| c.evm_chain_id)
    }

    pub fn has_evm_extension(&self, chain_id: &str) -> bool {
        self.evm_chain_id(chain_id).is_some()
    }

    /// EVM token address of a Cosmos denom on an EVM-extended chain
    pub fn evm_token_address(&self, chain_id: &str, denom: &str) -> SwapResult<&str> {
        self.chain(chain_id)?
            .evm_tokens
            .iter()
            .find(|t| t.denom == denom)
            .map(|t| t.address.as_str())
            .ok_or_else(|| SwapError::MissingEvmToken {
                chain_id: chain_id.to_string(),
                denom: denom.to_string(),
            })
    }

    /// Cosmos denom of an EVM token address, case-insensitive
    pub fn denom_for_evm_address(&self, chain_id: &str, address: &str) -> Option<&str> {
        self.chains
            .get(chain_id)?
            .evm_tokens
            .iter()
            .find(|t| t.address.eq_ignore_ascii_case(address))
            .map(|t| t.denom.as_str())
    }

    /// Swap venue name of an EVM-extended chain
    pub fn swap_venue(&self, chain_id: &str) -> SwapResult<&str> {
        self.swap_venues
            .get(chain_id)
            .map(String::as_str)
            .ok_or_else(|| SwapError::MissingSwapVenue {
                chain_id: chain_id.to_string(),
            })
    }

    pub fn signing_kind(&self, chain_id: &str) -> SwapResult<SigningKind> {
        Ok(self.chain(chain_id)?.signing)
    }

    /// Read-only client for a chain, connecting on first use
    pub async fn client(&self, chain_id: &str) -> SwapResult<Arc<dyn ChainQuery>> {
        self.chain(chain_id)?;
        self.clients.get(chain_id).await
    }

    /// Pre-seed a chain client
    pub fn install_client(&self, chain_id: impl Into<String>, client: Arc<dyn ChainQuery>) {
        self.clients.insert(chain_id, client);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::SAMPLE;

    fn registry() -> ChainRegistry {
        ChainRegistry::from_settings(&Settings::from_toml(SAMPLE).unwrap()).unwrap()
    }

    #[test]
    fn test_static_lookups() {
        let registry = registry();
        assert_eq!(registry.fee_token("osmosis-1").unwrap().denom, "uosmo");
        assert_eq!(registry.bech32_prefix("cosmoshub-4").unwrap(), "cosmos");
        assert_eq!(registry.evm_chain_id("evmos_9001-2"), Some(9001));
        assert!(!registry.has_evm_extension("osmosis-1"));
        assert_eq!(registry.swap_venue("evmos_9001-2").unwrap(), "evmos-dex");
        assert_eq!(registry.signing_kind("evmos_9001-2").unwrap(), SigningKind::Evmos);
        assert_eq!(
            registry.chain_ids(),
            vec!["cosmoshub-4", "evmos_9001-2", "osmosis-1"]
        );
    }

    #[test]
    fn test_evm_token_tables_are_bidirectional() {
        let registry = registry();
        let usdc = registry.evm_token_address("evmos_9001-2", "ibc/USDC").unwrap();
        assert_eq!(usdc, "0x15C3Eb3B621d1Bff62CbA1c9536B7c1AE9149b57");
        assert_eq!(
            registry.denom_for_evm_address("evmos_9001-2", &usdc.to_lowercase()),
            Some("ibc/USDC")
        );
        assert!(matches!(
            registry.evm_token_address("evmos_9001-2", "uatom"),
            Err(SwapError::MissingEvmToken { .. })
        ));
    }

    #[test]
    fn test_missing_entries_are_configuration_errors() {
        let registry = registry();
        let err = registry.swap_venue("osmosis-1").unwrap_err();
        assert_eq!(err.category(), crate::error::ErrorCategory::Configuration);
        let err = registry.chain("juno-1").unwrap_err();
        assert!(matches!(err, SwapError::ChainNotFound { .. }));
    }

    #[test]
    fn test_fee_asset_skips_unlisted_fee_tokens() {
        let mut settings = Settings::from_toml(SAMPLE).unwrap();
        let osmosis = settings.chains.get_mut("osmosis-1").unwrap();
        osmosis.fee_tokens.insert(
            0,
            FeeToken {
                denom: "ibc/UNLISTED".into(),
                average_gas_price: Some(0.1),
            },
        );
        let registry = ChainRegistry::from_settings(&settings).unwrap();

        let assets = vec![
            crate::compose::tests::asset("ibc/ATOM", "osmosis-1", "uatom", "cosmoshub-4"),
            crate::compose::tests::asset("uosmo", "osmosis-1", "uosmo", "osmosis-1"),
        ];
        assert_eq!(registry.fee_asset("osmosis-1", &assets).unwrap().denom, "uosmo");
        assert!(registry.fee_asset("cosmoshub-4", &assets).is_none());
        assert!(registry.fee_asset("juno-1", &assets).is_none());
    }
}
