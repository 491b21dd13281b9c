//! EVM quote adapter
//!
//! Wraps the secondary quoting/build service used for swaps on the EVM
//! execution extension of a Cosmos chain, plus the JSON-RPC reads needed to
//! turn a built call into a signable transaction.

pub mod quote;
pub mod rpc;
pub mod types;

pub use quote::EvmQuoteClient;
pub use rpc::EthersEvmRpc;
pub use types::*;

use crate::error::{SwapError, SwapResult};

use async_trait::async_trait;
use ethers::types::{Address, U256};

/// Quote and build endpoints of the EVM quote service
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EvmQuoteApi: Send + Sync {
    async fn metadata(&self, evm_chain_id: u64) -> SwapResult<ChainMetadata>;

    async fn balances(&self, evm_chain_id: u64, wallet: &str) -> SwapResult<Vec<TokenBalance>>;

    async fn quote(&self, evm_chain_id: u64, request: &QuoteRequest) -> SwapResult<QuoteResponse>;

    async fn build(&self, evm_chain_id: u64, request: &BuildRequest) -> SwapResult<BuiltTransaction>;
}

/// Account reads on an EVM JSON-RPC endpoint
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EvmRpc: Send + Sync {
    async fn transaction_count(&self, evm_chain_id: u64, address: Address) -> SwapResult<U256>;

    async fn gas_price(&self, evm_chain_id: u64) -> SwapResult<U256>;
}

/// EVM address behind a bech32 account address
pub fn bech32_to_evm_address(address: &str) -> SwapResult<Address> {
    let account: cosmrs::AccountId = address
        .parse()
        .map_err(|e| SwapError::Wallet(format!("invalid bech32 address {}: {}", address, e)))?;
    let bytes = account.to_bytes();
    if bytes.len() != 20 {
        return Err(SwapError::Wallet(format!(
            "address {} is not 20 bytes long",
            address
        )));
    }
    Ok(Address::from_slice(&bytes))
}
