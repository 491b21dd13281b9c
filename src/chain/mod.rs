//! Chain module - read and broadcast access to Cosmos SDK chains
//!
//! This module provides:
//! - The [`ChainQuery`] seam used by the funds check and the signing strategies
//! - A REST (LCD) implementation of it
//! - Protobuf transaction types shared by the signing strategies

pub mod proto;
pub mod rest;

pub use rest::CosmosRestClient;

use crate::error::SwapResult;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Account number and sequence of an on-chain account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AccountInfo {
    pub account_number: u64,
    pub sequence: u64,
}

/// Broadcast confirmation level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BroadcastMode {
    #[serde(rename = "BROADCAST_MODE_SYNC")]
    Sync,
    #[serde(rename = "BROADCAST_MODE_BLOCK")]
    Block,
}

/// Outcome of a broadcast as reported by the node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastResponse {
    pub tx_hash: String,
    pub code: u32,
    pub raw_log: String,
}

impl BroadcastResponse {
    pub fn is_ok(&self) -> bool {
        self.code == 0
    }
}

/// Read-only queries plus broadcast against one chain
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChainQuery: Send + Sync {
    /// Balance of `denom` held by `address`, in base units
    async fn balance(&self, address: &str, denom: &str) -> SwapResult<u128>;

    /// Account number and sequence
    async fn account(&self, address: &str) -> SwapResult<AccountInfo>;

    /// Latest committed block height
    async fn latest_height(&self) -> SwapResult<u64>;

    /// Gas used by a simulated transaction
    async fn simulate(&self, tx_bytes: Vec<u8>) -> SwapResult<u64>;

    /// Submit a signed transaction
    async fn broadcast(&self, tx_bytes: Vec<u8>, mode: BroadcastMode) -> SwapResult<BroadcastResponse>;
}
