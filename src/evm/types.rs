//! Wire types of the EVM quote service

use serde::{Deserialize, Serialize};

/// Placeholder address for the chain's native coin
pub const NATIVE_TOKEN_ADDRESS: &str = "0xEeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE";

/// Whether an address is the native coin placeholder
pub fn is_native_token(address: &str) -> bool {
    address.eq_ignore_ascii_case(NATIVE_TOKEN_ADDRESS)
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ResultEnvelope<T> {
    pub result: T,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractsMetadata {
    pub multicall2: String,
    pub approve: String,
    pub approve_proxy: String,
    pub route_proxy: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permit2: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub address: String,
    pub name: String,
    pub symbol: String,
    pub decimals: u32,
    #[serde(default)]
    pub icon: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DexInfo {
    pub dex_id: String,
    #[serde(default)]
    pub logo_url: String,
    pub name: String,
}

/// Chain description published by the quote service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainMetadata {
    pub id: String,
    pub name: String,
    pub native_symbol: String,
    pub contracts: ContractsMetadata,
    #[serde(default)]
    pub tokens: Vec<TokenInfo>,
    #[serde(default)]
    pub dexes: Vec<DexInfo>,
    #[serde(default)]
    pub block_explorer_url: String,
    pub wrapped_native_token: String,
    pub native_token: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBalance {
    pub token_address: String,
    pub balance: String,
    #[serde(default)]
    pub allowance: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    pub token_in_addr: String,
    pub token_out_addr: String,
    pub from: String,
    pub amount: String,
    /// 10000 is 100%
    pub slippage_bps: u32,
    pub max_split: u32,
    pub max_edge: u32,
    pub with_cycle: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SingleSwap {
    pub from_token: String,
    pub to_token: String,
    pub dex_id: String,
    pub pool: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitPath {
    pub weight: f64,
    pub swap_infos: Vec<SingleSwap>,
}

/// Aggregated multi-dex swap path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateSwap {
    pub from_token: String,
    pub amount_in: String,
    pub to_token: String,
    pub split_infos: Vec<SplitPath>,
    pub expected_amount_out: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteResponse {
    pub is_swap_path_exists: bool,
    #[serde(default)]
    pub dex_agg: Option<AggregateSwap>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermitDetails {
    pub token: String,
    pub amount: String,
    pub expiration: String,
    pub nonce: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermitSingle {
    pub details: PermitDetails,
    pub spender: String,
    pub sig_deadline: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildRequest {
    pub token_in_addr: String,
    pub token_out_addr: String,
    pub from: String,
    pub amount: String,
    pub slippage_bps: u32,
    pub max_split: u32,
    pub dex_agg: AggregateSwap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permit: Option<PermitSingle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permit_signature: Option<String>,
}

/// Unsigned EVM call returned by the build endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuiltTransaction {
    pub from: String,
    pub to: String,
    pub value: String,
    pub data: String,
    pub gas_limit: u64,
    #[serde(default)]
    pub estimated_gas: u64,
}
