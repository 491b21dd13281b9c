//! Wire types shared with the routing service

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::evm::types::AggregateSwap;

/// A fungible asset on a specific chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub denom: String,
    pub chain_id: String,
    pub origin_denom: String,
    pub origin_chain_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evm_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimals: Option<u32>,
}

impl Asset {
    /// All display fields are present and non-empty
    pub fn has_metadata(&self) -> bool {
        matches!(self.decimals, Some(d) if d > 0)
            && self.symbol.as_deref().is_some_and(|s| !s.is_empty())
            && self.name.as_deref().is_some_and(|s| !s.is_empty())
            && self.logo_uri.as_deref().is_some_and(|s| !s.is_empty())
    }

    /// Issued on the chain it lives on
    pub fn is_native(&self) -> bool {
        self.chain_id == self.origin_chain_id
    }

    /// Same issuing chain and origin denom
    pub fn is_equivalent(&self, other: &Asset) -> bool {
        self.origin_chain_id == other.origin_chain_id && self.origin_denom == other.origin_denom
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleVersionInfo {
    pub path: String,
    pub version: String,
    pub sum: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CosmosModuleSupport {
    pub authz: bool,
    pub feegrant: bool,
}

/// Chain as described by the routing service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chain {
    pub chain_id: String,
    pub chain_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evm_chain_id: Option<String>,
    #[serde(default)]
    pub pfm_enabled: bool,
    #[serde(default)]
    pub cosmos_sdk_version: String,
    #[serde(default)]
    pub modules: HashMap<String, ModuleVersionInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supports_memos: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cosmos_module_support: Option<CosmosModuleSupport>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SwapVenue {
    pub name: String,
    pub chain_id: String,
}

/// A single pool leg inside a swap
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapOperation {
    pub pool: String,
    pub denom_in: String,
    pub denom_out: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapIn {
    pub swap_venue: SwapVenue,
    pub swap_operations: Vec<SwapOperation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub swap_amount_in: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapExactCoinOut {
    pub swap_venue: SwapVenue,
    pub swap_operations: Vec<SwapOperation>,
    pub swap_amount_out: String,
}

/// Swap leg: exact-in or exact-out
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapKind {
    SwapIn(SwapIn),
    SwapOut(SwapExactCoinOut),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Swap {
    #[serde(flatten)]
    pub kind: SwapKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_affiliate_fee: Option<String>,
}

impl Swap {
    pub fn venue(&self) -> &SwapVenue {
        match &self.kind {
            SwapKind::SwapIn(s) => &s.swap_venue,
            SwapKind::SwapOut(s) => &s.swap_venue,
        }
    }
}

/// IBC hop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transfer {
    pub port: String,
    pub channel: String,
    pub chain_id: String,
    pub pfm_enabled: bool,
    #[serde(default)]
    pub dest_denom: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvertVenue {
    pub name: String,
    pub chain_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvertOperation {
    pub denom: String,
    pub venue: ConvertVenue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Erc20ConvertMessage {
    pub contract_address: String,
    pub amount: String,
    pub receiver: String,
    pub sender: String,
}

/// ERC20 token to native coin conversion on an EVM-extended Cosmos chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Erc20Convert {
    pub convert_message: Erc20ConvertMessage,
    pub convert_operation: ConvertOperation,
}

/// One step of a route
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Swap(Swap),
    Transfer(Transfer),
    Erc20Convert(Erc20Convert),
}

impl Operation {
    pub fn is_swap(&self) -> bool {
        matches!(self, Operation::Swap(_))
    }

    pub fn is_transfer(&self) -> bool {
        matches!(self, Operation::Transfer(_))
    }

    pub fn is_erc20_convert(&self) -> bool {
        matches!(self, Operation::Erc20Convert(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Affiliate {
    pub basis_points_fee: String,
    pub address: String,
}

/// Route quote request
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RouteRequest {
    pub amount_in: String,
    pub source_asset_denom: String,
    pub source_asset_chain_id: String,
    pub dest_asset_denom: String,
    pub dest_asset_chain_id: String,
}

/// Route description, possibly stitched from several sub-routes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteResponse {
    pub source_asset_denom: String,
    pub source_asset_chain_id: String,
    pub dest_asset_denom: String,
    pub dest_asset_chain_id: String,
    pub amount_in: String,
    #[serde(default)]
    pub operations: Vec<Operation>,
    #[serde(default)]
    pub chain_ids: Vec<String>,
    #[serde(default)]
    pub does_swap: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_amount_out: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub swap_venue: Option<SwapVenue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dex_aggregate: Option<AggregateSwap>,
}

impl RouteResponse {
    /// Whether the route starts with an EVM swap leg
    pub fn has_evm_leg(&self) -> bool {
        self.dex_aggregate.is_some()
    }

    /// Operations after the EVM swap and conversion legs
    pub fn cosmos_operations(&self) -> Vec<Operation> {
        if !self.has_evm_leg() {
            return self.operations.clone();
        }
        match self.operations.iter().position(Operation::is_erc20_convert) {
            Some(idx) => self.operations[idx + 1..].to_vec(),
            None => Vec::new(),
        }
    }

    /// Conversion leg of a composed route, if any
    pub fn erc20_convert(&self) -> Option<&Erc20Convert> {
        self.operations.iter().find_map(|op| match op {
            Operation::Erc20Convert(c) => Some(c),
            _ => None,
        })
    }
}

/// Request body of the messages endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MsgsRequest {
    pub source_asset_denom: String,
    pub source_asset_chain_id: String,
    pub dest_asset_denom: String,
    pub dest_asset_chain_id: String,
    pub amount_in: String,
    pub operations: Vec<Operation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_amount_out: Option<String>,
    pub chain_ids_to_addresses: HashMap<String, String>,
    pub slippage_tolerance_percent: String,
    #[serde(default)]
    pub affiliates: Vec<Affiliate>,
}

/// Atomic unit of execution: one on-chain action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiChainMsg {
    pub chain_id: String,
    pub path: Vec<String>,
    /// JSON encoded message body
    pub msg: String,
    pub msg_type_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MsgsResponse {
    #[serde(default)]
    pub msgs: Vec<MultiChainMsg>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackRequest {
    pub tx_hash: String,
    pub chain_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackResponse {
    #[serde(default)]
    pub tx_hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainTransaction {
    pub chain_id: String,
    pub tx_hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PacketError {
    pub code: i64,
    pub message: String,
}

/// IBC packet lifecycle as observed by the tracker
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Packet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub send_tx: Option<ChainTransaction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receive_tx: Option<ChainTransaction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acknowledge_tx: Option<ChainTransaction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_tx: Option<ChainTransaction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<PacketError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusState {
    #[serde(rename = "STATE_UNKNOWN")]
    Unknown,
    #[serde(rename = "STATE_SUBMITTED")]
    Submitted,
    #[serde(rename = "STATE_PENDING")]
    Pending,
    #[serde(rename = "STATE_COMPLETED")]
    Completed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusError {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxStatusResponse {
    pub status: StatusState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<StatusError>,
    #[serde(default)]
    pub packets: Vec<Packet>,
}

impl TxStatusResponse {
    pub fn is_terminal(&self) -> bool {
        self.status == StatusState::Completed
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ChainsResponse {
    pub chains: Vec<Chain>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AssetList {
    #[serde(default)]
    pub assets: Vec<Asset>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AssetsResponse {
    pub chain_to_assets_map: HashMap<String, AssetList>,
}
