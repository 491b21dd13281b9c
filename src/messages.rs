//! Message building
//!
//! Expands a composed route into the ordered list of chain messages the
//! execution engine signs one by one. EVM legs are built and signed here
//! (the signed legacy transaction is the message body); the Cosmos part is
//! delegated to the routing service.

use crate::chain::proto::{DYNAMIC_FEE_TX_TYPE_URL, LEGACY_TX_TYPE_URL, MSG_CONVERT_ERC20_TYPE_URL};
use crate::compose::QuoteParams;
use crate::error::{SwapError, SwapResult};
use crate::evm::{self, AggregateSwap, BuildRequest, BuiltTransaction, EvmQuoteApi, EvmRpc};
use crate::metrics;
use crate::registry::ChainRegistry;
use crate::routing::{MsgsRequest, MultiChainMsg, Operation, RouteResponse, RoutingApi};
use crate::wallet::Wallet;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, Signature, TransactionRequest, U256};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// JSON body of a signed legacy EVM transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyTxJson {
    #[serde(rename = "@type")]
    pub type_url: String,
    pub nonce: String,
    pub gas_price: String,
    pub gas: String,
    pub to: String,
    pub value: String,
    /// base64 call data
    pub data: String,
    /// base64 big-endian signature values
    pub v: String,
    pub r: String,
    pub s: String,
}

/// JSON body of an EVM leg message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EthereumTxJson {
    pub data: LegacyTxJson,
    pub hash: String,
    pub from: String,
}

/// Builds the ordered message list of a route
pub struct MessageBuilder {
    routing: Arc<dyn RoutingApi>,
    evm: Arc<dyn EvmQuoteApi>,
    evm_rpc: Arc<dyn EvmRpc>,
    registry: Arc<ChainRegistry>,
    slippage_tolerance_percent: String,
    fallback_gas_price: U256,
    params: QuoteParams,
}

impl MessageBuilder {
    pub fn new(
        routing: Arc<dyn RoutingApi>,
        evm: Arc<dyn EvmQuoteApi>,
        evm_rpc: Arc<dyn EvmRpc>,
        registry: Arc<ChainRegistry>,
        slippage_tolerance_percent: impl Into<String>,
        fallback_gas_price_wei: u64,
        params: QuoteParams,
    ) -> Self {
        Self {
            routing,
            evm,
            evm_rpc,
            registry,
            slippage_tolerance_percent: slippage_tolerance_percent.into(),
            fallback_gas_price: U256::from(fallback_gas_price_wei),
            params,
        }
    }

    /// Messages of `route` in execution order
    pub async fn build(
        &self,
        route: &RouteResponse,
        addresses: &HashMap<String, String>,
        wallet: &dyn Wallet,
    ) -> SwapResult<Vec<MultiChainMsg>> {
        let msgs = match &route.dex_aggregate {
            Some(agg) => self.build_with_evm_leg(route, agg, addresses, wallet).await?,
            None => self.routing.msgs(&self.msgs_request(route, addresses)).await?,
        };

        for msg in &msgs {
            metrics::record_message_built(&msg.chain_id);
        }
        info!(
            "Built {} messages for route {} -> {}",
            msgs.len(),
            route.source_asset_chain_id,
            route.dest_asset_chain_id
        );
        Ok(msgs)
    }

    /// Number of transactions the user will sign for `route`
    ///
    /// Uses placeholder addresses, so it can run before a wallet is connected.
    pub async fn transaction_count(&self, route: &RouteResponse) -> SwapResult<usize> {
        let addresses = self.placeholder_addresses(&route.chain_ids)?;

        if route.dex_aggregate.is_none() {
            return Ok(self.routing.msgs(&self.msgs_request(route, &addresses)).await?.len());
        }

        let mut count = 1;
        if let Some(convert) = route.erc20_convert() {
            count += 1;
            let cosmos_ops = route.cosmos_operations();
            if !cosmos_ops.is_empty() {
                let request = self.cosmos_leg_request(route, convert.convert_operation.denom.clone(), cosmos_ops, &addresses);
                count += self.routing.msgs(&request).await?.len();
            }
        }
        Ok(count)
    }

    fn placeholder_addresses(&self, chain_ids: &[String]) -> SwapResult<HashMap<String, String>> {
        chain_ids
            .iter()
            .map(|chain_id| {
                let prefix = self.registry.bech32_prefix(chain_id)?;
                let address = cosmrs::AccountId::new(prefix, &[0u8; 20])
                    .map_err(|e| SwapError::Config(format!("bech32 prefix {}: {}", prefix, e)))?;
                Ok((chain_id.clone(), address.to_string()))
            })
            .collect()
    }

    fn msgs_request(&self, route: &RouteResponse, addresses: &HashMap<String, String>) -> MsgsRequest {
        MsgsRequest {
            source_asset_denom: route.source_asset_denom.clone(),
            source_asset_chain_id: route.source_asset_chain_id.clone(),
            dest_asset_denom: route.dest_asset_denom.clone(),
            dest_asset_chain_id: route.dest_asset_chain_id.clone(),
            amount_in: route.amount_in.clone(),
            operations: route.operations.clone(),
            estimated_amount_out: route.estimated_amount_out.clone(),
            chain_ids_to_addresses: addresses.clone(),
            slippage_tolerance_percent: self.slippage_tolerance_percent.clone(),
            affiliates: Vec::new(),
        }
    }

    /// Request for the Cosmos part of a composed route, starting from the converted coin
    fn cosmos_leg_request(
        &self,
        route: &RouteResponse,
        converted_denom: String,
        operations: Vec<Operation>,
        addresses: &HashMap<String, String>,
    ) -> MsgsRequest {
        let amount_in = route
            .dex_aggregate
            .as_ref()
            .map(|agg| agg.expected_amount_out.clone())
            .unwrap_or_else(|| route.amount_in.clone());

        MsgsRequest {
            source_asset_denom: converted_denom,
            source_asset_chain_id: route.source_asset_chain_id.clone(),
            dest_asset_denom: route.dest_asset_denom.clone(),
            dest_asset_chain_id: route.dest_asset_chain_id.clone(),
            amount_in,
            operations,
            estimated_amount_out: route.estimated_amount_out.clone(),
            chain_ids_to_addresses: addresses.clone(),
            slippage_tolerance_percent: self.slippage_tolerance_percent.clone(),
            affiliates: Vec::new(),
        }
    }

    async fn build_with_evm_leg(
        &self,
        route: &RouteResponse,
        agg: &AggregateSwap,
        addresses: &HashMap<String, String>,
        wallet: &dyn Wallet,
    ) -> SwapResult<Vec<MultiChainMsg>> {
        let chain_id = route.source_asset_chain_id.as_str();
        let sender = addresses
            .get(chain_id)
            .ok_or_else(|| SwapError::Wallet(format!("no address for chain {}", chain_id)))?;

        let mut msgs = vec![self.evm_swap_message(chain_id, sender, &route.amount_in, agg, wallet).await?];

        if let Some(convert) = route.erc20_convert() {
            msgs.push(MultiChainMsg {
                chain_id: chain_id.to_string(),
                path: vec![chain_id.to_string()],
                msg: serde_json::to_string(&convert.convert_message)?,
                msg_type_url: MSG_CONVERT_ERC20_TYPE_URL.to_string(),
            });

            let cosmos_ops = route.cosmos_operations();
            if !cosmos_ops.is_empty() {
                let request =
                    self.cosmos_leg_request(route, convert.convert_operation.denom.clone(), cosmos_ops, addresses);
                msgs.extend(self.routing.msgs(&request).await?);
            }
        }

        Ok(msgs)
    }

    async fn gas_price(&self, evm_chain_id: u64) -> U256 {
        match self.evm_rpc.gas_price(evm_chain_id).await {
            Ok(price) => price,
            Err(e) => {
                warn!(
                    "Using fallback gas price {} on EVM chain {}: {}",
                    self.fallback_gas_price, evm_chain_id, e
                );
                self.fallback_gas_price
            }
        }
    }

    /// Build, sign and wrap the EVM swap transaction
    async fn evm_swap_message(
        &self,
        chain_id: &str,
        sender: &str,
        amount_in: &str,
        agg: &AggregateSwap,
        wallet: &dyn Wallet,
    ) -> SwapResult<MultiChainMsg> {
        let evm_chain_id = self
            .registry
            .evm_chain_id(chain_id)
            .ok_or_else(|| SwapError::Internal(format!("{} has no EVM extension", chain_id)))?;
        let from = evm::bech32_to_evm_address(sender)?;

        let nonce = self.evm_rpc.transaction_count(evm_chain_id, from).await?;
        let gas_price = self.gas_price(evm_chain_id).await;

        let request = BuildRequest {
            token_in_addr: agg.from_token.clone(),
            token_out_addr: agg.to_token.clone(),
            from: format!("{:?}", from),
            amount: amount_in.to_string(),
            slippage_bps: self.params.slippage_bps,
            max_split: self.params.max_split,
            dex_agg: agg.clone(),
            permit: None,
            permit_signature: None,
        };
        let built = self.evm.build(evm_chain_id, &request).await?;
        debug!(
            "Built EVM call to {} on {} (gas limit {}, nonce {})",
            built.to, evm_chain_id, built.gas_limit, nonce
        );

        let tx = legacy_transaction(&built, from, nonce, gas_price, evm_chain_id)?;
        let signature = wallet.sign_ethereum(chain_id, &tx).await?;
        let body = ethereum_tx_json(&tx, &signature, from);

        Ok(MultiChainMsg {
            chain_id: chain_id.to_string(),
            path: vec![chain_id.to_string()],
            msg: serde_json::to_string(&body)?,
            msg_type_url: DYNAMIC_FEE_TX_TYPE_URL.to_string(),
        })
    }
}

/// Parse a decimal or 0x-prefixed hex quantity
pub(crate) fn parse_quantity(value: &str) -> SwapResult<U256> {
    let value = value.trim();
    let parsed = match value.strip_prefix("0x") {
        Some(hex) if hex.is_empty() => Ok(U256::zero()),
        Some(hex) => U256::from_str_radix(hex, 16).map_err(|e| e.to_string()),
        None if value.is_empty() => Ok(U256::zero()),
        None => U256::from_dec_str(value).map_err(|e| e.to_string()),
    };
    parsed.map_err(|e| SwapError::Internal(format!("invalid quantity {:?}: {}", value, e)))
}

fn legacy_transaction(
    built: &BuiltTransaction,
    from: Address,
    nonce: U256,
    gas_price: U256,
    evm_chain_id: u64,
) -> SwapResult<TypedTransaction> {
    let to: Address = built
        .to
        .parse()
        .map_err(|e| SwapError::Internal(format!("invalid EVM call target {}: {}", built.to, e)))?;
    let data = hex::decode(built.data.trim_start_matches("0x"))
        .map_err(|e| SwapError::Internal(format!("invalid EVM call data: {}", e)))?;

    Ok(TransactionRequest::new()
        .from(from)
        .to(to)
        .value(parse_quantity(&built.value)?)
        .data(Bytes::from(data))
        .nonce(nonce)
        .gas(built.gas_limit)
        .gas_price(gas_price)
        .chain_id(evm_chain_id)
        .into())
}

fn u256_bytes(value: U256) -> [u8; 32] {
    let mut out = [0u8; 32];
    value.to_big_endian(&mut out);
    out
}

fn ethereum_tx_json(tx: &TypedTransaction, signature: &Signature, from: Address) -> EthereumTxJson {
    let v = signature.v.to_be_bytes();
    let first = v.iter().position(|b| *b != 0).unwrap_or(v.len());

    EthereumTxJson {
        data: LegacyTxJson {
            type_url: LEGACY_TX_TYPE_URL.to_string(),
            nonce: tx.nonce().copied().unwrap_or_default().to_string(),
            gas_price: tx.gas_price().unwrap_or_default().to_string(),
            gas: tx.gas().copied().unwrap_or_default().to_string(),
            to: tx
                .to_addr()
                .map(|a| format!("{:?}", a))
                .unwrap_or_default(),
            value: tx.value().copied().unwrap_or_default().to_string(),
            data: BASE64.encode(tx.data().map(|d| d.to_vec()).unwrap_or_default()),
            v: BASE64.encode(&v[first..]),
            r: BASE64.encode(u256_bytes(signature.r)),
            s: BASE64.encode(u256_bytes(signature.s)),
        },
        hash: format!("{:?}", tx.hash(signature)),
        from: format!("{:?}", from),
    }
}
