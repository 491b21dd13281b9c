//! Route composition
//!
//! Decides whether a swap needs an EVM leg, a Cosmos leg or both and stitches
//! the partial routes (EVM swap, ERC20 conversion, Cosmos route) into one
//! [`RouteResponse`].

use crate::config::EvmQuoteConfig;
use crate::error::{SwapError, SwapResult};
use crate::evm::{self, AggregateSwap, EvmQuoteApi, QuoteRequest};
use crate::metrics;
use crate::registry::{find_equivalent_asset, ChainRegistry};
use crate::routing::{
    Asset, ConvertOperation, ConvertVenue, Erc20Convert, Erc20ConvertMessage, Operation, RouteRequest,
    RouteResponse, RoutingApi, Swap, SwapIn, SwapKind, SwapOperation, SwapVenue,
};
use crate::wallet::Wallet;

use std::sync::Arc;
use tracing::{debug, info};

/// Quote parameters forwarded to the EVM quote service
#[derive(Debug, Clone)]
pub struct QuoteParams {
    pub slippage_bps: u32,
    pub max_split: u32,
    pub max_edge: u32,
}

impl From<&EvmQuoteConfig> for QuoteParams {
    fn from(config: &EvmQuoteConfig) -> Self {
        Self {
            slippage_bps: config.slippage_bps,
            max_split: config.max_split,
            max_edge: config.max_edge,
        }
    }
}

/// Builds unified routes from the routing service and the EVM quote service
pub struct RouteComposer {
    routing: Arc<dyn RoutingApi>,
    evm: Arc<dyn EvmQuoteApi>,
    registry: Arc<ChainRegistry>,
    params: QuoteParams,
}

impl RouteComposer {
    pub fn new(
        routing: Arc<dyn RoutingApi>,
        evm: Arc<dyn EvmQuoteApi>,
        registry: Arc<ChainRegistry>,
        params: QuoteParams,
    ) -> Self {
        Self {
            routing,
            evm,
            registry,
            params,
        }
    }

    /// Compose a route from `source_asset` on `source_chain_id` to `dest_asset` on `dest_chain_id`
    pub async fn compose(
        &self,
        amount_in: &str,
        source_asset: &Asset,
        source_chain_id: &str,
        dest_asset: &Asset,
        dest_chain_id: &str,
        wallet: &dyn Wallet,
    ) -> SwapResult<RouteResponse> {
        if !self.registry.has_evm_extension(source_chain_id) {
            let route = self
                .cosmos_route(
                    amount_in,
                    &source_asset.denom,
                    source_chain_id,
                    &dest_asset.denom,
                    dest_chain_id,
                )
                .await?;
            metrics::record_route_composed("cosmos");
            return Ok(route);
        }

        self.compose_with_evm_leg(
            amount_in,
            source_asset,
            source_chain_id,
            dest_asset,
            dest_chain_id,
            wallet,
        )
        .await
    }

    async fn cosmos_route(
        &self,
        amount_in: &str,
        source_denom: &str,
        source_chain_id: &str,
        dest_denom: &str,
        dest_chain_id: &str,
    ) -> SwapResult<RouteResponse> {
        let request = RouteRequest {
            amount_in: amount_in.to_string(),
            source_asset_denom: source_denom.to_string(),
            source_asset_chain_id: source_chain_id.to_string(),
            dest_asset_denom: dest_denom.to_string(),
            dest_asset_chain_id: dest_chain_id.to_string(),
        };

        let route = self.routing.route(&request).await?;
        if route.operations.is_empty() {
            return Err(SwapError::NoRoute {
                source_denom: source_denom.to_string(),
                source_chain: source_chain_id.to_string(),
                dest_denom: dest_denom.to_string(),
                dest_chain: dest_chain_id.to_string(),
            });
        }

        debug!(
            "Cosmos route {} -> {}: {} operations over {:?}",
            source_chain_id,
            dest_chain_id,
            route.operations.len(),
            route.chain_ids
        );
        Ok(route)
    }

    /// EVM address of an asset on its own chain
    fn evm_address(&self, chain_id: &str, asset: &Asset) -> SwapResult<String> {
        match &asset.evm_address {
            Some(address) if !address.is_empty() => Ok(address.clone()),
            _ => Ok(self.registry.evm_token_address(chain_id, &asset.denom)?.to_string()),
        }
    }

    /// Denom on the source chain that the EVM swap should produce
    async fn evm_output_asset(
        &self,
        source_chain_id: &str,
        dest_asset: &Asset,
        dest_chain_id: &str,
    ) -> SwapResult<Asset> {
        if dest_chain_id == source_chain_id {
            return Ok(dest_asset.clone());
        }

        let assets = self.routing.assets().await?;
        let candidates = assets.get(source_chain_id).map(Vec::as_slice).unwrap_or(&[]);
        find_equivalent_asset(dest_asset, candidates)
            .cloned()
            .ok_or_else(|| SwapError::NoRoute {
                source_denom: dest_asset.origin_denom.clone(),
                source_chain: source_chain_id.to_string(),
                dest_denom: dest_asset.denom.clone(),
                dest_chain: dest_chain_id.to_string(),
            })
    }

    fn denom_or_address(&self, chain_id: &str, address: &str) -> String {
        self.registry
            .denom_for_evm_address(chain_id, address)
            .map(str::to_string)
            .unwrap_or_else(|| address.to_string())
    }

    /// Route operation describing the aggregated EVM swap
    fn evm_swap_operation(&self, chain_id: &str, venue: &str, amount_in: &str, agg: &AggregateSwap) -> Operation {
        let swap_operations = agg
            .split_infos
            .iter()
            .flat_map(|path| path.swap_infos.iter())
            .map(|hop| SwapOperation {
                pool: hop.pool.clone(),
                denom_in: self.denom_or_address(chain_id, &hop.from_token),
                denom_out: self.denom_or_address(chain_id, &hop.to_token),
            })
            .collect();

        Operation::Swap(Swap {
            kind: SwapKind::SwapIn(SwapIn {
                swap_venue: SwapVenue {
                    name: venue.to_string(),
                    chain_id: chain_id.to_string(),
                },
                swap_operations,
                swap_amount_in: Some(amount_in.to_string()),
            }),
            estimated_affiliate_fee: None,
        })
    }

    async fn compose_with_evm_leg(
        &self,
        amount_in: &str,
        source_asset: &Asset,
        source_chain_id: &str,
        dest_asset: &Asset,
        dest_chain_id: &str,
        wallet: &dyn Wallet,
    ) -> SwapResult<RouteResponse> {
        let evm_chain_id = self
            .registry
            .evm_chain_id(source_chain_id)
            .ok_or_else(|| SwapError::Internal(format!("{} has no EVM extension", source_chain_id)))?;
        let venue = self.registry.swap_venue(source_chain_id)?.to_string();

        let output_asset = self
            .evm_output_asset(source_chain_id, dest_asset, dest_chain_id)
            .await?;
        let token_in = self.evm_address(source_chain_id, source_asset)?;
        let token_out = self.evm_address(source_chain_id, &output_asset)?;

        let account = wallet.get_account(source_chain_id).await?;
        let from = evm::bech32_to_evm_address(&account.address)?;
        let from_hex = format!("{:?}", from);

        let request = QuoteRequest {
            token_in_addr: token_in.to_lowercase(),
            token_out_addr: token_out.to_lowercase(),
            from: from_hex.clone(),
            amount: amount_in.to_string(),
            slippage_bps: self.params.slippage_bps,
            max_split: self.params.max_split,
            max_edge: self.params.max_edge,
            with_cycle: false,
        };
        let quote = self.evm.quote(evm_chain_id, &request).await?;

        let dex_agg = match quote.dex_agg {
            Some(agg) if quote.is_swap_path_exists => agg,
            _ => {
                return Err(SwapError::NoSwapPath {
                    chain_id: source_chain_id.to_string(),
                    token_in,
                    token_out,
                })
            }
        };
        let evm_amount_out = dex_agg.expected_amount_out.clone();
        let swap_op = self.evm_swap_operation(source_chain_id, &venue, amount_in, &dex_agg);
        let swap_venue = SwapVenue {
            name: venue.clone(),
            chain_id: source_chain_id.to_string(),
        };

        if dest_chain_id == source_chain_id {
            info!(
                "EVM-only route on {}: {} {} -> {} {}",
                source_chain_id, amount_in, source_asset.denom, evm_amount_out, dest_asset.denom
            );
            metrics::record_route_composed("evm");
            return Ok(RouteResponse {
                source_asset_denom: source_asset.denom.clone(),
                source_asset_chain_id: source_chain_id.to_string(),
                dest_asset_denom: dest_asset.denom.clone(),
                dest_asset_chain_id: dest_chain_id.to_string(),
                amount_in: amount_in.to_string(),
                operations: vec![swap_op],
                chain_ids: vec![source_chain_id.to_string()],
                does_swap: true,
                estimated_amount_out: Some(evm_amount_out),
                swap_venue: Some(swap_venue),
                dex_aggregate: Some(dex_agg),
            });
        }

        let convert_op = Operation::Erc20Convert(Erc20Convert {
            convert_message: Erc20ConvertMessage {
                contract_address: token_out.clone(),
                amount: evm_amount_out.clone(),
                receiver: account.address.clone(),
                sender: from_hex,
            },
            convert_operation: ConvertOperation {
                denom: output_asset.denom.clone(),
                venue: ConvertVenue {
                    name: venue,
                    chain_id: source_chain_id.to_string(),
                },
            },
        });

        let cosmos = self
            .cosmos_route(
                &evm_amount_out,
                &output_asset.denom,
                source_chain_id,
                &dest_asset.denom,
                dest_chain_id,
            )
            .await?;

        let mut chain_ids = vec![source_chain_id.to_string()];
        let mut rest = cosmos.chain_ids.iter().peekable();
        if rest.peek().map(|id| id.as_str()) == Some(source_chain_id) {
            rest.next();
        }
        chain_ids.extend(rest.cloned());

        let mut operations = Vec::with_capacity(cosmos.operations.len() + 2);
        operations.push(swap_op);
        operations.push(convert_op);
        operations.extend(cosmos.operations);

        info!(
            "Composed route {} -> {}: {} operations over {:?}",
            source_chain_id,
            dest_chain_id,
            operations.len(),
            chain_ids
        );
        metrics::record_route_composed("composed");

        Ok(RouteResponse {
            source_asset_denom: source_asset.denom.clone(),
            source_asset_chain_id: source_chain_id.to_string(),
            dest_asset_denom: dest_asset.denom.clone(),
            dest_asset_chain_id: dest_chain_id.to_string(),
            amount_in: amount_in.to_string(),
            operations,
            chain_ids,
            does_swap: true,
            estimated_amount_out: cosmos.estimated_amount_out,
            swap_venue: Some(swap_venue),
            dex_aggregate: Some(dex_agg),
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::tests::SAMPLE;
    use crate::config::Settings;
    use crate::evm::{MockEvmQuoteApi, QuoteResponse, SingleSwap, SplitPath};
    use crate::routing::{MockRoutingApi, Transfer};
    use crate::wallet::{KeyAlgo, MockWallet, WalletAccount};
    use std::collections::HashMap;

    pub(crate) const EVMOS: &str = "evmos_9001-2";
    pub(crate) const USER_HEX: &str = "f39fd6e51aad88f6f4ce6ab8827279cfffb92266";
    pub(crate) const USDC_EVM: &str = "0x15C3Eb3B621d1Bff62CbA1c9536B7c1AE9149b57";
    pub(crate) const NATIVE: &str = "0xEeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE";

    pub(crate) fn evmos_user() -> String {
        cosmrs::AccountId::new("evmos", &hex::decode(USER_HEX).unwrap())
            .unwrap()
            .to_string()
    }

    pub(crate) fn registry() -> Arc<ChainRegistry> {
        Arc::new(ChainRegistry::from_settings(&Settings::from_toml(SAMPLE).unwrap()).unwrap())
    }

    pub(crate) fn params() -> QuoteParams {
        QuoteParams {
            slippage_bps: 100,
            max_split: 15,
            max_edge: 3,
        }
    }

    pub(crate) fn asset(denom: &str, chain: &str, origin_denom: &str, origin_chain: &str) -> Asset {
        Asset {
            denom: denom.into(),
            chain_id: chain.into(),
            origin_denom: origin_denom.into(),
            origin_chain_id: origin_chain.into(),
            evm_address: None,
            symbol: None,
            name: None,
            logo_uri: None,
            decimals: None,
        }
    }

    pub(crate) fn transfer_route(amount_in: &str, src: (&str, &str), dst: (&str, &str)) -> RouteResponse {
        RouteResponse {
            source_asset_denom: src.0.into(),
            source_asset_chain_id: src.1.into(),
            dest_asset_denom: dst.0.into(),
            dest_asset_chain_id: dst.1.into(),
            amount_in: amount_in.into(),
            operations: vec![Operation::Transfer(Transfer {
                port: "transfer".into(),
                channel: "channel-0".into(),
                chain_id: src.1.into(),
                pfm_enabled: false,
                dest_denom: dst.0.into(),
            })],
            chain_ids: vec![src.1.into(), dst.1.into()],
            does_swap: false,
            estimated_amount_out: Some(amount_in.into()),
            swap_venue: None,
            dex_aggregate: None,
        }
    }

    pub(crate) fn aggregate(from: &str, to: &str, amount_in: &str, out: &str) -> AggregateSwap {
        AggregateSwap {
            from_token: from.into(),
            amount_in: amount_in.into(),
            to_token: to.into(),
            split_infos: vec![SplitPath {
                weight: 100.0,
                swap_infos: vec![SingleSwap {
                    from_token: from.into(),
                    to_token: to.into(),
                    dex_id: "forge".into(),
                    pool: "0xpool".into(),
                }],
            }],
            expected_amount_out: out.into(),
        }
    }

    pub(crate) fn evmos_wallet() -> MockWallet {
        let mut wallet = MockWallet::new();
        wallet.expect_get_account().returning(|chain_id| {
            Ok(WalletAccount {
                address: match chain_id {
                    EVMOS => evmos_user(),
                    "osmosis-1" => "osmo1user".to_string(),
                    other => format!("{}-user", other),
                },
                pubkey: vec![2; 33],
                algo: KeyAlgo::EthSecp256k1,
            })
        });
        wallet
    }

    #[tokio::test]
    async fn test_cosmos_source_delegates_to_routing_service() {
        let mut routing = MockRoutingApi::new();
        routing
            .expect_route()
            .withf(|req| req.source_asset_chain_id == "osmosis-1" && req.amount_in == "1000000")
            .times(1)
            .returning(|req| {
                Ok(transfer_route(
                    &req.amount_in,
                    (&req.source_asset_denom, &req.source_asset_chain_id),
                    (&req.dest_asset_denom, &req.dest_asset_chain_id),
                ))
            });
        let composer = RouteComposer::new(Arc::new(routing), Arc::new(MockEvmQuoteApi::new()), registry(), params());

        let route = composer
            .compose(
                "1000000",
                &asset("uosmo", "osmosis-1", "uosmo", "osmosis-1"),
                "osmosis-1",
                &asset("uatom", "cosmoshub-4", "uatom", "cosmoshub-4"),
                "cosmoshub-4",
                &MockWallet::new(),
            )
            .await
            .unwrap();

        assert!(!route.does_swap);
        assert_eq!(route.chain_ids, vec!["osmosis-1", "cosmoshub-4"]);
    }

    #[tokio::test]
    async fn test_empty_cosmos_route_is_no_route() {
        let mut routing = MockRoutingApi::new();
        routing.expect_route().returning(|req| {
            let mut route = transfer_route("1", (&req.source_asset_denom, "osmosis-1"), ("uatom", "cosmoshub-4"));
            route.operations.clear();
            Ok(route)
        });
        let composer = RouteComposer::new(Arc::new(routing), Arc::new(MockEvmQuoteApi::new()), registry(), params());

        let err = composer
            .compose(
                "1",
                &asset("uosmo", "osmosis-1", "uosmo", "osmosis-1"),
                "osmosis-1",
                &asset("uatom", "cosmoshub-4", "uatom", "cosmoshub-4"),
                "cosmoshub-4",
                &MockWallet::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SwapError::NoRoute { .. }));
        assert!(err.to_string().starts_with("No route found"));
    }

    #[tokio::test]
    async fn test_same_chain_evm_swap_without_path_is_no_route() {
        let mut evm = MockEvmQuoteApi::new();
        evm.expect_quote()
            .withf(|chain, req| {
                *chain == 9001
                    && req.token_in_addr == NATIVE.to_lowercase()
                    && req.token_out_addr == USDC_EVM.to_lowercase()
                    && req.from == format!("0x{}", USER_HEX)
                    && req.slippage_bps == 100
                    && req.max_split == 15
                    && !req.with_cycle
            })
            .times(1)
            .returning(|_, _| {
                Ok(QuoteResponse {
                    is_swap_path_exists: false,
                    dex_agg: None,
                })
            });
        let mut routing = MockRoutingApi::new();
        routing.expect_route().never();
        routing.expect_msgs().never();
        let composer = RouteComposer::new(Arc::new(routing), Arc::new(evm), registry(), params());

        let err = composer
            .compose(
                "1000000000000000000",
                &asset("aevmos", EVMOS, "aevmos", EVMOS),
                EVMOS,
                &asset("ibc/USDC", EVMOS, "uusdc", "noble-1"),
                EVMOS,
                &evmos_wallet(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, SwapError::NoSwapPath { .. }));
        assert!(err.to_string().starts_with("No route found"));
    }

    #[tokio::test]
    async fn test_same_chain_evm_swap_returns_evm_only_route() {
        let mut evm = MockEvmQuoteApi::new();
        evm.expect_quote().returning(|_, req| {
            Ok(QuoteResponse {
                is_swap_path_exists: true,
                dex_agg: Some(aggregate(&req.token_in_addr, &req.token_out_addr, &req.amount, "2500000")),
            })
        });
        let composer = RouteComposer::new(Arc::new(MockRoutingApi::new()), Arc::new(evm), registry(), params());

        let route = composer
            .compose(
                "1000",
                &asset("aevmos", EVMOS, "aevmos", EVMOS),
                EVMOS,
                &asset("ibc/USDC", EVMOS, "uusdc", "noble-1"),
                EVMOS,
                &evmos_wallet(),
            )
            .await
            .unwrap();

        assert_eq!(route.operations.len(), 1);
        assert!(route.operations[0].is_swap());
        assert_eq!(route.chain_ids, vec![EVMOS]);
        assert_eq!(route.estimated_amount_out.as_deref(), Some("2500000"));
        assert!(route.has_evm_leg());
        match &route.operations[0] {
            Operation::Swap(swap) => match &swap.kind {
                SwapKind::SwapIn(swap_in) => {
                    assert_eq!(swap_in.swap_venue.name, "evmos-dex");
                    assert_eq!(swap_in.swap_operations[0].denom_in, "aevmos");
                    assert_eq!(swap_in.swap_operations[0].denom_out, "ibc/USDC");
                }
                other => panic!("unexpected swap kind {:?}", other),
            },
            other => panic!("unexpected operation {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_composed_route_concatenates_evm_convert_and_cosmos_legs() {
        let mut evm = MockEvmQuoteApi::new();
        evm.expect_quote().returning(|_, req| {
            Ok(QuoteResponse {
                is_swap_path_exists: true,
                dex_agg: Some(aggregate(&req.token_in_addr, &req.token_out_addr, &req.amount, "2500000")),
            })
        });

        let mut routing = MockRoutingApi::new();
        routing.expect_assets().returning(|| {
            let mut map = HashMap::new();
            map.insert(
                EVMOS.to_string(),
                vec![
                    asset("aevmos", EVMOS, "aevmos", EVMOS),
                    asset("ibc/USDC", EVMOS, "uusdc", "noble-1"),
                ],
            );
            Ok(map)
        });
        routing
            .expect_route()
            .withf(|req| {
                req.source_asset_denom == "ibc/USDC"
                    && req.source_asset_chain_id == EVMOS
                    && req.amount_in == "2500000"
                    && req.dest_asset_chain_id == "osmosis-1"
            })
            .times(1)
            .returning(|req| {
                let mut route = transfer_route(
                    &req.amount_in,
                    (&req.source_asset_denom, EVMOS),
                    ("ibc/NOBLEUSDC", "noble-1"),
                );
                route.operations.push(Operation::Transfer(Transfer {
                    port: "transfer".into(),
                    channel: "channel-1".into(),
                    chain_id: "noble-1".into(),
                    pfm_enabled: true,
                    dest_denom: "ibc/OSMOUSDC".into(),
                }));
                route.chain_ids = vec![EVMOS.into(), "noble-1".into(), "osmosis-1".into()];
                route.estimated_amount_out = Some("2490000".into());
                Ok(route)
            });

        let composer = RouteComposer::new(Arc::new(routing), Arc::new(evm), registry(), params());
        let route = composer
            .compose(
                "1000",
                &asset("aevmos", EVMOS, "aevmos", EVMOS),
                EVMOS,
                &asset("ibc/OSMOUSDC", "osmosis-1", "uusdc", "noble-1"),
                "osmosis-1",
                &evmos_wallet(),
            )
            .await
            .unwrap();

        assert_eq!(route.operations.len(), 4);
        assert!(route.operations[0].is_swap());
        assert!(route.operations[1].is_erc20_convert());
        assert!(route.operations[2].is_transfer());
        assert!(route.operations[3].is_transfer());
        assert_eq!(route.chain_ids, vec![EVMOS, "noble-1", "osmosis-1"]);
        assert_eq!(route.amount_in, "1000");
        assert_eq!(route.estimated_amount_out.as_deref(), Some("2490000"));
        assert_eq!(route.cosmos_operations().len(), 2);

        let convert = route.erc20_convert().unwrap();
        assert_eq!(convert.convert_message.amount, "2500000");
        assert_eq!(convert.convert_message.receiver, evmos_user());
        assert_eq!(convert.convert_operation.denom, "ibc/USDC");
        assert_eq!(convert.convert_operation.venue.name, "evmos-dex");
    }

    #[tokio::test]
    async fn test_missing_dest_equivalent_on_evm_chain_is_no_route() {
        let mut routing = MockRoutingApi::new();
        routing.expect_assets().returning(|| Ok(HashMap::new()));
        let composer = RouteComposer::new(Arc::new(routing), Arc::new(MockEvmQuoteApi::new()), registry(), params());

        let err = composer
            .compose(
                "1000",
                &asset("aevmos", EVMOS, "aevmos", EVMOS),
                EVMOS,
                &asset("uatom", "cosmoshub-4", "uatom", "cosmoshub-4"),
                "cosmoshub-4",
                &evmos_wallet(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SwapError::NoRoute { .. }));
    }
}
