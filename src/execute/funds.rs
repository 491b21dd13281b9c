//! Pre-flight fee balance check
//!
//! Runs over every message before the first signature so a route never
//! stops half way for lack of fee tokens.

use super::prepared::PreparedMessage;
use crate::config::ExecutionConfig;
use crate::error::{SwapError, SwapResult};
use crate::metrics;
use crate::registry::ChainRegistry;
use crate::routing::{MultiChainMsg, Operation, RouteResponse};

use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Chains on which the route swaps
fn swap_chains(route: &RouteResponse) -> HashSet<&str> {
    let mut chains: HashSet<&str> = route
        .operations
        .iter()
        .filter_map(|op| match op {
            Operation::Swap(swap) => Some(swap.venue().chain_id.as_str()),
            _ => None,
        })
        .collect();
    if route.does_swap {
        if let Some(venue) = &route.swap_venue {
            chains.insert(venue.chain_id.as_str());
        }
    }
    chains
}

/// Gas budget of a message on `chain_id`
pub fn gas_needed(route: &RouteResponse, chain_id: &str, config: &ExecutionConfig) -> u64 {
    if swap_chains(route).contains(chain_id) {
        config.swap_gas
    } else {
        config.transfer_gas
    }
}

/// Fee tokens a message needs: gas at the average price plus any fee-denom outflow
pub fn required_amount(
    msg: &PreparedMessage,
    fee_denom: &str,
    average_gas_price: Option<f64>,
    gas: u64,
) -> SwapResult<u128> {
    let gas_cost = (average_gas_price.unwrap_or(0.0) * gas as f64).ceil() as u128;
    Ok(gas_cost.saturating_add(msg.outflow(fee_denom)?))
}

/// Fail with [`SwapError::InsufficientFunds`] if any message is underfunded
pub async fn check_funds(
    registry: &ChainRegistry,
    route: &RouteResponse,
    msgs: &[(MultiChainMsg, PreparedMessage)],
    addresses: &HashMap<String, String>,
    config: &ExecutionConfig,
) -> SwapResult<()> {
    for (msg, prepared) in msgs {
        let chain_id = msg.chain_id.as_str();
        let fee = registry.fee_token(chain_id)?;
        let address = addresses
            .get(chain_id)
            .ok_or_else(|| SwapError::Wallet(format!("no address for chain {}", chain_id)))?;

        let gas = gas_needed(route, chain_id, config);
        let required = required_amount(prepared, &fee.denom, fee.average_gas_price, gas)?;
        let available = registry.client(chain_id).await?.balance(address, &fee.denom).await?;
        debug!(
            "Fee check on {}: need {} {}, have {}",
            chain_id, required, fee.denom, available
        );

        if available < required {
            warn!(
                "Insufficient {} on {}: need {}, have {}",
                fee.denom, chain_id, required, available
            );
            metrics::record_funds_check_failure(chain_id);
            return Err(SwapError::InsufficientFunds {
                chain_id: chain_id.to_string(),
                required,
                available,
                denom: fee.denom.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::proto::{Coin, MsgTransfer};
    use crate::compose::tests::transfer_route;
    use crate::routing::{Swap, SwapIn, SwapKind, SwapVenue};

    fn transfer(denom: &str, amount: &str) -> PreparedMessage {
        PreparedMessage::IbcTransfer(MsgTransfer {
            token: Some(Coin {
                denom: denom.into(),
                amount: amount.into(),
            }),
            ..Default::default()
        })
    }

    #[test]
    fn test_swap_hop_gets_swap_gas() {
        let config = ExecutionConfig::default();
        let mut route = transfer_route("1", ("uatom", "cosmoshub-4"), ("uosmo", "osmosis-1"));
        assert_eq!(gas_needed(&route, "osmosis-1", &config), 300_000);

        route.does_swap = true;
        route.operations.push(Operation::Swap(Swap {
            kind: SwapKind::SwapIn(SwapIn {
                swap_venue: SwapVenue {
                    name: "osmosis-poolmanager".into(),
                    chain_id: "osmosis-1".into(),
                },
                swap_operations: vec![],
                swap_amount_in: None,
            }),
            estimated_affiliate_fee: None,
        }));
        assert_eq!(gas_needed(&route, "osmosis-1", &config), 1_500_000);
        assert_eq!(gas_needed(&route, "cosmoshub-4", &config), 300_000);
    }

    #[test]
    fn test_required_amount_adds_fee_denom_outflow() {
        let native = transfer("uosmo", "1000000");
        let other = transfer("uatom", "1000000");
        assert_eq!(required_amount(&native, "uosmo", Some(0.025), 300_000).unwrap(), 1_007_500);
        assert_eq!(required_amount(&other, "uosmo", Some(0.025), 300_000).unwrap(), 7_500);
        assert_eq!(required_amount(&other, "uosmo", None, 300_000).unwrap(), 0);
    }
}
