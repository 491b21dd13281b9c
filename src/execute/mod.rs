//! Execution engine
//!
//! Drives one route attempt: enable chains on the wallet, resolve addresses,
//! build messages, check fee balances for every message, then sign, broadcast
//! and track each message strictly in order. Progress is reported as
//! [`StepEvent`]s on a channel; dropping the receiver cancels the attempt.

pub mod funds;
pub mod prepared;
pub mod signing;
pub mod tracker;

pub use prepared::PreparedMessage;
pub use signing::{strategy_for, SigningStrategy};
pub use tracker::{StatusPoller, StepState, StepTracker};

use crate::config::ExecutionConfig;
use crate::error::{SwapError, SwapResult, WalletError};
use crate::messages::MessageBuilder;
use crate::metrics;
use crate::registry::ChainRegistry;
use crate::routing::{MultiChainMsg, RouteResponse, RoutingApi};
use crate::wallet::{Wallet, WalletAccount};

use signing::SigningContext;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Progress of one message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepEvent {
    Started { index: usize, chain_id: String },
    Broadcast { index: usize, chain_id: String, tx_hash: String },
    Succeeded { index: usize },
    Failed { index: usize, message: String },
}

/// How an execution attempt ended once the broadcast loop started
#[derive(Debug)]
pub enum ExecutionOutcome {
    /// Every message completed
    Completed { steps: usize },
    /// Message `index` failed; earlier messages stay completed
    Halted { index: usize, error: SwapError },
    /// The event receiver was dropped at message `index`
    Cancelled { index: usize },
}

/// How a single message ended
#[derive(Debug, PartialEq, Eq)]
enum StepResult {
    Completed,
    /// Broadcast, but the receiver was gone before tracking started
    Orphaned { tx_hash: String },
}

fn address_map(accounts: &HashMap<String, WalletAccount>) -> HashMap<String, String> {
    accounts
        .iter()
        .map(|(chain_id, account)| (chain_id.clone(), account.address.clone()))
        .collect()
}

/// Signs, broadcasts and tracks route messages
pub struct ExecutionEngine {
    routing: Arc<dyn RoutingApi>,
    registry: Arc<ChainRegistry>,
    builder: Arc<MessageBuilder>,
    config: ExecutionConfig,
}

impl ExecutionEngine {
    pub fn new(
        routing: Arc<dyn RoutingApi>,
        registry: Arc<ChainRegistry>,
        builder: Arc<MessageBuilder>,
        config: ExecutionConfig,
    ) -> Self {
        Self {
            routing,
            registry,
            builder,
            config,
        }
    }

    /// Execute `route` with `wallet`
    ///
    /// Failures before the first broadcast (wallet enable, address
    /// resolution, message building, fee check) are returned as `Err`.
    /// Failures of an individual message are reported as a
    /// [`StepEvent::Failed`] and an [`ExecutionOutcome::Halted`].
    pub async fn execute(
        &self,
        wallet: &dyn Wallet,
        route: &RouteResponse,
        events: mpsc::Sender<StepEvent>,
    ) -> SwapResult<ExecutionOutcome> {
        let span = info_span!("execution", id = %Uuid::new_v4());
        let result = self.run(wallet, route, events).instrument(span).await;

        match &result {
            Ok(ExecutionOutcome::Completed { .. }) => metrics::record_execution("completed"),
            Ok(ExecutionOutcome::Halted { .. }) => metrics::record_execution("halted"),
            Ok(ExecutionOutcome::Cancelled { .. }) => metrics::record_execution("cancelled"),
            Err(_) => metrics::record_execution("rejected"),
        }
        result
    }

    async fn run(
        &self,
        wallet: &dyn Wallet,
        route: &RouteResponse,
        events: mpsc::Sender<StepEvent>,
    ) -> SwapResult<ExecutionOutcome> {
        info!(
            "Executing route {} -> {} over {:?}",
            route.source_asset_chain_id, route.dest_asset_chain_id, route.chain_ids
        );

        self.enable_chains(wallet, &route.chain_ids).await?;
        let mut accounts = self.resolve_accounts(wallet, &route.chain_ids).await?;

        let msgs = self.builder.build(route, &address_map(&accounts), wallet).await?;
        for msg in &msgs {
            if !accounts.contains_key(&msg.chain_id) {
                let account = wallet.get_account(&msg.chain_id).await?;
                accounts.insert(msg.chain_id.clone(), account);
            }
        }
        let addresses = address_map(&accounts);

        let prepared = msgs
            .into_iter()
            .map(|msg| PreparedMessage::decode(&msg).map(|p| (msg, p)))
            .collect::<SwapResult<Vec<_>>>()?;

        funds::check_funds(&self.registry, route, &prepared, &addresses, &self.config).await?;
        info!("Fee check passed for {} messages", prepared.len());

        let mut tracker = StepTracker::new(prepared.len());
        for (index, (msg, message)) in prepared.iter().enumerate() {
            tracker.start(index);
            let started = StepEvent::Started {
                index,
                chain_id: msg.chain_id.clone(),
            };
            if events.send(started).await.is_err() {
                tracker.abort();
                info!("Event receiver dropped, cancelling before step {}", index);
                return Ok(ExecutionOutcome::Cancelled { index });
            }

            let step_started = Instant::now();
            let account = &accounts[&msg.chain_id];
            match self.run_step(wallet, route, index, msg, message, account, &events).await {
                Ok(StepResult::Orphaned { tx_hash }) => {
                    tracker.abort();
                    warn!(
                        "Event receiver dropped after step {} broadcast {} on {}, not tracking it",
                        index, tx_hash, msg.chain_id
                    );
                    return Ok(ExecutionOutcome::Cancelled { index });
                }
                Ok(StepResult::Completed) => {
                    tracker.succeed(index);
                    metrics::record_step_completed(&msg.chain_id, step_started.elapsed().as_secs_f64());
                    info!("Step {} on {} completed", index, msg.chain_id);
                    if events.send(StepEvent::Succeeded { index }).await.is_err() {
                        return Ok(ExecutionOutcome::Cancelled { index: index + 1 });
                    }
                }
                Err(e) => {
                    tracker.abort();
                    metrics::record_step_failed(&msg.chain_id);
                    error!("Step {} on {} failed: {}", index, msg.chain_id, e);
                    debug!("Step states after failure: {:?}", tracker.states());
                    // A closed channel here changes nothing, the attempt is over
                    let _ = events
                        .send(StepEvent::Failed {
                            index,
                            message: e.to_string(),
                        })
                        .await;
                    return Ok(ExecutionOutcome::Halted { index, error: e });
                }
            }
        }

        info!("Route executed in {} steps", prepared.len());
        Ok(ExecutionOutcome::Completed {
            steps: prepared.len(),
        })
    }

    /// Offer chain records, then enable, preferring the generic capability
    async fn enable_chains(&self, wallet: &dyn Wallet, chain_ids: &[String]) -> SwapResult<()> {
        for chain_id in chain_ids {
            let chain = self.registry.chain(chain_id)?;
            match wallet.add_chain(chain_id, chain).await {
                Ok(()) | Err(WalletError::Unsupported(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }

        match wallet.enable(chain_ids).await {
            Ok(()) => Ok(()),
            Err(WalletError::Unsupported(_)) => match wallet.enable_via_extension(chain_ids).await {
                Ok(()) => Ok(()),
                Err(WalletError::Unsupported(_)) => Err(SwapError::UnsupportedWallet(
                    "wallet can not enable chains".to_string(),
                )),
                Err(e) => Err(e.into()),
            },
            Err(e) => Err(e.into()),
        }
    }

    async fn resolve_accounts(
        &self,
        wallet: &dyn Wallet,
        chain_ids: &[String],
    ) -> SwapResult<HashMap<String, WalletAccount>> {
        let mut accounts = HashMap::with_capacity(chain_ids.len());
        for chain_id in chain_ids {
            accounts.insert(chain_id.clone(), wallet.get_account(chain_id).await?);
        }
        Ok(accounts)
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_step(
        &self,
        wallet: &dyn Wallet,
        route: &RouteResponse,
        index: usize,
        msg: &MultiChainMsg,
        message: &PreparedMessage,
        account: &WalletAccount,
        events: &mpsc::Sender<StepEvent>,
    ) -> SwapResult<StepResult> {
        let chain_id = msg.chain_id.as_str();
        let is_ledger = wallet.is_ledger(chain_id).await?;
        let client = self.registry.client(chain_id).await?;
        let fee_token = self.registry.fee_token(chain_id)?;
        let strategy = strategy_for(self.registry.signing_kind(chain_id)?);

        let ctx = SigningContext {
            chain_id,
            account,
            wallet,
            client: client.as_ref(),
            is_ledger,
            gas_needed: funds::gas_needed(route, chain_id, &self.config),
            fee_token,
            config: &self.config,
        };

        let doc = strategy.build_sign_doc(&ctx, message).await?;
        let tx_bytes = strategy.sign(&ctx, doc).await?;
        let response = strategy.broadcast(&ctx, tx_bytes).await?;
        if !response.is_ok() {
            return Err(SwapError::Broadcast {
                chain_id: chain_id.to_string(),
                code: response.code,
                log: response.raw_log,
            });
        }
        metrics::record_step_submitted(chain_id);
        info!(
            "Step {} broadcast on {} via {} signer: {}",
            index,
            chain_id,
            strategy.name(),
            response.tx_hash
        );

        let broadcast = StepEvent::Broadcast {
            index,
            chain_id: chain_id.to_string(),
            tx_hash: response.tx_hash.clone(),
        };
        if events.send(broadcast).await.is_err() {
            return Ok(StepResult::Orphaned {
                tx_hash: response.tx_hash,
            });
        }

        let poller = StatusPoller::new(
            self.routing.as_ref(),
            Duration::from_millis(self.config.poll_interval_ms),
            self.config.max_wait_secs.map(Duration::from_secs),
        );
        poller.track(&response.tx_hash, chain_id).await?;
        Ok(StepResult::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{AccountInfo, BroadcastResponse, MockChainQuery};
    use crate::compose::tests::{params, registry, transfer_route};
    use crate::config::tests::SAMPLE;
    use crate::config::Settings;
    use crate::evm::{MockEvmQuoteApi, MockEvmRpc};
    use crate::routing::{MockRoutingApi, Packet, PacketError, StatusState, TxStatusResponse};
    use crate::wallet::{LocalKeyWallet, MockWallet};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn wallet() -> LocalKeyWallet {
        let settings = Settings::from_toml(SAMPLE).unwrap();
        LocalKeyWallet::from_hex(KEY, &settings.chains).unwrap()
    }

    fn transfer_msg(chain_id: &str, denom: &str, amount: &str) -> MultiChainMsg {
        MultiChainMsg {
            chain_id: chain_id.into(),
            path: vec![chain_id.into(), "cosmoshub-4".into()],
            msg: format!(
                r#"{{"source_port":"transfer","source_channel":"channel-0","token":{{"denom":"{}","amount":"{}"}},
                    "sender":"sender","receiver":"receiver","timeout_height":{{}},"timeout_timestamp":1693222298030492937}}"#,
                denom, amount
            ),
            msg_type_url: "/ibc.applications.transfer.v1.MsgTransfer".into(),
        }
    }

    fn status(state: StatusState, packet_error: Option<(i64, &str)>) -> TxStatusResponse {
        TxStatusResponse {
            status: state,
            error: None,
            packets: packet_error
                .map(|(code, message)| {
                    vec![Packet {
                        error: Some(PacketError {
                            code,
                            message: message.into(),
                        }),
                        ..Default::default()
                    }]
                })
                .unwrap_or_default(),
        }
    }

    /// Chain client that funds everything and hands out TX1, TX2, ...
    fn funded_client(balance: u128, broadcasts: Arc<AtomicUsize>) -> MockChainQuery {
        let mut client = MockChainQuery::new();
        client.expect_balance().returning(move |_, _| Ok(balance));
        client.expect_account().returning(|_| {
            Ok(AccountInfo {
                account_number: 1,
                sequence: 0,
            })
        });
        client.expect_simulate().returning(|_| Ok(100_000));
        client.expect_broadcast().returning(move |_, _| {
            let n = broadcasts.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(BroadcastResponse {
                tx_hash: format!("TX{}", n),
                code: 0,
                raw_log: String::new(),
            })
        });
        client
    }

    fn engine(routing: MockRoutingApi, registry: Arc<ChainRegistry>) -> ExecutionEngine {
        let routing: Arc<dyn RoutingApi> = Arc::new(routing);
        let builder = MessageBuilder::new(
            routing.clone(),
            Arc::new(MockEvmQuoteApi::new()),
            Arc::new(MockEvmRpc::new()),
            registry.clone(),
            "5.0",
            250_000_000_000,
            params(),
        );
        ExecutionEngine::new(routing, registry, Arc::new(builder), ExecutionConfig::default())
    }

    fn drain(rx: &mut mpsc::Receiver<StepEvent>) -> Vec<StepEvent> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            out.push(event);
        }
        out
    }

    #[tokio::test]
    async fn test_insufficient_funds_on_any_message_blocks_all_broadcasts() {
        let registry = registry();
        let broadcasts = Arc::new(AtomicUsize::new(0));
        registry.install_client("osmosis-1", Arc::new(funded_client(10_000_000, broadcasts.clone())));
        // cosmoshub has 100 uatom against 7500 needed for gas
        registry.install_client("cosmoshub-4", Arc::new(funded_client(100, broadcasts.clone())));

        let mut routing = MockRoutingApi::new();
        routing.expect_msgs().returning(|_| {
            Ok(vec![
                transfer_msg("osmosis-1", "uosmo", "1000000"),
                transfer_msg("cosmoshub-4", "ibc/OSMO", "1000000"),
            ])
        });
        routing.expect_track().never();

        let route = transfer_route("1000000", ("uosmo", "osmosis-1"), ("uatom", "cosmoshub-4"));
        let (tx, mut rx) = mpsc::channel(16);
        let err = engine(routing, registry)
            .execute(&wallet(), &route, tx)
            .await
            .unwrap_err();

        match &err {
            SwapError::InsufficientFunds {
                chain_id,
                required,
                available,
                denom,
            } => {
                assert_eq!(chain_id, "cosmoshub-4");
                assert_eq!(*required, 7_500);
                assert_eq!(*available, 100);
                assert_eq!(denom, "uatom");
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert!(err.to_string().starts_with("Insufficient fee token to initiate transfer on cosmoshub-4"));
        assert_eq!(broadcasts.load(Ordering::SeqCst), 0);
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_step_blocks_later_messages() {
        let registry = registry();
        let broadcasts = Arc::new(AtomicUsize::new(0));
        registry.install_client("osmosis-1", Arc::new(funded_client(1_000_000_000, broadcasts.clone())));

        let mut routing = MockRoutingApi::new();
        routing.expect_msgs().returning(|_| {
            Ok(vec![
                transfer_msg("osmosis-1", "ibc/A", "1"),
                transfer_msg("osmosis-1", "ibc/B", "2"),
                transfer_msg("osmosis-1", "ibc/C", "3"),
            ])
        });
        routing.expect_track().returning(|_, _| Ok(()));
        routing.expect_status().returning(|hash, _| {
            Ok(match hash {
                "TX1" => status(StatusState::Completed, None),
                _ => status(StatusState::Pending, None),
            })
        });

        let mut route = transfer_route("1", ("ibc/A", "osmosis-1"), ("uatom", "cosmoshub-4"));
        route.chain_ids = vec!["osmosis-1".into()];
        let (tx, mut rx) = mpsc::channel(16);
        let engine = engine(routing, registry);
        let wallet = wallet();

        let result = tokio::time::timeout(Duration::from_secs(3_600), engine.execute(&wallet, &route, tx)).await;
        assert!(result.is_err(), "execution must still be polling step 2");

        assert_eq!(broadcasts.load(Ordering::SeqCst), 2);
        let events = drain(&mut rx);
        assert_eq!(
            events,
            vec![
                StepEvent::Started {
                    index: 0,
                    chain_id: "osmosis-1".into()
                },
                StepEvent::Broadcast {
                    index: 0,
                    chain_id: "osmosis-1".into(),
                    tx_hash: "TX1".into()
                },
                StepEvent::Succeeded { index: 0 },
                StepEvent::Started {
                    index: 1,
                    chain_id: "osmosis-1".into()
                },
                StepEvent::Broadcast {
                    index: 1,
                    chain_id: "osmosis-1".into(),
                    tx_hash: "TX2".into()
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_packet_error_halts_with_relayer_message() {
        let registry = registry();
        let broadcasts = Arc::new(AtomicUsize::new(0));
        registry.install_client("osmosis-1", Arc::new(funded_client(1_000_000_000, broadcasts.clone())));

        let mut routing = MockRoutingApi::new();
        routing
            .expect_msgs()
            .returning(|_| Ok(vec![transfer_msg("osmosis-1", "ibc/ATOM", "500")]));
        routing.expect_track().times(1).returning(|_, _| Ok(()));
        routing
            .expect_status()
            .returning(|_, _| Ok(status(StatusState::Completed, Some((1008, "timeout")))));

        let mut route = transfer_route("500", ("ibc/ATOM", "osmosis-1"), ("uatom", "cosmoshub-4"));
        route.does_swap = true;
        let (tx, mut rx) = mpsc::channel(16);
        let outcome = engine(routing, registry).execute(&wallet(), &route, tx).await.unwrap();

        match outcome {
            ExecutionOutcome::Halted { index, error } => {
                assert_eq!(index, 0);
                assert!(matches!(error, SwapError::PacketError { code: 1008, .. }));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        let events = drain(&mut rx);
        assert!(!events.iter().any(|e| matches!(e, StepEvent::Succeeded { .. })));
        assert_eq!(
            events.last(),
            Some(&StepEvent::Failed {
                index: 0,
                message: "timeout".into()
            })
        );
    }

    #[tokio::test]
    async fn test_completed_route_reports_every_step() {
        let registry = registry();
        let broadcasts = Arc::new(AtomicUsize::new(0));
        registry.install_client("osmosis-1", Arc::new(funded_client(1_000_000_000, broadcasts.clone())));

        let mut routing = MockRoutingApi::new();
        routing
            .expect_msgs()
            .returning(|_| Ok(vec![transfer_msg("osmosis-1", "uosmo", "1000000")]));
        routing.expect_track().returning(|_, _| Ok(()));
        routing
            .expect_status()
            .returning(|_, _| Ok(status(StatusState::Completed, None)));

        let route = transfer_route("1000000", ("uosmo", "osmosis-1"), ("uatom", "cosmoshub-4"));
        let (tx, mut rx) = mpsc::channel(16);
        let outcome = engine(routing, registry).execute(&wallet(), &route, tx).await.unwrap();

        assert!(matches!(outcome, ExecutionOutcome::Completed { steps: 1 }));
        assert_eq!(drain(&mut rx).last(), Some(&StepEvent::Succeeded { index: 0 }));
    }

    #[tokio::test]
    async fn test_wallet_without_enable_is_unsupported() {
        let mut wallet = MockWallet::new();
        wallet
            .expect_add_chain()
            .returning(|_, _| Err(WalletError::Unsupported("add chain")));
        wallet
            .expect_enable()
            .returning(|_| Err(WalletError::Unsupported("enable")));
        wallet
            .expect_enable_via_extension()
            .returning(|_| Err(WalletError::Unsupported("extension enable")));
        wallet.expect_get_account().never();

        let mut routing = MockRoutingApi::new();
        routing.expect_msgs().never();
        let route = transfer_route("1", ("uosmo", "osmosis-1"), ("uatom", "cosmoshub-4"));
        let (tx, _rx) = mpsc::channel(16);

        let err = engine(routing, registry())
            .execute(&wallet, &route, tx)
            .await
            .unwrap_err();
        assert!(matches!(err, SwapError::UnsupportedWallet(_)));
    }

    #[tokio::test]
    async fn test_extension_enable_is_used_when_generic_is_missing() {
        let mut wallet = MockWallet::new();
        wallet
            .expect_add_chain()
            .returning(|_, _| Err(WalletError::Unsupported("add chain")));
        wallet
            .expect_enable()
            .returning(|_| Err(WalletError::Unsupported("enable")));
        wallet.expect_enable_via_extension().times(1).returning(|_| Ok(()));
        wallet
            .expect_get_account()
            .returning(|chain_id| Err(WalletError::NoAccount(chain_id.to_string())));

        let route = transfer_route("1", ("uosmo", "osmosis-1"), ("uatom", "cosmoshub-4"));
        let (tx, _rx) = mpsc::channel(16);
        let err = engine(MockRoutingApi::new(), registry())
            .execute(&wallet, &route, tx)
            .await
            .unwrap_err();
        assert!(matches!(err, SwapError::Wallet(_)));
    }

    #[tokio::test]
    async fn test_dropped_receiver_cancels_before_first_step() {
        let registry = registry();
        let broadcasts = Arc::new(AtomicUsize::new(0));
        registry.install_client("osmosis-1", Arc::new(funded_client(1_000_000_000, broadcasts.clone())));

        let mut routing = MockRoutingApi::new();
        routing
            .expect_msgs()
            .returning(|_| Ok(vec![transfer_msg("osmosis-1", "uosmo", "1")]));

        let mut route = transfer_route("1", ("uosmo", "osmosis-1"), ("uatom", "cosmoshub-4"));
        route.chain_ids = vec!["osmosis-1".into()];
        let (tx, rx) = mpsc::channel(16);
        drop(rx);

        let outcome = engine(routing, registry)
            .execute(&wallet(), &route, tx)
            .await
            .unwrap();
        assert!(matches!(outcome, ExecutionOutcome::Cancelled { index: 0 }));
        assert_eq!(broadcasts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_receiver_dropped_after_start_cancels_without_tracking() {
        let registry = registry();
        let broadcasts = Arc::new(AtomicUsize::new(0));
        registry.install_client("osmosis-1", Arc::new(funded_client(1_000_000_000, broadcasts.clone())));

        let mut routing = MockRoutingApi::new();
        routing
            .expect_msgs()
            .returning(|_| Ok(vec![transfer_msg("osmosis-1", "uosmo", "1")]));
        routing.expect_track().never();
        routing.expect_status().never();

        let mut route = transfer_route("1", ("uosmo", "osmosis-1"), ("uatom", "cosmoshub-4"));
        route.chain_ids = vec!["osmosis-1".into()];
        let (tx, mut rx) = mpsc::channel(1);
        let reader = tokio::spawn(async move { rx.recv().await });

        let outcome = engine(routing, registry)
            .execute(&wallet(), &route, tx)
            .await
            .unwrap();

        assert!(matches!(outcome, ExecutionOutcome::Cancelled { index: 0 }));
        assert_eq!(broadcasts.load(Ordering::SeqCst), 1);
        assert_eq!(
            reader.await.unwrap(),
            Some(StepEvent::Started {
                index: 0,
                chain_id: "osmosis-1".into()
            })
        );
    }

    #[tokio::test]
    async fn test_underfunded_first_message_blocks_all_broadcasts() {
        let registry = registry();
        let broadcasts = Arc::new(AtomicUsize::new(0));
        registry.install_client("osmosis-1", Arc::new(funded_client(100, broadcasts.clone())));
        registry.install_client("cosmoshub-4", Arc::new(funded_client(10_000_000, broadcasts.clone())));

        let mut routing = MockRoutingApi::new();
        routing.expect_msgs().returning(|_| {
            Ok(vec![
                transfer_msg("osmosis-1", "uosmo", "1000000"),
                transfer_msg("cosmoshub-4", "ibc/OSMO", "1000000"),
            ])
        });
        routing.expect_track().never();

        let route = transfer_route("1000000", ("uosmo", "osmosis-1"), ("uatom", "cosmoshub-4"));
        let (tx, mut rx) = mpsc::channel(16);
        let err = engine(routing, registry)
            .execute(&wallet(), &route, tx)
            .await
            .unwrap_err();

        match err {
            SwapError::InsufficientFunds {
                chain_id,
                required,
                available,
                ..
            } => {
                assert_eq!(chain_id, "osmosis-1");
                // 300000 gas at 0.025 plus the transferred uosmo
                assert_eq!(required, 1_007_500);
                assert_eq!(available, 100);
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(broadcasts.load(Ordering::SeqCst), 0);
        assert!(drain(&mut rx).is_empty());
    }
}
