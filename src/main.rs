//! Route orchestrator CLI - quote, execute and serve cross-chain swaps
//!
//! Routes may cross IBC channels, CosmWasm swap venues and the EVM execution
//! extension of Cosmos chains.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use ibc_route_orchestrator::api::{self, AppState};
use ibc_route_orchestrator::compose::{QuoteParams, RouteComposer};
use ibc_route_orchestrator::config::Settings;
use ibc_route_orchestrator::evm::{EthersEvmRpc, EvmQuoteClient};
use ibc_route_orchestrator::execute::{ExecutionEngine, ExecutionOutcome, StepEvent};
use ibc_route_orchestrator::messages::MessageBuilder;
use ibc_route_orchestrator::metrics::MetricsServer;
use ibc_route_orchestrator::registry::{display_assets, find_asset, native_assets, ChainRegistry};
use ibc_route_orchestrator::routing::{RouteResponse, RoutingApi, RoutingClient};
use ibc_route_orchestrator::state::SourceChainStore;
use ibc_route_orchestrator::wallet::{LocalKeyWallet, Wallet, WatchOnlyWallet};

#[derive(Parser)]
#[command(name = "ibc-route-orchestrator", version, about)]
struct Cli {
    /// Configuration file; defaults to ORCHESTRATOR_CONFIG or config/default.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List chains supported by the routing service
    Chains,
    /// List assets with display metadata
    Assets {
        /// Only assets listed on this chain
        #[arg(long)]
        chain: Option<String>,
        /// Only assets issued on the chain they are listed on
        #[arg(long)]
        native: bool,
    },
    /// Quote a route
    Route(RouteArgs),
    /// Quote and execute a route with a local key
    Execute {
        #[command(flatten)]
        route: RouteArgs,
        #[arg(long, env = "ORCHESTRATOR_PRIVATE_KEY", hide_env_values = true)]
        private_key: String,
    },
    /// Run the HTTP API (and metrics server when enabled)
    Serve,
}

#[derive(Args)]
struct RouteArgs {
    /// Amount in base units of the source asset
    #[arg(long)]
    amount: String,
    #[arg(long)]
    source_denom: String,
    /// Defaults to the last used source chain
    #[arg(long)]
    source_chain: Option<String>,
    #[arg(long)]
    dest_denom: String,
    #[arg(long)]
    dest_chain: String,
    /// User address as chain_id=address, needed to quote EVM legs
    #[arg(long = "address", value_parser = parse_address)]
    addresses: Vec<(String, String)>,
}

fn parse_address(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(chain, address)| (chain.to_string(), address.to_string()))
        .ok_or_else(|| format!("expected chain_id=address, got {}", raw))
}

/// Clients and services shared by all commands
struct Services {
    settings: Settings,
    registry: Arc<ChainRegistry>,
    routing: Arc<dyn RoutingApi>,
    composer: Arc<RouteComposer>,
    builder: Arc<MessageBuilder>,
}

impl Services {
    fn new(settings: Settings) -> Result<Self> {
        let registry = Arc::new(ChainRegistry::from_settings(&settings).context("Failed to build chain registry")?);
        let routing: Arc<dyn RoutingApi> =
            Arc::new(RoutingClient::new(&settings.routing).context("Failed to create routing client")?);
        let evm = Arc::new(EvmQuoteClient::new(&settings.evm_quote).context("Failed to create EVM quote client")?);
        let evm_rpc = Arc::new(EthersEvmRpc::new(&settings).context("Failed to create EVM RPC providers")?);
        let params = QuoteParams::from(&settings.evm_quote);

        let composer = Arc::new(RouteComposer::new(
            routing.clone(),
            evm.clone(),
            registry.clone(),
            params.clone(),
        ));
        let builder = Arc::new(MessageBuilder::new(
            routing.clone(),
            evm,
            evm_rpc,
            registry.clone(),
            settings.routing.slippage_tolerance_percent.clone(),
            settings.execution.evm_fallback_gas_price_wei,
            params,
        ));

        Ok(Self {
            settings,
            registry,
            routing,
            composer,
            builder,
        })
    }

    async fn compose(&self, args: &RouteArgs, wallet: &dyn Wallet) -> Result<RouteResponse> {
        let store = SourceChainStore::new(&self.settings.state);
        let source_chain = args.source_chain.clone().unwrap_or_else(|| store.load());
        self.registry.chain(&source_chain)?;

        let assets = self.routing.assets().await?;
        let source = find_asset(&assets, &args.source_denom, &source_chain)
            .with_context(|| format!("Unknown asset {} on {}", args.source_denom, source_chain))?;
        let dest = find_asset(&assets, &args.dest_denom, &args.dest_chain)
            .with_context(|| format!("Unknown asset {} on {}", args.dest_denom, args.dest_chain))?;

        let route = self
            .composer
            .compose(&args.amount, source, &source_chain, dest, &args.dest_chain, wallet)
            .await?;

        if let Err(e) = store.save(&source_chain) {
            warn!("Failed to remember source chain: {}", e);
        }
        Ok(route)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.json);

    let settings = match &cli.config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };
    info!("Loaded configuration for {} chains", settings.chains.len());
    let services = Services::new(settings)?;

    match cli.command {
        Command::Chains => {
            let chains = services.routing.chains().await?;
            print_json(&chains)?;
        }
        Command::Assets { chain, native } => {
            let assets = services.routing.assets().await?;
            let names = services.registry.pretty_names();
            let listed = if native {
                native_assets(&assets)
            } else {
                assets.values().flat_map(|list| display_assets(list, &names)).collect()
            };
            let listed: Vec<_> = listed
                .into_iter()
                .filter(|a| chain.as_deref().map_or(true, |c| c == a.chain_id))
                .collect();
            print_json(&listed)?;
        }
        Command::Route(args) => {
            let wallet = WatchOnlyWallet::new(args.addresses.iter().cloned().collect());
            let route = services.compose(&args, &wallet).await?;
            let transactions = services.builder.transaction_count(&route).await?;
            print_json(&RouteSummary { route, transactions })?;
        }
        Command::Execute { route, private_key } => {
            execute(&services, &route, &private_key).await?;
        }
        Command::Serve => serve(services).await?,
    }

    Ok(())
}

#[derive(Serialize)]
struct RouteSummary {
    route: RouteResponse,
    transactions: usize,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn execute(services: &Services, args: &RouteArgs, private_key: &str) -> Result<()> {
    let wallet = LocalKeyWallet::from_hex(private_key, &services.settings.chains)
        .context("Failed to load private key")?;
    let route = services.compose(args, &wallet).await?;
    info!(
        "Executing {} {} on {} -> {} on {} ({} chains)",
        route.amount_in,
        route.source_asset_denom,
        route.source_asset_chain_id,
        route.dest_asset_denom,
        route.dest_asset_chain_id,
        route.chain_ids.len()
    );

    let engine = ExecutionEngine::new(
        services.routing.clone(),
        services.registry.clone(),
        services.builder.clone(),
        services.settings.execution.clone(),
    );

    let (tx, mut rx) = mpsc::channel(16);
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                StepEvent::Started { index, chain_id } => println!("[{}] signing on {}", index, chain_id),
                StepEvent::Broadcast { index, chain_id, tx_hash } => {
                    println!("[{}] broadcast {} on {}", index, tx_hash, chain_id)
                }
                StepEvent::Succeeded { index } => println!("[{}] completed", index),
                StepEvent::Failed { index, message } => println!("[{}] failed: {}", index, message),
            }
        }
    });

    let outcome = tokio::select! {
        outcome = engine.execute(&wallet, &route, tx) => outcome,
        _ = shutdown_signal() => {
            warn!("Interrupted, abandoning execution");
            printer.abort();
            return Ok(());
        }
    };
    let _ = printer.await;

    match outcome.map_err(|e| anyhow::anyhow!(e.user_message()))? {
        ExecutionOutcome::Completed { steps } => {
            info!("Route completed in {} transactions", steps);
            Ok(())
        }
        ExecutionOutcome::Halted { index, error } => {
            anyhow::bail!("Transaction {} failed: {}", index, error.user_message())
        }
        ExecutionOutcome::Cancelled { index } => {
            anyhow::bail!("Execution cancelled before transaction {}", index)
        }
    }
}

async fn serve(services: Services) -> Result<()> {
    let settings = services.settings.clone();
    let state = AppState::new(
        services.registry.clone(),
        services.routing.clone(),
        services.composer.clone(),
        services.builder.clone(),
    );

    let api_handle = tokio::spawn({
        let config = settings.api.clone();
        async move {
            if let Err(e) = api::run_server(config, state).await {
                error!("API server error: {}", e);
            }
        }
    });

    let metrics_handle = if settings.metrics.enabled {
        let server = MetricsServer::new(settings.metrics.port);
        Some(tokio::spawn(async move {
            if let Err(e) = server.run().await {
                error!("Metrics server error: {}", e);
            }
        }))
    } else {
        None
    };

    info!("API server: http://{}:{}", settings.api.host, settings.api.port);
    if settings.metrics.enabled {
        info!("Metrics: http://0.0.0.0:{}/metrics", settings.metrics.port);
    }

    shutdown_signal().await;
    info!("Shutdown signal received, stopping...");

    api_handle.abort();
    if let Some(h) = metrics_handle {
        h.abort();
    }
    Ok(())
}

fn init_logging(json: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info,ibc_route_orchestrator=debug,hyper=warn,reqwest=warn")
    });

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json().with_target(true)).init();
    } else {
        registry.with(fmt::layer().with_target(true)).init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
