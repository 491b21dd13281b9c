//! HTTP API for a web front end: chains, assets, route quotes and transaction counts

use crate::cache::{LatestIntent, QueryCache};
use crate::compose::RouteComposer;
use crate::config::ApiConfig;
use crate::error::{ErrorCategory, SwapError, SwapResult};
use crate::messages::MessageBuilder;
use crate::registry::{display_assets, find_asset, ChainRegistry};
use crate::routing::{Asset, Chain, RouteResponse, RoutingApi};
use crate::wallet::watch::WatchOnlyWallet;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

/// Quotes are reused for this long before the routing services are asked again
const ROUTE_TTL: Duration = Duration::from_secs(30);
const ASSETS_TTL: Duration = Duration::from_secs(300);

/// Route quote parameters; also the cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RouteQuery {
    pub amount_in: String,
    pub source_asset_denom: String,
    pub source_asset_chain_id: String,
    pub dest_asset_denom: String,
    pub dest_asset_chain_id: String,
    /// User addresses by chain id, needed for routes with an EVM leg
    #[serde(default)]
    pub addresses: BTreeMap<String, String>,
}

type AssetMap = HashMap<String, Vec<Asset>>;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ChainRegistry>,
    pub routing: Arc<dyn RoutingApi>,
    pub composer: Arc<RouteComposer>,
    pub builder: Arc<MessageBuilder>,
    routes: Arc<QueryCache<RouteQuery, RouteResponse>>,
    assets: Arc<QueryCache<(), AssetMap>>,
    latest: Arc<LatestIntent<RouteQuery, RouteResponse>>,
}

impl AppState {
    pub fn new(
        registry: Arc<ChainRegistry>,
        routing: Arc<dyn RoutingApi>,
        composer: Arc<RouteComposer>,
        builder: Arc<MessageBuilder>,
    ) -> Self {
        Self {
            registry,
            routing,
            composer,
            builder,
            routes: Arc::new(QueryCache::new(ROUTE_TTL)),
            assets: Arc::new(QueryCache::new(ASSETS_TTL)),
            latest: Arc::new(LatestIntent::new()),
        }
    }

    async fn asset_map(&self) -> Result<AssetMap, ApiError> {
        let routing = self.routing.clone();
        Ok(self
            .assets
            .get_or_fetch((), move || async move { routing.assets().await })
            .await?)
    }
}

/// Router with all endpoints, without binding a socket
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/chains", get(get_chains))
        .route("/assets", get(get_assets))
        .route("/route", post(post_route))
        .route("/route/latest", get(get_latest_route))
        .route("/route/transactions", post(post_transaction_count))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Run the HTTP API server
pub async fn run_server(config: ApiConfig, state: AppState) -> SwapResult<()> {
    let addr = format!("{}:{}", config.host, config.port);
    info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| SwapError::Internal(format!("Failed to bind {}: {}", addr, e)))?;
    axum::serve(listener, router(state))
        .await
        .map_err(|e| SwapError::Internal(format!("API server failed: {}", e)))?;

    Ok(())
}

/// Health check endpoint - basic liveness
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn get_chains(State(state): State<AppState>) -> Result<Json<ChainsResponse>, ApiError> {
    let chains = state.routing.chains().await?;
    Ok(Json(ChainsResponse { chains }))
}

/// Display-ready assets per chain
async fn get_assets(State(state): State<AppState>) -> Result<Json<AssetsResponse>, ApiError> {
    let assets = state.asset_map().await?;
    let names = state.registry.pretty_names();
    let chain_to_assets_map = assets
        .iter()
        .map(|(chain_id, list)| (chain_id.clone(), display_assets(list, &names)))
        .collect();
    let fee_assets = assets
        .iter()
        .filter_map(|(chain_id, list)| {
            let fee = state.registry.fee_asset(chain_id, list)?;
            Some((chain_id.clone(), fee.denom.clone()))
        })
        .collect();
    Ok(Json(AssetsResponse {
        chain_to_assets_map,
        fee_assets,
    }))
}

async fn post_route(
    State(state): State<AppState>,
    Json(query): Json<RouteQuery>,
) -> Result<Json<RouteResponse>, ApiError> {
    debug!(
        "Route query {} {} on {} -> {} on {}",
        query.amount_in,
        query.source_asset_denom,
        query.source_asset_chain_id,
        query.dest_asset_denom,
        query.dest_asset_chain_id
    );
    let intent = state.latest.begin(query.clone());

    let assets = state.asset_map().await?;
    let composer = state.composer.clone();
    let q = query.clone();
    let route = state
        .routes
        .get_or_fetch(query, move || async move { compose(&composer, &assets, &q).await })
        .await?;

    if !state.latest.publish(intent, route.clone()) {
        debug!("Route result superseded by a newer query");
    }
    Ok(Json(route))
}

async fn compose(composer: &RouteComposer, assets: &AssetMap, query: &RouteQuery) -> SwapResult<RouteResponse> {
    let source = lookup(assets, &query.source_asset_denom, &query.source_asset_chain_id, query)?;
    let dest = lookup(assets, &query.dest_asset_denom, &query.dest_asset_chain_id, query)?;
    let wallet = WatchOnlyWallet::new(query.addresses.clone().into_iter().collect());

    composer
        .compose(
            &query.amount_in,
            source,
            &query.source_asset_chain_id,
            dest,
            &query.dest_asset_chain_id,
            &wallet,
        )
        .await
}

fn lookup<'a>(assets: &'a AssetMap, denom: &str, chain_id: &str, query: &RouteQuery) -> SwapResult<&'a Asset> {
    find_asset(assets, denom, chain_id).ok_or_else(|| SwapError::NoRoute {
        source_denom: query.source_asset_denom.clone(),
        source_chain: query.source_asset_chain_id.clone(),
        dest_denom: query.dest_asset_denom.clone(),
        dest_chain: query.dest_asset_chain_id.clone(),
    })
}

/// Most recent route query and its result, if it has arrived
async fn get_latest_route(State(state): State<AppState>) -> impl IntoResponse {
    match state.latest.current() {
        Some((query, route)) => (StatusCode::OK, Json(Some(LatestRouteResponse { query, route }))),
        None => (StatusCode::NOT_FOUND, Json(None)),
    }
}

async fn post_transaction_count(
    State(state): State<AppState>,
    Json(route): Json<RouteResponse>,
) -> Result<Json<TransactionCountResponse>, ApiError> {
    let count = state.builder.transaction_count(&route).await?;
    Ok(Json(TransactionCountResponse { count }))
}

/// Error response carrying the orchestrator error
pub struct ApiError(Arc<SwapError>);

impl From<SwapError> for ApiError {
    fn from(err: SwapError) -> Self {
        Self(Arc::new(err))
    }
}

impl From<Arc<SwapError>> for ApiError {
    fn from(err: Arc<SwapError>) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0.category() {
            ErrorCategory::Configuration => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorCategory::NoRoute => StatusCode::NOT_FOUND,
            ErrorCategory::InsufficientFunds => StatusCode::PAYMENT_REQUIRED,
            ErrorCategory::Wallet => StatusCode::BAD_REQUEST,
            ErrorCategory::Execution => StatusCode::BAD_GATEWAY,
            ErrorCategory::Network if matches!(*self.0, SwapError::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
            ErrorCategory::Network => StatusCode::BAD_GATEWAY,
            ErrorCategory::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorResponse {
            error: self.0.user_message(),
            category: format!("{:?}", self.0.category()),
        };
        (status, Json(body)).into_response()
    }
}

// Response types

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

#[derive(Serialize)]
struct ChainsResponse {
    chains: Vec<Chain>,
}

#[derive(Serialize)]
struct AssetsResponse {
    chain_to_assets_map: HashMap<String, Vec<Asset>>,
    /// Fee denom per chain, for chains whose fee token is listed
    fee_assets: HashMap<String, String>,
}

#[derive(Serialize)]
struct LatestRouteResponse {
    query: RouteQuery,
    route: Option<RouteResponse>,
}

#[derive(Serialize, Deserialize)]
pub struct TransactionCountResponse {
    pub count: usize,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    category: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::tests::{asset, params, registry, transfer_route};
    use crate::evm::{MockEvmQuoteApi, MockEvmRpc};
    use crate::routing::{MockRoutingApi, MultiChainMsg};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    fn assets() -> AssetMap {
        let mut map = HashMap::new();
        map.insert("cosmoshub-4".to_string(), vec![asset("uatom", "cosmoshub-4", "uatom", "cosmoshub-4")]);
        map.insert(
            "osmosis-1".to_string(),
            vec![asset("ibc/ATOM", "osmosis-1", "uatom", "cosmoshub-4")],
        );
        map
    }

    fn app(routing: MockRoutingApi) -> Router {
        let registry = registry();
        let routing: Arc<dyn RoutingApi> = Arc::new(routing);
        let composer = Arc::new(RouteComposer::new(
            routing.clone(),
            Arc::new(MockEvmQuoteApi::new()),
            registry.clone(),
            params(),
        ));
        let builder = Arc::new(MessageBuilder::new(
            routing.clone(),
            Arc::new(MockEvmQuoteApi::new()),
            Arc::new(MockEvmRpc::new()),
            registry.clone(),
            "5.0",
            250_000_000_000,
            params(),
        ));
        router(AppState::new(registry, routing, composer, builder))
    }

    fn route_request(amount: &str) -> Request<Body> {
        let query = RouteQuery {
            amount_in: amount.into(),
            source_asset_denom: "uatom".into(),
            source_asset_chain_id: "cosmoshub-4".into(),
            dest_asset_denom: "ibc/ATOM".into(),
            dest_asset_chain_id: "osmosis-1".into(),
            addresses: BTreeMap::new(),
        };
        Request::post("/route")
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&query).unwrap()))
            .unwrap()
    }

    async fn json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = app(MockRoutingApi::new())
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_assets_report_listed_fee_assets() {
        let mut routing = MockRoutingApi::new();
        routing.expect_assets().times(1).returning(|| Ok(assets()));

        let response = app(routing)
            .oneshot(Request::get("/assets").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json(response).await;
        assert_eq!(body["fee_assets"]["cosmoshub-4"], "uatom");
        // uosmo is not listed on osmosis-1
        assert!(body["fee_assets"].get("osmosis-1").is_none());
        assert_eq!(body["chain_to_assets_map"]["osmosis-1"][0]["denom"], "ibc/ATOM");
    }

    #[tokio::test]
    async fn test_identical_route_queries_hit_the_cache() {
        let mut routing = MockRoutingApi::new();
        routing.expect_assets().times(1).returning(|| Ok(assets()));
        routing
            .expect_route()
            .times(1)
            .returning(|_| Ok(transfer_route("1000000", ("uatom", "cosmoshub-4"), ("ibc/ATOM", "osmosis-1"))));
        let app = app(routing);

        for _ in 0..2 {
            let response = app.clone().oneshot(route_request("1000000")).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(json(response).await["chain_ids"][1], "osmosis-1");
        }

        let latest = app
            .oneshot(Request::get("/route/latest").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(json(latest).await["query"]["amount_in"], "1000000");
    }

    #[tokio::test]
    async fn test_empty_route_maps_to_not_found() {
        let mut routing = MockRoutingApi::new();
        routing.expect_assets().returning(|| Ok(assets()));
        routing.expect_route().returning(|_| {
            let mut route = transfer_route("1", ("uatom", "cosmoshub-4"), ("ibc/ATOM", "osmosis-1"));
            route.operations.clear();
            Ok(route)
        });

        let response = app(routing).oneshot(route_request("1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = json(response).await;
        assert!(body["error"].as_str().unwrap().starts_with("No route found"));
        assert_eq!(body["category"], "NoRoute");
    }

    #[tokio::test]
    async fn test_transaction_count() {
        let mut routing = MockRoutingApi::new();
        routing.expect_msgs().times(1).returning(|_| {
            Ok(vec![MultiChainMsg {
                chain_id: "cosmoshub-4".into(),
                path: vec!["cosmoshub-4".into(), "osmosis-1".into()],
                msg: "{}".into(),
                msg_type_url: "/ibc.applications.transfer.v1.MsgTransfer".into(),
            }])
        });
        let route = transfer_route("1000000", ("uatom", "cosmoshub-4"), ("ibc/ATOM", "osmosis-1"));
        let request = Request::post("/route/transactions")
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&route).unwrap()))
            .unwrap();

        let response = app(routing).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await["count"], 1);
    }
}
