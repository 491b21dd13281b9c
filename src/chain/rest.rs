//! Cosmos SDK REST (LCD) client

use super::{AccountInfo, BroadcastMode, BroadcastResponse, ChainQuery};
use crate::error::{SwapError, SwapResult};
use crate::http;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// REST client bound to one endpoint of one chain
#[derive(Clone)]
pub struct CosmosRestClient {
    chain_id: String,
    endpoint: String,
    client: Client,
}

#[derive(Deserialize)]
struct Coin {
    amount: String,
}

#[derive(Deserialize)]
struct BalanceResponse {
    balance: Option<Coin>,
}

#[derive(Deserialize)]
struct AccountResponse {
    account: Value,
}

#[derive(Deserialize)]
struct BlockHeader {
    height: String,
}

#[derive(Deserialize)]
struct Block {
    header: BlockHeader,
}

#[derive(Deserialize)]
struct LatestBlockResponse {
    #[serde(default)]
    block: Option<Block>,
    #[serde(default)]
    sdk_block: Option<Block>,
}

#[derive(Serialize)]
struct TxBytesRequest<'a> {
    tx_bytes: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    mode: Option<&'a BroadcastMode>,
}

#[derive(Deserialize)]
struct GasInfo {
    gas_used: String,
}

#[derive(Deserialize)]
struct SimulateResponse {
    gas_info: GasInfo,
}

#[derive(Deserialize)]
struct TxResponse {
    txhash: String,
    #[serde(default)]
    code: u32,
    #[serde(default)]
    raw_log: String,
}

#[derive(Deserialize)]
struct BroadcastTxResponse {
    tx_response: TxResponse,
}

impl CosmosRestClient {
    pub fn new(chain_id: impl Into<String>, endpoint: impl Into<String>, client: Client) -> Self {
        Self {
            chain_id: chain_id.into(),
            endpoint: endpoint.into(),
            client,
        }
    }

    pub fn chain_id(&self) -> &str {
        &self.chain_id
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn url(&self, path: &str) -> String {
        http::join(&self.endpoint, path)
    }

    fn parse_u64(&self, field: &str, value: &str) -> SwapResult<u64> {
        value.parse().map_err(|_| SwapError::Rpc {
            chain_id: self.chain_id.clone(),
            message: format!("invalid {} {:?}", field, value),
        })
    }
}

/// Pull account number and sequence out of any account flavour
///
/// Plain accounts carry the fields at the top level; Ethermint and Injective
/// accounts nest them under `base_account`.
pub(crate) fn account_fields(account: &Value) -> Option<(String, String)> {
    let base = account.get("base_account").unwrap_or(account);
    let number = base.get("account_number")?;
    let sequence = base.get("sequence")?;
    let as_string = |v: &Value| match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    };
    Some((as_string(number)?, as_string(sequence)?))
}

#[async_trait]
impl ChainQuery for CosmosRestClient {
    async fn balance(&self, address: &str, denom: &str) -> SwapResult<u128> {
        let url = self.url(&format!("/cosmos/bank/v1beta1/balances/{}/by_denom", address));
        debug!("Balance query on {}: {} {}", self.chain_id, address, denom);

        let response: BalanceResponse = http::decode(
            self.client
                .get(&url)
                .query(&[("denom", denom)])
                .send()
                .await?,
        )
        .await?;

        match response.balance {
            Some(coin) => coin.amount.parse().map_err(|_| SwapError::Rpc {
                chain_id: self.chain_id.clone(),
                message: format!("invalid balance amount {:?}", coin.amount),
            }),
            None => Ok(0),
        }
    }

    async fn account(&self, address: &str) -> SwapResult<AccountInfo> {
        let url = self.url(&format!("/cosmos/auth/v1beta1/accounts/{}", address));
        debug!("Account query on {}: {}", self.chain_id, address);

        let response: AccountResponse = http::decode(self.client.get(&url).send().await?).await?;
        let (number, sequence) = account_fields(&response.account).ok_or_else(|| SwapError::Rpc {
            chain_id: self.chain_id.clone(),
            message: format!("unrecognised account payload for {}", address),
        })?;

        Ok(AccountInfo {
            account_number: self.parse_u64("account_number", &number)?,
            sequence: self.parse_u64("sequence", &sequence)?,
        })
    }

    async fn latest_height(&self) -> SwapResult<u64> {
        let url = self.url("/cosmos/base/tendermint/v1beta1/blocks/latest");

        let response: LatestBlockResponse = http::decode(self.client.get(&url).send().await?).await?;
        let header = response
            .sdk_block
            .or(response.block)
            .map(|b| b.header)
            .ok_or_else(|| SwapError::Rpc {
                chain_id: self.chain_id.clone(),
                message: "latest block response has no header".to_string(),
            })?;

        self.parse_u64("height", &header.height)
    }

    async fn simulate(&self, tx_bytes: Vec<u8>) -> SwapResult<u64> {
        let url = self.url("/cosmos/tx/v1beta1/simulate");
        let body = TxBytesRequest {
            tx_bytes: BASE64.encode(tx_bytes),
            mode: None,
        };

        let response: SimulateResponse =
            http::decode(self.client.post(&url).json(&body).send().await?).await?;
        let gas = self.parse_u64("gas_used", &response.gas_info.gas_used)?;
        debug!("Simulated gas on {}: {}", self.chain_id, gas);
        Ok(gas)
    }

    async fn broadcast(&self, tx_bytes: Vec<u8>, mode: BroadcastMode) -> SwapResult<BroadcastResponse> {
        let url = self.url("/cosmos/tx/v1beta1/txs");
        let body = TxBytesRequest {
            tx_bytes: BASE64.encode(tx_bytes),
            mode: Some(&mode),
        };

        let response: BroadcastTxResponse =
            http::decode(self.client.post(&url).json(&body).send().await?).await?;
        debug!(
            "Broadcast on {}: {} (code {})",
            self.chain_id, response.tx_response.txhash, response.tx_response.code
        );

        Ok(BroadcastResponse {
            tx_hash: response.tx_response.txhash,
            code: response.tx_response.code,
            raw_log: response.tx_response.raw_log,
        })
    }
}
