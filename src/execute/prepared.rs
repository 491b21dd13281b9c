//! Decoding of routing-service message bodies into signable protobuf messages

use crate::chain::proto::{
    self, Any, Coin, Height, LegacyTx, MsgConvertErc20, MsgEthereumTx, MsgExecuteContract, MsgTransfer,
    DYNAMIC_FEE_TX_TYPE_URL, LEGACY_TX_TYPE_URL, MSG_CONVERT_ERC20_TYPE_URL, MSG_ETHEREUM_TX_TYPE_URL,
    MSG_EXECUTE_CONTRACT_TYPE_URL, MSG_TRANSFER_TYPE_URL,
};
use crate::error::{SwapError, SwapResult};
use crate::messages::{parse_quantity, EthereumTxJson};
use crate::routing::{Erc20ConvertMessage, MultiChainMsg};
use crate::wallet::AminoMsg;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};

/// Accepts a number or a numeric string
fn flexible_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(u64),
        Str(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Num(n) => Ok(n),
        Raw::Str(s) if s.is_empty() => Ok(0),
        Raw::Str(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CoinJson {
    pub denom: String,
    pub amount: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct TimeoutHeightJson {
    #[serde(default, deserialize_with = "flexible_u64")]
    pub revision_number: u64,
    #[serde(default, deserialize_with = "flexible_u64")]
    pub revision_height: u64,
}

/// IBC transfer as returned by the routing service
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MsgTransferJson {
    pub source_port: String,
    pub source_channel: String,
    pub token: CoinJson,
    pub sender: String,
    pub receiver: String,
    #[serde(default)]
    pub timeout_height: TimeoutHeightJson,
    #[serde(default, deserialize_with = "flexible_u64")]
    pub timeout_timestamp: u64,
    #[serde(default)]
    pub memo: String,
}

/// CosmWasm contract call as returned by the routing service
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MsgExecuteContractJson {
    pub sender: String,
    pub contract: String,
    pub msg: Value,
    #[serde(default)]
    pub funds: Vec<CoinJson>,
}

/// A chain message ready for a signing strategy
#[derive(Debug, Clone, PartialEq)]
pub enum PreparedMessage {
    IbcTransfer(MsgTransfer),
    ExecuteContract { msg: MsgExecuteContract, json: Value },
    /// Pre-signed EVM transaction plus the native value it moves
    EthereumTx { msg: MsgEthereumTx, gas: u64, gas_price: u128, value: u128 },
    ConvertErc20(MsgConvertErc20),
}

fn amount(value: &str) -> SwapResult<u128> {
    value
        .parse()
        .map_err(|_| SwapError::Internal(format!("invalid coin amount {:?}", value)))
}

fn coin(c: &CoinJson) -> Coin {
    Coin {
        denom: c.denom.clone(),
        amount: c.amount.clone(),
    }
}

fn quantity_u128(value: &str) -> SwapResult<u128> {
    u128::try_from(parse_quantity(value)?)
        .map_err(|_| SwapError::Internal(format!("quantity {} overflows u128", value)))
}

fn decode_ethereum_tx(body: EthereumTxJson) -> SwapResult<PreparedMessage> {
    let bytes = |field: &str, value: &str| {
        BASE64
            .decode(value)
            .map_err(|e| SwapError::Internal(format!("invalid base64 in EVM tx {}: {}", field, e)))
    };
    let gas: u64 = body
        .data
        .gas
        .parse()
        .map_err(|_| SwapError::Internal(format!("invalid EVM gas {:?}", body.data.gas)))?;
    let gas_price = quantity_u128(&body.data.gas_price)?;
    let value = quantity_u128(&body.data.value)?;

    let legacy = LegacyTx {
        nonce: body
            .data
            .nonce
            .parse()
            .map_err(|_| SwapError::Internal(format!("invalid EVM nonce {:?}", body.data.nonce)))?,
        gas_price: body.data.gas_price.clone(),
        gas,
        to: body.data.to.clone(),
        value: body.data.value.clone(),
        data: bytes("data", &body.data.data)?,
        v: bytes("v", &body.data.v)?,
        r: bytes("r", &body.data.r)?,
        s: bytes("s", &body.data.s)?,
    };

    Ok(PreparedMessage::EthereumTx {
        msg: MsgEthereumTx {
            data: Some(Any::pack(LEGACY_TX_TYPE_URL, &legacy)),
            hash: body.hash,
            from: body.from,
        },
        gas,
        gas_price,
        value,
    })
}

impl PreparedMessage {
    /// Decode a message body according to its type url
    pub fn decode(msg: &MultiChainMsg) -> SwapResult<Self> {
        match msg.msg_type_url.as_str() {
            MSG_TRANSFER_TYPE_URL => {
                let body: MsgTransferJson = serde_json::from_str(&msg.msg)?;
                let timeout_height = (body.timeout_height != TimeoutHeightJson::default()).then(|| Height {
                    revision_number: body.timeout_height.revision_number,
                    revision_height: body.timeout_height.revision_height,
                });
                Ok(Self::IbcTransfer(MsgTransfer {
                    source_port: body.source_port,
                    source_channel: body.source_channel,
                    token: Some(coin(&body.token)),
                    sender: body.sender,
                    receiver: body.receiver,
                    timeout_height,
                    timeout_timestamp: body.timeout_timestamp,
                    memo: body.memo,
                }))
            }
            MSG_EXECUTE_CONTRACT_TYPE_URL => {
                let body: MsgExecuteContractJson = serde_json::from_str(&msg.msg)?;
                Ok(Self::ExecuteContract {
                    msg: MsgExecuteContract {
                        sender: body.sender,
                        contract: body.contract,
                        msg: serde_json::to_vec(&body.msg)?,
                        funds: body.funds.iter().map(coin).collect(),
                    },
                    json: body.msg,
                })
            }
            DYNAMIC_FEE_TX_TYPE_URL | MSG_ETHEREUM_TX_TYPE_URL => decode_ethereum_tx(serde_json::from_str(&msg.msg)?),
            MSG_CONVERT_ERC20_TYPE_URL => {
                let body: Erc20ConvertMessage = serde_json::from_str(&msg.msg)?;
                Ok(Self::ConvertErc20(MsgConvertErc20 {
                    contract_address: body.contract_address,
                    amount: body.amount,
                    receiver: body.receiver,
                    sender: body.sender,
                }))
            }
            other => Err(SwapError::Internal(format!("unsupported message type {}", other))),
        }
    }

    pub fn is_ibc_transfer(&self) -> bool {
        matches!(self, Self::IbcTransfer(_))
    }

    /// Amount of `fee_denom` the message moves out of the sender's account
    pub fn outflow(&self, fee_denom: &str) -> SwapResult<u128> {
        match self {
            Self::IbcTransfer(msg) => match &msg.token {
                Some(token) if token.denom == fee_denom => amount(&token.amount),
                _ => Ok(0),
            },
            Self::ExecuteContract { msg, .. } => msg
                .funds
                .iter()
                .filter(|c| c.denom == fee_denom)
                .try_fold(0u128, |acc, c| -> SwapResult<u128> { Ok(acc.saturating_add(amount(&c.amount)?)) }),
            Self::EthereumTx { value, .. } => Ok(*value),
            Self::ConvertErc20(_) => Ok(0),
        }
    }

    /// Protobuf `Any` for the transaction body
    pub fn to_any(&self) -> Any {
        match self {
            Self::IbcTransfer(msg) => Any::pack(MSG_TRANSFER_TYPE_URL, msg),
            Self::ExecuteContract { msg, .. } => Any::pack(MSG_EXECUTE_CONTRACT_TYPE_URL, msg),
            Self::EthereumTx { msg, .. } => Any::pack(MSG_ETHEREUM_TX_TYPE_URL, msg),
            Self::ConvertErc20(msg) => Any::pack(MSG_CONVERT_ERC20_TYPE_URL, msg),
        }
    }

    /// Legacy amino JSON form, for ledger signing
    pub fn to_amino(&self) -> SwapResult<AminoMsg> {
        let coins = |list: &[proto::Coin]| -> Vec<Value> {
            list.iter()
                .map(|c| json!({"denom": c.denom, "amount": c.amount}))
                .collect()
        };

        match self {
            Self::IbcTransfer(msg) => {
                let mut timeout_height = serde_json::Map::new();
                if let Some(height) = &msg.timeout_height {
                    if height.revision_number != 0 {
                        timeout_height.insert("revision_number".into(), json!(height.revision_number.to_string()));
                    }
                    if height.revision_height != 0 {
                        timeout_height.insert("revision_height".into(), json!(height.revision_height.to_string()));
                    }
                }
                let mut value = json!({
                    "source_port": msg.source_port,
                    "source_channel": msg.source_channel,
                    "token": coins(msg.token.as_slice()).pop(),
                    "sender": msg.sender,
                    "receiver": msg.receiver,
                    "timeout_height": timeout_height,
                });
                if msg.timeout_timestamp != 0 {
                    value["timeout_timestamp"] = json!(msg.timeout_timestamp.to_string());
                }
                if !msg.memo.is_empty() {
                    value["memo"] = json!(msg.memo);
                }
                Ok(AminoMsg {
                    type_name: "cosmos-sdk/MsgTransfer".to_string(),
                    value,
                })
            }
            Self::ExecuteContract { msg, json } => Ok(AminoMsg {
                type_name: "wasm/MsgExecuteContract".to_string(),
                value: json!({
                    "sender": msg.sender,
                    "contract": msg.contract,
                    "msg": json,
                    "funds": coins(&msg.funds),
                }),
            }),
            Self::EthereumTx { .. } | Self::ConvertErc20(_) => Err(SwapError::Internal(
                "EVM messages have no amino encoding".to_string(),
            )),
        }
    }
}
