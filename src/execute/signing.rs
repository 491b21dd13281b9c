//! Chain signing strategies
//!
//! Each chain family builds, signs and broadcasts transactions differently.
//! A [`SigningStrategy`] is selected from the chain's configured
//! [`SigningKind`]; the engine only sees the common contract.

use super::prepared::PreparedMessage;
use crate::chain::proto::{
    Any, AuthInfo, Coin, ExtensionOptionsEthereumTx, Fee, ModeInfo, ModeSingle, PubKey, SignDoc, SignerInfo, TxBody,
    TxRaw, ETHERMINT_PUBKEY_TYPE_URL, EXTENSION_OPTIONS_ETHEREUM_TX_TYPE_URL, INJECTIVE_PUBKEY_TYPE_URL,
    SECP256K1_PUBKEY_TYPE_URL, SIGN_MODE_DIRECT, SIGN_MODE_LEGACY_AMINO_JSON,
};
use crate::chain::{AccountInfo, BroadcastMode, BroadcastResponse, ChainQuery};
use crate::config::{ExecutionConfig, FeeToken, SigningKind};
use crate::error::{SwapError, SwapResult};
use crate::wallet::{AminoCoin, AminoMsg, StdFee, StdSignDoc, Wallet, WalletAccount};

use async_trait::async_trait;
use prost::Message;
use tracing::debug;

const EVMOS_FEE_AMOUNT: &str = "4000000000000000";
const EVMOS_GAS: u64 = 200_000;
const INJECTIVE_TIMEOUT_BLOCKS: u64 = 90;

/// Everything a strategy needs to handle one message
pub struct SigningContext<'a> {
    pub chain_id: &'a str,
    pub account: &'a WalletAccount,
    pub wallet: &'a dyn Wallet,
    pub client: &'a dyn ChainQuery,
    pub is_ledger: bool,
    /// Gas budget for fixed-gas messages on this hop
    pub gas_needed: u64,
    pub fee_token: &'a FeeToken,
    pub config: &'a ExecutionConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignMode {
    Direct,
    Amino,
    /// Carries its own signature, broadcast as is
    Presigned,
}

/// Unsigned transaction produced by [`SigningStrategy::build_sign_doc`]
#[derive(Debug, Clone, PartialEq)]
pub struct SignDocument {
    pub body: TxBody,
    pub auth_info: AuthInfo,
    pub amino_msgs: Vec<AminoMsg>,
    pub account: AccountInfo,
    pub mode: SignMode,
}

/// Build, sign and broadcast for one chain family
#[async_trait]
pub trait SigningStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn build_sign_doc(&self, ctx: &SigningContext<'_>, msg: &PreparedMessage) -> SwapResult<SignDocument>;

    /// Encoded `TxRaw` ready for broadcast
    async fn sign(&self, ctx: &SigningContext<'_>, doc: SignDocument) -> SwapResult<Vec<u8>> {
        sign_document(ctx, doc).await
    }

    async fn broadcast(&self, ctx: &SigningContext<'_>, tx_bytes: Vec<u8>) -> SwapResult<BroadcastResponse>;
}

/// Strategy for a chain's signing kind
pub fn strategy_for(kind: SigningKind) -> Box<dyn SigningStrategy> {
    match kind {
        SigningKind::Standard => Box::new(StandardStrategy),
        SigningKind::Evmos => Box::new(EvmosStrategy),
        SigningKind::Injective => Box::new(InjectiveStrategy),
    }
}

/// Revision number encoded in a chain id suffix, `osmosis-1` is revision 1
pub fn revision_number(chain_id: &str) -> u64 {
    chain_id
        .rsplit_once('-')
        .and_then(|(_, rev)| rev.parse().ok())
        .unwrap_or(0)
}

fn scale_gas(gas: u64, multiplier: f64) -> u64 {
    (gas as f64 * multiplier).ceil() as u64
}

fn signer_info(pubkey_type_url: &str, account: &WalletAccount, sequence: u64, mode: i32) -> SignerInfo {
    SignerInfo {
        public_key: Some(Any::pack(
            pubkey_type_url,
            &PubKey {
                key: account.pubkey.clone(),
            },
        )),
        mode_info: Some(ModeInfo {
            single: Some(ModeSingle { mode }),
        }),
        sequence,
    }
}

fn fee(amount: Vec<Coin>, gas_limit: u64) -> Fee {
    Fee {
        amount,
        gas_limit,
        payer: String::new(),
        granter: String::new(),
    }
}

fn zero_fee(ctx: &SigningContext<'_>, gas_limit: u64) -> Fee {
    fee(
        vec![Coin {
            denom: ctx.fee_token.denom.clone(),
            amount: "0".to_string(),
        }],
        gas_limit,
    )
}

fn sign_mode(ctx: &SigningContext<'_>) -> SignMode {
    if ctx.is_ledger {
        SignMode::Amino
    } else {
        SignMode::Direct
    }
}

fn mode_code(mode: SignMode) -> i32 {
    match mode {
        SignMode::Amino => SIGN_MODE_LEGACY_AMINO_JSON,
        _ => SIGN_MODE_DIRECT,
    }
}

fn amino_msgs(mode: SignMode, msg: &PreparedMessage) -> SwapResult<Vec<AminoMsg>> {
    match mode {
        SignMode::Amino => Ok(vec![msg.to_amino()?]),
        _ => Ok(Vec::new()),
    }
}

/// Gas used by `body` according to the node, with an empty signature
async fn simulate(ctx: &SigningContext<'_>, body: &TxBody, signer: SignerInfo) -> SwapResult<u64> {
    let auth_info = AuthInfo {
        signer_infos: vec![signer],
        fee: Some(zero_fee(ctx, 0)),
    };
    let tx = TxRaw {
        body_bytes: body.encode_to_vec(),
        auth_info_bytes: auth_info.encode_to_vec(),
        signatures: vec![Vec::new()],
    };
    let gas = ctx.client.simulate(tx.encode_to_vec()).await?;
    debug!("Simulated gas on {}: {}", ctx.chain_id, gas);
    Ok(gas)
}

/// Sign with the wallet and encode the resulting `TxRaw`
pub async fn sign_document(ctx: &SigningContext<'_>, doc: SignDocument) -> SwapResult<Vec<u8>> {
    let signing_error = |e: crate::error::WalletError| SwapError::Signing {
        chain_id: ctx.chain_id.to_string(),
        message: e.to_string(),
    };
    let body_bytes = doc.body.encode_to_vec();
    let auth_info_bytes = doc.auth_info.encode_to_vec();

    let tx = match doc.mode {
        SignMode::Presigned => TxRaw {
            body_bytes,
            auth_info_bytes,
            signatures: Vec::new(),
        },
        SignMode::Direct => {
            let sign_doc = SignDoc {
                body_bytes,
                auth_info_bytes,
                chain_id: ctx.chain_id.to_string(),
                account_number: doc.account.account_number,
            };
            let signed = ctx
                .wallet
                .sign_direct(ctx.chain_id, &ctx.account.address, sign_doc)
                .await
                .map_err(signing_error)?;
            TxRaw {
                body_bytes: signed.signed.body_bytes,
                auth_info_bytes: signed.signed.auth_info_bytes,
                signatures: vec![signed.signature],
            }
        }
        SignMode::Amino => {
            let fee = doc.auth_info.fee.clone().unwrap_or_default();
            let std_doc = StdSignDoc {
                chain_id: ctx.chain_id.to_string(),
                account_number: doc.account.account_number.to_string(),
                sequence: doc.account.sequence.to_string(),
                fee: StdFee {
                    amount: fee
                        .amount
                        .iter()
                        .map(|c| AminoCoin {
                            denom: c.denom.clone(),
                            amount: c.amount.clone(),
                        })
                        .collect(),
                    gas: fee.gas_limit.to_string(),
                },
                msgs: doc.amino_msgs,
                memo: doc.body.memo.clone(),
            };
            let signed = ctx
                .wallet
                .sign_amino(ctx.chain_id, &ctx.account.address, std_doc)
                .await
                .map_err(signing_error)?;
            TxRaw {
                body_bytes,
                auth_info_bytes,
                signatures: vec![signed.signature],
            }
        }
    };

    Ok(tx.encode_to_vec())
}

fn body(msg: &PreparedMessage) -> TxBody {
    TxBody {
        messages: vec![msg.to_any()],
        memo: String::new(),
        timeout_height: 0,
        extension_options: Vec::new(),
    }
}

fn unsupported(ctx: &SigningContext<'_>, strategy: &str) -> SwapError {
    SwapError::Signing {
        chain_id: ctx.chain_id.to_string(),
        message: format!("message type not supported by the {} signer", strategy),
    }
}

/// Plain Cosmos SDK chains
pub struct StandardStrategy;

impl StandardStrategy {
    /// Ledger cannot sign a document whose timeout it has not seen, so pin it to a fresh height
    async fn pin_timeout(ctx: &SigningContext<'_>, msg: &PreparedMessage) -> SwapResult<PreparedMessage> {
        let PreparedMessage::IbcTransfer(transfer) = msg else {
            return Ok(msg.clone());
        };
        let latest = ctx.client.latest_height().await?;
        let mut transfer = transfer.clone();
        transfer.timeout_height = Some(crate::chain::proto::Height {
            revision_number: revision_number(ctx.chain_id),
            revision_height: latest + ctx.config.ledger_timeout_blocks,
        });
        transfer.timeout_timestamp = 0;
        Ok(PreparedMessage::IbcTransfer(transfer))
    }
}

#[async_trait]
impl SigningStrategy for StandardStrategy {
    fn name(&self) -> &'static str {
        "standard"
    }

    async fn build_sign_doc(&self, ctx: &SigningContext<'_>, msg: &PreparedMessage) -> SwapResult<SignDocument> {
        if matches!(msg, PreparedMessage::EthereumTx { .. } | PreparedMessage::ConvertErc20(_)) {
            return Err(unsupported(ctx, self.name()));
        }

        let account = ctx.client.account(&ctx.account.address).await?;
        let mode = sign_mode(ctx);
        let msg = if ctx.is_ledger {
            Self::pin_timeout(ctx, msg).await?
        } else {
            msg.clone()
        };
        let body = body(&msg);
        let signer = signer_info(SECP256K1_PUBKEY_TYPE_URL, ctx.account, account.sequence, mode_code(mode));

        let fee = if msg.is_ibc_transfer() {
            let simulated = simulate(ctx, &body, signer.clone()).await?;
            if ctx.is_ledger {
                zero_fee(ctx, scale_gas(simulated, ctx.config.simulate_gas_multiplier))
            } else {
                let gas = scale_gas(simulated, ctx.config.auto_gas_multiplier);
                let price = ctx.fee_token.average_gas_price.unwrap_or(0.0);
                fee(
                    vec![Coin {
                        denom: ctx.fee_token.denom.clone(),
                        amount: (((gas as f64) * price).ceil() as u128).to_string(),
                    }],
                    gas,
                )
            }
        } else {
            zero_fee(ctx, ctx.gas_needed)
        };

        Ok(SignDocument {
            amino_msgs: amino_msgs(mode, &msg)?,
            body,
            auth_info: AuthInfo {
                signer_infos: vec![signer],
                fee: Some(fee),
            },
            account,
            mode,
        })
    }

    async fn broadcast(&self, ctx: &SigningContext<'_>, tx_bytes: Vec<u8>) -> SwapResult<BroadcastResponse> {
        ctx.client.broadcast(tx_bytes, BroadcastMode::Sync).await
    }
}

/// Evmos: ethsecp256k1 keys, fixed fee, block broadcast, raw EVM transactions
pub struct EvmosStrategy;

#[async_trait]
impl SigningStrategy for EvmosStrategy {
    fn name(&self) -> &'static str {
        "evmos"
    }

    async fn build_sign_doc(&self, ctx: &SigningContext<'_>, msg: &PreparedMessage) -> SwapResult<SignDocument> {
        let account = ctx.client.account(&ctx.account.address).await?;

        if let PreparedMessage::EthereumTx { gas, gas_price, .. } = msg {
            let mut body = body(msg);
            body.extension_options = vec![Any::pack(
                EXTENSION_OPTIONS_ETHEREUM_TX_TYPE_URL,
                &ExtensionOptionsEthereumTx {},
            )];
            let amount = (*gas as u128).saturating_mul(*gas_price);
            return Ok(SignDocument {
                body,
                auth_info: AuthInfo {
                    signer_infos: Vec::new(),
                    fee: Some(fee(
                        vec![Coin {
                            denom: ctx.fee_token.denom.clone(),
                            amount: amount.to_string(),
                        }],
                        *gas,
                    )),
                },
                amino_msgs: Vec::new(),
                account,
                mode: SignMode::Presigned,
            });
        }

        let signer = signer_info(ETHERMINT_PUBKEY_TYPE_URL, ctx.account, account.sequence, SIGN_MODE_DIRECT);
        Ok(SignDocument {
            body: body(msg),
            auth_info: AuthInfo {
                signer_infos: vec![signer],
                fee: Some(fee(
                    vec![Coin {
                        denom: ctx.fee_token.denom.clone(),
                        amount: EVMOS_FEE_AMOUNT.to_string(),
                    }],
                    EVMOS_GAS,
                )),
            },
            amino_msgs: Vec::new(),
            account,
            mode: SignMode::Direct,
        })
    }

    async fn broadcast(&self, ctx: &SigningContext<'_>, tx_bytes: Vec<u8>) -> SwapResult<BroadcastResponse> {
        ctx.client.broadcast(tx_bytes, BroadcastMode::Block).await
    }
}

/// Injective: own pubkey type, zero fee, explicit timeout height
pub struct InjectiveStrategy;

#[async_trait]
impl SigningStrategy for InjectiveStrategy {
    fn name(&self) -> &'static str {
        "injective"
    }

    async fn build_sign_doc(&self, ctx: &SigningContext<'_>, msg: &PreparedMessage) -> SwapResult<SignDocument> {
        if matches!(msg, PreparedMessage::EthereumTx { .. } | PreparedMessage::ConvertErc20(_)) {
            return Err(unsupported(ctx, self.name()));
        }

        let account = ctx.client.account(&ctx.account.address).await?;
        let latest = ctx.client.latest_height().await?;
        let mode = sign_mode(ctx);

        let mut body = body(msg);
        body.timeout_height = latest + INJECTIVE_TIMEOUT_BLOCKS;

        Ok(SignDocument {
            amino_msgs: amino_msgs(mode, msg)?,
            body,
            auth_info: AuthInfo {
                signer_infos: vec![signer_info(
                    INJECTIVE_PUBKEY_TYPE_URL,
                    ctx.account,
                    account.sequence,
                    mode_code(mode),
                )],
                fee: Some(zero_fee(ctx, ctx.gas_needed)),
            },
            account,
            mode,
        })
    }

    async fn broadcast(&self, ctx: &SigningContext<'_>, tx_bytes: Vec<u8>) -> SwapResult<BroadcastResponse> {
        ctx.client.broadcast(tx_bytes, BroadcastMode::Sync).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::proto::{MsgTransfer, MSG_ETHEREUM_TX_TYPE_URL};
    use crate::chain::MockChainQuery;
    use crate::config::tests::SAMPLE;
    use crate::config::Settings;
    use crate::wallet::{KeyAlgo, LocalKeyWallet};

    const KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn transfer() -> PreparedMessage {
        PreparedMessage::IbcTransfer(MsgTransfer {
            source_port: "transfer".into(),
            source_channel: "channel-0".into(),
            token: Some(Coin {
                denom: "uosmo".into(),
                amount: "1000000".into(),
            }),
            sender: "osmo1sender".into(),
            receiver: "cosmos1receiver".into(),
            timeout_height: None,
            timeout_timestamp: 1_693_222_298_030_492_937,
            memo: String::new(),
        })
    }

    fn account() -> WalletAccount {
        WalletAccount {
            address: "osmo1sender".into(),
            pubkey: vec![2; 33],
            algo: KeyAlgo::Secp256k1,
        }
    }

    fn chain_client() -> MockChainQuery {
        let mut client = MockChainQuery::new();
        client.expect_account().returning(|_| {
            Ok(AccountInfo {
                account_number: 12,
                sequence: 3,
            })
        });
        client.expect_latest_height().returning(|| Ok(1_000));
        client.expect_simulate().returning(|_| Ok(100_000));
        client
    }

    struct Fixture {
        wallet: LocalKeyWallet,
        account: WalletAccount,
        fee: FeeToken,
        config: ExecutionConfig,
    }

    impl Fixture {
        fn new(denom: &str) -> Self {
            let settings = Settings::from_toml(SAMPLE).unwrap();
            Self {
                wallet: LocalKeyWallet::from_hex(KEY, &settings.chains).unwrap(),
                account: account(),
                fee: FeeToken {
                    denom: denom.into(),
                    average_gas_price: Some(0.025),
                },
                config: ExecutionConfig::default(),
            }
        }

        fn ctx<'a>(&'a self, chain_id: &'a str, client: &'a MockChainQuery, is_ledger: bool) -> SigningContext<'a> {
            SigningContext {
                chain_id,
                account: &self.account,
                wallet: &self.wallet,
                client,
                is_ledger,
                gas_needed: 300_000,
                fee_token: &self.fee,
                config: &self.config,
            }
        }
    }

    #[test]
    fn test_revision_number_from_chain_id_suffix() {
        assert_eq!(revision_number("osmosis-1"), 1);
        assert_eq!(revision_number("evmos_9001-2"), 2);
        assert_eq!(revision_number("noversion"), 0);
    }

    #[tokio::test]
    async fn test_standard_transfer_uses_auto_gas_and_priced_fee() {
        let fixture = Fixture::new("uosmo");
        let client = chain_client();
        let ctx = fixture.ctx("osmosis-1", &client, false);

        let doc = StandardStrategy.build_sign_doc(&ctx, &transfer()).await.unwrap();
        let fee = doc.auth_info.fee.clone().unwrap();
        assert_eq!(doc.mode, SignMode::Direct);
        assert_eq!(fee.gas_limit, 130_000);
        assert_eq!(fee.amount[0].amount, "3250");
        assert_eq!(doc.account.sequence, 3);

        let raw = TxRaw::decode(StandardStrategy.sign(&ctx, doc).await.unwrap().as_slice()).unwrap();
        assert_eq!(raw.signatures.len(), 1);
        assert_eq!(raw.signatures[0].len(), 64);
    }

    #[tokio::test]
    async fn test_ledger_transfer_pins_timeout_and_signs_amino() {
        let fixture = Fixture::new("uosmo");
        let client = chain_client();
        let ctx = fixture.ctx("osmosis-1", &client, true);

        let doc = StandardStrategy.build_sign_doc(&ctx, &transfer()).await.unwrap();
        assert_eq!(doc.mode, SignMode::Amino);
        let fee = doc.auth_info.fee.clone().unwrap();
        assert_eq!(fee.gas_limit, 120_000);
        assert_eq!(fee.amount[0].amount, "0");
        assert_eq!(
            doc.auth_info.signer_infos[0].mode_info.clone().unwrap().single.unwrap().mode,
            SIGN_MODE_LEGACY_AMINO_JSON
        );

        let sent = MsgTransfer::decode(doc.body.messages[0].value.as_slice()).unwrap();
        let height = sent.timeout_height.unwrap();
        assert_eq!(height.revision_number, 1);
        assert_eq!(height.revision_height, 1_100);
        assert_eq!(sent.timeout_timestamp, 0);
        assert_eq!(doc.amino_msgs[0].value["timeout_height"]["revision_height"], "1100");
    }

    #[tokio::test]
    async fn test_contract_call_uses_fixed_gas_and_zero_fee() {
        let fixture = Fixture::new("uosmo");
        let mut client = MockChainQuery::new();
        client.expect_account().returning(|_| Ok(AccountInfo::default()));
        client.expect_simulate().never();
        let ctx = fixture.ctx("osmosis-1", &client, false);

        let msg = PreparedMessage::ExecuteContract {
            msg: crate::chain::proto::MsgExecuteContract {
                sender: "osmo1sender".into(),
                contract: "osmo1contract".into(),
                msg: b"{}".to_vec(),
                funds: vec![],
            },
            json: serde_json::json!({}),
        };
        let doc = StandardStrategy.build_sign_doc(&ctx, &msg).await.unwrap();
        let fee = doc.auth_info.fee.unwrap();
        assert_eq!(fee.gas_limit, 300_000);
        assert_eq!(fee.amount[0].amount, "0");
    }

    #[tokio::test]
    async fn test_evmos_uses_fixed_fee_and_ethermint_pubkey() {
        let fixture = Fixture::new("aevmos");
        let client = chain_client();
        let ctx = fixture.ctx("evmos_9001-2", &client, false);

        let doc = EvmosStrategy.build_sign_doc(&ctx, &transfer()).await.unwrap();
        let fee = doc.auth_info.fee.clone().unwrap();
        assert_eq!(fee.amount[0].amount, EVMOS_FEE_AMOUNT);
        assert_eq!(fee.amount[0].denom, "aevmos");
        assert_eq!(fee.gas_limit, EVMOS_GAS);
        assert_eq!(
            doc.auth_info.signer_infos[0].public_key.clone().unwrap().type_url,
            ETHERMINT_PUBKEY_TYPE_URL
        );
    }

    #[tokio::test]
    async fn test_evmos_ethereum_tx_is_broadcast_without_cosmos_signature() {
        let fixture = Fixture::new("aevmos");
        let client = chain_client();
        let ctx = fixture.ctx("evmos_9001-2", &client, false);

        let msg = PreparedMessage::EthereumTx {
            msg: crate::chain::proto::MsgEthereumTx::default(),
            gas: 350_000,
            gas_price: 25_000_000_000,
            value: 0,
        };
        let doc = EvmosStrategy.build_sign_doc(&ctx, &msg).await.unwrap();
        assert_eq!(doc.mode, SignMode::Presigned);
        assert_eq!(doc.body.messages[0].type_url, MSG_ETHEREUM_TX_TYPE_URL);
        assert_eq!(doc.body.extension_options[0].type_url, EXTENSION_OPTIONS_ETHEREUM_TX_TYPE_URL);
        assert_eq!(doc.auth_info.fee.clone().unwrap().amount[0].amount, "8750000000000000");

        let raw = TxRaw::decode(EvmosStrategy.sign(&ctx, doc).await.unwrap().as_slice()).unwrap();
        assert!(raw.signatures.is_empty());
    }

    #[tokio::test]
    async fn test_injective_sets_timeout_height_and_zero_fee() {
        let fixture = Fixture::new("inj");
        let client = chain_client();
        let ctx = fixture.ctx("injective-1", &client, false);

        let doc = InjectiveStrategy.build_sign_doc(&ctx, &transfer()).await.unwrap();
        assert_eq!(doc.body.timeout_height, 1_090);
        let fee = doc.auth_info.fee.clone().unwrap();
        assert_eq!(fee.gas_limit, 300_000);
        assert_eq!(fee.amount[0].amount, "0");
        assert_eq!(
            doc.auth_info.signer_infos[0].public_key.clone().unwrap().type_url,
            INJECTIVE_PUBKEY_TYPE_URL
        );
    }

    #[tokio::test]
    async fn test_standard_rejects_evm_messages() {
        let fixture = Fixture::new("uosmo");
        let client = MockChainQuery::new();
        let ctx = fixture.ctx("osmosis-1", &client, false);
        let msg = PreparedMessage::ConvertErc20(crate::chain::proto::MsgConvertErc20::default());
        let err = StandardStrategy.build_sign_doc(&ctx, &msg).await.unwrap_err();
        assert!(matches!(err, SwapError::Signing { .. }));
    }
}
