//! Chain adapters: the seam between the engine's send pipeline and one
//! (chain, network) pair.

use std::sync::Arc;

use async_trait::async_trait;
use chain_btc::address::parse_address as parse_btc_address;
use chain_btc::fee::{quote_fee_rate, FeeQuote, FeeRate, FeeSource as BtcFeeSource};
use chain_btc::transaction::{build_transaction, sign_transaction as sign_btc};
use chain_btc::utxo::{select_utxos, spendable};
use chain_btc::{BtcKey, UtxoIndexer};
use chain_eth::fee::{quote_gas, GasQuote, NATIVE_TRANSFER_GAS, TOKEN_TRANSFER_GAS};
use chain_eth::transaction::{build_erc20_transfer, build_transfer, sign_transaction as sign_eth};
use chain_eth::{LiveProvider, ProviderPool, U256};
use secrecy::{ExposeSecret, SecretString};

use crate::amount::{parse_amount, parse_btc, ETH_DECIMALS};
use crate::balance;
use crate::config::{EngineConfig, TokenConfig};
use crate::error::EngineError;
use crate::types::{
    Balances, ChainKind, Confirmation, ConfirmationStatus, FeeHint, FeeInfo, Network,
    SignedTransaction, TxRecord,
};

/// One validated transfer, as handed to an adapter.
///
/// `sender_address` has already been checked against the key.
pub struct TransferIntent<'a> {
    pub sender_private_key: &'a SecretString,
    pub sender_address: &'a str,
    pub to_address: &'a str,
    pub amount: &'a str,
    pub fee_hint: Option<FeeHint>,
}

/// A signed transaction plus, on account chains, the endpoint it was
/// priced and nonced against. Broadcast goes back to that same endpoint.
#[derive(Debug)]
pub struct PreparedTransfer {
    pub signed: SignedTransaction,
    provider: Option<LiveProvider>,
}

impl PreparedTransfer {
    pub fn new(signed: SignedTransaction) -> Self {
        Self {
            signed,
            provider: None,
        }
    }

    fn via(mut self, provider: LiveProvider) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Endpoint the transfer is pinned to, if any.
    pub fn endpoint(&self) -> Option<&str> {
        self.provider.as_ref().map(LiveProvider::endpoint)
    }
}

#[async_trait]
pub trait ChainAdapter: Send + Sync {
    fn chain(&self) -> ChainKind;

    fn network(&self) -> Network;

    async fn balances(&self, address: &str) -> Result<Balances, EngineError>;

    /// Price, build and sign a transfer. Nothing is broadcast.
    async fn build_and_sign(
        &self,
        intent: &TransferIntent<'_>,
    ) -> Result<PreparedTransfer, EngineError>;

    /// Submit a signed transaction. Returns the network's txid.
    async fn broadcast(&self, prepared: &PreparedTransfer) -> Result<String, EngineError>;

    async fn recent_transactions(
        &self,
        address: &str,
        limit: usize,
    ) -> Result<Vec<TxRecord>, EngineError>;

    async fn check_confirmation(&self, txid: &str) -> Result<Confirmation, EngineError>;
}

// ---------------------------------------------------------------------------
// Bitcoin
// ---------------------------------------------------------------------------

/// Tunables for [`BitcoinAdapter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitcoinSettings {
    pub dust_threshold_sat: u64,
    pub spend_unconfirmed: bool,
    pub confirmation_target: u16,
    pub fallback_sat_per_vb: u64,
}

impl BitcoinSettings {
    pub fn for_network(network: Network) -> Self {
        Self {
            dust_threshold_sat: chain_btc::fee::DUST_THRESHOLD_SAT,
            spend_unconfirmed: false,
            confirmation_target: chain_btc::fee::DEFAULT_CONFIRMATION_TARGET,
            fallback_sat_per_vb: network.btc().fallback_sat_per_vb(),
        }
    }

    pub fn from_config(config: &EngineConfig, network: Network) -> Self {
        Self {
            dust_threshold_sat: config.dust_threshold_sat,
            spend_unconfirmed: config.spend_unconfirmed,
            confirmation_target: config.btc(network).confirmation_target,
            fallback_sat_per_vb: config.fallback_sat_per_vb(network),
        }
    }
}

pub struct BitcoinAdapter {
    network: Network,
    indexer: Arc<dyn UtxoIndexer>,
    settings: BitcoinSettings,
}

impl BitcoinAdapter {
    pub fn new(network: Network, indexer: Arc<dyn UtxoIndexer>) -> Self {
        Self {
            network,
            indexer,
            settings: BitcoinSettings::for_network(network),
        }
    }

    pub fn with_settings(mut self, settings: BitcoinSettings) -> Self {
        self.settings = settings;
        self
    }

    async fn fee_quote(&self, hint: Option<FeeHint>) -> Result<FeeQuote, EngineError> {
        let network = self.network.btc();
        match hint {
            Some(FeeHint::SatPerVbyte(0)) => {
                Err(EngineError::InvalidAmount("fee rate must be positive".into()))
            }
            Some(FeeHint::SatPerVbyte(rate)) => Ok(FeeQuote {
                rate: FeeRate::from_sat_per_vb(rate),
                source: BtcFeeSource::Caller,
                network,
            }),
            Some(FeeHint::GasPriceGwei(_)) => Err(EngineError::InvalidAmount(
                "gas price hint does not apply to bitcoin".into(),
            )),
            None => {
                let mut quote =
                    quote_fee_rate(&*self.indexer, network, self.settings.confirmation_target)
                        .await;
                if quote.source == BtcFeeSource::Fallback {
                    quote.rate = FeeRate::from_sat_per_vb(self.settings.fallback_sat_per_vb);
                }
                Ok(quote)
            }
        }
    }
}

#[async_trait]
impl ChainAdapter for BitcoinAdapter {
    fn chain(&self) -> ChainKind {
        ChainKind::Bitcoin
    }

    fn network(&self) -> Network {
        self.network
    }

    async fn balances(&self, address: &str) -> Result<Balances, EngineError> {
        let utxos = self.indexer.utxos(address).await?;
        Ok(Balances {
            native: balance::utxo_asset_balance(&utxos),
            tokens: Vec::new(),
        })
    }

    async fn build_and_sign(
        &self,
        intent: &TransferIntent<'_>,
    ) -> Result<PreparedTransfer, EngineError> {
        let network = self.network.btc();
        let key = BtcKey::parse(intent.sender_private_key.expose_secret(), network)?;
        let recipient = parse_btc_address(intent.to_address, network)?;
        let change = parse_btc_address(intent.sender_address, network)?;

        let spend_sat = parse_btc(intent.amount)?;
        if spend_sat < self.settings.dust_threshold_sat {
            return Err(EngineError::InvalidAmount(format!(
                "{spend_sat} sat is below the dust threshold of {} sat",
                self.settings.dust_threshold_sat
            )));
        }

        let quote = self.fee_quote(intent.fee_hint).await?;
        let utxos = spendable(
            self.indexer.utxos(intent.sender_address).await?,
            self.settings.spend_unconfirmed,
        );
        let selection = select_utxos(
            &utxos,
            spend_sat,
            quote.rate,
            self.settings.dust_threshold_sat,
        )?;
        tracing::debug!(
            network = %self.network,
            inputs = selection.selected.len(),
            fee_sat = selection.fee_sat,
            change_sat = selection.change_sat,
            rate = %quote.rate,
            "selected utxos"
        );

        let unsigned = build_transaction(&selection, &recipient, &change)?;
        let signed = sign_btc(&unsigned, &key)?;

        Ok(PreparedTransfer::new(SignedTransaction {
            chain: ChainKind::Bitcoin,
            network: self.network,
            raw_hex: signed.raw_hex,
            txid: signed.txid,
            fee: FeeInfo {
                amount: U256::from(signed.fee_sat),
                unit: "sat",
                source: quote.source.into(),
            },
        }))
    }

    async fn broadcast(&self, prepared: &PreparedTransfer) -> Result<String, EngineError> {
        let signed = &prepared.signed;
        let txid = self.indexer.broadcast(&signed.raw_hex).await?;
        if txid != signed.txid {
            tracing::warn!(local = %signed.txid, remote = %txid, "indexer returned a different txid");
        }
        Ok(txid)
    }

    async fn recent_transactions(
        &self,
        address: &str,
        limit: usize,
    ) -> Result<Vec<TxRecord>, EngineError> {
        let history = self.indexer.recent_transactions(address, limit).await?;
        Ok(history
            .into_iter()
            .take(limit)
            .map(|tx| TxRecord {
                txid: tx.txid,
                confirmed: tx.confirmed,
                block_height: tx.block_height,
                timestamp: tx.block_time,
                fee: tx.fee_sat,
                net_amount: tx.net_sat,
            })
            .collect())
    }

    async fn check_confirmation(&self, txid: &str) -> Result<Confirmation, EngineError> {
        let (status, block_height) = match self.indexer.tx_status(txid).await? {
            None => (ConfirmationStatus::Unknown, None),
            Some(s) if s.confirmed => (ConfirmationStatus::Confirmed, s.block_height),
            Some(_) => (ConfirmationStatus::Pending, None),
        };
        Ok(Confirmation {
            chain: ChainKind::Bitcoin,
            network: self.network,
            txid: txid.to_string(),
            status,
            block_height,
        })
    }
}

// ---------------------------------------------------------------------------
// Ethereum and ERC-20
// ---------------------------------------------------------------------------

async fn gas_quote(
    provider: &LiveProvider,
    hint: Option<FeeHint>,
    fallback_gas_price_wei: u128,
) -> Result<GasQuote, EngineError> {
    let chain_id = provider.network().chain_id();
    match hint {
        Some(FeeHint::GasPriceGwei(0)) => {
            Err(EngineError::InvalidAmount("gas price must be positive".into()))
        }
        Some(FeeHint::GasPriceGwei(gwei)) => Ok(GasQuote::from_caller_gwei(chain_id, gwei)),
        Some(FeeHint::SatPerVbyte(_)) => Err(EngineError::InvalidAmount(
            "sat/vB hint does not apply to ethereum".into(),
        )),
        None => Ok(quote_gas(provider, fallback_gas_price_wei).await),
    }
}

/// Fail unless the sender holds at least `required` wei.
async fn ensure_ether(
    provider: &LiveProvider,
    sender: &str,
    required: U256,
) -> Result<(), EngineError> {
    let available = provider.native_balance(sender).await?;
    if available < required {
        return Err(EngineError::InsufficientBalance {
            asset: "ETH".into(),
            available,
            required,
        });
    }
    Ok(())
}

fn eth_fee(quote: &GasQuote, gas_limit: u64) -> FeeInfo {
    FeeInfo {
        amount: quote.pricing.max_fee(gas_limit),
        unit: "wei",
        source: quote.source.into(),
    }
}

async fn broadcast_raw(pool: &ProviderPool, prepared: &PreparedTransfer) -> Result<String, EngineError> {
    let signed = &prepared.signed;
    let raw = hex::decode(signed.raw_hex.trim_start_matches("0x"))
        .map_err(|e| EngineError::SigningFailed(format!("raw transaction is not hex: {e}")))?;
    let provider = match &prepared.provider {
        Some(provider) => provider.clone(),
        None => pool.connect().await?,
    };
    let hash = provider.send_raw_transaction(&raw).await?;
    if !hash.eq_ignore_ascii_case(&signed.txid) {
        tracing::warn!(local = %signed.txid, remote = %hash, "node returned a different tx hash");
    }
    Ok(hash)
}

async fn receipt_confirmation(
    pool: &ProviderPool,
    chain: ChainKind,
    network: Network,
    txid: &str,
) -> Result<Confirmation, EngineError> {
    let provider = pool.connect().await?;
    let (status, block_height) = match provider.receipt(txid).await? {
        None => (ConfirmationStatus::Pending, None),
        Some(r) if r.status == Some(false) => (ConfirmationStatus::Reverted, r.block_number),
        Some(r) if r.block_number.is_some() => (ConfirmationStatus::Confirmed, r.block_number),
        Some(_) => (ConfirmationStatus::Pending, None),
    };
    Ok(Confirmation {
        chain,
        network,
        txid: txid.to_string(),
        status,
        block_height,
    })
}

fn signed_eth(
    chain: ChainKind,
    network: Network,
    signed: chain_eth::SignedEthTransaction,
    fee: FeeInfo,
) -> SignedTransaction {
    SignedTransaction {
        chain,
        network,
        raw_hex: format!("0x{}", hex::encode(&signed.raw_tx)),
        txid: signed.tx_hash,
        fee,
    }
}

/// Native ether transfers.
pub struct EthereumAdapter {
    network: Network,
    pool: ProviderPool,
    fallback_gas_price_wei: u128,
    tokens: Vec<TokenConfig>,
}

impl EthereumAdapter {
    pub fn new(
        network: Network,
        pool: ProviderPool,
        fallback_gas_price_wei: u128,
        tokens: Vec<TokenConfig>,
    ) -> Self {
        Self {
            network,
            pool,
            fallback_gas_price_wei,
            tokens,
        }
    }
}

#[async_trait]
impl ChainAdapter for EthereumAdapter {
    fn chain(&self) -> ChainKind {
        ChainKind::Ethereum
    }

    fn network(&self) -> Network {
        self.network
    }

    async fn balances(&self, address: &str) -> Result<Balances, EngineError> {
        let provider = self.pool.connect().await?;
        balance::account_balances(&provider, address, &self.tokens).await
    }

    async fn build_and_sign(
        &self,
        intent: &TransferIntent<'_>,
    ) -> Result<PreparedTransfer, EngineError> {
        let secret = chain_eth::address::parse_private_key(intent.sender_private_key.expose_secret())?;
        chain_eth::address::parse_address(intent.to_address)?;
        let value = parse_amount(intent.amount, ETH_DECIMALS)?;

        let provider = self.pool.connect().await?;
        let quote = gas_quote(&provider, intent.fee_hint, self.fallback_gas_price_wei).await?;
        let fee = eth_fee(&quote, NATIVE_TRANSFER_GAS);
        let required = value
            .checked_add(fee.amount)
            .ok_or_else(|| EngineError::InvalidAmount("amount plus fee overflows".into()))?;
        ensure_ether(&provider, intent.sender_address, required).await?;

        let nonce = provider.nonce(intent.sender_address).await?;
        tracing::debug!(network = %self.network, nonce, endpoint = %provider.endpoint(), "signing ether transfer");
        let tx = build_transfer(
            quote.chain_id,
            nonce,
            intent.to_address,
            value,
            quote.pricing,
            NATIVE_TRANSFER_GAS,
        )?;
        let signed = sign_eth(&tx, &secret)?;
        let signed = signed_eth(ChainKind::Ethereum, self.network, signed, fee);
        Ok(PreparedTransfer::new(signed).via(provider))
    }

    async fn broadcast(&self, prepared: &PreparedTransfer) -> Result<String, EngineError> {
        broadcast_raw(&self.pool, prepared).await
    }

    async fn recent_transactions(
        &self,
        address: &str,
        _limit: usize,
    ) -> Result<Vec<TxRecord>, EngineError> {
        // JSON-RPC has no per-address history query.
        tracing::debug!(network = %self.network, %address, "no transaction history over json-rpc");
        Ok(Vec::new())
    }

    async fn check_confirmation(&self, txid: &str) -> Result<Confirmation, EngineError> {
        receipt_confirmation(&self.pool, ChainKind::Ethereum, self.network, txid).await
    }
}

/// ERC-20 transfers of one configured token.
pub struct TokenAdapter {
    network: Network,
    pool: ProviderPool,
    token: TokenConfig,
    fallback_gas_price_wei: u128,
}

impl TokenAdapter {
    pub fn new(
        network: Network,
        pool: ProviderPool,
        token: TokenConfig,
        fallback_gas_price_wei: u128,
    ) -> Self {
        Self {
            network,
            pool,
            token,
            fallback_gas_price_wei,
        }
    }

    pub fn token(&self) -> &TokenConfig {
        &self.token
    }
}

#[async_trait]
impl ChainAdapter for TokenAdapter {
    fn chain(&self) -> ChainKind {
        ChainKind::Usdt
    }

    fn network(&self) -> Network {
        self.network
    }

    async fn balances(&self, address: &str) -> Result<Balances, EngineError> {
        let provider = self.pool.connect().await?;
        let token = balance::token_balance(&provider, address, &self.token).await?;
        Ok(Balances {
            native: balance::token_as_asset(&token),
            tokens: Vec::new(),
        })
    }

    /// Both the token balance and the ether for gas are checked before the
    /// nonce is read, so an underfunded send never touches the nonce.
    async fn build_and_sign(
        &self,
        intent: &TransferIntent<'_>,
    ) -> Result<PreparedTransfer, EngineError> {
        let secret = chain_eth::address::parse_private_key(intent.sender_private_key.expose_secret())?;
        chain_eth::address::parse_address(intent.to_address)?;

        let provider = self.pool.connect().await?;
        let decimals = provider
            .token_decimals_or(&self.token.contract, self.token.fallback_decimals)
            .await;
        let amount = parse_amount(intent.amount, decimals)?;

        let available = provider
            .token_balance(&self.token.contract, intent.sender_address)
            .await?;
        if available < amount {
            return Err(EngineError::InsufficientBalance {
                asset: self.token.symbol.clone(),
                available,
                required: amount,
            });
        }

        let quote = gas_quote(&provider, intent.fee_hint, self.fallback_gas_price_wei).await?;
        let fee = eth_fee(&quote, TOKEN_TRANSFER_GAS);
        ensure_ether(&provider, intent.sender_address, fee.amount).await?;

        let nonce = provider.nonce(intent.sender_address).await?;
        tracing::debug!(
            network = %self.network,
            token = %self.token.symbol,
            nonce,
            decimals,
            endpoint = %provider.endpoint(),
            "signing token transfer"
        );
        let tx = build_erc20_transfer(
            quote.chain_id,
            nonce,
            &self.token.contract,
            intent.to_address,
            amount,
            quote.pricing,
            TOKEN_TRANSFER_GAS,
        )?;
        let signed = sign_eth(&tx, &secret)?;
        let signed = signed_eth(ChainKind::Usdt, self.network, signed, fee);
        Ok(PreparedTransfer::new(signed).via(provider))
    }

    async fn broadcast(&self, prepared: &PreparedTransfer) -> Result<String, EngineError> {
        broadcast_raw(&self.pool, prepared).await
    }

    async fn recent_transactions(
        &self,
        _address: &str,
        _limit: usize,
    ) -> Result<Vec<TxRecord>, EngineError> {
        Ok(Vec::new())
    }

    async fn check_confirmation(&self, txid: &str) -> Result<Confirmation, EngineError> {
        receipt_confirmation(&self.pool, ChainKind::Usdt, self.network, txid).await
    }
}
