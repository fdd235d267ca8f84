//! The wallet engine: adapter registry plus the send pipeline.

use std::collections::HashMap;
use std::sync::Arc;

use chain_btc::EsploraClient;
use chain_eth::{HttpTransport, JsonRpcTransport, ProviderPool};
use crypto_utils::KeyCipher;
use secrecy::ExposeSecret;

use crate::adapter::{
    BitcoinAdapter, BitcoinSettings, ChainAdapter, EthereumAdapter, TokenAdapter, TransferIntent,
};
use crate::config::EngineConfig;
use crate::error::{EngineError, ErrorCode};
use crate::keys;
use crate::locks::AddressLocks;
use crate::state::{SendProgress, SendStage};
use crate::types::{
    ChainKind, Confirmation, FeeInfo, GeneratedWallet, KeyMaterial, Network, SealedKey,
    SendRequest, TxResult, WalletInfo,
};

const DEFAULT_RECENT_TX_LIMIT: usize = 10;

type AdapterKey = (ChainKind, Network);

/// Custodial wallet engine for BTC, ETH and USDT.
///
/// Cheap to share behind an `Arc`; every operation takes `&self`.
pub struct WalletEngine {
    adapters: HashMap<AdapterKey, Arc<dyn ChainAdapter>>,
    locks: AddressLocks,
    recent_tx_limit: usize,
}

#[derive(Default)]
pub struct WalletEngineBuilder {
    adapters: HashMap<AdapterKey, Arc<dyn ChainAdapter>>,
    recent_tx_limit: Option<usize>,
}

impl WalletEngineBuilder {
    /// Register an adapter, replacing any previous one for its pair.
    pub fn adapter(mut self, adapter: Arc<dyn ChainAdapter>) -> Self {
        self.adapters
            .insert((adapter.chain(), adapter.network()), adapter);
        self
    }

    pub fn recent_tx_limit(mut self, limit: usize) -> Self {
        self.recent_tx_limit = Some(limit);
        self
    }

    pub fn build(self) -> WalletEngine {
        WalletEngine {
            adapters: self.adapters,
            locks: AddressLocks::new(),
            recent_tx_limit: self.recent_tx_limit.unwrap_or(DEFAULT_RECENT_TX_LIMIT),
        }
    }
}

impl WalletEngine {
    pub fn builder() -> WalletEngineBuilder {
        WalletEngineBuilder::default()
    }

    /// Wire HTTP clients and adapters for every chain on both networks.
    pub fn from_config(config: &EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let query = config.timeouts.query();
        let broadcast = config.timeouts.broadcast();
        let transport: Arc<dyn JsonRpcTransport> = Arc::new(HttpTransport::new(query, broadcast));

        let mut builder = Self::builder().recent_tx_limit(config.recent_tx_limit);
        for network in Network::ALL {
            let indexer = EsploraClient::new(config.esplora_url(network), network.btc())
                .with_timeouts(query, broadcast);
            builder = builder.adapter(Arc::new(
                BitcoinAdapter::new(network, Arc::new(indexer))
                    .with_settings(BitcoinSettings::from_config(config, network)),
            ));

            let pool = ProviderPool::new(
                network.eth(),
                config.rpc_urls(network),
                Arc::clone(&transport),
            );
            let fallback = config.fallback_gas_price_wei(network);
            builder = builder
                .adapter(Arc::new(EthereumAdapter::new(
                    network,
                    pool.clone(),
                    fallback,
                    config.tracked_tokens(network),
                )))
                .adapter(Arc::new(TokenAdapter::new(
                    network,
                    pool,
                    config.usdt_token(network),
                    fallback,
                )));

            tracing::info!(
                %network,
                esplora = %config.esplora_url(network),
                rpc_endpoints = config.rpc_urls(network).len(),
                "chain adapters configured"
            );
        }
        Ok(builder.build())
    }

    fn adapter(&self, chain: ChainKind, network: Network) -> Result<&Arc<dyn ChainAdapter>, EngineError> {
        self.adapters
            .get(&(chain, network))
            .ok_or_else(|| EngineError::UnsupportedChain(format!("{chain} on {network} is not configured")))
    }

    /// A fresh wallet: 24-word mnemonic, key at index 0, default address.
    pub fn generate_wallet(
        &self,
        chain: ChainKind,
        network: Network,
    ) -> Result<GeneratedWallet, EngineError> {
        Ok(GeneratedWallet::new(keys::generate(chain, network)?))
    }

    /// Balances and recent history of `address`.
    ///
    /// History is best effort: if it fails, the balances are still returned
    /// with an empty history.
    pub async fn get_wallet_info(
        &self,
        chain: ChainKind,
        address: &str,
        network: Network,
    ) -> Result<WalletInfo, EngineError> {
        keys::validate_address(chain, network, address)?;
        let adapter = self.adapter(chain, network)?;

        let (balances, history) = tokio::join!(
            adapter.balances(address),
            adapter.recent_transactions(address, self.recent_tx_limit)
        );
        let balances = balances?;
        let recent_transactions = history.unwrap_or_else(|e| {
            tracing::warn!(%chain, %network, %address, error = %e, "transaction history unavailable");
            Vec::new()
        });

        Ok(WalletInfo {
            chain,
            network,
            address: address.to_string(),
            balance: balances.native,
            recent_transactions,
            token_balances: balances.tokens,
        })
    }

    /// Validate, build, sign and broadcast a transfer.
    ///
    /// Never returns an error: every failure is reported in the result with
    /// its code and the stage the send had reached.
    pub async fn send_value(&self, request: SendRequest) -> TxResult {
        let mut progress = SendProgress::new();
        let mut fee = None;

        match self.run_send(&request, &mut progress, &mut fee).await {
            Ok(txid) => {
                tracing::info!(
                    chain = %request.chain,
                    network = %request.network,
                    %txid,
                    "send broadcast"
                );
                TxResult {
                    success: true,
                    chain: request.chain,
                    network: request.network,
                    txid: Some(txid),
                    error: None,
                    details: "broadcast".into(),
                    stage: progress.stage().unwrap_or(SendStage::Broadcast),
                    failed_at: None,
                    fee,
                }
            }
            Err(err) => {
                progress.fail();
                tracing::warn!(
                    chain = %request.chain,
                    network = %request.network,
                    code = %err.code(),
                    failed_at = ?progress.failed_at(),
                    error = %err,
                    "send failed"
                );
                TxResult {
                    success: false,
                    chain: request.chain,
                    network: request.network,
                    txid: None,
                    error: Some(err.code()),
                    details: err.to_string(),
                    stage: SendStage::Failed,
                    failed_at: progress.failed_at(),
                    fee,
                }
            }
        }
    }

    async fn run_send(
        &self,
        request: &SendRequest,
        progress: &mut SendProgress,
        fee: &mut Option<FeeInfo>,
    ) -> Result<String, EngineError> {
        let (chain, network) = (request.chain, request.network);
        let adapter = self.adapter(chain, network)?;

        keys::validate_address(chain, network, &request.to_address)?;
        let private_key = request.sender_private_key.expose_secret();
        let sender = match &request.sender_address {
            Some(address) => {
                keys::validate_address(chain, network, address)?;
                if !keys::key_controls_address(chain, network, private_key, address)? {
                    return Err(EngineError::KeyAddressMismatch {
                        address: address.clone(),
                    });
                }
                keys::canonical_address(chain, network, address)?
            }
            None => keys::derive_address(chain, network, private_key)?,
        };
        crate::amount::validate_amount(&request.amount)?;
        progress.advance(SendStage::Validated)?;
        tracing::info!(
            %chain,
            %network,
            from = %sender,
            to = %request.to_address,
            amount = %request.amount,
            "send validated"
        );

        let _guard = self.locks.acquire(chain.family(), network, &sender).await;
        let intent = TransferIntent {
            sender_private_key: &request.sender_private_key,
            sender_address: &sender,
            to_address: &request.to_address,
            amount: &request.amount,
            fee_hint: request.fee_hint,
        };

        let prepared = match adapter.build_and_sign(&intent).await {
            Ok(prepared) => prepared,
            Err(err) => {
                if err.code() == ErrorCode::SigningFailed {
                    progress.advance(SendStage::Built)?;
                }
                return Err(err);
            }
        };
        progress.advance(SendStage::Built)?;
        progress.advance(SendStage::Signed)?;
        let signed = &prepared.signed;
        *fee = Some(signed.fee.clone());
        tracing::debug!(
            %chain,
            %network,
            txid = %signed.txid,
            fee = %signed.fee.amount,
            fee_unit = signed.fee.unit,
            fee_source = ?signed.fee.source,
            endpoint = prepared.endpoint().unwrap_or("-"),
            "send signed"
        );

        let txid = adapter.broadcast(&prepared).await?;
        progress.advance(SendStage::Broadcast)?;
        Ok(txid)
    }

    /// Current mined state of `txid`.
    pub async fn check_confirmation(
        &self,
        chain: ChainKind,
        network: Network,
        txid: &str,
    ) -> Result<Confirmation, EngineError> {
        self.adapter(chain, network)?.check_confirmation(txid).await
    }

    /// Encrypt a key's private half for storage at rest.
    pub fn seal_private_key(
        &self,
        key: &KeyMaterial,
        cipher: &dyn KeyCipher,
    ) -> Result<SealedKey, EngineError> {
        let ciphertext = cipher.seal(key.private_key.expose_secret())?;
        Ok(SealedKey {
            chain: key.chain,
            network: key.network,
            address: key.address.clone(),
            ciphertext,
        })
    }

    /// Decrypt a sealed key and check it still controls its address.
    pub fn open_private_key(
        &self,
        sealed: &SealedKey,
        cipher: &dyn KeyCipher,
    ) -> Result<KeyMaterial, EngineError> {
        let private_key = cipher.open(&sealed.ciphertext)?;
        let mut key = keys::from_private_key(sealed.chain, sealed.network, private_key.expose_secret())?;
        if key.address != sealed.address {
            if !keys::key_controls_address(
                sealed.chain,
                sealed.network,
                private_key.expose_secret(),
                &sealed.address,
            )? {
                return Err(EngineError::KeyAddressMismatch {
                    address: sealed.address.clone(),
                });
            }
            key.address = sealed.address.clone();
        }
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unregistered_pair_is_unsupported() {
        let engine = WalletEngine::builder().build();
        let err = engine.adapter(ChainKind::Bitcoin, Network::Mainnet).err().unwrap();
        assert_eq!(err.code(), ErrorCode::UnsupportedChain);
    }

    #[test]
    fn from_config_registers_every_pair() {
        let engine = WalletEngine::from_config(&EngineConfig::default()).unwrap();
        for chain in ChainKind::ALL {
            for network in Network::ALL {
                let adapter = engine.adapter(chain, network).unwrap();
                assert_eq!(adapter.chain(), chain);
                assert_eq!(adapter.network(), network);
            }
        }
        assert_eq!(engine.recent_tx_limit, 10);
    }

    #[tokio::test]
    async fn send_on_unconfigured_chain_fails_without_stage() {
        let engine = WalletEngine::builder().build();
        let result = engine
            .send_value(SendRequest {
                chain: ChainKind::Ethereum,
                network: Network::Testnet,
                sender_private_key: "0x01".to_string().into(),
                sender_address: None,
                to_address: "0x000000000000000000000000000000000000dEaD".into(),
                amount: "1".into(),
                fee_hint: None,
            })
            .await;
        assert!(!result.success);
        assert_eq!(result.error, Some(ErrorCode::UnsupportedChain));
        assert_eq!(result.stage, SendStage::Failed);
        assert_eq!(result.failed_at, None);
    }
}
