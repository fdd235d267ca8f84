//! Balance aggregation across the native asset and tracked tokens.

use chain_btc::utxo::{summarize, Utxo};
use chain_eth::{LiveProvider, U256};
use futures::future::join_all;

use crate::amount::{format_units, BTC_DECIMALS, ETH_DECIMALS};
use crate::config::TokenConfig;
use crate::error::EngineError;
use crate::types::{AssetBalance, BalanceStatus, Balances, TokenBalance};

/// Confirmed and mempool totals of an address's UTXO set.
pub fn utxo_asset_balance(utxos: &[Utxo]) -> AssetBalance {
    let summary = summarize(utxos);
    AssetBalance {
        symbol: "BTC".into(),
        decimals: BTC_DECIMALS,
        confirmed: U256::from(summary.confirmed_sat),
        unconfirmed: U256::from(summary.unconfirmed_sat),
        human_total: format_units(U256::from(summary.total_sat()), BTC_DECIMALS),
    }
}

/// Native ether plus every tracked token, fetched concurrently.
///
/// A failed native lookup fails the whole call. A failed token lookup
/// degrades to a zero entry carrying the error.
pub async fn account_balances(
    provider: &LiveProvider,
    owner: &str,
    tokens: &[TokenConfig],
) -> Result<Balances, EngineError> {
    let (native, tokens) = tokio::join!(
        provider.native_balance(owner),
        token_balances(provider, owner, tokens)
    );
    let native = native?;

    Ok(Balances {
        native: AssetBalance {
            symbol: "ETH".into(),
            decimals: ETH_DECIMALS,
            confirmed: native,
            unconfirmed: U256::ZERO,
            human_total: format_units(native, ETH_DECIMALS),
        },
        tokens,
    })
}

pub async fn token_balances(
    provider: &LiveProvider,
    owner: &str,
    tokens: &[TokenConfig],
) -> Vec<TokenBalance> {
    join_all(tokens.iter().map(|token| async move {
        match token_balance(provider, owner, token).await {
            Ok(balance) => balance,
            Err(e) => {
                tracing::warn!(
                    token = %token.symbol,
                    contract = %token.contract,
                    endpoint = %provider.endpoint(),
                    error = %e,
                    "token balance lookup failed"
                );
                failed_token(token, &e)
            }
        }
    }))
    .await
}

/// Balance of one token. Decimals fall back to the configured value when
/// the contract does not answer `decimals()`.
pub async fn token_balance(
    provider: &LiveProvider,
    owner: &str,
    token: &TokenConfig,
) -> Result<TokenBalance, EngineError> {
    let (raw, decimals) = tokio::join!(
        provider.token_balance(&token.contract, owner),
        provider.token_decimals_or(&token.contract, token.fallback_decimals)
    );
    let raw = raw?;

    Ok(TokenBalance {
        token: token.symbol.clone(),
        contract: token.contract.clone(),
        raw_balance: raw,
        decimals,
        human_balance: format_units(raw, decimals),
        status: BalanceStatus::Ok,
    })
}

/// A token balance as the primary asset of a token wallet.
pub fn token_as_asset(balance: &TokenBalance) -> AssetBalance {
    AssetBalance {
        symbol: balance.token.clone(),
        decimals: balance.decimals,
        confirmed: balance.raw_balance,
        unconfirmed: U256::ZERO,
        human_total: balance.human_balance.clone(),
    }
}

fn failed_token(token: &TokenConfig, err: &EngineError) -> TokenBalance {
    TokenBalance {
        token: token.symbol.clone(),
        contract: token.contract.clone(),
        raw_balance: U256::ZERO,
        decimals: token.fallback_decimals,
        human_balance: "0".into(),
        status: BalanceStatus::Error {
            code: err.code(),
            details: err.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use chain_eth::EthNetwork;

    use super::*;
    use crate::error::ErrorCode;

    fn utxo(value_sat: u64, confirmed: bool) -> Utxo {
        Utxo {
            txid: "aa".repeat(32),
            vout: 0,
            value_sat,
            owner_address: "addr".into(),
            script_pubkey: Vec::new(),
            confirmed,
        }
    }

    #[test]
    fn utxo_balance_splits_confirmed_and_pending() {
        let balance = utxo_asset_balance(&[utxo(50_000, true), utxo(25_000, false)]);
        assert_eq!(balance.confirmed, U256::from(50_000u64));
        assert_eq!(balance.unconfirmed, U256::from(25_000u64));
        assert_eq!(balance.human_total, "0.00075");
        assert_eq!(balance.symbol, "BTC");
    }

    #[test]
    fn empty_utxo_set_is_zero() {
        let balance = utxo_asset_balance(&[]);
        assert_eq!(balance.human_total, "0");
    }

    #[test]
    fn failed_token_carries_code() {
        let token = TokenConfig::usdt(EthNetwork::Mainnet);
        let entry = failed_token(&token, &EngineError::NetworkUnavailable("timeout".into()));
        assert_eq!(entry.raw_balance, U256::ZERO);
        assert_eq!(entry.decimals, 6);
        match entry.status {
            BalanceStatus::Error { code, .. } => assert_eq!(code, ErrorCode::NetworkUnavailable),
            BalanceStatus::Ok => panic!("expected error status"),
        }
    }

    #[test]
    fn token_as_asset_keeps_decimals() {
        let balance = TokenBalance {
            token: "USDT".into(),
            contract: "0x0".into(),
            raw_balance: U256::from(1_500_000u64),
            decimals: 6,
            human_balance: "1.5".into(),
            status: BalanceStatus::Ok,
        };
        let asset = token_as_asset(&balance);
        assert_eq!(asset.decimals, 6);
        assert_eq!(asset.human_total, "1.5");
    }
}
