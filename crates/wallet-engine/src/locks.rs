//! Per-sender send serialization.
//!
//! Two sends from the same address would otherwise race on UTXO
//! selection (Bitcoin) or on the pending nonce (Ethereum). Sends from
//! different addresses never wait on each other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::OwnedMutexGuard;

use crate::types::{ChainFamily, Network};

type LockKey = (ChainFamily, Network, String);
type LockMap = HashMap<LockKey, Arc<tokio::sync::Mutex<()>>>;

/// Registry of async mutexes keyed by `(family, network, address)`.
///
/// Callers pass the canonical spelling of the address. ETH and USDT share
/// a family, so a token send and a native send from the same account are
/// serialized against each other. An entry lives only while some send
/// holds or waits for it.
#[derive(Debug, Default)]
pub struct AddressLocks {
    inner: Arc<Mutex<LockMap>>,
}

/// Held for the duration of one send. Dropping it releases the address
/// and prunes entries nobody is using.
#[derive(Debug)]
pub struct AddressGuard {
    guard: Option<OwnedMutexGuard<()>>,
    registry: Arc<Mutex<LockMap>>,
}

impl AddressLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other send holds `address`, then hold it until the
    /// guard drops.
    pub async fn acquire(
        &self,
        family: ChainFamily,
        network: Network,
        address: &str,
    ) -> AddressGuard {
        let lock = {
            let mut map = lock_map(&self.inner);
            Arc::clone(map.entry((family, network, address.to_string())).or_default())
        };
        AddressGuard {
            guard: Some(lock.lock_owned().await),
            registry: Arc::clone(&self.inner),
        }
    }

    /// Number of addresses currently held or waited on.
    pub fn len(&self) -> usize {
        lock_map(&self.inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for AddressGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Waiters hold a clone of the Arc, so a count of one means only the
        // map still refers to the mutex. This also sweeps entries left by
        // cancelled waiters.
        lock_map(&self.registry).retain(|_, lock| Arc::strong_count(lock) > 1);
    }
}

fn lock_map(map: &Mutex<LockMap>) -> MutexGuard<'_, LockMap> {
    map.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn same_address_is_serialized() {
        let locks = Arc::new(AddressLocks::new());
        let guard = locks
            .acquire(ChainFamily::Ethereum, Network::Mainnet, "0xabc")
            .await;

        let contender = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _g = locks
                    .acquire(ChainFamily::Ethereum, Network::Mainnet, "0xabc")
                    .await;
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!contender.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .unwrap()
            .unwrap();
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn different_addresses_do_not_block() {
        let locks = AddressLocks::new();
        let _a = locks.acquire(ChainFamily::Bitcoin, Network::Mainnet, "addr-a").await;
        let b = tokio::time::timeout(
            Duration::from_millis(200),
            locks.acquire(ChainFamily::Bitcoin, Network::Mainnet, "addr-b"),
        )
        .await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn networks_are_separate_keys() {
        let locks = AddressLocks::new();
        let _main = locks.acquire(ChainFamily::Ethereum, Network::Mainnet, "0xabc").await;
        let _test = locks.acquire(ChainFamily::Ethereum, Network::Testnet, "0xabc").await;
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test]
    async fn released_addresses_leave_the_map() {
        let locks = AddressLocks::new();
        for i in 0..1000 {
            let _g = locks
                .acquire(ChainFamily::Bitcoin, Network::Testnet, &format!("addr-{i}"))
                .await;
            assert_eq!(locks.len(), 1);
        }
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn entry_survives_while_someone_waits() {
        let locks = Arc::new(AddressLocks::new());
        let first = locks.acquire(ChainFamily::Ethereum, Network::Mainnet, "0xabc").await;

        let waiter = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _g = locks.acquire(ChainFamily::Ethereum, Network::Mainnet, "0xabc").await;
                tokio::time::sleep(Duration::from_millis(20)).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        drop(first);
        assert_eq!(locks.len(), 1);
        waiter.await.unwrap();
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn cancelled_waiter_is_swept() {
        let locks = AddressLocks::new();
        let held = locks.acquire(ChainFamily::Bitcoin, Network::Mainnet, "addr-a").await;
        let timed_out = tokio::time::timeout(
            Duration::from_millis(20),
            locks.acquire(ChainFamily::Bitcoin, Network::Mainnet, "addr-a"),
        )
        .await;
        assert!(timed_out.is_err());

        drop(held);
        assert!(locks.is_empty());
    }
}
